use std::ffi::OsStr;
use std::fmt::{self, Debug, Formatter};
use std::io::{self, Read, Write};
use std::time::Duration;

use log::debug;
use serial_core::prelude::*;

use icsc_core::{BusError, BusRx, BusTx};

use crate::errors::SerialError;
use crate::serial_port::configure_port;

/// Timeout applied to freshly opened ports; receive loops override it per wait.
const INITIAL_TIMEOUT: Duration = Duration::from_millis(100);

/// Opens a serial device for use as a station bus connection.
///
/// The device is opened twice, once per half, so the receive loop can sit in
/// its bounded wait while senders independently hold the write half. Both
/// handles are configured for 8N1 at the given bit rate.
///
/// # Errors
///
/// Returns [`SerialError::Open`] if the device can't be opened and
/// [`SerialError::Configuration`] if it rejects the port settings.
///
/// # Examples
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// #
/// let (tx, rx) = icsc_serial::open_bus("/dev/ttyUSB0", 115_200)?;
/// // Hand tx and rx to a station.
/// #
/// # Ok(()) }
/// ```
pub fn open_bus<T: AsRef<OsStr> + ?Sized>(path: &T, bitrate: usize) -> Result<(SerialTx, SerialRx), SerialError> {
    let writer = open_half(path, bitrate)?;
    let reader = open_half(path, bitrate)?;
    debug!("opened {} at {} baud", path.as_ref().to_string_lossy(), bitrate);
    Ok((
        SerialTx { port: writer },
        SerialRx {
            port: reader,
            timeout: INITIAL_TIMEOUT,
        },
    ))
}

fn open_half<T: AsRef<OsStr> + ?Sized>(path: &T, bitrate: usize) -> Result<serial::SystemPort, SerialError> {
    let mut port = serial::open(path).map_err(|source| SerialError::Open {
        path: path.as_ref().to_string_lossy().into_owned(),
        source,
    })?;
    configure_port(&mut port, bitrate, INITIAL_TIMEOUT)?;
    Ok(port)
}

/// Write half of a serial bus connection.
pub struct SerialTx {
    port: serial::SystemPort,
}

impl BusTx for SerialTx {
    fn write_byte(&mut self, byte: u8) -> Result<(), BusError> {
        self.port.write_all(&[byte])?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), BusError> {
        self.port.flush()?;
        Ok(())
    }
}

impl Debug for SerialTx {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "SerialTx")
    }
}

/// Read half of a serial bus connection.
pub struct SerialRx {
    port: serial::SystemPort,
    timeout: Duration,
}

impl BusRx for SerialRx {
    fn recv_byte(&mut self, timeout: Duration) -> Result<Option<u8>, BusError> {
        if self.timeout != timeout {
            self.port
                .set_timeout(timeout)
                .map_err(|e| BusError::Device { source: Box::new(e) })?;
            self.timeout = timeout;
        }

        let mut byte = [0u8; 1];
        match self.port.read(&mut byte) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(byte[0])),
            Err(e) if e.kind() == io::ErrorKind::TimedOut || e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl Debug for SerialRx {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "SerialRx")
    }
}
