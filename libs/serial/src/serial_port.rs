use std::time::Duration;

use serial_core as serial;
use serial_core::prelude::*;

use crate::errors::SerialError;

/// Configures the given serial port for use on a station bus.
///
/// The protocol uses 8N1 format with no flow control; the bit rate is
/// whatever the bus agrees on. Also sets the provided timeout value.
///
/// # Errors
///
/// Returns [`SerialError::Configuration`] if the underlying serial port
/// reports an error.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// #
/// let mut port = serial::open("/dev/ttyUSB0")?;
/// icsc_serial::configure_port(&mut port, 115_200, Duration::from_millis(100))?;
/// // Now ready for communication with other stations (8N1, no flow control).
/// #
/// # Ok(()) }
/// ```
pub fn configure_port<P: SerialPort>(port: &mut P, bitrate: usize, timeout: Duration) -> Result<(), SerialError> {
    port.reconfigure(&|settings| {
        settings.set_baud_rate(serial::BaudRate::from_speed(bitrate))?;
        settings.set_char_size(serial::Bits8);
        settings.set_parity(serial::ParityNone);
        settings.set_stop_bits(serial::Stop1);
        settings.set_flow_control(serial::FlowNone);
        Ok(())
    })?;
    port.set_timeout(timeout)?;
    Ok(())
}
