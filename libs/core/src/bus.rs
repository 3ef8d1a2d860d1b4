use std::fmt::{self, Debug, Formatter};
use std::time::Duration;

use thiserror::Error;

/// Errors reported by bus transports.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BusError {
    /// The underlying device failed an I/O operation.
    #[error("Bus I/O failed")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The underlying device reported a failure of its own.
    #[error("Bus device reported a failure")]
    Device {
        /// The device's error.
        #[from]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The other side of the connection is gone.
    #[error("Bus connection is closed")]
    Closed,
}

/// Write half of a connection to a shared bus.
///
/// Writes are assumed to block until the byte is accepted by the device;
/// there is no partial-write reporting at this level.
///
/// # Examples
///
/// Implementing an in-memory transport:
///
/// ```
/// use icsc_core::{BusError, BusTx};
///
/// struct VecTx(Vec<u8>);
///
/// impl BusTx for VecTx {
///     fn write_byte(&mut self, byte: u8) -> Result<(), BusError> {
///         self.0.push(byte);
///         Ok(())
///     }
///
///     fn flush(&mut self) -> Result<(), BusError> {
///         Ok(())
///     }
/// }
/// ```
pub trait BusTx: Send {
    /// Writes a single byte to the bus.
    fn write_byte(&mut self, byte: u8) -> Result<(), BusError>;

    /// Blocks until everything written so far has reached the device.
    fn flush(&mut self) -> Result<(), BusError>;
}

/// Read half of a connection to a shared bus.
pub trait BusRx: Send {
    /// Waits up to `timeout` for the next byte.
    ///
    /// Returns `Ok(None)` when the timeout elapses without data; this is the
    /// bounded wait that keeps a receive loop responsive to shutdown.
    fn recv_byte(&mut self, timeout: Duration) -> Result<Option<u8>, BusError>;
}

/// A transmit-enable line for half-duplex media.
///
/// RS-485 transceivers drive the bus only while their enable pin is held
/// high; at all other times the line must be released so other stations can
/// talk. Implementations map `set_transmitting` onto whatever controls that
/// pin. Full-duplex or externally-switched media simply go without one.
pub trait DirectionControl: Send {
    /// Puts the transceiver into drive mode (`true`) or listen mode (`false`).
    fn set_transmitting(&mut self, transmitting: bool) -> Result<(), BusError>;
}

// Provide Debug representations so types that contain trait objects can derive Debug.
impl Debug for dyn BusTx {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<BusTx trait>")
    }
}

impl Debug for dyn BusRx {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<BusRx trait>")
    }
}

impl Debug for dyn DirectionControl {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<DirectionControl trait>")
    }
}
