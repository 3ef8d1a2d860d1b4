use std::io;

use thiserror::Error;

/// Errors related to setting up the serial transport.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SerialError {
    /// The serial device could not be opened.
    #[error("Couldn't open serial device {}", path)]
    Open {
        /// Path of the device that failed to open.
        path: String,

        /// The underlying serial error.
        source: serial_core::Error,
    },

    /// The serial port rejected its configuration.
    #[error("Couldn't configure serial port")]
    Configuration {
        /// The underlying serial error.
        #[from]
        source: serial_core::Error,
    },

    /// The transmit-enable GPIO pin could not be set up.
    #[error("Couldn't set up GPIO pin {}", pin)]
    Gpio {
        /// The sysfs GPIO number that failed.
        pin: u32,

        /// The underlying I/O error.
        source: io::Error,
    },
}
