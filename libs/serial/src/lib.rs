//! Serial transport for inter-station bus messaging.
//!
//! For the basic task of exchanging commands between stations, you likely
//! want to use the high-level API in the [`icsc`] crate instead.
//!
//! However, you can use [`open_bus`] and [`configure_port`] directly if you're
//! doing custom lower-level communication, and [`SysfsPin`] when an RS-485
//! transceiver's transmit-enable pin hangs off a GPIO.
//!
//! # Examples
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! #
//! let (tx, rx) = icsc_serial::open_bus("/dev/ttyUSB0", 115_200)?;
//! // tx and rx plug into a station's transmit and receive paths.
//! #
//! # Ok(()) }
//! ```
//!
//! [`icsc`]: https://docs.rs/icsc
#![doc(html_root_url = "https://docs.rs/icsc-serial/0.2.0")]
#![deny(
    missing_copy_implementations,
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code
)]
#![warn(
    missing_docs,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results
)]

mod errors;
mod gpio;
mod serial_bus;
mod serial_port;

pub use self::errors::SerialError;
pub use self::gpio::SysfsPin;
pub use self::serial_bus::{open_bus, SerialRx, SerialTx};
pub use self::serial_port::configure_port;
