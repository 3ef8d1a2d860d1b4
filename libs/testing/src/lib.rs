//! Tools for testing and debugging inter-station bus messaging.
//!
//! For the basic task of exchanging commands between stations, you likely
//! want to use the high-level API in the [`icsc`] crate instead.
//!
//! This crate isn't directly related to real hardware, but provides some
//! helpful diagnostic tools. [`VirtualBus`] is a general-purpose in-memory
//! stand-in for the shared serial line, letting any number of stations talk
//! to each other inside one process, and [`VirtualDirection`] records
//! transmit-enable transitions so tests can assert on line turnaround.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//! use icsc_core::{BusRx, BusTx};
//! use icsc_testing::VirtualBus;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! #
//! let bus = VirtualBus::new();
//! let (mut tx, _) = bus.endpoint();
//! let (_, mut rx) = bus.endpoint();
//!
//! tx.write_byte(0x42)?;
//! assert_eq!(Some(0x42), rx.recv_byte(Duration::from_millis(100))?);
//! #
//! # Ok(()) }
//! ```
//!
//! [`icsc`]: https://docs.rs/icsc
#![doc(html_root_url = "https://docs.rs/icsc-testing/0.2.0")]
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

mod direction;
mod virtual_bus;

pub use self::direction::VirtualDirection;
pub use self::virtual_bus::{VirtualBus, VirtualRx, VirtualTx};
