//! Core types for inter-station messaging over shared serial buses.
//!
//! For the basic task of exchanging commands between stations, you likely
//! want to use the high-level API in the [`icsc`] crate instead.
//!
//! However, `icsc_core` is useful for crates that want to work with the wire
//! protocol at a lower level, or who want to provide their own bus transports
//! for use by `icsc`.
//!
//! The protocol is point-to-multipoint: every station on the bus hears every
//! frame, and a destination byte decides who acts on it. [`Frame`] describes
//! one message and its wire format, [`FrameParser`] recovers validated frames
//! from a noisy byte stream, and the [`BusTx`] / [`BusRx`] /
//! [`DirectionControl`] traits are the seams a physical transport plugs into.
//!
//! # Examples
//!
//! ```
//! use icsc_core::{Address, Command, Frame, FrameParser, Payload, Step};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! #
//! // Encode a frame from station 2 to station 6...
//! let frame = Frame::new(Address(6), Address(2), Command(b'T'), Payload::try_new(vec![1, 2])?);
//!
//! // ...and recover it from the wire bytes as station 6 would.
//! let mut parser = FrameParser::new(Address(6));
//! for byte in frame.to_bytes() {
//!     if let Step::Complete(received) = parser.push(byte) {
//!         assert_eq!(frame, received);
//!     }
//! }
//! #
//! # Ok(()) }
//! ```
//!
//! [`icsc`]: https://docs.rs/icsc
#![doc(html_root_url = "https://docs.rs/icsc-core/0.2.0")]
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

mod bus;
mod frame;
mod parser;

pub use self::bus::{BusError, BusRx, BusTx, DirectionControl};
pub use self::frame::{Address, Command, Frame, FrameError, Payload, DEFAULT_SOH_REPEAT, EOT, ETX, SOH, STX};
pub use self::parser::{FrameParser, Step};
