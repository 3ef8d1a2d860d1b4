//! A library for messaging between stations sharing a half-duplex serial bus
//! such as RS-485.
//!
//! Every station on the bus has a number. A [`Station`] joins the bus, sends
//! addressed or broadcast frames to other stations, and dispatches inbound
//! frames to registered handlers from a background receive loop. Frames are
//! checksummed; corrupted or foreign traffic is dropped silently and the
//! receiver re-synchronizes on the next valid header, which is what life on
//! a long noisy wire demands. A built-in ping/pong pair gives you liveness
//! probing for free.
//!
//! Handlers run synchronously on the receive thread, so keep them short.
//!
//! # Examples
//!
//! ```
//! use icsc::{Address, Command, Station, StationConfig};
//! use icsc_testing::VirtualBus;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! #
//! // Two stations sharing an in-memory bus; on real hardware each would
//! // call Station::open with its serial device instead.
//! let bus = VirtualBus::new();
//! let (tx, rx) = bus.endpoint();
//! let sender = Station::try_new(tx, rx, None, StationConfig::new(Address(50)))?;
//!
//! let (tx, rx) = bus.endpoint();
//! let receiver = Station::try_new(tx, rx, None, StationConfig::new(Address(100)))?;
//!
//! receiver.register(Command(b'T'), |_, frame| {
//!     println!("{} says: {:?}", frame.source(), frame.payload());
//! })?;
//!
//! sender.send(Address(100), Command(b'T'), &[1, 2, 3])?;
//! #
//! # Ok(()) }
//! ```
//!
//! # Sub-crates
//!
//! In addition to the high-level API of [`Station`], several lower-level
//! components are provided that can be combined for more specialized
//! use-cases.
//!
//! - [`icsc-core`] \(re-exported as `core`\) contains the basic types
//!   describing the wire protocol, and is useful if you want to implement a
//!   custom bus transport or otherwise operate at the level of raw frames.
//! - [`icsc-serial`] \(re-exported as `serial`\) contains the serial
//!   transport, port configuration, and the sysfs GPIO transmit-enable line.
//! - [`icsc-testing`] contains an in-memory bus and instrumented
//!   transmit-enable line, useful for testing and debugging.
//!
//! [`icsc-core`]: https://docs.rs/icsc-core
//! [`icsc-serial`]: https://docs.rs/icsc-serial
//! [`icsc-testing`]: https://docs.rs/icsc-testing
#![doc(html_root_url = "https://docs.rs/icsc/0.2.0")]
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

pub use icsc_core as core;
pub use icsc_serial as serial;

mod registry;
mod station;

pub use self::station::{Station, StationConfig, StationError, StationHandle, StationStats};

pub use crate::core::{Address, BusError, Command, Frame, FrameError, Payload};
