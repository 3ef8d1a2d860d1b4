use std::ffi::OsStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, warn};
use thiserror::Error;

use crate::core::{
    Address, BusError, BusRx, BusTx, Command, DirectionControl, Frame, FrameError, FrameParser, Payload, Step,
    DEFAULT_SOH_REPEAT,
};
use crate::registry::{CommandRegistry, Handler};
use crate::serial::SerialError;

/// Errors related to [`Station`]s.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StationError {
    /// The station has been closed, so nothing can be sent or registered.
    #[error("Station is closed")]
    Closed,

    /// A frame could not be built from the given payload.
    #[error("Frame could not be encoded")]
    Frame {
        /// The underlying frame error.
        #[from]
        source: FrameError,
    },

    /// The bus transport failed underneath the station.
    #[error("Bus transport failed")]
    Bus {
        /// The underlying bus error.
        #[from]
        source: BusError,
    },

    /// The serial device could not be opened or configured.
    #[error("Serial connection failed")]
    Serial {
        /// The underlying serial error.
        #[from]
        source: SerialError,
    },
}

/// Settings for one station's connection to the bus.
#[derive(Debug, Copy, Clone)]
pub struct StationConfig {
    /// This endpoint's own station number.
    pub address: Address,

    /// How many start-of-header sentinels to write ahead of each frame.
    ///
    /// Some UARTs drop the first byte after a line turnaround; raising this
    /// gives them a sacrificial sentinel. Receivers accept any run length.
    pub soh_repeat: usize,

    /// How long the receive loop waits for input before rechecking whether
    /// it has been asked to shut down. Also bounds [`Station::close`] latency.
    pub poll_timeout: Duration,
}

impl StationConfig {
    /// Creates a configuration for `address` with the default sentinel count
    /// and a 100 ms receive poll.
    pub fn new(address: Address) -> Self {
        StationConfig {
            address,
            soh_repeat: DEFAULT_SOH_REPEAT,
            poll_timeout: Duration::from_millis(100),
        }
    }
}

/// Running traffic counters for one station.
///
/// Counters only ever increase; [`Station::stats`] returns a snapshot.
#[derive(Debug, Default, Copy, Clone)]
#[non_exhaustive]
pub struct StationStats {
    /// Frames received, validated, and dispatched.
    pub rx_packets: u64,

    /// Raw bytes seen by the receive loop, including noise and foreign frames.
    pub rx_bytes: u64,

    /// Frames transmitted successfully.
    pub tx_packets: u64,

    /// Wire bytes transmitted, including sentinels and trailers.
    pub tx_bytes: u64,

    /// Sends that failed at the transport.
    pub tx_failures: u64,

    /// Frames addressed to us that failed trailer validation.
    pub frames_rejected: u64,

    /// Handler invocations, over all commands.
    pub callbacks_run: u64,
}

/// Everything the station's threads share.
#[derive(Debug)]
struct Shared {
    config: StationConfig,
    /// The channel lock: whoever holds it owns the physical line.
    line: Mutex<TxPath>,
    registry: Mutex<CommandRegistry>,
    stats: Mutex<StationStats>,
    running: AtomicBool,
}

/// The write half of the bus plus its transmit-enable line.
#[derive(Debug)]
struct TxPath {
    tx: Box<dyn BusTx>,
    direction: Option<Box<dyn DirectionControl>>,
}

impl TxPath {
    /// Writes one whole frame, bracketed by the transmit-enable line.
    /// Returns the number of wire bytes written.
    fn send_frame(&mut self, frame: &Frame<'_>, soh_repeat: usize) -> Result<usize, StationError> {
        if let Some(direction) = &mut self.direction {
            direction.set_transmitting(true)?;
        }
        let result = self.write_frame(frame, soh_repeat);
        // The line must be released even when the write failed partway.
        if let Some(direction) = &mut self.direction {
            if let Err(error) = direction.set_transmitting(false) {
                warn!("couldn't release transmit-enable line: {}", error);
            }
        }
        result
    }

    fn write_frame(&mut self, frame: &Frame<'_>, soh_repeat: usize) -> Result<usize, StationError> {
        let bytes = frame.to_bytes_with_preamble(soh_repeat);
        for &byte in &bytes {
            self.tx.write_byte(byte)?;
        }
        self.tx.flush()?;
        Ok(bytes.len())
    }
}

impl Shared {
    fn send(&self, destination: Address, command: Command, payload: &[u8]) -> Result<(), StationError> {
        if !self.running.load(Ordering::Acquire) {
            return Err(StationError::Closed);
        }
        let frame = Frame::new(destination, self.config.address, command, Payload::try_new(payload)?);
        debug!("station {}: sending {}", self.config.address, frame);
        let result = lock(&self.line).send_frame(&frame, self.config.soh_repeat);

        let mut stats = lock(&self.stats);
        match result {
            Ok(written) => {
                stats.tx_packets += 1;
                stats.tx_bytes += written as u64;
                Ok(())
            }
            Err(error) => {
                stats.tx_failures += 1;
                Err(error)
            }
        }
    }
}

/// A lightweight handle for sending through a [`Station`].
///
/// Handles are cheap to clone and safe to move to other threads. Every
/// registered callback receives one so it can reply to the frame it was
/// handed. A handle outliving its station isn't an error; sends just fail
/// with [`StationError::Closed`].
#[derive(Debug, Clone)]
pub struct StationHandle {
    shared: Arc<Shared>,
}

impl StationHandle {
    /// Returns this endpoint's own station number.
    pub fn address(&self) -> Address {
        self.shared.config.address
    }

    /// Sends `payload` to `destination` under the given command.
    ///
    /// Blocks while another sender, or a partially received frame, owns the
    /// line. Payloads over 255 bytes are rejected.
    pub fn send(&self, destination: Address, command: Command, payload: &[u8]) -> Result<(), StationError> {
        self.shared.send(destination, command, payload)
    }

    /// Sends the bytes of a string, excluding any terminator.
    pub fn send_str(&self, destination: Address, command: Command, text: &str) -> Result<(), StationError> {
        self.send(destination, command, text.as_bytes())
    }

    /// Sends a signed 8-bit value.
    pub fn send_i8(&self, destination: Address, command: Command, value: i8) -> Result<(), StationError> {
        self.send(destination, command, &value.to_le_bytes())
    }

    /// Sends a signed 16-bit value in little-endian byte order.
    pub fn send_i16(&self, destination: Address, command: Command, value: i16) -> Result<(), StationError> {
        self.send(destination, command, &value.to_le_bytes())
    }

    /// Sends a signed 32-bit value in little-endian byte order.
    pub fn send_i32(&self, destination: Address, command: Command, value: i32) -> Result<(), StationError> {
        self.send(destination, command, &value.to_le_bytes())
    }

    /// Sends `payload` to every station on the bus.
    pub fn broadcast(&self, command: Command, payload: &[u8]) -> Result<(), StationError> {
        self.send(Address::BROADCAST, command, payload)
    }

    /// Broadcasts the bytes of a string, excluding any terminator.
    pub fn broadcast_str(&self, command: Command, text: &str) -> Result<(), StationError> {
        self.broadcast(command, text.as_bytes())
    }

    /// Broadcasts a signed 8-bit value.
    pub fn broadcast_i8(&self, command: Command, value: i8) -> Result<(), StationError> {
        self.broadcast(command, &value.to_le_bytes())
    }

    /// Broadcasts a signed 16-bit value in little-endian byte order.
    pub fn broadcast_i16(&self, command: Command, value: i16) -> Result<(), StationError> {
        self.broadcast(command, &value.to_le_bytes())
    }

    /// Broadcasts a signed 32-bit value in little-endian byte order.
    pub fn broadcast_i32(&self, command: Command, value: i32) -> Result<(), StationError> {
        self.broadcast(command, &value.to_le_bytes())
    }

    /// Returns a snapshot of this station's traffic counters.
    pub fn stats(&self) -> StationStats {
        *lock(&self.shared.stats)
    }
}

/// One station's connection to the bus.
///
/// A `Station` owns the transport, a background receive loop, and the command
/// registrations. Frames addressed to this station (or broadcast) are
/// validated by the receive loop and dispatched synchronously to every
/// matching registration, so handlers should return promptly; a handler
/// that blocks stalls further reception and shutdown.
///
/// Incoming [`Command::PING`] frames are answered automatically with
/// [`Command::PONG`] carrying the same payload, before any user handler runs.
///
/// # Examples
///
/// ```
/// use icsc::{Address, Command, Station, StationConfig};
/// use icsc_testing::VirtualBus;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// #
/// // Attach a station to an in-memory bus. On real hardware you would use
/// // Station::open with a device path instead.
/// let bus = VirtualBus::new();
/// let (tx, rx) = bus.endpoint();
/// let mut station = Station::try_new(tx, rx, None, StationConfig::new(Address(50)))?;
///
/// station.register(Command(b'T'), |_, frame| {
///     println!("{} says: {:?}", frame.source(), frame.payload());
/// })?;
///
/// station.send(Address(100), Command(b'T'), &[1, 2, 3])?;
/// station.close()?;
/// #
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub struct Station {
    handle: StationHandle,
    receiver: Option<JoinHandle<()>>,
}

impl Station {
    /// Opens the serial device at `path` and joins the bus as `address`.
    ///
    /// Intended for full-duplex or externally-switched media; use
    /// [`Station::open_with_direction`] when a transmit-enable line must be
    /// driven around each transmission.
    ///
    /// # Errors
    ///
    /// Returns [`StationError::Serial`] if the device can't be opened or
    /// configured. Nothing is left open on failure.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use icsc::{Address, Station};
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// #
    /// let station = Station::open("/dev/ttyUSB0", 115_200, Address(50))?;
    /// #
    /// # Ok(()) }
    /// ```
    pub fn open<T: AsRef<OsStr> + ?Sized>(path: &T, bitrate: usize, address: Address) -> Result<Self, StationError> {
        let (tx, rx) = crate::serial::open_bus(path, bitrate)?;
        Self::try_new(tx, rx, None, StationConfig::new(address))
    }

    /// Like [`Station::open`], but drives `direction` high for the duration
    /// of each transmission, the usual arrangement for RS-485 transceivers.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use icsc::{Address, Station};
    /// use icsc::serial::SysfsPin;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// #
    /// let direction = SysfsPin::open(49)?;
    /// let station = Station::open_with_direction("/dev/ttyO1", 115_200, Address(50), Box::new(direction))?;
    /// #
    /// # Ok(()) }
    /// ```
    pub fn open_with_direction<T: AsRef<OsStr> + ?Sized>(
        path: &T,
        bitrate: usize,
        address: Address,
        direction: Box<dyn DirectionControl>,
    ) -> Result<Self, StationError> {
        let (tx, rx) = crate::serial::open_bus(path, bitrate)?;
        Self::try_new(tx, rx, Some(direction), StationConfig::new(address))
    }

    /// Attaches a station to an arbitrary transport.
    ///
    /// This is the constructor the convenience `open` functions build on; use
    /// it directly with [`VirtualBus`] endpoints or a custom transport. The
    /// transmit-enable line, when present, is driven low before the receive
    /// loop starts.
    ///
    /// [`VirtualBus`]: https://docs.rs/icsc-testing
    pub fn try_new<W, R>(
        tx: W,
        rx: R,
        direction: Option<Box<dyn DirectionControl>>,
        config: StationConfig,
    ) -> Result<Self, StationError>
    where
        W: BusTx + 'static,
        R: BusRx + 'static,
    {
        let mut line = TxPath {
            tx: Box::new(tx),
            direction,
        };
        if let Some(direction) = &mut line.direction {
            direction.set_transmitting(false)?;
        }

        let shared = Arc::new(Shared {
            config,
            line: Mutex::new(line),
            registry: Mutex::new(CommandRegistry::new()),
            stats: Mutex::new(StationStats::default()),
            running: AtomicBool::new(true),
        });

        let parser = FrameParser::new(config.address);
        let loop_shared = Arc::clone(&shared);
        let receiver = thread::Builder::new()
            .name(format!("icsc-rx-{}", config.address))
            .spawn(move || receive_loop(&loop_shared, rx, parser))
            .map_err(BusError::from)?;

        debug!("station {}: running", config.address);
        Ok(Station {
            handle: StationHandle { shared },
            receiver: Some(receiver),
        })
    }

    /// Returns this endpoint's own station number.
    pub fn address(&self) -> Address {
        self.handle.address()
    }

    /// Returns a handle for sending from other threads.
    pub fn handle(&self) -> StationHandle {
        self.handle.clone()
    }

    /// Returns a snapshot of this station's traffic counters.
    pub fn stats(&self) -> StationStats {
        self.handle.stats()
    }

    /// Registers `handler` to run for every inbound frame carrying `command`.
    ///
    /// Registrations fire in the order they were made, and the same command
    /// may be registered more than once; every match runs. Registering
    /// [`Command::CATCH_ALL`] matches every inbound command. Handlers run on
    /// the receive thread and get a [`StationHandle`] for replying.
    ///
    /// # Errors
    ///
    /// Returns [`StationError::Closed`] if the station has been closed.
    pub fn register<F>(&self, command: Command, handler: F) -> Result<(), StationError>
    where
        F: FnMut(&StationHandle, &Frame<'_>) + Send + 'static,
    {
        if !self.handle.shared.running.load(Ordering::Acquire) {
            return Err(StationError::Closed);
        }
        let handler: Handler = Arc::new(Mutex::new(handler));
        lock(&self.handle.shared.registry).register(command, handler);
        Ok(())
    }

    /// Removes the earliest registration for `command`, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`StationError::Closed`] if the station has been closed.
    pub fn unregister(&self, command: Command) -> Result<(), StationError> {
        if !self.handle.shared.running.load(Ordering::Acquire) {
            return Err(StationError::Closed);
        }
        lock(&self.handle.shared.registry).unregister(command);
        Ok(())
    }

    /// Sends `payload` to `destination` under the given command.
    pub fn send(&self, destination: Address, command: Command, payload: &[u8]) -> Result<(), StationError> {
        self.handle.send(destination, command, payload)
    }

    /// Sends the bytes of a string, excluding any terminator.
    pub fn send_str(&self, destination: Address, command: Command, text: &str) -> Result<(), StationError> {
        self.handle.send_str(destination, command, text)
    }

    /// Sends a signed 8-bit value.
    pub fn send_i8(&self, destination: Address, command: Command, value: i8) -> Result<(), StationError> {
        self.handle.send_i8(destination, command, value)
    }

    /// Sends a signed 16-bit value in little-endian byte order.
    pub fn send_i16(&self, destination: Address, command: Command, value: i16) -> Result<(), StationError> {
        self.handle.send_i16(destination, command, value)
    }

    /// Sends a signed 32-bit value in little-endian byte order.
    pub fn send_i32(&self, destination: Address, command: Command, value: i32) -> Result<(), StationError> {
        self.handle.send_i32(destination, command, value)
    }

    /// Sends `payload` to every station on the bus.
    pub fn broadcast(&self, command: Command, payload: &[u8]) -> Result<(), StationError> {
        self.handle.broadcast(command, payload)
    }

    /// Broadcasts the bytes of a string, excluding any terminator.
    pub fn broadcast_str(&self, command: Command, text: &str) -> Result<(), StationError> {
        self.handle.broadcast_str(command, text)
    }

    /// Broadcasts a signed 8-bit value.
    pub fn broadcast_i8(&self, command: Command, value: i8) -> Result<(), StationError> {
        self.handle.broadcast_i8(command, value)
    }

    /// Broadcasts a signed 16-bit value in little-endian byte order.
    pub fn broadcast_i16(&self, command: Command, value: i16) -> Result<(), StationError> {
        self.handle.broadcast_i16(command, value)
    }

    /// Broadcasts a signed 32-bit value in little-endian byte order.
    pub fn broadcast_i32(&self, command: Command, value: i32) -> Result<(), StationError> {
        self.handle.broadcast_i32(command, value)
    }

    /// Shuts the station down.
    ///
    /// Stops the receive loop (waiting at most one poll interval for it to
    /// notice), releases every registration, and lets the transport drop.
    /// A handler that never returns will block this call.
    ///
    /// # Errors
    ///
    /// Returns [`StationError::Closed`] if the station was already closed;
    /// nothing further is released in that case.
    pub fn close(&mut self) -> Result<(), StationError> {
        let receiver = self.receiver.take().ok_or(StationError::Closed)?;
        self.handle.shared.running.store(false, Ordering::Release);
        if receiver.join().is_err() {
            warn!("station {}: receive loop panicked during shutdown", self.address());
        }
        lock(&self.handle.shared.registry).clear();
        debug!("station {}: closed", self.address());
        Ok(())
    }
}

impl Drop for Station {
    fn drop(&mut self) {
        if self.receiver.is_some() {
            let _ = self.close();
        }
    }
}

/// Drives the parser from the read half until the station shuts down.
///
/// The line lock is taken as soon as a header addressed to us is recognized
/// and held until that frame resolves, so a send can't interleave its bytes
/// with a frame already in flight on the wire. Dispatch runs with the lock
/// released, letting handlers transmit without deadlocking.
fn receive_loop<R: BusRx>(shared: &Arc<Shared>, mut rx: R, mut parser: FrameParser) {
    let mut line: Option<MutexGuard<'_, TxPath>> = None;

    while shared.running.load(Ordering::Acquire) {
        let byte = match rx.recv_byte(shared.config.poll_timeout) {
            Ok(Some(byte)) => byte,
            Ok(None) => continue,
            Err(error) => {
                warn!("station {}: receive failed: {}", shared.config.address, error);
                break;
            }
        };

        lock(&shared.stats).rx_bytes += 1;
        match parser.push(byte) {
            Step::Continue => {}
            Step::HeaderFound => line = Some(lock(&shared.line)),
            Step::Rejected => {
                drop(line.take());
                lock(&shared.stats).frames_rejected += 1;
            }
            Step::Complete(frame) => {
                drop(line.take());
                lock(&shared.stats).rx_packets += 1;
                dispatch(shared, &frame);
            }
        }
    }
}

fn dispatch(shared: &Arc<Shared>, frame: &Frame<'_>) {
    debug!("station {}: received {}", shared.config.address, frame);

    if frame.command() == Command::PING {
        // Liveness replies go out ahead of any user handler.
        if let Err(error) = shared.send(frame.source(), Command::PONG, frame.payload()) {
            warn!(
                "station {}: ping reply to {} failed: {}",
                shared.config.address,
                frame.source(),
                error
            );
        }
    }

    let handle = StationHandle {
        shared: Arc::clone(shared),
    };
    let handlers = lock(&shared.registry).matching(frame.command());
    lock(&shared.stats).callbacks_run += handlers.len() as u64;
    for handler in handlers {
        let mut handler = lock(&handler);
        (&mut *handler)(&handle, frame);
    }
}

/// Takes a lock, recovering from poisoning so a panicked handler can't
/// wedge the whole endpoint.
fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
