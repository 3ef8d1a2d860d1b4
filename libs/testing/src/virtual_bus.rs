use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use icsc_core::{BusError, BusRx, BusTx};

/// In-memory stand-in for a shared half-duplex line.
///
/// Any number of endpoints can attach; a byte written by one endpoint is
/// heard by every *other* endpoint, matching a transceiver that is in drive
/// mode (and therefore deaf) while transmitting. There is no simulated
/// noise or collision; bytes arrive intact and in order.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use icsc_core::{BusRx, BusTx};
/// use icsc_testing::VirtualBus;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// #
/// let bus = VirtualBus::new();
/// let (mut a_tx, _a_rx) = bus.endpoint();
/// let (_b_tx, mut b_rx) = bus.endpoint();
///
/// a_tx.write_byte(0x42)?;
/// assert_eq!(Some(0x42), b_rx.recv_byte(Duration::from_millis(100))?);
/// #
/// # Ok(()) }
/// ```
#[derive(Debug, Clone, Default)]
pub struct VirtualBus {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    taps: Vec<Tap>,
    next_id: usize,
}

#[derive(Debug)]
struct Tap {
    id: usize,
    sender: Sender<u8>,
}

impl VirtualBus {
    /// Creates a new bus with no endpoints attached.
    pub fn new() -> Self {
        VirtualBus::default()
    }

    /// Attaches a new endpoint and returns its transmit and receive halves.
    pub fn endpoint(&self) -> (VirtualTx, VirtualRx) {
        let (sender, receiver) = mpsc::channel();
        let mut inner = lock(&self.inner);
        let id = inner.next_id;
        inner.next_id += 1;
        inner.taps.push(Tap { id, sender });
        (
            VirtualTx {
                id,
                inner: Arc::clone(&self.inner),
            },
            VirtualRx { receiver },
        )
    }
}

/// Write half of a [`VirtualBus`] endpoint.
#[derive(Debug)]
pub struct VirtualTx {
    id: usize,
    inner: Arc<Mutex<Inner>>,
}

impl BusTx for VirtualTx {
    fn write_byte(&mut self, byte: u8) -> Result<(), BusError> {
        let mut inner = lock(&self.inner);
        let id = self.id;
        // Deliver to everyone else, pruning endpoints whose receive half is gone.
        inner.taps.retain(|tap| tap.id == id || tap.sender.send(byte).is_ok());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), BusError> {
        Ok(())
    }
}

/// Read half of a [`VirtualBus`] endpoint.
#[derive(Debug)]
pub struct VirtualRx {
    receiver: Receiver<u8>,
}

impl BusRx for VirtualRx {
    fn recv_byte(&mut self, timeout: Duration) -> Result<Option<u8>, BusError> {
        match self.receiver.recv_timeout(timeout) {
            Ok(byte) => Ok(Some(byte)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(BusError::Closed),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
