use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use icsc_core::{BusError, DirectionControl};

/// Transmit-enable line that records every transition it is asked to make.
///
/// Clones share the same recording, so a test can hand one clone to a station
/// and keep another to assert on afterwards.
///
/// # Examples
///
/// ```
/// use icsc_core::DirectionControl;
/// use icsc_testing::VirtualDirection;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// #
/// let line = VirtualDirection::new();
/// let mut driven = line.clone();
///
/// driven.set_transmitting(true)?;
/// driven.set_transmitting(false)?;
/// assert_eq!(vec![true, false], line.transitions());
/// #
/// # Ok(()) }
/// ```
#[derive(Debug, Clone, Default)]
pub struct VirtualDirection {
    transitions: Arc<Mutex<Vec<bool>>>,
}

impl VirtualDirection {
    /// Creates a line with no recorded transitions.
    pub fn new() -> Self {
        VirtualDirection::default()
    }

    /// Returns every `set_transmitting` value seen so far, oldest first.
    pub fn transitions(&self) -> Vec<bool> {
        lock(&self.transitions).clone()
    }
}

impl DirectionControl for VirtualDirection {
    fn set_transmitting(&mut self, transmitting: bool) -> Result<(), BusError> {
        lock(&self.transitions).push(transmitting);
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
