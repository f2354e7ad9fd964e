use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard};

use crate::error::{BusError, DispatchError};

/// How the driver moves pixels for the next rectangles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TransferMode {
    /// Synchronous, low setup latency. Best for small rectangles.
    Polling,
    /// Queued and interrupt driven. Higher setup cost, higher throughput.
    #[default]
    Interrupt,
}

/// Panel driver consumed by the dispatcher.
///
/// A transfer is `begin_rectangle` followed by `continue_line` calls whose
/// `width * line_count` pixels fill the rectangle row by row.
pub trait DisplayBus: Send {
    /// Called when a dispatch takes ownership of the bus.
    fn acquire(&mut self) {}

    /// Called when the dispatch ends, on every exit path.
    fn release(&mut self) {}

    fn set_transfer_mode(&mut self, _mode: TransferMode) {}

    fn begin_rectangle(&mut self, x: u32, y: u32, width: u32, height: u32)
    -> Result<(), BusError>;

    fn continue_line(&mut self, line: &[u16], width: u32, line_count: u32)
    -> Result<(), BusError>;

    /// Teardown when the display consumer exits (e.g. draw a busy indicator).
    fn show_idle(&mut self) {}
}

/// Exclusive ownership of the display bus for one dispatch.
///
/// Holding the session holds the bus mutex; dropping it calls
/// [`DisplayBus::release`] before the mutex is unlocked.
pub struct BusSession<'a, B: DisplayBus> {
    guard: MutexGuard<'a, B>,
}

impl<'a, B: DisplayBus> BusSession<'a, B> {
    pub fn open(bus: &'a Mutex<B>) -> Result<Self, DispatchError> {
        let mut guard = bus.lock().map_err(|_| DispatchError::Poisoned)?;
        guard.acquire();
        Ok(Self { guard })
    }
}

impl<B: DisplayBus> Deref for BusSession<'_, B> {
    type Target = B;

    fn deref(&self) -> &B {
        &self.guard
    }
}

impl<B: DisplayBus> DerefMut for BusSession<'_, B> {
    fn deref_mut(&mut self) -> &mut B {
        &mut self.guard
    }
}

impl<B: DisplayBus> Drop for BusSession<'_, B> {
    fn drop(&mut self) {
        self.guard.release();
    }
}
