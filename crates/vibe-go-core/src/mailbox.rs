//! Depth-one blocking handoff between the producer and one consumer.

use std::sync::{Condvar, Mutex, MutexGuard};

use crate::error::PipelineError;

/// Message carried by a [`Mailbox`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handoff<T> {
    /// A buffer is ready; the value names which one.
    Payload(T),
    /// Graceful end of stream. The consumer tears down and exits.
    Shutdown,
    /// Unrecoverable producer state. The consumer must not touch any buffer.
    Fatal,
}

/// Single-slot channel.
///
/// `send` waits until the slot is empty, so at most one message is ever
/// pending. Consumers `peek` while they work on a buffer and `receive` once
/// they are done with it, which keeps the sender blocked until the buffer it
/// handed over is free again.
pub struct Mailbox<T> {
    slot: Mutex<Option<Handoff<T>>>,
    changed: Condvar,
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Handoff<T>>>, PipelineError> {
        self.slot
            .lock()
            .map_err(|_| PipelineError::Poisoned("mailbox"))
    }

    /// Block until the slot is free, then store `message`.
    pub fn send(&self, message: Handoff<T>) -> Result<(), PipelineError> {
        let guard = self.lock()?;
        let mut guard = self
            .changed
            .wait_while(guard, |slot| slot.is_some())
            .map_err(|_| PipelineError::Poisoned("mailbox"))?;
        *guard = Some(message);
        self.changed.notify_all();
        Ok(())
    }

    /// Block until a message is pending, then take it out of the slot.
    pub fn receive(&self) -> Result<Handoff<T>, PipelineError> {
        let guard = self.lock()?;
        let mut guard = self
            .changed
            .wait_while(guard, |slot| slot.is_none())
            .map_err(|_| PipelineError::Poisoned("mailbox"))?;
        let message = guard.take().ok_or(PipelineError::Poisoned("mailbox"))?;
        self.changed.notify_all();
        Ok(message)
    }

    /// Overwrite whatever is pending without waiting for the slot to drain.
    /// Returns the message that was displaced.
    pub fn replace(&self, message: Handoff<T>) -> Option<Handoff<T>> {
        let mut slot = match self.slot.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        let displaced = slot.replace(message);
        self.changed.notify_all();
        displaced
    }

    /// Whether a message is waiting to be received.
    pub fn is_pending(&self) -> bool {
        self.slot.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }
}

impl<T: Clone> Mailbox<T> {
    /// Block until a message is pending and return a copy, leaving it queued.
    pub fn peek(&self) -> Result<Handoff<T>, PipelineError> {
        let guard = self.lock()?;
        let guard = self
            .changed
            .wait_while(guard, |slot| slot.is_none())
            .map_err(|_| PipelineError::Poisoned("mailbox"))?;
        guard.clone().ok_or(PipelineError::Poisoned("mailbox"))
    }

    pub fn try_peek(&self) -> Option<Handoff<T>> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }
}
