//! Single-slot "latest value" handoff
//!
//! A capacity-1 crossbeam channel where a write that finds the slot occupied
//! evicts the unread value and takes its place. Writers never block; readers
//! always see the newest value that was written before they looked.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError, bounded};
use std::time::Duration;

/// Single-slot mailbox with overwrite-on-full semantics
pub struct Mailbox<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> Mailbox<T> {
    /// Empty slot
    pub fn new() -> Self {
        let (tx, rx) = bounded(1);
        Self { tx, rx }
    }

    /// Store `value`, returning the unread value it replaced (if any)
    pub fn put(&self, value: T) -> Option<T> {
        let mut value = value;
        let mut evicted = None;
        loop {
            match self.tx.try_send(value) {
                Ok(()) => return evicted,
                Err(TrySendError::Full(rejected)) => {
                    value = rejected;
                    // A concurrent reader may win the race for the old value;
                    // either way the slot frees up for the retry.
                    if let Ok(old) = self.rx.try_recv() {
                        evicted = Some(old);
                    }
                }
                // Both ends live in `self`, so the channel cannot disconnect
                Err(TrySendError::Disconnected(_)) => return evicted,
            }
        }
    }

    /// Take the pending value without waiting
    pub fn take(&self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(value) => Some(value),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Wait up to `timeout` for a value
    pub fn take_timeout(&self, timeout: Duration) -> Option<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(value) => Some(value),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Receiving end, for use in `crossbeam_channel::select!`
    pub fn receiver(&self) -> &Receiver<T> {
        &self.rx
    }

    /// True when no value is waiting
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}
