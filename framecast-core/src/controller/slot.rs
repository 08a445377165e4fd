//! Latest-frame hand-off from the worker to a polling consumer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::frame::Frame;

/// One delivered frame pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredFrame {
    pub original: Frame,
    pub processed: Frame,
    pub id: u64,
}

/// Single-entry mailbox holding the most recent frame pair.
///
/// The producer overwrites; the consumer polls [`has_new`](Self::has_new)
/// without touching the lock and takes a private copy when one is ready.
#[derive(Debug, Default)]
pub struct FrameSlot {
    latest: Mutex<Option<DeliveredFrame>>,
    fresh: AtomicBool,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store copies of `original` and `processed`, replacing any unread pair.
    pub fn publish(&self, original: &Frame, processed: &Frame, id: u64) {
        let entry = DeliveredFrame {
            original: original.clone(),
            processed: processed.clone(),
            id,
        };
        let mut latest = match self.latest.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *latest = Some(entry);
        self.fresh.store(true, Ordering::Release);
    }

    /// `true` when a pair has been published since the last `take`.
    pub fn has_new(&self) -> bool {
        self.fresh.load(Ordering::Acquire)
    }

    /// Take the unread pair, if any.
    pub fn take(&self) -> Option<DeliveredFrame> {
        if !self.has_new() {
            return None;
        }
        let mut latest = match self.latest.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.fresh.store(false, Ordering::Release);
        latest.take()
    }
}
