//! Per-state operations
//!
//! Each operation owns the bookkeeping for one operating state and reports
//! what the controller should do; none of them touch hardware directly.

pub mod init;
pub mod knit;
pub mod test;

use ayab_protocol::DeviceMessage;
use heapless::Deque;

pub use init::InitDetector;
pub use knit::{KnitActions, Knitter, LineOutcome};
pub use test::Tester;

/// Messages queued for the host between two drains
pub const OUTBOX_LEN: usize = 16;

/// Bounded queue of outgoing messages
///
/// A full queue drops new messages and counts them.
#[derive(Debug, Default)]
pub struct Outbox {
    queue: Deque<DeviceMessage, OUTBOX_LEN>,
    dropped: u32,
}

impl Outbox {
    pub const fn new() -> Self {
        Self {
            queue: Deque::new(),
            dropped: 0,
        }
    }

    /// Queue a message; returns false if it was dropped
    pub fn push(&mut self, message: DeviceMessage) -> bool {
        match self.queue.push_back(message) {
            Ok(()) => true,
            Err(_) => {
                self.dropped = self.dropped.saturating_add(1);
                false
            }
        }
    }

    pub fn pop(&mut self) -> Option<DeviceMessage> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Messages lost to a full queue
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}
