//! Outbound queue for frames sent while disconnected.
//!
//! Frames are encoded at enqueue time and drained strictly FIFO on the next
//! open. The queue is bounded: when full, the oldest entry is dropped with a
//! warning so an unreachable server cannot grow memory without limit.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::transport::Transport;

/// Default maximum number of queued frames.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

#[derive(Debug)]
pub struct OutboundQueue {
    entries: VecDeque<String>,
    capacity: usize,
    dropped: u64,
}

impl OutboundQueue {
    /// Create a queue holding at most `capacity` frames (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
            dropped: 0,
        }
    }

    /// Append an already-encoded frame.
    pub fn enqueue(&mut self, payload: String) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
            self.dropped = self.dropped.saturating_add(1);
            warn!(capacity = self.capacity, dropped = self.dropped, "outbound queue full; dropped oldest frame");
        }
        self.entries.push_back(payload);
    }

    /// Put frames that were handed to a dying transport back at the head,
    /// ahead of anything queued since, keeping their relative order.
    pub fn requeue_front(&mut self, payloads: Vec<String>) {
        for payload in payloads.into_iter().rev() {
            self.entries.push_front(payload);
        }
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
            self.dropped = self.dropped.saturating_add(1);
        }
    }

    /// Drain queued frames into `transport` in FIFO order while it stays open.
    ///
    /// A frame the transport refuses goes back to the head of the queue and
    /// the flush stops; the remainder waits for the next open.
    pub fn flush(&mut self, transport: &mut dyn Transport) -> usize {
        let mut sent = 0_usize;
        while transport.is_open() {
            let Some(payload) = self.entries.pop_front() else {
                break;
            };
            if let Err(error) = transport.send_text(&payload) {
                warn!(error = %error, remaining = self.entries.len() + 1, "flush interrupted");
                self.entries.push_front(payload);
                break;
            }
            sent += 1;
        }
        if sent > 0 {
            debug!(sent, remaining = self.entries.len(), "flushed outbound queue");
        }
        sent
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Frames discarded because the queue was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Queued payloads, oldest first.
    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

impl Default for OutboundQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

#[cfg(test)]
#[path = "queue_test.rs"]
mod queue_test;
