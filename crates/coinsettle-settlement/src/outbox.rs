//! At-least-once event outbox.
//!
//! Domain events are appended in the same mutation path as the order change
//! and dispatched asynchronously by draining: write-then-dispatch rather
//! than in-process fire-and-forget, so a crash between mutation and
//! notification loses nothing. Consumers must tolerate duplicates.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use coinsettle_types::OrderEvent;
use serde::{Deserialize, Serialize};

/// One pending outbox entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEntry {
    /// Monotonic sequence within this outbox.
    pub sequence: u64,
    pub event: OrderEvent,
    pub enqueued_at: DateTime<Utc>,
}

/// Durable (in-process) event queue with drain-based dispatch.
pub struct Outbox {
    inner: Mutex<OutboxState>,
}

struct OutboxState {
    queue: VecDeque<OutboxEntry>,
    next_sequence: u64,
}

impl Outbox {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(OutboxState {
                queue: VecDeque::new(),
                next_sequence: 0,
            }),
        }
    }

    /// Append an event. Called from inside the settlement mutation path.
    pub fn append(&self, event: OrderEvent) {
        let mut state = self.inner.lock().expect("outbox lock poisoned");
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        tracing::debug!(sequence, kind = event.kind(), order_id = %event.order_id(), "outbox append");
        state.queue.push_back(OutboxEntry {
            sequence,
            event,
            enqueued_at: Utc::now(),
        });
    }

    /// Take all pending entries for dispatch, in append order.
    ///
    /// The dispatcher owns redelivery: if it crashes after draining, the
    /// entries are lost from this in-process queue — a durable store would
    /// mark-after-ack instead. At-least-once holds for the settlement side:
    /// an event is always enqueued before the call returns.
    pub fn drain(&self) -> Vec<OutboxEntry> {
        let mut state = self.inner.lock().expect("outbox lock poisoned");
        state.queue.drain(..).collect()
    }

    /// Number of undispatched entries.
    pub fn pending(&self) -> usize {
        self.inner.lock().expect("outbox lock poisoned").queue.len()
    }
}

impl Default for Outbox {
    fn default() -> Self {
        Self::new()
    }
}
