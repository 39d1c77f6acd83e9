//! Create-order idempotency guard.
//!
//! A client retrying a timed-out create-order call must not produce two
//! orders funded twice from the same balance. The guard tracks every
//! caller-supplied [`IdempotencyKey`] from the moment a request starts:
//! `begin` atomically either reserves the key (first caller), reports it
//! in flight (a concurrent duplicate), or returns the order a completed
//! request produced. Reservation and lookup are one operation under one
//! lock, so two racing requests with the same key can never both pass.
//!
//! The guard maintains an LRU-style bounded cache so memory usage stays
//! predictable in long-running processes.

use std::collections::{HashMap, VecDeque};

use coinsettle_types::{IdempotencyKey, OrderId};

/// Outcome of atomically claiming a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    /// First use: the key is now reserved for this caller.
    Reserved,
    /// Another request with this key is still being processed.
    InFlight,
    /// A request with this key already completed and produced this order.
    Completed(OrderId),
}

#[derive(Debug, Clone, Copy)]
enum KeyState {
    InFlight,
    Completed(OrderId),
}

/// Bounded key map with LRU eviction of completed entries.
///
/// When the map reaches `max_size`, the oldest completed entry is evicted
/// to make room. In-flight entries are never evicted.
pub struct IdempotencyGuard {
    seen: HashMap<IdempotencyKey, KeyState>,
    /// Insertion order for LRU eviction (front = oldest).
    order: VecDeque<IdempotencyKey>,
    /// Maximum number of entries before eviction kicks in.
    max_size: usize,
}

impl IdempotencyGuard {
    /// Create a new guard with the given maximum cache size.
    ///
    /// # Panics
    /// Panics if `max_size` is zero.
    pub fn new(max_size: usize) -> Self {
        assert!(max_size > 0, "IdempotencyGuard max_size must be > 0");
        Self {
            seen: HashMap::with_capacity(max_size),
            order: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    /// Atomically claim `key` for a new request.
    ///
    /// Exactly one caller per key observes [`Reservation::Reserved`]; every
    /// concurrent duplicate observes [`Reservation::InFlight`] until the
    /// winner calls [`complete`](Self::complete) or
    /// [`release`](Self::release).
    pub fn begin(&mut self, key: IdempotencyKey) -> Reservation {
        match self.seen.get(&key) {
            Some(KeyState::InFlight) => return Reservation::InFlight,
            Some(KeyState::Completed(order_id)) => return Reservation::Completed(*order_id),
            None => {}
        }

        if self.seen.len() >= self.max_size {
            self.evict_oldest_completed();
        }
        self.seen.insert(key.clone(), KeyState::InFlight);
        self.order.push_back(key);
        Reservation::Reserved
    }

    /// Record that the reserved `key` produced `order_id`. Replays from now
    /// on return that order.
    pub fn complete(&mut self, key: &IdempotencyKey, order_id: OrderId) {
        if let Some(state) = self.seen.get_mut(key) {
            *state = KeyState::Completed(order_id);
        }
    }

    /// Release a key after its request failed or its order was rolled
    /// back, so the caller may legitimately retry.
    pub fn release(&mut self, key: &IdempotencyKey) {
        if self.seen.remove(key).is_some() {
            self.order.retain(|k| k != key);
        }
    }

    /// The order a completed request under this key produced, if any.
    pub fn lookup(&self, key: &IdempotencyKey) -> Option<OrderId> {
        match self.seen.get(key) {
            Some(KeyState::Completed(order_id)) => Some(*order_id),
            _ => None,
        }
    }

    /// Number of keys currently tracked (reserved or completed).
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether the guard is empty.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn evict_oldest_completed(&mut self) {
        // Skip over in-flight entries; evicting one would let a racing
        // duplicate through.
        let victim = self
            .order
            .iter()
            .position(|k| matches!(self.seen.get(k), Some(KeyState::Completed(_))));
        if let Some(idx) = victim {
            if let Some(key) = self.order.remove(idx) {
                self.seen.remove(&key);
            }
        }
    }
}
