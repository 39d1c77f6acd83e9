//! In-memory order store.
//!
//! Orders are created by the orchestrator and mutated only through it.
//! Deletion exists solely for the compensating-rollback path: removing a
//! just-created, not-yet-externally-visible row.

use std::collections::HashMap;

use chrono::Utc;
use coinsettle_types::{CoinsettleError, Order, OrderId, OrderStatus, Result, UserId};

/// All orders indexed by id, with a per-user index for listings and the
/// rolling-window aggregation.
pub struct OrderStore {
    orders: HashMap<OrderId, Order>,
    by_user: HashMap<UserId, Vec<OrderId>>,
}

impl OrderStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            orders: HashMap::new(),
            by_user: HashMap::new(),
        }
    }

    /// Persist a new order.
    pub fn insert(&mut self, order: Order) {
        self.by_user.entry(order.user_id).or_default().push(order.id);
        self.orders.insert(order.id, order);
    }

    /// Look up an order by id.
    #[must_use]
    pub fn get(&self, order_id: OrderId) -> Option<&Order> {
        self.orders.get(&order_id)
    }

    /// Advance an order's status. The pricing snapshot is untouched.
    ///
    /// The transition is validated against the current status under the
    /// same borrow that applies it, so callers whose earlier status check
    /// went stale (a concurrent cancel or settlement won the race) get
    /// `InvalidStatusTransition` instead of clobbering the winner's state.
    pub fn set_status(&mut self, order_id: OrderId, status: OrderStatus) -> Result<()> {
        let order = self
            .orders
            .get_mut(&order_id)
            .ok_or(CoinsettleError::OrderNotFound(order_id))?;
        if !order.status.can_transition_to(status) {
            return Err(CoinsettleError::InvalidStatusTransition {
                order_id,
                from: order.status.to_string(),
                to: status.to_string(),
            });
        }
        order.status = status;
        order.updated_at = Utc::now();
        Ok(())
    }

    /// Compensating rollback: delete a just-created order.
    ///
    /// Returns the removed order, or `OrderNotFound` — the caller escalates
    /// that case, since it means an orphaned row may remain elsewhere.
    pub fn delete(&mut self, order_id: OrderId) -> Result<Order> {
        let order = self
            .orders
            .remove(&order_id)
            .ok_or(CoinsettleError::OrderNotFound(order_id))?;
        if let Some(ids) = self.by_user.get_mut(&order.user_id) {
            ids.retain(|id| *id != order_id);
        }
        Ok(order)
    }

    /// All of a user's orders, unsorted. Used for window aggregation.
    pub fn for_user(&self, user_id: UserId) -> impl Iterator<Item = &Order> {
        self.by_user
            .get(&user_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.orders.get(id))
    }

    /// Paged listing of a user's orders, newest first.
    #[must_use]
    pub fn list(
        &self,
        user_id: UserId,
        status: Option<OrderStatus>,
        offset: usize,
        limit: usize,
    ) -> Vec<Order> {
        let mut orders: Vec<&Order> = self
            .for_user(user_id)
            .filter(|o| status.is_none_or(|s| o.status == s))
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        orders
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Number of stored orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

impl Default for OrderStore {
    fn default() -> Self {
        Self::new()
    }
}
