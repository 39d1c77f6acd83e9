//! Domain events emitted by the settlement engine.
//!
//! Events are written to a durable outbox in the same mutation path as the
//! order change and dispatched asynchronously, at-least-once. Consumers
//! (notification delivery, crypto-payout initiation) must tolerate
//! duplicates; the engine never waits for consumer success.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{OrderId, PaymentReference, UserId};

/// A domain event carrying everything downstream consumers need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrderEvent {
    /// An order was created (either path).
    OrderCreated {
        order_id: OrderId,
        user_id: UserId,
        crypto_code: String,
        fiat_code: String,
        crypto_amount: Decimal,
        fiat_total: Decimal,
        wallet_address: String,
        payment_reference: PaymentReference,
        created_at: DateTime<Utc>,
    },
    /// Payment for an order completed (funds matched and settled).
    /// Triggers downstream crypto-payout initiation.
    PaymentCompleted {
        order_id: OrderId,
        user_id: UserId,
        crypto_code: String,
        fiat_code: String,
        crypto_amount: Decimal,
        fiat_total: Decimal,
        wallet_address: String,
        payment_reference: PaymentReference,
        completed_at: DateTime<Utc>,
    },
}

impl OrderEvent {
    /// The order this event refers to.
    #[must_use]
    pub fn order_id(&self) -> OrderId {
        match self {
            Self::OrderCreated { order_id, .. } | Self::PaymentCompleted { order_id, .. } => {
                *order_id
            }
        }
    }

    /// Short event-kind tag for logs and routing.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OrderCreated { .. } => "ORDER_CREATED",
            Self::PaymentCompleted { .. } => "PAYMENT_COMPLETED",
        }
    }
}
