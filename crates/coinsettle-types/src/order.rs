//! Order types for the CoinSettle settlement engine.
//!
//! An [`Order`] carries a **frozen pricing snapshot**: once the orchestrator
//! creates the row, subtotal, fee, total, and the applied rate are never
//! recomputed. All later readers must trust the stored figures, not
//! re-derive them from current rates.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{constants, CurrencyPair, OrderId, PaymentReference, UserId};

/// How an order is funded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// Instant settlement from the user's custodial balance.
    Balance,
    /// Deferred settlement via an externally reported bank transfer.
    BankTransfer,
}

impl PaymentMethod {
    /// Parse the payment-method code carried by the request surface.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "balance" => Some(Self::Balance),
            "bank_transfer" | "sepa" => Some(Self::BankTransfer),
            _ => None,
        }
    }

    /// Whether this method settles instantly from the ledger.
    #[must_use]
    pub fn is_instant(self) -> bool {
        matches!(self, Self::Balance)
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Balance => write!(f, "BALANCE"),
            Self::BankTransfer => write!(f, "BANK_TRANSFER"),
        }
    }
}

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    PaymentPending,
    PaymentReceived,
    Processing,
    Completed,
    Cancelled,
    Failed,
    Expired,
}

impl OrderStatus {
    /// Whether this order still counts toward the rolling spending limit.
    ///
    /// Cancelled, failed, and expired orders never consumed funds.
    #[must_use]
    pub fn counts_toward_limit(self) -> bool {
        !matches!(self, Self::Cancelled | Self::Failed | Self::Expired)
    }

    /// Whether this status is terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed | Self::Expired)
    }

    /// Legal forward transitions. Terminal statuses permit none: a
    /// cancelled order can never be resurrected and a funded order can
    /// never be cancelled out from under its pay-in record.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (
                Self::Pending,
                Self::PaymentPending
                    | Self::PaymentReceived
                    | Self::Cancelled
                    | Self::Failed
                    | Self::Expired
            ) | (
                Self::PaymentPending,
                Self::PaymentReceived | Self::Cancelled | Self::Failed | Self::Expired
            ) | (Self::PaymentReceived, Self::Processing | Self::Failed)
                | (Self::Processing, Self::Completed | Self::Failed)
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::PaymentPending => write!(f, "PAYMENT_PENDING"),
            Self::PaymentReceived => write!(f, "PAYMENT_RECEIVED"),
            Self::Processing => write!(f, "PROCESSING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// One purchase intent, with an immutable pricing snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    /// Reconciliation key for external transfers. Unique per order.
    pub payment_reference: PaymentReference,
    pub pair: CurrencyPair,
    // --- Pricing snapshot (frozen at creation) ---
    /// Crypto amount at full precision as supplied by the caller.
    pub crypto_amount: Decimal,
    pub fiat_subtotal: Decimal,
    /// Fee as a fraction (0.015 = 1.5%).
    pub fee_fraction: Decimal,
    pub fee_amount: Decimal,
    pub fiat_total: Decimal,
    /// Rate applied at pricing time (fiat per crypto unit).
    pub rate_applied: Decimal,
    // --- Routing ---
    pub wallet_address: String,
    pub blockchain: Option<String>,
    pub payment_method: PaymentMethod,
    // --- Lifecycle ---
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Funding horizon; a separate sweeper expires past-due PENDING orders.
    pub expires_at: DateTime<Utc>,
}

impl Order {
    /// Default expiry timestamp relative to creation time.
    #[must_use]
    pub fn expiry_from(created_at: DateTime<Utc>) -> DateTime<Utc> {
        created_at + Duration::hours(constants::ORDER_EXPIRY_HOURS)
    }

    /// Whether the order was created within the trailing window ending now.
    #[must_use]
    pub fn within_window(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.created_at >= now - window
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Order {
    pub fn dummy_purchase(user_id: UserId, fiat_total: Decimal, status: OrderStatus) -> Self {
        let id = OrderId::new();
        let now = Utc::now();
        Self {
            id,
            user_id,
            payment_reference: PaymentReference::for_order(id),
            pair: CurrencyPair::new("BTC", "EUR"),
            crypto_amount: Decimal::new(1, 2),
            fiat_subtotal: fiat_total,
            fee_fraction: Decimal::ZERO,
            fee_amount: Decimal::ZERO,
            fiat_total,
            rate_applied: Decimal::new(45_000, 0),
            wallet_address: "bc1qtestwallet".to_string(),
            blockchain: None,
            payment_method: PaymentMethod::Balance,
            status,
            created_at: now,
            updated_at: now,
            expires_at: Self::expiry_from(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display() {
        assert_eq!(format!("{}", OrderStatus::PaymentReceived), "PAYMENT_RECEIVED");
        assert_eq!(format!("{}", OrderStatus::PaymentPending), "PAYMENT_PENDING");
        assert_eq!(format!("{}", OrderStatus::Expired), "EXPIRED");
    }

    #[test]
    fn cancelled_failed_expired_excluded_from_limit() {
        assert!(!OrderStatus::Cancelled.counts_toward_limit());
        assert!(!OrderStatus::Failed.counts_toward_limit());
        assert!(!OrderStatus::Expired.counts_toward_limit());
        assert!(OrderStatus::Pending.counts_toward_limit());
        assert!(OrderStatus::PaymentReceived.counts_toward_limit());
        assert!(OrderStatus::Completed.counts_toward_limit());
    }

    #[test]
    fn funding_transitions() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::PaymentPending));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::PaymentReceived));
        assert!(OrderStatus::PaymentPending.can_transition_to(OrderStatus::PaymentReceived));
        assert!(OrderStatus::PaymentReceived.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Completed));
    }

    #[test]
    fn terminal_statuses_are_frozen() {
        for from in [
            OrderStatus::Completed,
            OrderStatus::Cancelled,
            OrderStatus::Failed,
            OrderStatus::Expired,
        ] {
            for to in [
                OrderStatus::Pending,
                OrderStatus::PaymentPending,
                OrderStatus::PaymentReceived,
                OrderStatus::Processing,
                OrderStatus::Completed,
            ] {
                assert!(!from.can_transition_to(to), "{from} -> {to} must be illegal");
            }
        }
    }

    #[test]
    fn funded_order_cannot_be_cancelled() {
        assert!(!OrderStatus::PaymentReceived.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Processing.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn payment_method_codes() {
        assert_eq!(PaymentMethod::from_code("balance"), Some(PaymentMethod::Balance));
        assert_eq!(
            PaymentMethod::from_code("bank_transfer"),
            Some(PaymentMethod::BankTransfer)
        );
        assert_eq!(PaymentMethod::from_code("sepa"), Some(PaymentMethod::BankTransfer));
        assert_eq!(PaymentMethod::from_code("paypal"), None);
        assert!(PaymentMethod::Balance.is_instant());
        assert!(!PaymentMethod::BankTransfer.is_instant());
    }

    #[test]
    fn expiry_is_24_hours_out() {
        let now = Utc::now();
        assert_eq!(Order::expiry_from(now), now + Duration::hours(24));
    }

    #[test]
    fn window_membership() {
        let order = Order::dummy_purchase(UserId::new(), Decimal::new(100, 0), OrderStatus::Pending);
        let now = Utc::now();
        assert!(order.within_window(now, Duration::hours(24)));
        assert!(!order.within_window(now + Duration::hours(25), Duration::hours(24)));
    }

    #[test]
    fn order_serde_roundtrip() {
        let order = Order::dummy_purchase(UserId::new(), Decimal::new(45675, 2), OrderStatus::Pending);
        let json = serde_json::to_string(&order).unwrap();
        let back: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(order.id, back.id);
        assert_eq!(order.fiat_total, back.fiat_total);
        assert_eq!(order.payment_reference, back.payment_reference);
    }
}
