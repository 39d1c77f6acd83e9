//! Reconciliation (pay-in) record types.
//!
//! A [`PayIn`] asserts that a specific amount of funds has been matched to a
//! specific order. Ledger-funded orders get one synchronously, already
//! RECONCILED and sourced from the settling ledger transaction. Bank-funded
//! orders get one later from the external matching process, starting at
//! PENDING or RECEIVED.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{LedgerTxId, OrderId, PayInId, UserId};

/// Lifecycle status of a pay-in record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayInStatus {
    /// Expected but no funds seen yet.
    Pending,
    /// Funds reported, not yet verified.
    Received,
    /// Funds verified against the expected amount.
    Verified,
    /// Matched to the order. At most one per order.
    Reconciled,
    /// Received amount disagrees with the expected amount.
    Mismatch,
    Failed,
}

impl PayInStatus {
    /// Valid forward transitions for externally-funded records.
    /// Ledger-funded records are created directly as `Reconciled`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Received | Self::Failed)
                | (Self::Received, Self::Verified | Self::Mismatch | Self::Failed)
                | (Self::Verified, Self::Reconciled | Self::Mismatch)
                | (Self::Mismatch, Self::Verified | Self::Failed)
        )
    }
}

impl std::fmt::Display for PayInStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Received => write!(f, "RECEIVED"),
            Self::Verified => write!(f, "VERIFIED"),
            Self::Reconciled => write!(f, "RECONCILED"),
            Self::Mismatch => write!(f, "MISMATCH"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Where the matched funds came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayInSource {
    /// Instant settlement: the ledger transaction that debited the balance.
    Ledger(LedgerTxId),
    /// Externally reported bank transfer.
    BankTransfer {
        sender_name: String,
        sender_reference: String,
    },
}

/// Links received funds to exactly one order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayIn {
    pub id: PayInId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub expected_amount: Decimal,
    pub received_amount: Decimal,
    pub currency: String,
    pub status: PayInStatus,
    pub source: PayInSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PayIn {
    /// Whether the received amount covers the expected amount exactly.
    #[must_use]
    pub fn amounts_match(&self) -> bool {
        self.received_amount == self.expected_amount
    }
}
