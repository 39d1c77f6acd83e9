//! Custodial account and ledger-transaction types.
//!
//! A [`CustodialAccount`] is a per-(user, currency) fiat balance the platform
//! holds on the user's behalf. Every change to the balance is accompanied by
//! exactly one immutable [`LedgerTransaction`], and the cached balance must
//! always equal the sum of the account's transaction amounts.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountId, LedgerTxId, OrderId, UserId};

/// Lifecycle status of a custodial account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountStatus {
    Active,
    /// Debits blocked; reads still allowed.
    Suspended,
    /// Terminal.
    Closed,
    /// Provisioning failed; never held funds.
    Failed,
}

impl AccountStatus {
    /// Whether funds may leave the account in this state.
    #[must_use]
    pub fn allows_debit(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Whether funds may enter the account in this state.
    ///
    /// Suspension blocks spending, not incoming funds.
    #[must_use]
    pub fn allows_credit(self) -> bool {
        matches!(self, Self::Active | Self::Suspended)
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Suspended => write!(f, "SUSPENDED"),
            Self::Closed => write!(f, "CLOSED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// One per-user, currency-denominated custodial balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustodialAccount {
    pub id: AccountId,
    pub user_id: UserId,
    /// Fiat currency code (e.g., "EUR").
    pub currency: String,
    /// Cached balance. Invariant: non-negative, equals the transaction sum.
    pub balance: Decimal,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CustodialAccount {
    /// A fresh, empty, active account.
    #[must_use]
    pub fn open(user_id: UserId, currency: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: AccountId::new(),
            user_id,
            currency: currency.into(),
            balance: Decimal::ZERO,
            status: AccountStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Append-only record of one balance mutation. Never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub id: LedgerTxId,
    pub account_id: AccountId,
    /// Signed amount: positive = credit, negative = debit.
    pub amount: Decimal,
    /// Account balance immediately after this mutation.
    pub balance_after: Decimal,
    /// The order this mutation settles, if any.
    pub order_id: Option<OrderId>,
    pub memo: String,
    pub created_at: DateTime<Utc>,
}

impl LedgerTransaction {
    #[must_use]
    pub fn is_debit(&self) -> bool {
        self.amount.is_sign_negative()
    }

    #[must_use]
    pub fn is_credit(&self) -> bool {
        self.amount.is_sign_positive()
    }
}
