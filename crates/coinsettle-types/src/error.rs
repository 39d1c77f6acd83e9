//! Error types for the CoinSettle settlement engine.
//!
//! All errors use the `CS_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Order / validation errors
//! - 2xx: Trading-pair / rate errors
//! - 3xx: Limit errors
//! - 4xx: Ledger / account errors
//! - 5xx: Reconciliation errors
//! - 6xx: Persistence / rollback errors
//! - 9xx: General / internal errors
//!
//! Structured fields (`required`/`available`, `used`/`limit`/`remaining`)
//! are part of the caller contract: the storefront renders precise messages
//! from them, so they must carry the exact values the check observed.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{CurrencyPair, IdempotencyKey, OrderId};

/// Which bound a per-trade amount check violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundSide {
    Min,
    Max,
}

impl std::fmt::Display for BoundSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Min => write!(f, "MIN"),
            Self::Max => write!(f, "MAX"),
        }
    }
}

/// Central error enum for all CoinSettle operations.
#[derive(Debug, Error)]
pub enum CoinsettleError {
    // =================================================================
    // Order / Validation Errors (1xx)
    // =================================================================
    /// The requested order was not found.
    #[error("CS_ERR_100: Order not found: {0}")]
    OrderNotFound(OrderId),

    /// A request field failed validation (malformed input).
    #[error("CS_ERR_101: Validation failed on `{field}`: {reason}")]
    ValidationError { field: &'static str, reason: String },

    /// The order is not in a state that permits the requested transition.
    #[error("CS_ERR_102: Invalid status transition for order {order_id}: {from} -> {to}")]
    InvalidStatusTransition {
        order_id: OrderId,
        from: String,
        to: String,
    },

    /// Another request with the same idempotency key is still in flight.
    #[error("CS_ERR_103: Request with idempotency key {0} is already in flight")]
    RequestInFlight(IdempotencyKey),

    // =================================================================
    // Trading-pair / Rate Errors (2xx)
    // =================================================================
    /// The trading pair is unknown or disabled by an administrator.
    #[error("CS_ERR_200: Trading pair unavailable: {0}")]
    TradingPairUnavailable(CurrencyPair),

    /// Neither an override nor a live market rate exists for the pair.
    #[error("CS_ERR_201: No exchange rate available for {0}")]
    RateUnavailable(CurrencyPair),

    // =================================================================
    // Limit Errors (3xx)
    // =================================================================
    /// The crypto amount lies outside the pair's per-trade bounds.
    #[error("CS_ERR_300: Amount {amount} violates {side} bound {bound}")]
    OutOfBounds {
        side: BoundSide,
        amount: Decimal,
        bound: Decimal,
    },

    /// The order would push the rolling-window spend past the tier cap.
    #[error("CS_ERR_301: Spending limit exceeded: used {used} of {limit}, remaining {remaining}")]
    LimitExceeded {
        used: Decimal,
        limit: Decimal,
        remaining: Decimal,
    },

    // =================================================================
    // Ledger / Account Errors (4xx)
    // =================================================================
    /// No custodial account exists for this user and currency.
    #[error("CS_ERR_400: No custodial account for user in this currency")]
    AccountNotFound,

    /// Not enough balance to cover the debit (beyond tolerance).
    #[error("CS_ERR_401: Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        required: Decimal,
        available: Decimal,
    },

    /// The account is suspended — debits are blocked.
    #[error("CS_ERR_402: Account is suspended")]
    AccountSuspended,

    /// The account is closed — terminal, no mutations allowed.
    #[error("CS_ERR_403: Account is closed")]
    AccountClosed,

    /// A (user, currency) account already exists.
    #[error("CS_ERR_404: Account already exists for user in this currency")]
    AccountAlreadyExists,

    /// The account's cached balance no longer equals the transaction sum.
    #[error("CS_ERR_405: Ledger invariant violation: {reason}")]
    LedgerInvariantViolation { reason: String },

    /// The user is not eligible to open a custodial account.
    #[error("CS_ERR_406: Account eligibility not met: {reason}")]
    AccountNotEligible { reason: String },

    // =================================================================
    // Reconciliation Errors (5xx)
    // =================================================================
    /// A RECONCILED record already exists for this order.
    #[error("CS_ERR_500: Order already reconciled: {0}")]
    AlreadyReconciled(OrderId),

    /// The pay-in record cannot move to the requested status.
    #[error("CS_ERR_501: Invalid pay-in transition: {from} -> {to}")]
    InvalidPayInTransition { from: String, to: String },

    // =================================================================
    // Persistence / Rollback Errors (6xx)
    // =================================================================
    /// Storage-layer fault. Retryable pre-persist.
    #[error("CS_ERR_600: Persistence failure: {reason}")]
    PersistenceFailure { reason: String },

    /// Compensating rollback failed — an orphaned unpaid order remains.
    /// Unrecoverable locally; requires operator intervention.
    #[error("CS_ERR_601: Rollback failed for order {order_id}: {reason}")]
    RollbackFailed { order_id: OrderId, reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("CS_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("CS_ERR_901: Serialization error: {0}")]
    Serialization(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, CoinsettleError>;

impl CoinsettleError {
    /// Whether the caller may retry the identical request.
    ///
    /// Pre-persist rate and storage faults are transient, as is a
    /// duplicate still in flight (the retry returns the winner's order);
    /// validation and limit errors require the user to change the
    /// request first.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateUnavailable(_)
                | Self::PersistenceFailure { .. }
                | Self::RequestInFlight(_)
        )
    }
}
