//! # coinsettle-types
//!
//! Shared types, errors, and configuration for the **CoinSettle** order
//! settlement & balance ledger engine.
//!
//! This crate is the leaf dependency of the workspace — every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`OrderId`], [`UserId`], [`AccountId`], [`LedgerTxId`],
//!   [`PayInId`], [`PaymentReference`], [`IdempotencyKey`], [`CurrencyPair`]
//! - **Order model**: [`Order`], [`OrderStatus`], [`PaymentMethod`]
//! - **Ledger model**: [`CustodialAccount`], [`AccountStatus`], [`LedgerTransaction`]
//! - **Reconciliation model**: [`PayIn`], [`PayInStatus`], [`PayInSource`]
//! - **Configuration**: [`PairConfig`], [`VerificationTier`], [`TierLimits`]
//! - **Events**: [`OrderEvent`]
//! - **Errors**: [`CoinsettleError`] with `CS_ERR_` prefix codes
//! - **Money helpers**: rounding and precision in [`currency`]
//! - **Constants**: system-wide limits and defaults

pub mod account;
pub mod config;
pub mod constants;
pub mod currency;
pub mod error;
pub mod event;
pub mod ids;
pub mod order;
pub mod payin;

// Re-export all primary types at crate root for ergonomic imports:
//   use coinsettle_types::{Order, CustodialAccount, PayIn, ...};

pub use account::*;
pub use config::*;
pub use error::*;
pub use event::*;
pub use ids::*;
pub use order::*;
pub use payin::*;

// Money helpers are accessed via `coinsettle_types::currency::round_money`,
// constants via `coinsettle_types::constants::FOO`
// (not re-exported to avoid name collisions).
