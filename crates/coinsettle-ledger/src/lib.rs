//! # coinsettle-ledger
//!
//! **Balance plane**: custodial accounts, atomic debit/credit, and the
//! append-only ledger transaction log.
//!
//! ## Invariants
//!
//! ```text
//! ∀ account: balance >= 0
//! ∀ account: balance == Σ(transaction.amount)
//! ```
//!
//! Both are enforced inside per-account critical sections; the second is
//! additionally auditable on demand via `BalanceLedger::verify_account`.
//!
//! ## Concurrency
//!
//! Mutations are serialized per account (per-account mutex). Concurrent
//! debits against one account see each other's writes; operations on
//! different accounts share no lock.

pub mod ledger;

pub use ledger::BalanceLedger;
