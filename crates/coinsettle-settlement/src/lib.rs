//! # coinsettle-settlement
//!
//! Settlement plane: the create-order state machine and everything it
//! persists — orders, reconciliation records, the idempotency cache, and
//! the event outbox.
//!
//! ## Architecture
//!
//! ```text
//!                ┌──────────────────────────┐
//!   request ───▶ │  SettlementOrchestrator  │ ───▶ OrderStore
//!                │  (priced → persisted →   │ ───▶ BalanceLedger (debit)
//!                │   settle / defer /       │ ───▶ ReconciliationRecorder
//!                │   rollback)              │ ───▶ Outbox (events)
//!                └──────────────────────────┘
//! ```
//!
//! The orchestrator owns all mutable settlement state behind interior
//! mutability, so one instance serves concurrent request handlers through
//! `&self`. Collaborators (rate source, user directory, pair catalog,
//! audit sink) are injected at construction.

pub mod idempotency;
pub mod orchestrator;
pub mod orders;
pub mod outbox;
pub mod recorder;

pub use idempotency::{IdempotencyGuard, Reservation};
pub use orchestrator::{
    AuditEntry, AuditSink, PairCatalog, PurchaseRequest, SettlementOrchestrator, TracingAudit,
    UserDirectory,
};
pub use orders::OrderStore;
pub use outbox::{Outbox, OutboxEntry};
pub use recorder::ReconciliationRecorder;
