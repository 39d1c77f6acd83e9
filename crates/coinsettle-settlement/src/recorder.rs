//! Reconciliation recorder — links received funds to orders.
//!
//! Ledger-funded settlement creates its record synchronously, already
//! RECONCILED and sourced from the settling ledger transaction. Bank-funded
//! orders get their record later from the external matching process and
//! walk PENDING/RECEIVED → VERIFIED → RECONCILED.
//!
//! Invariant: at most one RECONCILED record per order, ever. A second
//! attempt fails with [`CoinsettleError::AlreadyReconciled`].

use std::collections::HashMap;

use chrono::Utc;
use coinsettle_types::{
    CoinsettleError, LedgerTxId, OrderId, PayIn, PayInId, PayInSource, PayInStatus, Result, UserId,
};
use rust_decimal::Decimal;

/// Owns all pay-in records and enforces per-order reconciliation uniqueness.
pub struct ReconciliationRecorder {
    payins: HashMap<PayInId, PayIn>,
    by_order: HashMap<OrderId, Vec<PayInId>>,
}

impl ReconciliationRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            payins: HashMap::new(),
            by_order: HashMap::new(),
        }
    }

    /// Record instant ledger settlement: created directly as RECONCILED,
    /// sourced from the ledger transaction that debited the balance.
    ///
    /// # Errors
    /// Returns [`CoinsettleError::AlreadyReconciled`] if the order already
    /// has a RECONCILED record.
    pub fn record_ledger(
        &mut self,
        order_id: OrderId,
        user_id: UserId,
        amount: Decimal,
        currency: &str,
        tx_id: LedgerTxId,
    ) -> Result<PayIn> {
        self.check_not_reconciled(order_id)?;
        let payin = Self::build(
            order_id,
            user_id,
            amount,
            amount,
            currency,
            PayInStatus::Reconciled,
            PayInSource::Ledger(tx_id),
        );
        self.store(payin.clone());
        Ok(payin)
    }

    /// Record an externally-reported bank transfer. Starts at PENDING when
    /// no funds were seen yet (`received_amount` zero), RECEIVED otherwise.
    pub fn record_external(
        &mut self,
        order_id: OrderId,
        user_id: UserId,
        expected_amount: Decimal,
        received_amount: Decimal,
        currency: &str,
        sender_name: &str,
        sender_reference: &str,
    ) -> PayIn {
        let status = if received_amount.is_zero() {
            PayInStatus::Pending
        } else {
            PayInStatus::Received
        };
        let payin = Self::build(
            order_id,
            user_id,
            expected_amount,
            received_amount,
            currency,
            status,
            PayInSource::BankTransfer {
                sender_name: sender_name.to_string(),
                sender_reference: sender_reference.to_string(),
            },
        );
        self.store(payin.clone());
        payin
    }

    /// Advance an external record through its lifecycle. Moving to
    /// RECONCILED is guarded by the same per-order uniqueness invariant.
    ///
    /// # Errors
    /// - [`CoinsettleError::InvalidPayInTransition`] for illegal moves
    /// - [`CoinsettleError::AlreadyReconciled`] on a second reconciliation
    pub fn advance(&mut self, payin_id: PayInId, next: PayInStatus) -> Result<()> {
        let order_id = self
            .payins
            .get(&payin_id)
            .map(|p| p.order_id)
            .ok_or_else(|| CoinsettleError::Internal(format!("unknown pay-in {payin_id}")))?;

        if next == PayInStatus::Reconciled {
            self.check_not_reconciled(order_id)?;
        }

        let payin = self.payins.get_mut(&payin_id).expect("checked above");
        if !payin.status.can_transition_to(next) {
            return Err(CoinsettleError::InvalidPayInTransition {
                from: payin.status.to_string(),
                to: next.to_string(),
            });
        }
        payin.status = next;
        payin.updated_at = Utc::now();
        Ok(())
    }

    /// The RECONCILED record for an order, if one exists.
    #[must_use]
    pub fn reconciled_for(&self, order_id: OrderId) -> Option<&PayIn> {
        self.by_order
            .get(&order_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.payins.get(id))
            .find(|p| p.status == PayInStatus::Reconciled)
    }

    /// All records for an order.
    pub fn for_order(&self, order_id: OrderId) -> impl Iterator<Item = &PayIn> {
        self.by_order
            .get(&order_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.payins.get(id))
    }

    /// Look up a record by id.
    #[must_use]
    pub fn get(&self, payin_id: PayInId) -> Option<&PayIn> {
        self.payins.get(&payin_id)
    }

    /// Number of records tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.payins.len()
    }

    /// Whether no records exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payins.is_empty()
    }

    fn check_not_reconciled(&self, order_id: OrderId) -> Result<()> {
        if self.reconciled_for(order_id).is_some() {
            return Err(CoinsettleError::AlreadyReconciled(order_id));
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        order_id: OrderId,
        user_id: UserId,
        expected_amount: Decimal,
        received_amount: Decimal,
        currency: &str,
        status: PayInStatus,
        source: PayInSource,
    ) -> PayIn {
        let now = Utc::now();
        PayIn {
            id: PayInId::new(),
            order_id,
            user_id,
            expected_amount,
            received_amount,
            currency: currency.to_string(),
            status,
            source,
            created_at: now,
            updated_at: now,
        }
    }

    fn store(&mut self, payin: PayIn) {
        self.by_order.entry(payin.order_id).or_default().push(payin.id);
        self.payins.insert(payin.id, payin);
    }
}

impl Default for ReconciliationRecorder {
    fn default() -> Self {
        Self::new()
    }
}
