//! Settlement orchestrator — the create-order state machine.
//!
//! ```text
//! Priced → Persisted → { InstantSettling → Settled
//!                      | DeferredAwaitingTransfer }
//!                    | RolledBack
//! ```
//!
//! 1. **Priced**: resolve the rate, compute the quote, run both limit
//!    checks. Any failure here returns directly — nothing was persisted.
//! 2. **Persisted**: create the order row with status PENDING and the
//!    frozen pricing snapshot. From here on, undo is an explicit
//!    compensating rollback, not a silent discard.
//! 3. Balance-funded orders settle instantly: ledger debit, RECONCILED
//!    pay-in record, order → PAYMENT_RECEIVED. Any failure rolls the
//!    order back so the caller-visible outcome equals "never created".
//!    Bank-funded orders park at PAYMENT_PENDING until the external
//!    transfer is matched.
//!
//! All collaborators are injected at construction — there is no ambient
//! global state anywhere in the engine.

use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use coinsettle_ledger::BalanceLedger;
use coinsettle_pricing::{price, LimitGuard, RateResolver, RateSource};
use coinsettle_types::currency::fiat_precision;
use coinsettle_types::{
    constants, CoinsettleError, CurrencyPair, CustodialAccount, IdempotencyKey, Order, OrderEvent,
    OrderId, OrderStatus, PairConfig, PayIn, PayInStatus, PaymentMethod, PaymentReference, Result,
    UserId, VerificationTier,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::idempotency::{IdempotencyGuard, Reservation};
use crate::orders::OrderStore;
use crate::outbox::Outbox;
use crate::recorder::ReconciliationRecorder;

/// User/profile store: verification tier and profile completeness. Read-only.
pub trait UserDirectory: Send + Sync {
    fn verification_tier(&self, user_id: UserId) -> Option<VerificationTier>;
    fn profile_complete(&self, user_id: UserId) -> bool;
}

/// Trading-pair catalog: bounds, fee, active flag per (crypto, fiat) pair.
pub trait PairCatalog: Send + Sync {
    fn pair(&self, pair: &CurrencyPair) -> Option<PairConfig>;
}

/// One audit-trail entry for order creation and settlement.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub action: &'static str,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub detail: String,
    pub at: DateTime<Utc>,
}

/// Audit-log writer. Fire-and-forget from the engine's perspective:
/// a failing sink is logged and never blocks settlement.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry) -> std::result::Result<(), String>;
}

/// Default audit sink: structured log lines via `tracing`.
pub struct TracingAudit;

impl AuditSink for TracingAudit {
    fn record(&self, entry: AuditEntry) -> std::result::Result<(), String> {
        tracing::info!(
            action = entry.action,
            order_id = %entry.order_id,
            user_id = %entry.user_id,
            detail = %entry.detail,
            "audit"
        );
        Ok(())
    }
}

/// One purchase request as received from the request surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub user_id: UserId,
    pub crypto_code: String,
    pub fiat_code: String,
    pub crypto_amount: Decimal,
    pub wallet_address: String,
    pub blockchain: Option<String>,
    pub payment_method: PaymentMethod,
    /// Optional dedup key for client retries. Absent means no dedup.
    pub idempotency_key: Option<IdempotencyKey>,
}

/// Composes pricing, limits, ledger, and reconciliation into the
/// create-order flow. Usable from concurrent request handlers (`&self`).
pub struct SettlementOrchestrator<S: RateSource> {
    rates: RateResolver<S>,
    limits: LimitGuard,
    ledger: Arc<BalanceLedger>,
    users: Arc<dyn UserDirectory>,
    pairs: Arc<dyn PairCatalog>,
    audit: Arc<dyn AuditSink>,
    outbox: Arc<Outbox>,
    orders: RwLock<OrderStore>,
    recorder: Mutex<ReconciliationRecorder>,
    idempotency: Mutex<IdempotencyGuard>,
}

impl<S: RateSource> SettlementOrchestrator<S> {
    pub fn new(
        rates: RateResolver<S>,
        limits: LimitGuard,
        ledger: Arc<BalanceLedger>,
        users: Arc<dyn UserDirectory>,
        pairs: Arc<dyn PairCatalog>,
        audit: Arc<dyn AuditSink>,
        outbox: Arc<Outbox>,
    ) -> Self {
        Self {
            rates,
            limits,
            ledger,
            users,
            pairs,
            audit,
            outbox,
            orders: RwLock::new(OrderStore::new()),
            recorder: Mutex::new(ReconciliationRecorder::new()),
            idempotency: Mutex::new(IdempotencyGuard::new(constants::IDEMPOTENCY_CACHE_SIZE)),
        }
    }

    /// The rate resolver (admin override surface).
    #[must_use]
    pub fn rates(&self) -> &RateResolver<S> {
        &self.rates
    }

    /// The event outbox (dispatcher surface).
    #[must_use]
    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    // =====================================================================
    // Create order
    // =====================================================================

    /// Run the full state machine for one purchase request.
    pub fn create_order(&self, req: &PurchaseRequest) -> Result<Order> {
        Self::validate(req)?;

        // Claim the idempotency key before any pricing work. `begin` is one
        // atomic lookup-and-reserve: of two racing requests with the same
        // key, exactly one proceeds; the other sees the reservation and is
        // turned away (or handed the completed order on a later replay).
        if let Some(key) = &req.idempotency_key {
            let reservation = self
                .idempotency
                .lock()
                .expect("idempotency lock poisoned")
                .begin(key.clone());
            match reservation {
                Reservation::Completed(order_id) => {
                    tracing::info!(order_id = %order_id, key = %key, "idempotent replay");
                    return self.order(order_id);
                }
                Reservation::InFlight => {
                    tracing::info!(key = %key, "duplicate request still in flight");
                    return Err(CoinsettleError::RequestInFlight(key.clone()));
                }
                Reservation::Reserved => {}
            }
        }

        // Any failure from here on must free the reservation again, or the
        // caller could never retry.
        let result = self.price_and_settle(req);
        if result.is_err() {
            if let Some(key) = &req.idempotency_key {
                self.idempotency
                    .lock()
                    .expect("idempotency lock poisoned")
                    .release(key);
            }
        }
        result
    }

    fn price_and_settle(&self, req: &PurchaseRequest) -> Result<Order> {
        // --- Priced ---
        let pair = CurrencyPair::new(req.crypto_code.clone(), req.fiat_code.clone());
        let pair_cfg = self
            .pairs
            .pair(&pair)
            .filter(|cfg| cfg.active)
            .ok_or_else(|| CoinsettleError::TradingPairUnavailable(pair.clone()))?;
        let tier = self.users.verification_tier(req.user_id).ok_or_else(|| {
            CoinsettleError::ValidationError {
                field: "user_id",
                reason: format!("unknown user {}", req.user_id),
            }
        })?;

        let rate = self.rates.resolve(&pair)?;
        let quote = price(
            req.crypto_amount,
            rate,
            pair_cfg.fee_fraction,
            fiat_precision(&pair.fiat),
        );

        LimitGuard::check_bounds(&pair_cfg, req.crypto_amount)?;
        {
            let orders = self.orders.read().expect("order store lock poisoned");
            let used = self
                .limits
                .window_spend(req.user_id, orders.for_user(req.user_id), Utc::now());
            self.limits.check_cap(tier, used, quote.total)?;
        }

        // --- Persisted ---
        let order = Self::build_order(req, &pair, rate, quote);
        let order_id = order.id;
        self.orders
            .write()
            .expect("order store lock poisoned")
            .insert(order.clone());
        if let Some(key) = &req.idempotency_key {
            self.idempotency
                .lock()
                .expect("idempotency lock poisoned")
                .complete(key, order_id);
        }
        self.audit_order("order.created", &order);

        // --- Branch on payment method ---
        match req.payment_method {
            PaymentMethod::Balance => self.settle_instant(order),
            PaymentMethod::BankTransfer => self.defer_to_transfer(order),
        }
    }

    /// Instant settlement from the custodial balance.
    ///
    /// Ordering is fixed: the order exists before the debit (a debit is
    /// always attributable to an order), and the pay-in record is created
    /// only after the debit succeeds. A fresh order id cannot already be
    /// reconciled, so after the debit the remaining steps are infallible
    /// in-memory writes — no re-credit path exists or is needed.
    fn settle_instant(&self, order: Order) -> Result<Order> {
        let order_id = order.id;

        let account_id = match self
            .ledger
            .account_id_for(order.user_id, &order.pair.fiat)
        {
            Some(id) => id,
            None => return self.rollback(order_id, CoinsettleError::AccountNotFound),
        };

        let memo = format!("settlement of order {}", order.payment_reference);
        let tx = match self
            .ledger
            .debit(account_id, order.fiat_total, Some(order_id), &memo)
        {
            Ok(tx) => tx,
            Err(err) => return self.rollback(order_id, err),
        };

        self.recorder
            .lock()
            .expect("recorder lock poisoned")
            .record_ledger(
                order_id,
                order.user_id,
                order.fiat_total,
                &order.pair.fiat,
                tx.id,
            )?;

        let settled = self.transition(order_id, OrderStatus::PaymentReceived)?;
        self.outbox.append(Self::created_event(&settled));
        self.outbox.append(Self::completed_event(&settled));
        tracing::info!(
            order_id = %order_id,
            user_id = %settled.user_id,
            total = %settled.fiat_total,
            fiat = %settled.pair.fiat,
            "instant settlement complete"
        );
        Ok(settled)
    }

    /// External-transfer path: park the order awaiting funds.
    fn defer_to_transfer(&self, order: Order) -> Result<Order> {
        let parked = self.transition(order.id, OrderStatus::PaymentPending)?;
        self.outbox.append(Self::created_event(&parked));
        tracing::info!(
            order_id = %parked.id,
            reference = %parked.payment_reference,
            "order awaiting bank transfer"
        );
        Ok(parked)
    }

    /// Compensating rollback: delete the just-created order, then surface
    /// the original error (`create_order` frees the idempotency
    /// reservation on every error path). A rollback that cannot find the
    /// order is unrecoverable locally and is escalated.
    fn rollback(&self, order_id: OrderId, cause: CoinsettleError) -> Result<Order> {
        match self
            .orders
            .write()
            .expect("order store lock poisoned")
            .delete(order_id)
        {
            Ok(_) => {
                tracing::warn!(order_id = %order_id, cause = %cause, "order rolled back");
                Err(cause)
            }
            Err(delete_err) => {
                tracing::error!(
                    order_id = %order_id,
                    cause = %cause,
                    error = %delete_err,
                    "ROLLBACK FAILED — orphaned unpaid order, operator intervention required"
                );
                Err(CoinsettleError::RollbackFailed {
                    order_id,
                    reason: delete_err.to_string(),
                })
            }
        }
    }

    // =====================================================================
    // Deferred-path completion (driven by the external matching process)
    // =====================================================================

    /// Confirm a bank transfer reported for an order awaiting funds.
    ///
    /// Creates the external pay-in record and, when the received amount
    /// matches the expected total, reconciles it and advances the order to
    /// PAYMENT_RECEIVED. A mismatching amount leaves the order untouched
    /// and the record in MISMATCH for manual review.
    pub fn confirm_bank_transfer(
        &self,
        order_id: OrderId,
        received_amount: Decimal,
        sender_name: &str,
        sender_reference: &str,
    ) -> Result<PayIn> {
        let order = self.order(order_id)?;
        if order.status != OrderStatus::PaymentPending {
            return Err(CoinsettleError::InvalidStatusTransition {
                order_id,
                from: order.status.to_string(),
                to: OrderStatus::PaymentReceived.to_string(),
            });
        }

        let mut recorder = self.recorder.lock().expect("recorder lock poisoned");
        let payin = recorder.record_external(
            order_id,
            order.user_id,
            order.fiat_total,
            received_amount,
            &order.pair.fiat,
            sender_name,
            sender_reference,
        );

        if payin.amounts_match() {
            recorder.advance(payin.id, PayInStatus::Verified)?;
            recorder.advance(payin.id, PayInStatus::Reconciled)?;
            let reconciled = recorder
                .get(payin.id)
                .cloned()
                .expect("pay-in just created");
            drop(recorder);
            let settled = self.transition(order_id, OrderStatus::PaymentReceived)?;
            self.outbox.append(Self::completed_event(&settled));
            tracing::info!(order_id = %order_id, "bank transfer reconciled");
            return Ok(reconciled);
        }

        // Wrong amount: hold for manual review. A record still PENDING saw
        // no funds at all and stays put.
        if payin.status == PayInStatus::Received {
            recorder.advance(payin.id, PayInStatus::Mismatch)?;
        }
        tracing::warn!(
            order_id = %order_id,
            expected = %order.fiat_total,
            received = %received_amount,
            "bank transfer amount mismatch"
        );
        Ok(recorder
            .get(payin.id)
            .cloned()
            .expect("pay-in just created"))
    }

    // =====================================================================
    // Custodial account surface
    // =====================================================================

    /// Open a custodial account, gated on eligibility: a verification tier
    /// above UNVERIFIED and a complete profile.
    pub fn open_custodial_account(
        &self,
        user_id: UserId,
        currency: &str,
    ) -> Result<CustodialAccount> {
        let tier = self.users.verification_tier(user_id).ok_or_else(|| {
            CoinsettleError::ValidationError {
                field: "user_id",
                reason: format!("unknown user {user_id}"),
            }
        })?;
        if tier == VerificationTier::Unverified {
            return Err(CoinsettleError::AccountNotEligible {
                reason: "identity verification required".to_string(),
            });
        }
        if !self.users.profile_complete(user_id) {
            return Err(CoinsettleError::AccountNotEligible {
                reason: "profile incomplete".to_string(),
            });
        }
        self.ledger.open_account(user_id, currency)
    }

    // =====================================================================
    // Query / lifecycle surface
    // =====================================================================

    /// Look up one order.
    pub fn order(&self, order_id: OrderId) -> Result<Order> {
        self.orders
            .read()
            .expect("order store lock poisoned")
            .get(order_id)
            .cloned()
            .ok_or(CoinsettleError::OrderNotFound(order_id))
    }

    /// Paged listing of a user's orders, newest first.
    #[must_use]
    pub fn list_orders(
        &self,
        user_id: UserId,
        status: Option<OrderStatus>,
        offset: usize,
        limit: usize,
    ) -> Vec<Order> {
        let limit = if limit == 0 {
            constants::DEFAULT_PAGE_SIZE
        } else {
            limit.min(constants::MAX_PAGE_SIZE)
        };
        self.orders
            .read()
            .expect("order store lock poisoned")
            .list(user_id, status, offset, limit)
    }

    /// Cancel an order still awaiting funding. Funded or terminal orders
    /// cannot be cancelled through this path.
    pub fn cancel_order(&self, order_id: OrderId, user_id: UserId) -> Result<Order> {
        let order = self.order(order_id)?;
        if order.user_id != user_id {
            return Err(CoinsettleError::OrderNotFound(order_id));
        }
        if !matches!(
            order.status,
            OrderStatus::Pending | OrderStatus::PaymentPending
        ) {
            return Err(CoinsettleError::InvalidStatusTransition {
                order_id,
                from: order.status.to_string(),
                to: OrderStatus::Cancelled.to_string(),
            });
        }
        self.transition(order_id, OrderStatus::Cancelled)
    }

    // =====================================================================
    // Internals
    // =====================================================================

    fn validate(req: &PurchaseRequest) -> Result<()> {
        if req.wallet_address.trim().is_empty() {
            return Err(CoinsettleError::ValidationError {
                field: "wallet_address",
                reason: "must not be empty".to_string(),
            });
        }
        if req.crypto_amount.is_zero() || req.crypto_amount.is_sign_negative() {
            return Err(CoinsettleError::ValidationError {
                field: "crypto_amount",
                reason: format!("must be positive, got {}", req.crypto_amount),
            });
        }
        Ok(())
    }

    fn build_order(
        req: &PurchaseRequest,
        pair: &CurrencyPair,
        rate: Decimal,
        quote: coinsettle_pricing::Quote,
    ) -> Order {
        let id = OrderId::new();
        let now = Utc::now();
        Order {
            id,
            user_id: req.user_id,
            payment_reference: PaymentReference::for_order(id),
            pair: pair.clone(),
            crypto_amount: req.crypto_amount,
            fiat_subtotal: quote.subtotal,
            fee_fraction: quote.fee_fraction,
            fee_amount: quote.fee,
            fiat_total: quote.total,
            rate_applied: rate,
            wallet_address: req.wallet_address.clone(),
            blockchain: req.blockchain.clone(),
            payment_method: req.payment_method,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
            expires_at: Order::expiry_from(now),
        }
    }

    fn transition(&self, order_id: OrderId, status: OrderStatus) -> Result<Order> {
        let mut orders = self.orders.write().expect("order store lock poisoned");
        orders.set_status(order_id, status)?;
        Ok(orders.get(order_id).expect("just updated").clone())
    }

    fn audit_order(&self, action: &'static str, order: &Order) {
        let entry = AuditEntry {
            action,
            order_id: order.id,
            user_id: order.user_id,
            detail: format!(
                "{} {} for {} {} via {}",
                order.crypto_amount, order.pair.crypto, order.fiat_total, order.pair.fiat,
                order.payment_method
            ),
            at: Utc::now(),
        };
        if let Err(reason) = self.audit.record(entry) {
            tracing::warn!(order_id = %order.id, reason, "audit write failed; continuing");
        }
    }

    fn created_event(order: &Order) -> OrderEvent {
        OrderEvent::OrderCreated {
            order_id: order.id,
            user_id: order.user_id,
            crypto_code: order.pair.crypto.clone(),
            fiat_code: order.pair.fiat.clone(),
            crypto_amount: order.crypto_amount,
            fiat_total: order.fiat_total,
            wallet_address: order.wallet_address.clone(),
            payment_reference: order.payment_reference.clone(),
            created_at: order.created_at,
        }
    }

    fn completed_event(order: &Order) -> OrderEvent {
        OrderEvent::PaymentCompleted {
            order_id: order.id,
            user_id: order.user_id,
            crypto_code: order.pair.crypto.clone(),
            fiat_code: order.pair.fiat.clone(),
            crypto_amount: order.crypto_amount,
            fiat_total: order.fiat_total,
            wallet_address: order.wallet_address.clone(),
            payment_reference: order.payment_reference.clone(),
            completed_at: order.updated_at,
        }
    }
}
