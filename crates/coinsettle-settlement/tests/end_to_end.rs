//! End-to-end integration tests across all three planes.
//!
//! These tests exercise the full purchase lifecycle:
//! Pricing (rate + quote + limits) -> Settlement (persist + debit) ->
//! Reconciliation (pay-in records), against a live `BalanceLedger`.

use std::collections::HashMap;
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use coinsettle_ledger::BalanceLedger;
use coinsettle_pricing::{LimitGuard, RateResolver, RateSource};
use coinsettle_settlement::{
    PairCatalog, PurchaseRequest, SettlementOrchestrator, TracingAudit, UserDirectory,
};
use coinsettle_types::{
    AccountId, CoinsettleError, CurrencyPair, IdempotencyKey, OrderStatus, PairConfig,
    PayInSource, PayInStatus, PaymentMethod, TierLimits, UserId, VerificationTier,
};
use rust_decimal::Decimal;

// =============================================================================
// Harness
// =============================================================================

struct FixedRates(HashMap<CurrencyPair, Decimal>);

impl RateSource for FixedRates {
    fn market_rate(&self, pair: &CurrencyPair) -> Option<Decimal> {
        self.0.get(pair).copied()
    }
}

#[derive(Default)]
struct Directory {
    users: Mutex<HashMap<UserId, (VerificationTier, bool)>>,
}

impl Directory {
    fn register(&self, user: UserId, tier: VerificationTier, complete: bool) {
        self.users.lock().unwrap().insert(user, (tier, complete));
    }
}

impl UserDirectory for Directory {
    fn verification_tier(&self, user_id: UserId) -> Option<VerificationTier> {
        self.users.lock().unwrap().get(&user_id).map(|(t, _)| *t)
    }
    fn profile_complete(&self, user_id: UserId) -> bool {
        self.users
            .lock()
            .unwrap()
            .get(&user_id)
            .is_some_and(|(_, c)| *c)
    }
}

struct Catalog;

impl PairCatalog for Catalog {
    fn pair(&self, pair: &CurrencyPair) -> Option<PairConfig> {
        match (pair.crypto.as_str(), pair.fiat.as_str()) {
            ("BTC", "EUR") => Some(PairConfig::btc_eur()),
            ("ETH", "EUR") => Some(PairConfig::eth_eur()),
            _ => None,
        }
    }
}

/// Full purchase pipeline: directory, catalog, ledger, orchestrator.
struct PurchasePipeline {
    directory: Arc<Directory>,
    ledger: Arc<BalanceLedger>,
    engine: SettlementOrchestrator<FixedRates>,
}

impl PurchasePipeline {
    fn new() -> Self {
        let mut rates = HashMap::new();
        rates.insert(CurrencyPair::new("BTC", "EUR"), Decimal::new(45_000, 0));
        rates.insert(CurrencyPair::new("ETH", "EUR"), Decimal::new(3_000, 0));

        let directory = Arc::new(Directory::default());
        let ledger = Arc::new(BalanceLedger::new());
        let engine = SettlementOrchestrator::new(
            RateResolver::new(FixedRates(rates)),
            LimitGuard::new(TierLimits::default()),
            Arc::clone(&ledger),
            Arc::clone(&directory) as Arc<dyn UserDirectory>,
            Arc::new(Catalog),
            Arc::new(TracingAudit),
            Arc::new(coinsettle_settlement::Outbox::new()),
        );
        Self {
            directory,
            ledger,
            engine,
        }
    }

    /// Register a verified user with a funded EUR account.
    fn funded_user(&self, eur: Decimal) -> (UserId, AccountId) {
        let user = UserId::new();
        self.directory
            .register(user, VerificationTier::Verified, true);
        let account = self.engine.open_custodial_account(user, "EUR").unwrap();
        if !eur.is_zero() {
            self.ledger.credit(account.id, eur, None, "deposit").unwrap();
        }
        (user, account.id)
    }

    fn btc_purchase(user: UserId, amount: Decimal, method: PaymentMethod) -> PurchaseRequest {
        PurchaseRequest {
            user_id: user,
            crypto_code: "BTC".to_string(),
            fiat_code: "EUR".to_string(),
            crypto_amount: amount,
            wallet_address: "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4".to_string(),
            blockchain: Some("bitcoin".to_string()),
            payment_method: method,
            idempotency_key: None,
        }
    }
}

// =============================================================================
// Test: Instant settlement happy path
// =============================================================================
#[test]
fn e2e_instant_settlement() {
    let pipeline = PurchasePipeline::new();
    let (user, account_id) = pipeline.funded_user(Decimal::new(1_000, 0));

    // 0.01 BTC @ 45,000 with 1.5% fee: 450.00 + 6.75 = 456.75
    let req = PurchasePipeline::btc_purchase(user, Decimal::new(1, 2), PaymentMethod::Balance);
    let order = pipeline.engine.create_order(&req).unwrap();

    assert_eq!(order.status, OrderStatus::PaymentReceived);
    assert_eq!(order.fiat_subtotal, Decimal::new(45_000, 2));
    assert_eq!(order.fee_amount, Decimal::new(675, 2));
    assert_eq!(order.fiat_total, Decimal::new(45_675, 2));
    assert_eq!(order.rate_applied, Decimal::new(45_000, 0));
    assert!(order.payment_reference.as_str().starts_with("CS-"));

    // Balance debited exactly once, by the total.
    let account = pipeline.ledger.account(account_id).unwrap();
    assert_eq!(account.balance, Decimal::new(54_325, 2));
    let txs = pipeline.ledger.transactions(account_id).unwrap();
    assert_eq!(txs.len(), 2); // deposit + settlement debit
    assert_eq!(txs[1].amount, Decimal::new(-45_675, 2));
    assert_eq!(txs[1].order_id, Some(order.id));
    pipeline.ledger.verify_account(account_id).unwrap();

    // Both lifecycle events were enqueued for dispatch.
    let events = pipeline.engine.outbox().drain();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event.kind(), "ORDER_CREATED");
    assert_eq!(events[1].event.kind(), "PAYMENT_COMPLETED");
    assert_eq!(events[1].event.order_id(), order.id);
}

// =============================================================================
// Test: Insufficient balance rolls the order back completely
// =============================================================================
#[test]
fn e2e_insufficient_balance_rollback() {
    let pipeline = PurchasePipeline::new();
    let (user, account_id) = pipeline.funded_user(Decimal::new(100, 0));

    let req = PurchasePipeline::btc_purchase(user, Decimal::new(1, 2), PaymentMethod::Balance);
    let err = pipeline.engine.create_order(&req).unwrap_err();

    assert!(matches!(
        err,
        CoinsettleError::InsufficientBalance { required, available }
            if required == Decimal::new(45_675, 2) && available == Decimal::new(100, 0)
    ));

    // Outcome equals "never created": no order, no debit, no events.
    assert!(pipeline.engine.list_orders(user, None, 0, 0).is_empty());
    assert_eq!(
        pipeline.ledger.account(account_id).unwrap().balance,
        Decimal::new(100, 0)
    );
    assert_eq!(pipeline.ledger.transactions(account_id).unwrap().len(), 1);
    assert_eq!(pipeline.engine.outbox().pending(), 0);
}

// =============================================================================
// Test: Rolling-window tier cap
// =============================================================================
#[test]
fn e2e_tier_cap_enforced() {
    let pipeline = PurchasePipeline::new();
    let (user, _) = pipeline.funded_user(Decimal::new(10_000, 0));

    // Park a large order: 0.105 BTC -> 4,725.00 + 70.88 = 4,795.88 EUR used.
    let big = PurchasePipeline::btc_purchase(
        user,
        Decimal::new(105, 3),
        PaymentMethod::BankTransfer,
    );
    pipeline.engine.create_order(&big).unwrap();

    // 456.75 more would cross the 5,000 verified cap.
    let req = PurchasePipeline::btc_purchase(user, Decimal::new(1, 2), PaymentMethod::Balance);
    let err = pipeline.engine.create_order(&req).unwrap_err();

    match err {
        CoinsettleError::LimitExceeded {
            used,
            limit,
            remaining,
        } => {
            assert_eq!(used, Decimal::new(479_588, 2));
            assert_eq!(limit, Decimal::new(5_000, 0));
            assert_eq!(remaining, limit - used);
        }
        other => panic!("expected LimitExceeded, got {other}"),
    }
    assert_eq!(pipeline.engine.list_orders(user, None, 0, 0).len(), 1);
}

// =============================================================================
// Test: Bank-transfer path parks, then reconciles on matching transfer
// =============================================================================
#[test]
fn e2e_bank_transfer_deferred_then_reconciled() {
    let pipeline = PurchasePipeline::new();
    let (user, account_id) = pipeline.funded_user(Decimal::new(1_000, 0));

    let req =
        PurchasePipeline::btc_purchase(user, Decimal::new(1, 2), PaymentMethod::BankTransfer);
    let order = pipeline.engine.create_order(&req).unwrap();

    // Parked: no debit, no pay-in record yet.
    assert_eq!(order.status, OrderStatus::PaymentPending);
    assert_eq!(
        pipeline.ledger.account(account_id).unwrap().balance,
        Decimal::new(1_000, 0)
    );

    // External matching reports the transfer, exact amount.
    let payin = pipeline
        .engine
        .confirm_bank_transfer(order.id, order.fiat_total, "A. Customer", order.payment_reference.as_str())
        .unwrap();
    assert_eq!(payin.status, PayInStatus::Reconciled);
    assert!(matches!(payin.source, PayInSource::BankTransfer { .. }));

    let settled = pipeline.engine.order(order.id).unwrap();
    assert_eq!(settled.status, OrderStatus::PaymentReceived);
    // Custodial balance untouched: funds arrived externally.
    assert_eq!(
        pipeline.ledger.account(account_id).unwrap().balance,
        Decimal::new(1_000, 0)
    );
}

// =============================================================================
// Test: Mismatching transfer amount is held for review
// =============================================================================
#[test]
fn e2e_bank_transfer_amount_mismatch() {
    let pipeline = PurchasePipeline::new();
    let (user, _) = pipeline.funded_user(Decimal::ZERO);

    let req =
        PurchasePipeline::btc_purchase(user, Decimal::new(1, 2), PaymentMethod::BankTransfer);
    let order = pipeline.engine.create_order(&req).unwrap();

    let payin = pipeline
        .engine
        .confirm_bank_transfer(
            order.id,
            Decimal::new(400, 0), // short of 456.75
            "A. Customer",
            order.payment_reference.as_str(),
        )
        .unwrap();
    assert_eq!(payin.status, PayInStatus::Mismatch);
    // Order still awaiting funds.
    assert_eq!(
        pipeline.engine.order(order.id).unwrap().status,
        OrderStatus::PaymentPending
    );
}

// =============================================================================
// Test: Administrator override takes precedence over the market rate
// =============================================================================
#[test]
fn e2e_rate_override_precedence() {
    let pipeline = PurchasePipeline::new();
    let (user, _) = pipeline.funded_user(Decimal::new(1_000, 0));

    let pair = CurrencyPair::new("BTC", "EUR");
    pipeline
        .engine
        .rates()
        .overrides()
        .set(pair.clone(), Decimal::new(40_000, 0));

    let req = PurchasePipeline::btc_purchase(user, Decimal::new(1, 2), PaymentMethod::Balance);
    let order = pipeline.engine.create_order(&req).unwrap();
    assert_eq!(order.rate_applied, Decimal::new(40_000, 0));
    // 400.00 + 6.00 = 406.00
    assert_eq!(order.fiat_total, Decimal::new(406, 0));

    // Deactivated override falls back to the market rate.
    pipeline.engine.rates().overrides().deactivate(&pair);
    let next = pipeline.engine.create_order(&req).unwrap();
    assert_eq!(next.rate_applied, Decimal::new(45_000, 0));
}

// =============================================================================
// Test: Idempotent replay never double-settles
// =============================================================================
#[test]
fn e2e_idempotent_replay() {
    let pipeline = PurchasePipeline::new();
    let (user, account_id) = pipeline.funded_user(Decimal::new(1_000, 0));

    let mut req =
        PurchasePipeline::btc_purchase(user, Decimal::new(1, 2), PaymentMethod::Balance);
    req.idempotency_key = Some(IdempotencyKey::new("client-retry-7f3a"));

    let first = pipeline.engine.create_order(&req).unwrap();
    let replay = pipeline.engine.create_order(&req).unwrap();

    assert_eq!(first.id, replay.id);
    assert_eq!(pipeline.engine.list_orders(user, None, 0, 0).len(), 1);
    assert_eq!(
        pipeline.ledger.account(account_id).unwrap().balance,
        Decimal::new(54_325, 2)
    );
}

// =============================================================================
// Test: Two simultaneous requests under one key settle exactly once
// =============================================================================
#[test]
fn e2e_concurrent_replay_single_settlement() {
    // The timeout-retry case: the client fires the identical request twice
    // at once. Whatever the interleaving, the key funds one order exactly
    // once; the loser gets the winner's order or a retryable in-flight
    // error, never a second settlement.
    for round in 0..50 {
        let pipeline = PurchasePipeline::new();
        let (user, account_id) = pipeline.funded_user(Decimal::new(1_000, 0));
        let engine = Arc::new(pipeline.engine);
        let barrier = Arc::new(Barrier::new(2));

        let mut handles = Vec::new();
        for _ in 0..2 {
            let engine = Arc::clone(&engine);
            let barrier = Arc::clone(&barrier);
            handles.push(thread::spawn(move || {
                let mut req = PurchasePipeline::btc_purchase(
                    user,
                    Decimal::new(1, 2),
                    PaymentMethod::Balance,
                );
                req.idempotency_key = Some(IdempotencyKey::new("timeout-retry-11d4"));
                barrier.wait();
                engine.create_order(&req)
            }));
        }
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let orders = engine.list_orders(user, None, 0, 0);
        assert_eq!(orders.len(), 1, "round {round}: one order per key");
        assert_eq!(
            pipeline.ledger.account(account_id).unwrap().balance,
            Decimal::new(54_325, 2),
            "round {round}: balance debited exactly once"
        );
        for result in results {
            match result {
                Ok(order) => assert_eq!(order.id, orders[0].id),
                Err(err) => assert!(
                    matches!(err, CoinsettleError::RequestInFlight(_)),
                    "round {round}: unexpected error {err}"
                ),
            }
        }
        pipeline.ledger.verify_account(account_id).unwrap();
    }
}

// =============================================================================
// Test: Suspended account blocks settlement but still accepts credits
// =============================================================================
#[test]
fn e2e_suspended_account() {
    let pipeline = PurchasePipeline::new();
    let (user, account_id) = pipeline.funded_user(Decimal::new(1_000, 0));
    pipeline.ledger.suspend(account_id).unwrap();

    let req = PurchasePipeline::btc_purchase(user, Decimal::new(1, 2), PaymentMethod::Balance);
    let err = pipeline.engine.create_order(&req).unwrap_err();
    assert!(matches!(err, CoinsettleError::AccountSuspended));
    assert!(pipeline.engine.list_orders(user, None, 0, 0).is_empty());

    // Incoming funds are still accepted while suspended.
    pipeline
        .ledger
        .credit(account_id, Decimal::new(50, 0), None, "refund")
        .unwrap();

    pipeline.ledger.reactivate(account_id).unwrap();
    assert!(pipeline.engine.create_order(&req).is_ok());
}

// =============================================================================
// Test: Unverified users are capped at zero
// =============================================================================
#[test]
fn e2e_unverified_user_blocked() {
    let pipeline = PurchasePipeline::new();
    let user = UserId::new();
    pipeline
        .directory
        .register(user, VerificationTier::Unverified, true);

    let req =
        PurchasePipeline::btc_purchase(user, Decimal::new(1, 2), PaymentMethod::BankTransfer);
    let err = pipeline.engine.create_order(&req).unwrap_err();
    assert!(matches!(err, CoinsettleError::LimitExceeded { .. }));
}

// =============================================================================
// Test: Concurrent settlement against one account debits at most the balance
// =============================================================================
#[test]
fn e2e_concurrent_settlement_single_account() {
    let pipeline = PurchasePipeline::new();
    // Covers exactly one 456.75 settlement.
    let (user, account_id) = pipeline.funded_user(Decimal::new(500, 0));

    let engine = Arc::new(pipeline.engine);
    let mut handles = Vec::new();
    for _ in 0..2 {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            let req =
                PurchasePipeline::btc_purchase(user, Decimal::new(1, 2), PaymentMethod::Balance);
            engine.create_order(&req).is_ok()
        }));
    }
    let outcomes: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(
        outcomes.iter().filter(|ok| **ok).count(),
        1,
        "exactly one of the two concurrent settlements must succeed"
    );
    assert_eq!(engine.list_orders(user, None, 0, 0).len(), 1);
    assert_eq!(
        pipeline.ledger.account(account_id).unwrap().balance,
        Decimal::new(4_325, 2)
    );
    pipeline.ledger.verify_account(account_id).unwrap();
}
