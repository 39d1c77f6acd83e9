//! Custodial balance ledger.
//!
//! The [`BalanceLedger`] is the source of truth for all custodial balances.
//! Every mutation appends exactly one immutable [`LedgerTransaction`] and
//! updates the cached balance inside the same per-account critical section:
//! either both are visible or neither is.
//!
//! Serializability is **per account**: the read-balance-then-write sequence
//! holds the account's mutex for its whole duration, so two concurrent
//! debits can never both observe a stale sufficient balance. Operations on
//! different accounts take no shared lock and run fully in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::Utc;
use coinsettle_types::currency::{fiat_precision, smallest_unit};
use coinsettle_types::{
    AccountId, AccountStatus, CoinsettleError, CustodialAccount, LedgerTransaction, LedgerTxId,
    OrderId, Result, UserId,
};
use rust_decimal::Decimal;

/// An account plus its append-only transaction log, guarded as one unit.
struct AccountCell {
    account: CustodialAccount,
    transactions: Vec<LedgerTransaction>,
}

/// Owns all custodial accounts and serializes mutations per account.
pub struct BalanceLedger {
    accounts: RwLock<HashMap<AccountId, Arc<Mutex<AccountCell>>>>,
    by_user: RwLock<HashMap<(UserId, String), AccountId>>,
}

impl BalanceLedger {
    #[must_use]
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            by_user: RwLock::new(HashMap::new()),
        }
    }

    /// Open a custodial account for a (user, currency) pair.
    ///
    /// # Errors
    /// Returns [`CoinsettleError::AccountAlreadyExists`] if one exists.
    pub fn open_account(&self, user_id: UserId, currency: &str) -> Result<CustodialAccount> {
        let mut by_user = self.by_user.write().expect("ledger index lock poisoned");
        let key = (user_id, currency.to_string());
        if by_user.contains_key(&key) {
            return Err(CoinsettleError::AccountAlreadyExists);
        }

        let account = CustodialAccount::open(user_id, currency);
        let id = account.id;
        by_user.insert(key, id);
        self.accounts
            .write()
            .expect("ledger accounts lock poisoned")
            .insert(
                id,
                Arc::new(Mutex::new(AccountCell {
                    account: account.clone(),
                    transactions: Vec::new(),
                })),
            );
        tracing::info!(account_id = %id, user_id = %user_id, currency, "custodial account opened");
        Ok(account)
    }

    fn cell(&self, account_id: AccountId) -> Result<Arc<Mutex<AccountCell>>> {
        self.accounts
            .read()
            .expect("ledger accounts lock poisoned")
            .get(&account_id)
            .cloned()
            .ok_or(CoinsettleError::AccountNotFound)
    }

    /// The account id for a (user, currency) pair, if provisioned.
    #[must_use]
    pub fn account_id_for(&self, user_id: UserId, currency: &str) -> Option<AccountId> {
        self.by_user
            .read()
            .expect("ledger index lock poisoned")
            .get(&(user_id, currency.to_string()))
            .copied()
    }

    /// Snapshot of an account's current state.
    pub fn account(&self, account_id: AccountId) -> Result<CustodialAccount> {
        let cell = self.cell(account_id)?;
        let guard = cell.lock().expect("account lock poisoned");
        Ok(guard.account.clone())
    }

    /// Atomically debit an account.
    ///
    /// The debit tolerance is one smallest currency unit — it absorbs
    /// floating settlement noise from upstream fee arithmetic, never acts
    /// as a business allowance. A tolerated over-debit clamps the balance
    /// to exactly zero so the non-negative invariant holds.
    ///
    /// # Errors
    /// - [`CoinsettleError::AccountNotFound`] for unknown or failed accounts
    /// - [`CoinsettleError::AccountSuspended`] / [`CoinsettleError::AccountClosed`]
    /// - [`CoinsettleError::InsufficientBalance`] with required/available
    pub fn debit(
        &self,
        account_id: AccountId,
        amount: Decimal,
        order_id: Option<OrderId>,
        memo: &str,
    ) -> Result<LedgerTransaction> {
        Self::require_positive(amount)?;
        let cell = self.cell(account_id)?;
        let mut guard = cell.lock().expect("account lock poisoned");

        match guard.account.status {
            AccountStatus::Active => {}
            AccountStatus::Suspended => return Err(CoinsettleError::AccountSuspended),
            AccountStatus::Closed => return Err(CoinsettleError::AccountClosed),
            AccountStatus::Failed => return Err(CoinsettleError::AccountNotFound),
        }

        let balance = guard.account.balance;
        let tolerance = smallest_unit(fiat_precision(&guard.account.currency));
        if amount > balance + tolerance {
            return Err(CoinsettleError::InsufficientBalance {
                required: amount,
                available: balance,
            });
        }

        // Clamp so a tolerated over-debit lands on exactly zero; the logged
        // delta is the clamped one, keeping balance == sum(tx.amount).
        let new_balance = (balance - amount).max(Decimal::ZERO);
        let tx = Self::append(&mut guard, new_balance - balance, new_balance, order_id, memo);
        tracing::debug!(
            account_id = %account_id,
            amount = %amount,
            balance_after = %new_balance,
            "ledger debit"
        );
        Ok(tx)
    }

    /// Atomically credit an account. No upper bound.
    ///
    /// # Errors
    /// Fails only on CLOSED accounts (or unknown/failed ones).
    pub fn credit(
        &self,
        account_id: AccountId,
        amount: Decimal,
        order_id: Option<OrderId>,
        memo: &str,
    ) -> Result<LedgerTransaction> {
        Self::require_positive(amount)?;
        let cell = self.cell(account_id)?;
        let mut guard = cell.lock().expect("account lock poisoned");

        match guard.account.status {
            AccountStatus::Active | AccountStatus::Suspended => {}
            AccountStatus::Closed => return Err(CoinsettleError::AccountClosed),
            AccountStatus::Failed => return Err(CoinsettleError::AccountNotFound),
        }

        let new_balance = guard.account.balance + amount;
        let tx = Self::append(&mut guard, amount, new_balance, order_id, memo);
        tracing::debug!(
            account_id = %account_id,
            amount = %amount,
            balance_after = %new_balance,
            "ledger credit"
        );
        Ok(tx)
    }

    /// Suspend an account: further debits blocked, reads and credits allowed.
    pub fn suspend(&self, account_id: AccountId) -> Result<()> {
        self.set_status(account_id, AccountStatus::Suspended)
    }

    /// Reactivate a suspended account.
    pub fn reactivate(&self, account_id: AccountId) -> Result<()> {
        self.set_status(account_id, AccountStatus::Active)
    }

    /// Close an account. Terminal — no further mutations of any kind.
    pub fn close(&self, account_id: AccountId) -> Result<()> {
        self.set_status(account_id, AccountStatus::Closed)
    }

    fn set_status(&self, account_id: AccountId, status: AccountStatus) -> Result<()> {
        let cell = self.cell(account_id)?;
        let mut guard = cell.lock().expect("account lock poisoned");
        if guard.account.status == AccountStatus::Closed {
            return Err(CoinsettleError::AccountClosed);
        }
        guard.account.status = status;
        guard.account.updated_at = Utc::now();
        Ok(())
    }

    /// Copy of the account's transaction log, oldest first.
    pub fn transactions(&self, account_id: AccountId) -> Result<Vec<LedgerTransaction>> {
        let cell = self.cell(account_id)?;
        let guard = cell.lock().expect("account lock poisoned");
        Ok(guard.transactions.clone())
    }

    /// Audit: the cached balance must equal the sum of all transaction
    /// amounts for the account.
    ///
    /// # Errors
    /// Returns [`CoinsettleError::LedgerInvariantViolation`] on any drift.
    pub fn verify_account(&self, account_id: AccountId) -> Result<()> {
        let cell = self.cell(account_id)?;
        let guard = cell.lock().expect("account lock poisoned");
        let tx_sum: Decimal = guard.transactions.iter().map(|tx| tx.amount).sum();
        if tx_sum != guard.account.balance {
            return Err(CoinsettleError::LedgerInvariantViolation {
                reason: format!(
                    "account {account_id}: balance {} != transaction sum {tx_sum}",
                    guard.account.balance
                ),
            });
        }
        Ok(())
    }

    fn require_positive(amount: Decimal) -> Result<()> {
        if amount.is_zero() || amount.is_sign_negative() {
            return Err(CoinsettleError::ValidationError {
                field: "amount",
                reason: format!("must be positive, got {amount}"),
            });
        }
        Ok(())
    }

    fn append(
        guard: &mut AccountCell,
        signed_amount: Decimal,
        new_balance: Decimal,
        order_id: Option<OrderId>,
        memo: &str,
    ) -> LedgerTransaction {
        let now = Utc::now();
        let tx = LedgerTransaction {
            id: LedgerTxId::new(),
            account_id: guard.account.id,
            amount: signed_amount,
            balance_after: new_balance,
            order_id,
            memo: memo.to_string(),
            created_at: now,
        };
        guard.account.balance = new_balance;
        guard.account.updated_at = now;
        guard.transactions.push(tx.clone());
        tx
    }
}

impl Default for BalanceLedger {
    fn default() -> Self {
        Self::new()
    }
}
