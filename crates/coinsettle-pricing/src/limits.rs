//! Limit guard — hard gate for purchase requests.
//!
//! Two independent, composable checks, both of which must pass before an
//! order is persisted:
//!
//! 1. **Per-trade bound**: the crypto amount must lie within the pair's
//!    `[min, max]` interval.
//! 2. **Rolling cap**: cumulative fiat spend over the trailing window plus
//!    the candidate order must not exceed the verification-tier cap.
//!
//! Fail-closed: the guard only evaluates comparisons — tier caps and the
//! window duration are configuration inputs, and the historical spend is
//! aggregated by the caller from its order store.

use chrono::{DateTime, Utc};
use coinsettle_types::{
    BoundSide, CoinsettleError, Order, PairConfig, Result, TierLimits, UserId, VerificationTier,
};
use rust_decimal::Decimal;

/// Validates purchase requests against per-trade bounds and rolling caps.
pub struct LimitGuard {
    limits: TierLimits,
}

impl LimitGuard {
    #[must_use]
    pub fn new(limits: TierLimits) -> Self {
        Self { limits }
    }

    /// The configured tier limits.
    #[must_use]
    pub fn limits(&self) -> &TierLimits {
        &self.limits
    }

    /// Per-trade bound check against the pair configuration.
    ///
    /// # Errors
    /// Returns [`CoinsettleError::OutOfBounds`] naming the violated side.
    pub fn check_bounds(pair: &PairConfig, crypto_amount: Decimal) -> Result<()> {
        if crypto_amount < pair.min_crypto_amount {
            return Err(CoinsettleError::OutOfBounds {
                side: BoundSide::Min,
                amount: crypto_amount,
                bound: pair.min_crypto_amount,
            });
        }
        if crypto_amount > pair.max_crypto_amount {
            return Err(CoinsettleError::OutOfBounds {
                side: BoundSide::Max,
                amount: crypto_amount,
                bound: pair.max_crypto_amount,
            });
        }
        Ok(())
    }

    /// Sum of `fiat_total` over the user's orders created within the
    /// trailing window, excluding cancelled/failed/expired orders.
    #[must_use]
    pub fn window_spend<'a, I>(&self, user_id: UserId, orders: I, now: DateTime<Utc>) -> Decimal
    where
        I: IntoIterator<Item = &'a Order>,
    {
        let window = self.limits.window();
        orders
            .into_iter()
            .filter(|o| o.user_id == user_id)
            .filter(|o| o.status.counts_toward_limit())
            .filter(|o| o.within_window(now, window))
            .map(|o| o.fiat_total)
            .sum()
    }

    /// Rolling-cap check: `used + candidate` must not exceed the tier cap.
    ///
    /// # Errors
    /// Returns [`CoinsettleError::LimitExceeded`] with `used`, `limit`, and
    /// `remaining` exactly as observed — the caller surfaces them verbatim.
    pub fn check_cap(
        &self,
        tier: VerificationTier,
        used: Decimal,
        candidate_total: Decimal,
    ) -> Result<()> {
        let limit = self.limits.cap_for(tier);
        if used + candidate_total > limit {
            return Err(CoinsettleError::LimitExceeded {
                used,
                limit,
                remaining: limit - used,
            });
        }
        Ok(())
    }
}
