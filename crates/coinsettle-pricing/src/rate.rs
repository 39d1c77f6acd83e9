//! Exchange-rate resolution with administrator-override precedence.
//!
//! The resolver consults the override store first; an active override is
//! returned unmodified. Otherwise the live market rate from the injected
//! [`RateSource`] applies. Staleness handling belongs to the rate source —
//! this component only encodes the precedence rule.

use std::collections::HashMap;
use std::sync::RwLock;

use coinsettle_types::{CoinsettleError, CurrencyPair, Result};
use rust_decimal::Decimal;

/// Live market rates, keyed by (crypto, fiat) pair. Injected collaborator.
pub trait RateSource: Send + Sync {
    /// The current market rate (fiat per crypto unit), if known.
    fn market_rate(&self, pair: &CurrencyPair) -> Option<Decimal>;
}

/// One administrator-set rate override.
#[derive(Debug, Clone)]
pub struct RateOverride {
    pub rate: Decimal,
    pub active: bool,
}

/// Administrator rate overrides, keyed by pair.
pub struct OverrideStore {
    overrides: RwLock<HashMap<CurrencyPair, RateOverride>>,
}

impl OverrideStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            overrides: RwLock::new(HashMap::new()),
        }
    }

    /// Set (or replace) an override for a pair.
    pub fn set(&self, pair: CurrencyPair, rate: Decimal) {
        tracing::info!(pair = %pair, rate = %rate, "rate override set");
        self.overrides
            .write()
            .expect("override lock poisoned")
            .insert(pair, RateOverride { rate, active: true });
    }

    /// Deactivate an override without removing it.
    pub fn deactivate(&self, pair: &CurrencyPair) {
        if let Some(ov) = self
            .overrides
            .write()
            .expect("override lock poisoned")
            .get_mut(pair)
        {
            ov.active = false;
            tracing::info!(pair = %pair, "rate override deactivated");
        }
    }

    /// The active override rate for a pair, if one exists.
    #[must_use]
    pub fn active_rate(&self, pair: &CurrencyPair) -> Option<Decimal> {
        self.overrides
            .read()
            .expect("override lock poisoned")
            .get(pair)
            .filter(|ov| ov.active)
            .map(|ov| ov.rate)
    }
}

impl Default for OverrideStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves the rate to apply for an order.
pub struct RateResolver<S: RateSource> {
    overrides: OverrideStore,
    source: S,
}

impl<S: RateSource> RateResolver<S> {
    #[must_use]
    pub fn new(source: S) -> Self {
        Self {
            overrides: OverrideStore::new(),
            source,
        }
    }

    /// Access the override store (admin surface).
    #[must_use]
    pub fn overrides(&self) -> &OverrideStore {
        &self.overrides
    }

    /// Resolve the rate for a pair: active override first, then market rate.
    ///
    /// Non-positive rates are treated as absent at each source, so a junk
    /// override degrades to the market rate rather than an outage.
    ///
    /// # Errors
    /// Returns [`CoinsettleError::RateUnavailable`] if neither source has
    /// a usable rate.
    pub fn resolve(&self, pair: &CurrencyPair) -> Result<Decimal> {
        let rate = self
            .overrides
            .active_rate(pair)
            .filter(|r| r.is_sign_positive() && !r.is_zero())
            .or_else(|| self.source.market_rate(pair))
            .filter(|r| r.is_sign_positive() && !r.is_zero())
            .ok_or_else(|| CoinsettleError::RateUnavailable(pair.clone()))?;
        Ok(rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedRates(HashMap<CurrencyPair, Decimal>);

    impl RateSource for FixedRates {
        fn market_rate(&self, pair: &CurrencyPair) -> Option<Decimal> {
            self.0.get(pair).copied()
        }
    }

    fn btc_eur() -> CurrencyPair {
        CurrencyPair::new("BTC", "EUR")
    }

    fn resolver_with_market(rate: Decimal) -> RateResolver<FixedRates> {
        let mut rates = HashMap::new();
        rates.insert(btc_eur(), rate);
        RateResolver::new(FixedRates(rates))
    }

    #[test]
    fn market_rate_when_no_override() {
        let resolver = resolver_with_market(Decimal::new(45_000, 0));
        assert_eq!(resolver.resolve(&btc_eur()).unwrap(), Decimal::new(45_000, 0));
    }

    #[test]
    fn active_override_wins() {
        let resolver = resolver_with_market(Decimal::new(45_000, 0));
        resolver.overrides().set(btc_eur(), Decimal::new(44_000, 0));
        assert_eq!(resolver.resolve(&btc_eur()).unwrap(), Decimal::new(44_000, 0));
    }

    #[test]
    fn deactivated_override_falls_back_to_market() {
        let resolver = resolver_with_market(Decimal::new(45_000, 0));
        resolver.overrides().set(btc_eur(), Decimal::new(44_000, 0));
        resolver.overrides().deactivate(&btc_eur());
        assert_eq!(resolver.resolve(&btc_eur()).unwrap(), Decimal::new(45_000, 0));
    }

    #[test]
    fn unknown_pair_fails() {
        let resolver = resolver_with_market(Decimal::new(45_000, 0));
        let err = resolver
            .resolve(&CurrencyPair::new("DOGE", "EUR"))
            .unwrap_err();
        assert!(matches!(err, CoinsettleError::RateUnavailable(_)));
    }

    #[test]
    fn zero_rate_is_unavailable() {
        let resolver = resolver_with_market(Decimal::ZERO);
        let err = resolver.resolve(&btc_eur()).unwrap_err();
        assert!(matches!(err, CoinsettleError::RateUnavailable(_)));
    }

    #[test]
    fn negative_market_rate_is_unavailable() {
        let resolver = resolver_with_market(Decimal::new(-1, 0));
        let err = resolver.resolve(&btc_eur()).unwrap_err();
        assert!(matches!(err, CoinsettleError::RateUnavailable(_)));
    }

    #[test]
    fn junk_override_falls_back_to_market() {
        let resolver = resolver_with_market(Decimal::new(45_000, 0));
        resolver.overrides().set(btc_eur(), Decimal::ZERO);
        assert_eq!(resolver.resolve(&btc_eur()).unwrap(), Decimal::new(45_000, 0));

        resolver.overrides().set(btc_eur(), Decimal::new(-500, 0));
        assert_eq!(resolver.resolve(&btc_eur()).unwrap(), Decimal::new(45_000, 0));
    }
}
