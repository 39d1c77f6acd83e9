//! Configuration types: trading pairs, verification tiers, spending limits.

use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::constants;

/// Per-pair trading configuration from the (out-of-scope) pair catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairConfig {
    /// Crypto asset (e.g., "BTC").
    pub crypto: String,
    /// Fiat currency (e.g., "EUR").
    pub fiat: String,
    /// Minimum crypto amount per trade.
    pub min_crypto_amount: Decimal,
    /// Maximum crypto amount per trade.
    pub max_crypto_amount: Decimal,
    /// Fee as a fraction of the subtotal (0.015 = 1.5%).
    pub fee_fraction: Decimal,
    /// Disabled pairs reject new orders.
    pub active: bool,
}

impl PairConfig {
    /// Default BTC/EUR pair config.
    #[must_use]
    pub fn btc_eur() -> Self {
        Self {
            crypto: "BTC".to_string(),
            fiat: "EUR".to_string(),
            min_crypto_amount: Decimal::new(1, 4),  // 0.0001 BTC
            max_crypto_amount: Decimal::new(5, 0),  // 5 BTC
            fee_fraction: Decimal::new(15, 3),      // 1.5%
            active: true,
        }
    }

    /// Default ETH/EUR pair config.
    #[must_use]
    pub fn eth_eur() -> Self {
        Self {
            crypto: "ETH".to_string(),
            fiat: "EUR".to_string(),
            min_crypto_amount: Decimal::new(1, 3),  // 0.001 ETH
            max_crypto_amount: Decimal::new(100, 0),
            fee_fraction: Decimal::new(15, 3),
            active: true,
        }
    }

    /// Returns the pair symbol (e.g., "BTC/EUR").
    #[must_use]
    pub fn symbol(&self) -> String {
        format!("{}/{}", self.crypto, self.fiat)
    }
}

/// KYC verification tier, read from the user directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum VerificationTier {
    Unverified,
    /// Identity document verified.
    Verified,
    /// Identity plus proof of residence / source of funds.
    Enhanced,
}

impl std::fmt::Display for VerificationTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unverified => write!(f, "UNVERIFIED"),
            Self::Verified => write!(f, "VERIFIED"),
            Self::Enhanced => write!(f, "ENHANCED"),
        }
    }
}

/// Tier-derived rolling-window spending caps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierLimits {
    /// Fiat cap for unverified users (typically zero).
    pub unverified_cap: Decimal,
    /// Fiat cap for identity-verified users.
    pub verified_cap: Decimal,
    /// Fiat cap for enhanced-verification users.
    pub enhanced_cap: Decimal,
    /// Trailing window length in hours.
    pub window_hours: i64,
}

impl TierLimits {
    /// The fiat cap for a given tier.
    #[must_use]
    pub fn cap_for(&self, tier: VerificationTier) -> Decimal {
        match tier {
            VerificationTier::Unverified => self.unverified_cap,
            VerificationTier::Verified => self.verified_cap,
            VerificationTier::Enhanced => self.enhanced_cap,
        }
    }

    /// The trailing window as a duration.
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::hours(self.window_hours)
    }
}

impl Default for TierLimits {
    fn default() -> Self {
        Self {
            unverified_cap: Decimal::ZERO,
            verified_cap: Decimal::new(5_000, 0),
            enhanced_cap: Decimal::new(50_000, 0),
            window_hours: constants::DEFAULT_LIMIT_WINDOW_HOURS,
        }
    }
}
