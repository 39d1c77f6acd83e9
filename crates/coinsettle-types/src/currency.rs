//! Monetary rounding helpers.
//!
//! All fiat money in CoinSettle is `rust_decimal::Decimal`; binary floating
//! point never touches a balance or a total. Monetary outputs are rounded
//! **half-up** at the fiat currency's display precision. Crypto amounts are
//! kept at full precision as supplied by the caller.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::constants;

/// Display precision (decimal places) for a fiat currency code.
///
/// Zero-decimal currencies are the exception; everything else uses two.
#[must_use]
pub fn fiat_precision(fiat: &str) -> u32 {
    match fiat {
        "JPY" | "KRW" | "ISK" => 0,
        _ => constants::DEFAULT_FIAT_PRECISION,
    }
}

/// Round a monetary amount half-up at the given precision.
#[must_use]
pub fn round_money(amount: Decimal, precision: u32) -> Decimal {
    amount.round_dp_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero)
}

/// Smallest representable unit at the given precision (e.g., 0.01 for 2 dp).
///
/// This is the ledger's debit tolerance: it absorbs floating settlement
/// noise from upstream fee arithmetic and is never a business allowance.
#[must_use]
pub fn smallest_unit(precision: u32) -> Decimal {
    Decimal::new(1, precision)
}
