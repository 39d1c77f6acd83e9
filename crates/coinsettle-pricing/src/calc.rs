//! Order pricing calculator — pure, deterministic, zero side effects.
//!
//! `subtotal = crypto_amount × rate`, `fee = subtotal × fee_fraction`,
//! both rounded half-up at the fiat display precision, and
//! `total = subtotal + fee` exactly (sum of the rounded parts, so the
//! identity holds for every valid input). The crypto amount itself is
//! preserved at full precision. The calculator never rejects input —
//! validation is the Limit Guard's job.

use coinsettle_types::currency::round_money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The money figures frozen into an order at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub subtotal: Decimal,
    pub fee: Decimal,
    pub total: Decimal,
    /// The rate the quote was computed from, echoed for the snapshot.
    pub rate: Decimal,
    pub fee_fraction: Decimal,
}

/// Price a purchase: crypto amount × rate × fee fraction.
#[must_use]
pub fn price(
    crypto_amount: Decimal,
    rate: Decimal,
    fee_fraction: Decimal,
    fiat_precision: u32,
) -> Quote {
    let subtotal = round_money(crypto_amount * rate, fiat_precision);
    let fee = round_money(subtotal * fee_fraction, fiat_precision);
    Quote {
        subtotal,
        fee,
        total: subtotal + fee,
        rate,
        fee_fraction,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_scenario() {
        // 0.01 BTC @ 45,000 EUR with 1.5% fee
        let quote = price(
            Decimal::new(1, 2),
            Decimal::new(45_000, 0),
            Decimal::new(15, 3),
            2,
        );
        assert_eq!(quote.subtotal, Decimal::new(45_000, 2)); // 450.00
        assert_eq!(quote.fee, Decimal::new(675, 2));         // 6.75
        assert_eq!(quote.total, Decimal::new(45_675, 2));    // 456.75
    }

    #[test]
    fn determinism() {
        let a = price(Decimal::new(37, 3), Decimal::new(45_123, 0), Decimal::new(2, 2), 2);
        let b = price(Decimal::new(37, 3), Decimal::new(45_123, 0), Decimal::new(2, 2), 2);
        assert_eq!(a, b);
    }

    #[test]
    fn total_is_exactly_subtotal_plus_fee() {
        // Awkward inputs that force rounding in both subtotal and fee.
        let cases = [
            (Decimal::new(333, 5), Decimal::new(41_987, 0), Decimal::new(17, 3)),
            (Decimal::new(1, 8), Decimal::new(99_999, 0), Decimal::new(25, 3)),
            (Decimal::new(123_456, 8), Decimal::new(3_333, 0), Decimal::new(1, 3)),
        ];
        for (amount, rate, fee) in cases {
            let quote = price(amount, rate, fee, 2);
            assert_eq!(quote.total, quote.subtotal + quote.fee);
            assert_eq!(quote.subtotal.scale(), 2);
            assert_eq!(quote.fee.scale(), 2);
        }
    }

    #[test]
    fn rounding_is_half_up() {
        // 0.001 × 45005 = 45.005 → 45.01 (half-up, not banker's 45.00)
        let quote = price(Decimal::new(1, 3), Decimal::new(45_005, 0), Decimal::ZERO, 2);
        assert_eq!(quote.subtotal, Decimal::new(4501, 2));
    }

    #[test]
    fn zero_fee() {
        let quote = price(Decimal::new(1, 2), Decimal::new(45_000, 0), Decimal::ZERO, 2);
        assert_eq!(quote.fee, Decimal::ZERO);
        assert_eq!(quote.total, quote.subtotal);
    }

    #[test]
    fn zero_decimal_currency() {
        // JPY-style precision: everything lands on whole units.
        let quote = price(
            Decimal::new(1, 2),
            Decimal::new(6_800_000, 0),
            Decimal::new(15, 3),
            0,
        );
        assert_eq!(quote.subtotal, Decimal::new(68_000, 0));
        assert_eq!(quote.fee, Decimal::new(1_020, 0));
        assert_eq!(quote.total, Decimal::new(69_020, 0));
    }

    #[test]
    fn never_rejects_input() {
        // Zero and oversized amounts still produce a quote; bounds are the
        // Limit Guard's concern.
        let quote = price(Decimal::ZERO, Decimal::new(45_000, 0), Decimal::new(15, 3), 2);
        assert_eq!(quote.total, Decimal::ZERO);
    }
}
