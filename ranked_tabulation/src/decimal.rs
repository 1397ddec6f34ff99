//! Fixed-scale decimal arithmetic for vote quantities.
//!
//! Every tally, threshold and fractional transfer value flows through the
//! two operations below so that a tabulation is reproducible bit for bit
//! for a given configured scale. Rounding is always toward zero: a
//! transferred vote fraction may be slightly undercounted, never
//! overcounted.

use rust_decimal::{Decimal, RoundingStrategy};

/// The two arithmetic operations of the engine, bound to the scale
/// configured by `decimalPlacesForVoteArithmetic`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteArithmetic {
    scale: u32,
}

impl VoteArithmetic {
    /// Valid scales are 1 to 20; the validator enforces the range before a
    /// tabulation is constructed.
    pub fn new(scale: u32) -> VoteArithmetic {
        debug_assert!((1..=20).contains(&scale));
        VoteArithmetic { scale }
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// `dividend / divisor`, truncated to the configured scale.
    ///
    /// The divisor must be non-zero; the engine only divides by round
    /// totals of elected candidates and by seat counts, both positive.
    pub fn divide(&self, dividend: Decimal, divisor: Decimal) -> Decimal {
        (dividend / divisor).round_dp_with_strategy(self.scale, RoundingStrategy::ToZero)
    }

    /// `multiplier * multiplicand`, truncated to the configured scale.
    pub fn multiply(&self, multiplier: Decimal, multiplicand: Decimal) -> Decimal {
        (multiplier * multiplicand).round_dp_with_strategy(self.scale, RoundingStrategy::ToZero)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn divide_truncates_toward_zero() {
        let arith = VoteArithmetic::new(4);
        assert_eq!(arith.divide(Decimal::from(10), Decimal::from(3)), dec("3.3333"));
        assert_eq!(arith.divide(Decimal::from(10), Decimal::from(2)), dec("5"));
        // 36.6667 / 70 = 0.52381; the trailing 1 is dropped, not rounded up.
        assert_eq!(arith.divide(dec("36.6667"), Decimal::from(70)), dec("0.5238"));
    }

    #[test]
    fn multiply_truncates_toward_zero() {
        let arith = VoteArithmetic::new(4);
        assert_eq!(arith.multiply(Decimal::ONE, dec("0.5238")), dec("0.5238"));
        // 0.5238 * 0.5238 = 0.27436644
        assert_eq!(arith.multiply(dec("0.5238"), dec("0.5238")), dec("0.2743"));
    }

    #[test]
    fn scale_one_is_coarse() {
        let arith = VoteArithmetic::new(1);
        assert_eq!(arith.divide(Decimal::from(100), Decimal::from(3)), dec("33.3"));
    }

    #[test]
    fn repeated_transfers_only_shrink() {
        let arith = VoteArithmetic::new(6);
        let fraction = arith.divide(Decimal::from(1), Decimal::from(7));
        let mut ftv = Decimal::ONE;
        for _ in 0..5 {
            let next = arith.multiply(ftv, fraction);
            assert!(next < ftv);
            ftv = next;
        }
    }
}
