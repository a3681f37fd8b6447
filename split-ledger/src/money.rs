//! Ledger precision
//!
//! Amounts are exact decimals. The ledger fixes how many fractional digits a
//! settled amount may carry and below which magnitude a balance counts as zero.

use crate::{Error, Result};
use rust_decimal::prelude::RoundingStrategy;
use rust_decimal::Decimal;

/// Largest supported number of fractional digits
pub const MAX_FRACTIONAL_DIGITS: u32 = 18;

/// Default fractional digits (wallet-token friendly)
pub const DEFAULT_FRACTIONAL_DIGITS: u32 = 6;

/// Largest accepted epsilon: one whole currency unit
pub const MAX_EPSILON: Decimal = Decimal::ONE;

/// Default epsilon: 1e-6 of the currency unit
pub const DEFAULT_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 6);

/// Rounding and tolerance rules shared by every computation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Precision {
    fractional_digits: u32,
    epsilon: Decimal,
}

impl Precision {
    /// Create precision rules, rejecting nonsensical values
    pub fn new(fractional_digits: u32, epsilon: Decimal) -> Result<Self> {
        if fractional_digits > MAX_FRACTIONAL_DIGITS {
            return Err(Error::Config(format!(
                "fractional_digits {} exceeds maximum {}",
                fractional_digits, MAX_FRACTIONAL_DIGITS
            )));
        }

        if epsilon <= Decimal::ZERO {
            return Err(Error::Config(format!(
                "epsilon must be positive, got {}",
                epsilon
            )));
        }

        if epsilon > MAX_EPSILON {
            return Err(Error::Config(format!(
                "epsilon {} exceeds maximum {}",
                epsilon, MAX_EPSILON
            )));
        }

        Ok(Self {
            fractional_digits,
            epsilon,
        })
    }

    /// Number of fractional digits settled amounts carry
    pub fn fractional_digits(&self) -> u32 {
        self.fractional_digits
    }

    /// Magnitude below which a balance is treated as exactly zero
    pub fn epsilon(&self) -> Decimal {
        self.epsilon
    }

    /// Smallest representable ledger unit (10^-digits)
    pub fn unit(&self) -> Decimal {
        Decimal::new(1, self.fractional_digits)
    }

    /// Round to ledger precision (half away from zero)
    pub fn round(&self, amount: Decimal) -> Decimal {
        amount.round_dp_with_strategy(
            self.fractional_digits,
            RoundingStrategy::MidpointAwayFromZero,
        )
    }

    /// Whether the amount is below epsilon in magnitude
    pub fn is_negligible(&self, amount: Decimal) -> bool {
        amount.abs() < self.epsilon
    }

    /// Tolerance for a sum over `terms` rounded or epsilon-filtered amounts.
    ///
    /// Each term may drift by up to one unit or one epsilon, whichever is larger.
    /// Saturates at `Decimal::MAX`.
    pub fn drift_tolerance(&self, terms: usize) -> Decimal {
        self.unit()
            .max(self.epsilon)
            .checked_mul(Decimal::from(terms.max(1)))
            .unwrap_or(Decimal::MAX)
    }
}

impl Default for Precision {
    fn default() -> Self {
        Self {
            fractional_digits: DEFAULT_FRACTIONAL_DIGITS,
            epsilon: DEFAULT_EPSILON,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_precision() {
        let precision = Precision::default();
        assert_eq!(precision.fractional_digits(), 6);
        assert_eq!(precision.epsilon(), dec!(0.000001));
        assert_eq!(precision.unit(), dec!(0.000001));
    }

    #[test]
    fn test_rejects_non_positive_epsilon() {
        assert!(Precision::new(2, Decimal::ZERO).is_err());
        assert!(Precision::new(2, dec!(-0.01)).is_err());
    }

    #[test]
    fn test_rejects_epsilon_above_one_unit() {
        assert!(Precision::new(6, dec!(1)).is_ok());
        assert!(Precision::new(6, dec!(1.000001)).is_err());
        assert!(Precision::new(6, Decimal::from(1_000_000_000_u64)).is_err());
    }

    #[test]
    fn test_drift_tolerance_with_huge_term_count() {
        let precision = Precision::new(0, dec!(1)).unwrap();
        assert_eq!(precision.drift_tolerance(usize::MAX), Decimal::from(usize::MAX));
        assert_eq!(precision.drift_tolerance(2), dec!(2));
    }

    #[test]
    fn test_rejects_excessive_digits() {
        assert!(Precision::new(19, dec!(0.000001)).is_err());
    }

    #[test]
    fn test_rounding_half_away_from_zero() {
        let precision = Precision::new(2, dec!(0.000001)).unwrap();
        assert_eq!(precision.round(dec!(1.005)), dec!(1.01));
        assert_eq!(precision.round(dec!(-1.005)), dec!(-1.01));
    }

    #[test]
    fn test_negligible_below_epsilon() {
        let precision = Precision::default();
        assert!(precision.is_negligible(dec!(0.0000001)));
        assert!(precision.is_negligible(dec!(-0.0000009)));
        assert!(!precision.is_negligible(dec!(0.000001)));
    }

    #[test]
    fn test_drift_tolerance_scales_with_terms() {
        let precision = Precision::new(2, dec!(0.000001)).unwrap();
        assert_eq!(precision.drift_tolerance(0), dec!(0.01));
        assert_eq!(precision.drift_tolerance(3), dec!(0.03));
    }
}
