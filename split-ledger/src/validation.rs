//! Split integrity validation
//!
//! - Owed shares sum to the total (within epsilon)
//! - Members unique by participant
//! - No negative amounts

use crate::{money::Precision, types::Split, Error, Result};
use rust_decimal::Decimal;
use std::collections::HashSet;

/// Validate a split before it enters the datastore
pub fn validate_split(split: &Split, precision: &Precision) -> Result<()> {
    if split.payer.as_str().is_empty() {
        return Err(Error::InvalidSplit(format!("Split {} has no payer", split.id)));
    }

    if split.members.is_empty() {
        return Err(Error::InvalidSplit(format!("Split {} has no members", split.id)));
    }

    if split.total_amount < Decimal::ZERO {
        return Err(Error::InvalidSplit(format!(
            "Split {} has negative total {}",
            split.id, split.total_amount
        )));
    }

    let mut seen = HashSet::with_capacity(split.members.len());
    let mut owed_sum = Decimal::ZERO;

    for member in &split.members {
        if !seen.insert(&member.participant) {
            return Err(Error::InvalidSplit(format!(
                "Split {} lists {} more than once",
                split.id, member.participant
            )));
        }

        if member.owed_amount < Decimal::ZERO {
            return Err(Error::InvalidSplit(format!(
                "Split {} has negative share {} for {}",
                split.id, member.owed_amount, member.participant
            )));
        }

        owed_sum = owed_sum.checked_add(member.owed_amount).ok_or_else(|| {
            Error::InvalidSplit(format!("Split {} shares overflow", split.id))
        })?;
    }

    let mismatch = owed_sum
        .checked_sub(split.total_amount)
        .ok_or_else(|| Error::InvalidSplit(format!("Split {} total overflows", split.id)))?;

    if precision.is_negligible(mismatch) {
        Ok(())
    } else {
        Err(Error::InvalidSplit(format!(
            "Split {} shares sum to {} but total is {}",
            split.id, owed_sum, split.total_amount
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GroupId, ParticipantId, SplitMember};
    use rust_decimal_macros::dec;

    fn split(total: Decimal, shares: &[(&str, Decimal)]) -> Split {
        Split::new(
            GroupId::new("g1"),
            ParticipantId::new("A"),
            total,
            shares
                .iter()
                .map(|(p, amount)| SplitMember::unpaid(ParticipantId::new(*p), *amount))
                .collect(),
        )
    }

    #[test]
    fn test_valid_split() {
        let split = split(dec!(90), &[("A", dec!(30)), ("B", dec!(30)), ("C", dec!(30))]);
        assert!(validate_split(&split, &Precision::default()).is_ok());
    }

    #[test]
    fn test_tolerates_sub_epsilon_mismatch() {
        let split = split(dec!(10), &[("B", dec!(5)), ("C", dec!(4.9999999))]);
        assert!(validate_split(&split, &Precision::default()).is_ok());
    }

    #[test]
    fn test_rejects_amount_mismatch() {
        let split = split(dec!(90), &[("B", dec!(30)), ("C", dec!(30))]);
        let err = validate_split(&split, &Precision::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidSplit(_)));
    }

    #[test]
    fn test_rejects_duplicate_members() {
        let split = split(dec!(20), &[("B", dec!(10)), ("B", dec!(10))]);
        assert!(validate_split(&split, &Precision::default()).is_err());
    }

    #[test]
    fn test_rejects_negative_share() {
        let split = split(dec!(0), &[("B", dec!(10)), ("C", dec!(-10))]);
        assert!(validate_split(&split, &Precision::default()).is_err());
    }

    #[test]
    fn test_rejects_empty_members() {
        let split = split(dec!(0), &[]);
        assert!(validate_split(&split, &Precision::default()).is_err());
    }
}
