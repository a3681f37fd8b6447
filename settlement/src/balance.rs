//! Balance calculation
//!
//! Reduces a set of splits to one signed balance per participant.
//!
//! # Algorithm
//!
//! For every active split, each unpaid member other than the payer contributes
//! `-owed` to the member and `+owed` to the payer. Paid shares and the payer's own
//! share contribute nothing. Totals cancel by construction, so the resulting map
//! sums to zero.
//!
//! Balances below epsilon are dropped. Their sum is written off against the largest
//! balances on the opposite side, so the map still sums to exactly zero.
//!
//! ```text
//! A paid 90, shares A:30 B:30 C:30, B and C unpaid
//!
//! Balances:
//!   A: +60 (creditor)
//!   B: -30 (debtor)
//!   C: -30 (debtor)
//! ```

use crate::{
    types::{BalanceMap, BalanceSheet, SkippedSplit},
    Error, Result,
};
use rust_decimal::Decimal;
use split_ledger::{ParticipantId, Precision, Split};
use std::collections::BTreeMap;

/// Balance calculator
#[derive(Debug, Clone, Default)]
pub struct BalanceCalculator {
    precision: Precision,
}

impl BalanceCalculator {
    /// Create new calculator
    pub fn new(precision: Precision) -> Self {
        Self { precision }
    }

    /// Compute balances over any mix of splits (settled splits are ignored)
    pub fn compute(&self, splits: &[Split]) -> Result<BalanceSheet> {
        let mut balances = BalanceMap::new();
        let mut skipped = Vec::new();
        let mut split_count = 0;

        for split in splits.iter().filter(|s| !s.is_settled()) {
            match self.apply_split(&mut balances, split) {
                Ok(()) => split_count += 1,
                Err(Error::PrecisionOverflow(reason)) => {
                    tracing::warn!("Skipping split {}: {}", split.id, reason);
                    skipped.push(SkippedSplit {
                        split_id: split.id,
                        group_id: split.group_id.clone(),
                        reason,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        let total = balances
            .values()
            .try_fold(Decimal::ZERO, |acc, b| acc.checked_add(*b))
            .ok_or_else(|| Error::PrecisionOverflow("Balance total overflows".to_string()))?;

        if !self.precision.is_negligible(total) {
            return Err(Error::DataIntegrity(format!(
                "Balances over {} splits sum to {} instead of zero",
                split_count, total
            )));
        }

        let written_off = self.write_off_dust(&mut balances)?;

        tracing::debug!(
            "Computed {} balances from {} splits ({} skipped, {} written off)",
            balances.len(),
            split_count,
            skipped.len(),
            written_off
        );

        Ok(BalanceSheet {
            balances,
            skipped,
            split_count,
            written_off,
        })
    }

    /// Drop sub-epsilon balances and absorb their sum into the opposite side.
    ///
    /// Dropped debts are forgiven by the largest creditors, dropped credits by the
    /// largest debtors, so the remaining map still sums to exactly zero. Absorption
    /// can leave another balance below epsilon; repeat until none remains.
    fn write_off_dust(&self, balances: &mut BalanceMap) -> Result<Decimal> {
        let overflow = || Error::PrecisionOverflow("Written-off dust overflows".to_string());
        let mut written_off = Decimal::ZERO;

        loop {
            let mut dust = Decimal::ZERO;
            balances.retain(|_, b| {
                if self.precision.is_negligible(*b) {
                    dust += *b;
                    false
                } else {
                    true
                }
            });

            if dust.is_zero() {
                return Ok(written_off);
            }
            written_off = written_off.checked_add(dust.abs()).ok_or_else(overflow)?;

            // Remaining balances sum to -dust; take it off the side holding the excess
            let mut excess = dust.abs();
            let mut absorbers: Vec<(ParticipantId, Decimal)> = balances
                .iter()
                .filter(|(_, b)| b.is_sign_negative() == dust.is_sign_positive())
                .map(|(p, b)| (p.clone(), b.abs()))
                .collect();
            absorbers.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

            for (participant, magnitude) in absorbers {
                if excess.is_zero() {
                    break;
                }
                let taken = magnitude.min(excess);
                excess -= taken;
                if let Some(balance) = balances.get_mut(&participant) {
                    if balance.is_sign_negative() {
                        *balance += taken;
                    } else {
                        *balance -= taken;
                    }
                }
            }

            if !excess.is_zero() {
                return Err(Error::DataIntegrity(format!(
                    "Dust of {} has no counterpart to absorb it",
                    dust
                )));
            }
        }
    }

    /// Apply one split. An overflowing split leaves `balances` untouched.
    fn apply_split(&self, balances: &mut BalanceMap, split: &Split) -> Result<()> {
        let overflow = || {
            Error::PrecisionOverflow(format!(
                "Split {} in group {} exceeds the decimal range",
                split.id, split.group_id
            ))
        };

        let mut deltas: BTreeMap<&ParticipantId, Decimal> = BTreeMap::new();
        for member in split.outstanding_members() {
            let debit = deltas.entry(&member.participant).or_insert(Decimal::ZERO);
            *debit = debit.checked_sub(member.owed_amount).ok_or_else(overflow)?;

            let credit = deltas.entry(&split.payer).or_insert(Decimal::ZERO);
            *credit = credit.checked_add(member.owed_amount).ok_or_else(overflow)?;
        }

        // Stage every update before committing any
        let mut staged = Vec::with_capacity(deltas.len());
        for (participant, delta) in deltas {
            let current = balances.get(participant).copied().unwrap_or(Decimal::ZERO);
            let updated = current.checked_add(delta).ok_or_else(overflow)?;
            staged.push((participant.clone(), updated));
        }

        balances.extend(staged);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use split_ledger::{GroupId, SplitMember, SplitStatus};

    fn p(id: &str) -> ParticipantId {
        ParticipantId::new(id)
    }

    fn split(payer: &str, shares: &[(&str, Decimal, bool)]) -> Split {
        let members: Vec<SplitMember> = shares
            .iter()
            .map(|(who, amount, paid)| SplitMember {
                participant: p(who),
                owed_amount: *amount,
                is_paid: *paid,
            })
            .collect();
        let total = members.iter().map(|m| m.owed_amount).sum();
        Split::new(GroupId::new("g1"), p(payer), total, members)
    }

    #[test]
    fn test_equal_split_three_ways() {
        let calculator = BalanceCalculator::default();
        let splits = vec![split(
            "A",
            &[("A", dec!(30), false), ("B", dec!(30), false), ("C", dec!(30), false)],
        )];

        let sheet = calculator.compute(&splits).unwrap();
        assert_eq!(sheet.balance_of(&p("A")), dec!(60));
        assert_eq!(sheet.balance_of(&p("B")), dec!(-30));
        assert_eq!(sheet.balance_of(&p("C")), dec!(-30));
        assert_eq!(sheet.split_count, 1);
    }

    #[test]
    fn test_paid_members_contribute_nothing() {
        let calculator = BalanceCalculator::default();
        let splits = vec![split("A", &[("B", dec!(30), true), ("C", dec!(30), false)])];

        let sheet = calculator.compute(&splits).unwrap();
        assert_eq!(sheet.balance_of(&p("A")), dec!(30));
        assert!(!sheet.balances.contains_key(&p("B")));
    }

    #[test]
    fn test_settled_split_ignored() {
        let calculator = BalanceCalculator::default();
        let mut settled = split("A", &[("B", dec!(30), false)]);
        settled.status = SplitStatus::Settled;

        let sheet = calculator.compute(&[settled]).unwrap();
        assert!(sheet.balances.is_empty());
        assert_eq!(sheet.split_count, 0);
    }

    #[test]
    fn test_self_share_nets_to_zero() {
        let calculator = BalanceCalculator::default();
        let splits = vec![split("A", &[("A", dec!(50), false)])];

        let sheet = calculator.compute(&splits).unwrap();
        assert!(sheet.balances.is_empty());
    }

    #[test]
    fn test_balances_accumulate_across_splits() {
        let calculator = BalanceCalculator::default();
        let splits = vec![
            split("A", &[("B", dec!(40), false)]),
            split("B", &[("A", dec!(15), false), ("C", dec!(5), false)]),
        ];

        let sheet = calculator.compute(&splits).unwrap();
        assert_eq!(sheet.balance_of(&p("A")), dec!(25));
        assert_eq!(sheet.balance_of(&p("B")), dec!(-20));
        assert_eq!(sheet.balance_of(&p("C")), dec!(-5));
        assert_eq!(sheet.balances.values().sum::<Decimal>(), Decimal::ZERO);
    }

    #[test]
    fn test_sub_epsilon_balance_removed() {
        let calculator = BalanceCalculator::default();
        let splits = vec![
            split("A", &[("B", dec!(10), false), ("C", dec!(0.0000001), false)]),
        ];

        let sheet = calculator.compute(&splits).unwrap();
        assert!(!sheet.balances.contains_key(&p("C")));
        assert_eq!(sheet.balance_of(&p("B")), dec!(-10));
        assert_eq!(sheet.balance_of(&p("A")), dec!(10));
        assert_eq!(sheet.written_off, dec!(0.0000001));
    }

    #[test]
    fn test_many_dust_shares_written_off() {
        let calculator = BalanceCalculator::default();
        let names: Vec<String> = (0..20).map(|i| format!("m{:02}", i)).collect();
        let shares: Vec<(&str, Decimal, bool)> = names
            .iter()
            .map(|n| (n.as_str(), dec!(0.0000009), false))
            .collect();
        let dusty = split("payer", &shares);
        assert!(split_ledger::validation::validate_split(&dusty, &Precision::default()).is_ok());

        let sheet = calculator.compute(&[dusty]).unwrap();
        assert!(sheet.balances.is_empty());
        assert_eq!(sheet.written_off, dec!(0.000018));
    }

    #[test]
    fn test_dust_absorbed_largest_first() {
        let calculator = BalanceCalculator::default();
        let mut shares = vec![("B", dec!(5), false), ("C", dec!(3), false)];
        shares.push(("D", dec!(0.0000009), false));
        let splits = vec![
            split("A", &shares),
            split("E", &[("F", dec!(0.0000008), false), ("G", dec!(0.0000007), false)]),
        ];

        let sheet = calculator.compute(&splits).unwrap();
        let total: Decimal = sheet.balances.values().sum();
        assert_eq!(total, Decimal::ZERO);
        // A is the largest creditor and absorbs all of D, F and G
        assert_eq!(sheet.balance_of(&p("A")), dec!(7.9999985));
        assert_eq!(sheet.balance_of(&p("E")), dec!(0.0000015));
        assert_eq!(sheet.balance_of(&p("B")), dec!(-5));
        assert_eq!(sheet.written_off, dec!(0.0000024));
    }

    #[test]
    fn test_overflowing_split_skipped() {
        let calculator = BalanceCalculator::default();
        let splits = vec![
            split("A", &[("B", Decimal::MAX, false)]),
            split("A", &[("B", Decimal::MAX, false)]),
            split("C", &[("D", dec!(12), false)]),
        ];

        let sheet = calculator.compute(&splits).unwrap();
        assert_eq!(sheet.skipped.len(), 1);
        assert_eq!(sheet.skipped[0].split_id, splits[1].id);
        assert_eq!(sheet.balance_of(&p("A")), Decimal::MAX);
        assert_eq!(sheet.balance_of(&p("C")), dec!(12));
        assert_eq!(sheet.split_count, 2);
    }
}
