//! Dues aggregation
//!
//! Builds a user's dues report from their active splits.
//!
//! # Views
//!
//! - **Per group**: each group is solved on its own and the transactions are
//!   filtered to those the user sends or receives
//! - **Global**: every healthy group's splits are pooled *before* solving, which
//!   can cancel debts no per-group view sees
//!
//! ```text
//! Group 1: A +50, B -50   ->  B pays A 50
//! Group 2: B +50, A -50   ->  A pays B 50
//! Pooled:  A 0,   B 0     ->  (nothing)
//! ```
//!
//! The two views are computed and reported independently. Due totals come from raw
//! split membership, not from the solver.
//!
//! # Degradation
//!
//! A group whose settlement fails keeps its membership totals but reports no
//! transactions, carries the error, and is left out of the pool. A group whose totals
//! cannot be summed is zeroed. The rest of the report is still produced.

use crate::{
    balance::BalanceCalculator,
    labels::{DisplayNames, PerspectiveLabeler},
    solver::SettlementSolver,
    types::{DuesReport, GroupDues, SettlementResult},
    Error, Result,
};
use chrono::Utc;
use rust_decimal::Decimal;
use split_ledger::{GroupId, ParticipantId, Precision, Split};
use std::collections::BTreeMap;

/// What a user owes and is owed over a set of splits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct DueTotals {
    owed: Decimal,
    owed_to_user: Decimal,
}

impl DueTotals {
    fn net(&self) -> Decimal {
        self.owed_to_user - self.owed
    }

    fn checked_add(self, other: DueTotals) -> Option<DueTotals> {
        Some(DueTotals {
            owed: self.owed.checked_add(other.owed)?,
            owed_to_user: self.owed_to_user.checked_add(other.owed_to_user)?,
        })
    }
}

/// Dues aggregator
#[derive(Debug, Clone, Default)]
pub struct DuesAggregator {
    calculator: BalanceCalculator,
    solver: SettlementSolver,
}

impl DuesAggregator {
    /// Create new aggregator
    pub fn new(precision: Precision) -> Self {
        Self {
            calculator: BalanceCalculator::new(precision),
            solver: SettlementSolver::new(precision),
        }
    }

    /// Balance calculation followed by settlement over one scope of splits
    pub fn compute_group_settlement(&self, splits: &[Split]) -> Result<SettlementResult> {
        let sheet = self.calculator.compute(splits)?;
        let mut result = self.solver.solve(&sheet.balances)?;
        result.skipped = sheet.skipped;
        Ok(result)
    }

    /// Dues report labelled with raw participant IDs
    pub fn compute_user_dues(
        &self,
        user: &ParticipantId,
        splits_by_group: &BTreeMap<GroupId, Vec<Split>>,
    ) -> DuesReport {
        self.compute_user_dues_with_names(user, splits_by_group, &DisplayNames::new())
    }

    /// Dues report labelled with display names where known
    pub fn compute_user_dues_with_names(
        &self,
        user: &ParticipantId,
        splits_by_group: &BTreeMap<GroupId, Vec<Split>>,
        names: &DisplayNames,
    ) -> DuesReport {
        let mut groups = Vec::with_capacity(splits_by_group.len());
        let mut totals = DueTotals::default();
        let mut pooled: Vec<Split> = Vec::new();

        for (group_id, splits) in splits_by_group {
            let (entry, healthy) = self.group_dues(user, group_id, splits);

            let combined = totals
                .checked_add(DueTotals {
                    owed: entry.amount_owed,
                    owed_to_user: entry.amount_owed_to_user,
                })
                .ok_or_else(|| {
                    Error::PrecisionOverflow(format!(
                        "Dues totals overflow when adding group {}",
                        group_id
                    ))
                });

            match combined {
                Ok(combined) => {
                    totals = combined;
                    if healthy {
                        pooled.extend(splits.iter().filter(|s| !s.is_settled()).cloned());
                    }
                    groups.push(entry);
                }
                Err(e) => {
                    tracing::warn!("Group {} degraded for {}: {}", group_id, user, e);
                    groups.push(GroupDues::errored(group_id.clone(), e.to_string()));
                }
            }
        }

        let (global_transactions, global_error) = if pooled.is_empty() {
            (Vec::new(), None)
        } else {
            match self.compute_group_settlement(&pooled) {
                Ok(result) => (result.involving(user), None),
                Err(e) => {
                    tracing::warn!("Global settlement degraded for {}: {}", user, e);
                    (Vec::new(), Some(e.to_string()))
                }
            }
        };

        let mut report = DuesReport {
            participant: user.clone(),
            total_owed: totals.owed,
            total_owed_to_user: totals.owed_to_user,
            net_balance: totals.net(),
            groups,
            global_transactions,
            global_error,
            generated_at: Utc::now(),
        };

        let labeler = PerspectiveLabeler::new(user, names);
        for tx in report.transactions_mut() {
            labeler.apply(tx);
        }

        tracing::info!(
            "Dues for {}: owed {}, owed to user {}, {} groups ({} degraded), {} global transactions",
            user,
            report.total_owed,
            report.total_owed_to_user,
            report.groups.len(),
            report.errored_groups().count(),
            report.global_transactions.len()
        );

        report
    }

    /// Entry for one group, and whether its settlement succeeded.
    ///
    /// Totals come from membership, so a solver failure only empties the transactions.
    fn group_dues(
        &self,
        user: &ParticipantId,
        group_id: &GroupId,
        splits: &[Split],
    ) -> (GroupDues, bool) {
        let totals = match due_totals(user, splits) {
            Ok(totals) => totals,
            Err(e) => {
                tracing::warn!("Group {} degraded for {}: {}", group_id, user, e);
                return (GroupDues::errored(group_id.clone(), e.to_string()), false);
            }
        };

        let mut entry = GroupDues {
            group_id: group_id.clone(),
            amount_owed: totals.owed,
            amount_owed_to_user: totals.owed_to_user,
            net_amount: totals.net(),
            transactions: Vec::new(),
            skipped_splits: Vec::new(),
            error: None,
        };

        match self.compute_group_settlement(splits) {
            Ok(settlement) => {
                entry.transactions = settlement.involving(user);
                entry.skipped_splits = settlement.skipped;
                (entry, true)
            }
            Err(e) => {
                tracing::warn!("Settlement of group {} failed for {}: {}", group_id, user, e);
                entry.error = Some(e.to_string());
                (entry, false)
            }
        }
    }
}

/// Totals straight from split membership, independent of the solver
fn due_totals(user: &ParticipantId, splits: &[Split]) -> Result<DueTotals> {
    let mut totals = DueTotals::default();
    let overflow = |split: &Split| {
        Error::PrecisionOverflow(format!("Dues for split {} overflow", split.id))
    };

    for split in splits.iter().filter(|s| !s.is_settled()) {
        if &split.payer == user {
            for member in split.outstanding_members() {
                totals.owed_to_user = totals
                    .owed_to_user
                    .checked_add(member.owed_amount)
                    .ok_or_else(|| overflow(split))?;
            }
        } else if let Some(member) = split.member(user).filter(|m| !m.is_paid) {
            totals.owed = totals
                .owed
                .checked_add(member.owed_amount)
                .ok_or_else(|| overflow(split))?;
        }
    }

    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use split_ledger::{SplitMember, SplitStatus};

    fn p(id: &str) -> ParticipantId {
        ParticipantId::new(id)
    }

    fn owes(group: &str, debtor: &str, creditor: &str, amount: Decimal) -> Split {
        Split::new(
            GroupId::new(group),
            p(creditor),
            amount,
            vec![SplitMember::unpaid(p(debtor), amount)],
        )
    }

    fn by_group(splits: Vec<Split>) -> BTreeMap<GroupId, Vec<Split>> {
        let mut grouped: BTreeMap<GroupId, Vec<Split>> = BTreeMap::new();
        for split in splits {
            grouped.entry(split.group_id.clone()).or_default().push(split);
        }
        grouped
    }

    #[test]
    fn test_totals_from_membership() {
        let splits = vec![
            owes("g1", "A", "B", dec!(40)),
            owes("g1", "C", "A", dec!(15)),
            owes("g1", "C", "B", dec!(7)),
        ];

        let totals = due_totals(&p("A"), &splits).unwrap();
        assert_eq!(totals.owed, dec!(40));
        assert_eq!(totals.owed_to_user, dec!(15));
        assert_eq!(totals.net(), dec!(-25));
    }

    #[test]
    fn test_totals_ignore_paid_and_settled() {
        let mut paid = owes("g1", "A", "B", dec!(40));
        paid.members[0].is_paid = true;
        let mut settled = owes("g1", "A", "B", dec!(10));
        settled.status = SplitStatus::Settled;

        let totals = due_totals(&p("A"), &[paid, settled]).unwrap();
        assert_eq!(totals, DueTotals::default());
    }

    #[test]
    fn test_group_transactions_filtered_to_user() {
        let aggregator = DuesAggregator::default();
        let splits = by_group(vec![
            owes("g1", "A", "B", dec!(10)),
            owes("g1", "C", "D", dec!(20)),
        ]);

        let report = aggregator.compute_user_dues(&p("A"), &splits);
        let group = &report.groups[0];

        assert_eq!(group.transactions.len(), 1);
        assert_eq!(group.transactions[0].from, p("A"));
        assert_eq!(group.transactions[0].description, "You pay B");
        assert_eq!(report.total_owed, dec!(10));
        assert!(!report.is_degraded());
    }

    #[test]
    fn test_pooling_cancels_cross_group_debts() {
        let aggregator = DuesAggregator::default();
        let splits = by_group(vec![
            owes("g1", "B", "A", dec!(50)),
            owes("g2", "A", "B", dec!(50)),
        ]);

        let report = aggregator.compute_user_dues(&p("A"), &splits);

        assert_eq!(report.groups.len(), 2);
        assert_eq!(report.groups[0].transactions.len(), 1);
        assert_eq!(report.groups[1].transactions.len(), 1);
        assert!(report.global_transactions.is_empty());
        assert_eq!(report.net_balance, Decimal::ZERO);
    }

    #[test]
    fn test_failing_group_degrades_report() {
        let aggregator = DuesAggregator::default();
        let splits = by_group(vec![
            owes("bad", "A", "B", Decimal::MAX),
            owes("bad", "C", "A", dec!(1)),
            owes("bad", "A", "B", Decimal::MAX),
            owes("good", "D", "A", dec!(25)),
        ]);

        let report = aggregator.compute_user_dues(&p("A"), &splits);

        let bad = report.groups.iter().find(|g| g.group_id.as_str() == "bad").unwrap();
        assert!(bad.is_errored());

        let good = report.groups.iter().find(|g| g.group_id.as_str() == "good").unwrap();
        assert!(!good.is_errored());
        assert_eq!(good.amount_owed_to_user, dec!(25));

        assert_eq!(report.total_owed_to_user, dec!(25));
        assert_eq!(report.global_transactions.len(), 1);
        assert_eq!(report.global_transactions[0].description, "D pays you");
        assert!(report.is_degraded());
    }

    #[test]
    fn test_failed_settlement_keeps_membership_totals() {
        let aggregator = DuesAggregator::default();
        let splits = by_group(vec![
            owes("whales", "y", "a", Decimal::MAX),
            owes("whales", "z", "b", Decimal::MAX),
            owes("whales", "c", "A", dec!(10)),
            owes("good", "A", "D", dec!(4)),
        ]);

        let report = aggregator.compute_user_dues(&p("A"), &splits);

        let whales = report.groups.iter().find(|g| g.group_id.as_str() == "whales").unwrap();
        assert!(whales.is_errored());
        assert!(whales.transactions.is_empty());
        assert_eq!(whales.amount_owed_to_user, dec!(10));

        assert_eq!(report.total_owed_to_user, dec!(10));
        assert_eq!(report.total_owed, dec!(4));
        assert_eq!(report.net_balance, dec!(6));

        // Only the healthy group is pooled
        assert_eq!(report.global_transactions.len(), 1);
        assert_eq!(report.global_transactions[0].description, "You pay D");
        assert!(report.global_error.is_none());
    }

    #[test]
    fn test_dust_split_settles_cleanly() {
        let aggregator = DuesAggregator::default();
        let members = (0..20)
            .map(|i| SplitMember::unpaid(p(&format!("m{:02}", i)), dec!(0.0000009)))
            .collect();
        let dusty = Split::new(GroupId::new("g1"), p("payer"), dec!(0.000018), members);

        let result = aggregator.compute_group_settlement(&[dusty]).unwrap();
        assert!(result.transactions.is_empty());
    }

    #[test]
    fn test_compute_group_settlement_reports_skipped() {
        let aggregator = DuesAggregator::default();
        let splits = vec![
            owes("g1", "A", "B", Decimal::MAX),
            owes("g1", "A", "B", Decimal::MAX),
        ];

        let result = aggregator.compute_group_settlement(&splits).unwrap();
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.transactions.len(), 1);
        assert_eq!(result.transactions[0].amount, Decimal::MAX);
    }
}
