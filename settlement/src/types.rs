//! Core types for the settlement engine
//!
//! Every value here is ephemeral: recomputed per query from the current split
//! snapshot, never persisted by the engine.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use split_ledger::{GroupId, ParticipantId, SplitId, Transaction};
use std::collections::BTreeMap;

/// Signed balance per participant (positive = creditor, negative = debtor)
pub type BalanceMap = BTreeMap<ParticipantId, Decimal>;

/// Split left out of a computation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedSplit {
    /// Split ID
    pub split_id: SplitId,

    /// Group of the split
    pub group_id: GroupId,

    /// Why it was skipped
    pub reason: String,
}

/// Balance Calculator output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BalanceSheet {
    /// Nonzero balances (sub-epsilon balances removed)
    pub balances: BalanceMap,

    /// Splits rejected for precision overflow
    pub skipped: Vec<SkippedSplit>,

    /// Active splits that contributed
    pub split_count: usize,

    /// Sub-epsilon dust removed from the map and absorbed by counterparties
    #[serde(default)]
    pub written_off: Decimal,
}

impl BalanceSheet {
    /// Balance of one participant (zero if absent)
    pub fn balance_of(&self, participant: &ParticipantId) -> Decimal {
        self.balances.get(participant).copied().unwrap_or(Decimal::ZERO)
    }

    /// Participants owed money
    pub fn creditors(&self) -> impl Iterator<Item = (&ParticipantId, &Decimal)> {
        self.balances.iter().filter(|(_, b)| **b > Decimal::ZERO)
    }

    /// Participants owing money
    pub fn debtors(&self) -> impl Iterator<Item = (&ParticipantId, &Decimal)> {
        self.balances.iter().filter(|(_, b)| **b < Decimal::ZERO)
    }
}

/// Settlement Solver output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementResult {
    /// Transactions, in the order they should be applied
    pub transactions: Vec<Transaction>,

    /// Balances after applying every transaction (all zero on success)
    pub residual: BalanceMap,

    /// Splits excluded from the computation
    #[serde(default)]
    pub skipped: Vec<SkippedSplit>,
}

impl SettlementResult {
    /// Total money moved
    pub fn total_amount(&self) -> Result<Decimal> {
        self.transactions
            .iter()
            .try_fold(Decimal::ZERO, |acc, t| acc.checked_add(t.amount))
            .ok_or_else(|| {
                Error::PrecisionOverflow(format!(
                    "Total of {} transactions exceeds the decimal range",
                    self.transactions.len()
                ))
            })
    }

    /// Transactions sent or received by the participant
    pub fn involving(&self, participant: &ParticipantId) -> Vec<Transaction> {
        self.transactions
            .iter()
            .filter(|t| t.involves(participant))
            .cloned()
            .collect()
    }

    /// Summary statistics
    pub fn stats(&self) -> Result<SettlementStats> {
        Ok(SettlementStats {
            participant_count: self.residual.len(),
            transaction_count: self.transactions.len(),
            total_settled: self.total_amount()?,
            largest_transaction: self
                .transactions
                .iter()
                .map(|t| t.amount)
                .max()
                .unwrap_or(Decimal::ZERO),
        })
    }
}

/// Settlement statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementStats {
    /// Participants in the solved balance map
    pub participant_count: usize,

    /// Number of transactions
    pub transaction_count: usize,

    /// Total money moved
    pub total_settled: Decimal,

    /// Largest single transaction
    pub largest_transaction: Decimal,
}

/// One group's entry in a dues report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDues {
    /// Group ID
    pub group_id: GroupId,

    /// What the user owes in this group
    pub amount_owed: Decimal,

    /// What others owe the user in this group
    pub amount_owed_to_user: Decimal,

    /// `amount_owed_to_user - amount_owed`
    pub net_amount: Decimal,

    /// Group-local recommended transactions involving the user
    pub transactions: Vec<Transaction>,

    /// Splits excluded from this group's computation
    pub skipped_splits: Vec<SkippedSplit>,

    /// Set when this group could not be computed
    pub error: Option<String>,
}

impl GroupDues {
    /// Entry for a group whose computation failed
    pub fn errored(group_id: GroupId, error: impl Into<String>) -> Self {
        Self {
            group_id,
            amount_owed: Decimal::ZERO,
            amount_owed_to_user: Decimal::ZERO,
            net_amount: Decimal::ZERO,
            transactions: Vec::new(),
            skipped_splits: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// Check if the entry is degraded
    pub fn is_errored(&self) -> bool {
        self.error.is_some()
    }
}

/// Per-user dues report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuesReport {
    /// Whose report this is
    pub participant: ParticipantId,

    /// Sum the user owes across healthy groups
    pub total_owed: Decimal,

    /// Sum owed to the user across healthy groups
    pub total_owed_to_user: Decimal,

    /// `total_owed_to_user - total_owed`
    pub net_balance: Decimal,

    /// Per-group entries, ordered by group ID
    pub groups: Vec<GroupDues>,

    /// Transactions from pooling every healthy group before solving
    pub global_transactions: Vec<Transaction>,

    /// Set when the pooled computation failed
    pub global_error: Option<String>,

    /// Generation timestamp
    pub generated_at: DateTime<Utc>,
}

impl DuesReport {
    /// Groups flagged as errored
    pub fn errored_groups(&self) -> impl Iterator<Item = &GroupDues> {
        self.groups.iter().filter(|g| g.is_errored())
    }

    /// Whether any part of the report is degraded
    pub fn is_degraded(&self) -> bool {
        self.global_error.is_some() || self.groups.iter().any(GroupDues::is_errored)
    }

    /// Every transaction in the report, group-local and global
    pub fn transactions_mut(&mut self) -> impl Iterator<Item = &mut Transaction> {
        self.groups
            .iter_mut()
            .flat_map(|g| g.transactions.iter_mut())
            .chain(self.global_transactions.iter_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn p(id: &str) -> ParticipantId {
        ParticipantId::new(id)
    }

    #[test]
    fn test_settlement_stats() {
        let result = SettlementResult {
            transactions: vec![
                Transaction::new(p("B"), p("A"), dec!(30)),
                Transaction::new(p("C"), p("A"), dec!(45.5)),
            ],
            residual: [(p("A"), dec!(0)), (p("B"), dec!(0)), (p("C"), dec!(0))]
                .into_iter()
                .collect(),
            skipped: vec![],
        };

        let stats = result.stats().unwrap();
        assert_eq!(stats.participant_count, 3);
        assert_eq!(stats.transaction_count, 2);
        assert_eq!(stats.total_settled, dec!(75.5));
        assert_eq!(stats.largest_transaction, dec!(45.5));

        assert_eq!(result.involving(&p("C")).len(), 1);
        assert!(result.involving(&p("Z")).is_empty());
    }

    #[test]
    fn test_total_overflow_is_an_error() {
        let result = SettlementResult {
            transactions: vec![
                Transaction::new(p("B"), p("A"), Decimal::MAX),
                Transaction::new(p("D"), p("C"), Decimal::MAX),
            ],
            ..Default::default()
        };

        assert!(matches!(result.total_amount(), Err(Error::PrecisionOverflow(_))));
        assert!(matches!(result.stats(), Err(Error::PrecisionOverflow(_))));
    }

    #[test]
    fn test_balance_sheet_partitions() {
        let sheet = BalanceSheet {
            balances: [(p("A"), dec!(60)), (p("B"), dec!(-30)), (p("C"), dec!(-30))]
                .into_iter()
                .collect(),
            skipped: vec![],
            split_count: 1,
            written_off: Decimal::ZERO,
        };

        assert_eq!(sheet.creditors().count(), 1);
        assert_eq!(sheet.debtors().count(), 2);
        assert_eq!(sheet.balance_of(&p("Z")), Decimal::ZERO);
    }

    #[test]
    fn test_errored_group_is_zeroed() {
        let entry = GroupDues::errored(GroupId::new("g1"), "boom");
        assert!(entry.is_errored());
        assert_eq!(entry.net_amount, Decimal::ZERO);
        assert!(entry.transactions.is_empty());
    }
}
