//! Debt simplification
//!
//! Turns a balance map into point-to-point transactions that zero every balance.
//!
//! # Algorithm
//!
//! Deterministic greedy matching:
//!
//! 1. Partition participants into creditors (> 0) and debtors (< 0)
//! 2. Repeatedly take the largest creditor and the largest debtor
//!    (ties broken by participant ID, lexicographically smallest first)
//! 3. Transfer `min(credit, |debit|)` from debtor to creditor
//! 4. Whoever reaches zero leaves; the other goes back into its queue
//!
//! Each step zeroes at least one participant, so `n` nonzero balances settle in at
//! most `n - 1` transactions, in `O(n log n)`.
//!
//! This is a heuristic. Finding the minimum number of transactions is NP-hard;
//! replacing the greedy pass with an exact solver changes the complexity bounds
//! and must not be done silently.
//!
//! # Example
//!
//! ```text
//! Balances:
//!   A: +60
//!   B: -30
//!   C: -30
//!
//! Transactions:
//!   B pays A 30
//!   C pays A 30
//! ```

use crate::{
    types::{BalanceMap, SettlementResult},
    Error, Result,
};
use rust_decimal::Decimal;
use split_ledger::{ParticipantId, Precision, Transaction};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Queue entry: largest amount first, then smallest participant ID
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Position {
    amount: Decimal,
    participant: Reverse<ParticipantId>,
}

impl Position {
    fn new(participant: ParticipantId, amount: Decimal) -> Self {
        Self {
            amount,
            participant: Reverse(participant),
        }
    }

    fn id(&self) -> &ParticipantId {
        &self.participant.0
    }
}

/// Settlement solver
#[derive(Debug, Clone, Default)]
pub struct SettlementSolver {
    precision: Precision,
}

impl SettlementSolver {
    /// Create new solver
    pub fn new(precision: Precision) -> Self {
        Self { precision }
    }

    /// Compute transactions settling every balance in the map
    pub fn solve(&self, balances: &BalanceMap) -> Result<SettlementResult> {
        let mut creditors = BinaryHeap::new();
        let mut debtors = BinaryHeap::new();
        let mut total = Decimal::ZERO;
        let mut terms = 0usize;
        let tolerance = self.precision.drift_tolerance(balances.len());

        // Step 1: Partition (sub-epsilon balances are exactly zero)
        for (participant, balance) in balances {
            if self.precision.is_negligible(*balance) {
                continue;
            }

            let amount = self.precision.round(*balance);
            if amount.is_zero() {
                continue;
            }

            total = total.checked_add(amount).ok_or_else(|| {
                Error::PrecisionOverflow("Balance total overflows".to_string())
            })?;
            terms += 1;

            if amount > Decimal::ZERO {
                creditors.push(Position::new(participant.clone(), amount));
            } else {
                debtors.push(Position::new(participant.clone(), amount.abs()));
            }
        }

        // Step 2: Conservation precondition
        if total.abs() > tolerance {
            return Err(self.imbalance_error(&creditors, &debtors, total));
        }

        // Step 3: Greedy matching
        let mut transactions = Vec::with_capacity(terms.saturating_sub(1));
        while !creditors.is_empty() && !debtors.is_empty() {
            let (Some(creditor), Some(debtor)) = (creditors.pop(), debtors.pop()) else {
                break;
            };
            let amount = creditor.amount.min(debtor.amount);

            transactions.push(Transaction::new(
                debtor.id().clone(),
                creditor.id().clone(),
                amount,
            ));

            let credit_left = self.precision.round(creditor.amount - amount);
            let debit_left = self.precision.round(debtor.amount - amount);

            if self.is_open(credit_left) {
                creditors.push(Position::new(creditor.participant.0, credit_left));
            }
            if self.is_open(debit_left) {
                debtors.push(Position::new(debtor.participant.0, debit_left));
            }
        }

        // Step 4: Whatever is left is rounding drift
        let leftover: Decimal = creditors
            .iter()
            .chain(debtors.iter())
            .map(|p| p.amount)
            .sum();
        if leftover > tolerance {
            return Err(Error::DataIntegrity(format!(
                "Unresolved balance of {} after settlement",
                leftover
            )));
        }

        let residual = self.residual(balances, &transactions, tolerance)?;

        tracing::debug!(
            "Settled {} balances with {} transactions",
            terms,
            transactions.len()
        );

        Ok(SettlementResult {
            transactions,
            residual,
            skipped: Vec::new(),
        })
    }

    fn is_open(&self, remaining: Decimal) -> bool {
        remaining > Decimal::ZERO && !self.precision.is_negligible(remaining)
    }

    /// Apply transactions to the input; drift within tolerance is forced to zero
    fn residual(
        &self,
        balances: &BalanceMap,
        transactions: &[Transaction],
        tolerance: Decimal,
    ) -> Result<BalanceMap> {
        let mut residual = balances.clone();

        for tx in transactions {
            if let Some(paid) = residual.get_mut(&tx.from) {
                *paid += tx.amount;
            }
            if let Some(received) = residual.get_mut(&tx.to) {
                *received -= tx.amount;
            }
        }

        for (participant, remaining) in residual.iter_mut() {
            if remaining.abs() > tolerance {
                return Err(Error::DataIntegrity(format!(
                    "Participant {} left with {} after settlement",
                    participant, remaining
                )));
            }
            *remaining = Decimal::ZERO;
        }

        Ok(residual)
    }

    fn imbalance_error(
        &self,
        creditors: &BinaryHeap<Position>,
        debtors: &BinaryHeap<Position>,
        total: Decimal,
    ) -> Error {
        match (creditors.len(), debtors.len()) {
            (1, 0) | (0, 1) => {
                let lone = creditors.peek().or_else(|| debtors.peek());
                let who = lone.map(|p| p.id().to_string()).unwrap_or_default();
                Error::DataIntegrity(format!(
                    "Balance of {} for {} has no counterpart",
                    total, who
                ))
            }
            _ => Error::DataIntegrity(format!(
                "Balances sum to {} instead of zero",
                total
            )),
        }
    }
}
