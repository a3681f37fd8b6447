//! Perspective labels for transactions
//!
//! Rewrites transaction descriptions relative to the user reading the report.
//! Labels never touch amounts or counterparties.

use split_ledger::{ParticipantId, Transaction};
use std::collections::HashMap;

/// Resolved display names
pub type DisplayNames = HashMap<ParticipantId, String>;

/// Describes transactions from one participant's point of view
#[derive(Debug, Clone, Copy)]
pub struct PerspectiveLabeler<'a> {
    viewer: &'a ParticipantId,
    names: &'a DisplayNames,
}

impl<'a> PerspectiveLabeler<'a> {
    /// Create a labeler for `viewer`
    pub fn new(viewer: &'a ParticipantId, names: &'a DisplayNames) -> Self {
        Self { viewer, names }
    }

    /// Display name, falling back to the raw participant ID
    pub fn name_of(&self, participant: &ParticipantId) -> String {
        self.names
            .get(participant)
            .cloned()
            .unwrap_or_else(|| participant.to_string())
    }

    /// Describe one transaction
    pub fn describe(&self, tx: &Transaction) -> String {
        if &tx.from == self.viewer {
            format!("You pay {}", self.name_of(&tx.to))
        } else if &tx.to == self.viewer {
            format!("{} pays you", self.name_of(&tx.from))
        } else {
            format!("{} pays {}", self.name_of(&tx.from), self.name_of(&tx.to))
        }
    }

    /// Rewrite the description in place
    pub fn apply(&self, tx: &mut Transaction) {
        tx.description = self.describe(tx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_describes_relative_to_viewer() {
        let me = ParticipantId::new("0xme");
        let bob = ParticipantId::new("0xbob");
        let carol = ParticipantId::new("0xcarol");

        let mut names = DisplayNames::new();
        names.insert(bob.clone(), "bob.eth".to_string());

        let labeler = PerspectiveLabeler::new(&me, &names);

        let owe = Transaction::new(me.clone(), bob.clone(), dec!(5));
        let owed = Transaction::new(carol.clone(), me.clone(), dec!(5));
        let other = Transaction::new(carol, bob, dec!(5));

        assert_eq!(labeler.describe(&owe), "You pay bob.eth");
        assert_eq!(labeler.describe(&owed), "0xcarol pays you");
        assert_eq!(labeler.describe(&other), "0xcarol pays bob.eth");
    }

    #[test]
    fn test_apply_keeps_amount() {
        let me = ParticipantId::new("me");
        let names = DisplayNames::new();
        let labeler = PerspectiveLabeler::new(&me, &names);

        let mut tx = Transaction::new(ParticipantId::new("x"), me.clone(), dec!(12.5));
        labeler.apply(&mut tx);

        assert_eq!(tx.description, "x pays you");
        assert_eq!(tx.amount, dec!(12.5));
    }
}
