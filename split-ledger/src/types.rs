//! Core types for the split ledger
//!
//! All types are designed for:
//! - Plain in-memory records, flattened from whatever schema the datastore uses
//! - Exact arithmetic (Decimal for money)
//! - Case-sensitive identity (callers normalize participant ids before entry)

use crate::money::Precision;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::RoundingStrategy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Participant identifier (wallet address or equivalent)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Create new participant ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Group identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(String);

impl GroupId {
    /// Create new group ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Split identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SplitId(Uuid);

impl SplitId {
    /// Generate a fresh split ID
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SplitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Split lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SplitStatus {
    /// Outstanding shares may remain
    #[default]
    Active,
    /// Closed; ignored by every balance computation
    Settled,
}

/// One member's share of a split
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitMember {
    /// Member
    pub participant: ParticipantId,

    /// Amount this member owes the payer
    pub owed_amount: Decimal,

    /// Whether the share has already been paid outside the ledger
    #[serde(default)]
    pub is_paid: bool,
}

impl SplitMember {
    /// Unpaid member share
    pub fn unpaid(participant: ParticipantId, owed_amount: Decimal) -> Self {
        Self {
            participant,
            owed_amount,
            is_paid: false,
        }
    }
}

/// A single shared expense: one payer, one or more owing members
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    /// Split ID
    pub id: SplitId,

    /// Group the expense belongs to
    pub group_id: GroupId,

    /// Who paid
    pub payer: ParticipantId,

    /// Total expense amount
    pub total_amount: Decimal,

    /// Member shares, in entry order
    pub members: Vec<SplitMember>,

    /// Lifecycle status
    #[serde(default)]
    pub status: SplitStatus,

    /// Free-form description
    #[serde(default)]
    pub description: String,

    /// Creation timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Split {
    /// Create an active split from explicit member shares
    pub fn new(
        group_id: GroupId,
        payer: ParticipantId,
        total_amount: Decimal,
        members: Vec<SplitMember>,
    ) -> Self {
        Self {
            id: SplitId::generate(),
            group_id,
            payer,
            total_amount,
            members,
            status: SplitStatus::Active,
            description: String::new(),
            created_at: Utc::now(),
        }
    }

    /// Divide `total_amount` evenly among `participants` at ledger precision.
    ///
    /// Leftover smallest units go to the earliest participants, one each, so the
    /// shares always sum exactly to the total.
    pub fn even(
        group_id: GroupId,
        payer: ParticipantId,
        total_amount: Decimal,
        participants: &[ParticipantId],
        precision: &Precision,
    ) -> crate::Result<Self> {
        if participants.is_empty() {
            return Err(crate::Error::InvalidSplit(
                "Even split needs at least one participant".to_string(),
            ));
        }

        let total = total_amount.normalize();
        if total.scale() > precision.fractional_digits() {
            return Err(crate::Error::InvalidSplit(format!(
                "Total {} has more than {} fractional digits",
                total_amount,
                precision.fractional_digits()
            )));
        }

        let count = Decimal::from(participants.len());
        let base = (total / count).round_dp_with_strategy(
            precision.fractional_digits(),
            RoundingStrategy::ToZero,
        );
        let allocated = base
            .checked_mul(count)
            .ok_or_else(|| crate::Error::InvalidSplit(format!("Total {} overflows", total)))?;

        let unit = precision.unit();
        let mut leftover = total - allocated;

        let members = participants
            .iter()
            .map(|participant| {
                let mut share = base;
                if leftover >= unit {
                    share += unit;
                    leftover -= unit;
                }
                SplitMember::unpaid(participant.clone(), share)
            })
            .collect();

        Ok(Self::new(group_id, payer, total_amount, members))
    }

    /// Attach a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Check if split is closed
    pub fn is_settled(&self) -> bool {
        matches!(self.status, SplitStatus::Settled)
    }

    /// Members that still owe the payer, excluding the payer's own share
    pub fn outstanding_members(&self) -> impl Iterator<Item = &SplitMember> {
        self.members
            .iter()
            .filter(move |m| !m.is_paid && m.participant != self.payer)
    }

    /// Whether the participant is the payer or a member
    pub fn involves(&self, participant: &ParticipantId) -> bool {
        &self.payer == participant || self.members.iter().any(|m| &m.participant == participant)
    }

    /// Look up a member entry
    pub fn member(&self, participant: &ParticipantId) -> Option<&SplitMember> {
        self.members.iter().find(|m| &m.participant == participant)
    }
}

/// Recommended point-to-point payment from a net debtor to a net creditor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Debtor (pays)
    pub from: ParticipantId,

    /// Creditor (receives)
    pub to: ParticipantId,

    /// Amount, always positive
    pub amount: Decimal,

    /// Human readable label
    pub description: String,
}

impl Transaction {
    /// Create a transaction with the default label
    pub fn new(from: ParticipantId, to: ParticipantId, amount: Decimal) -> Self {
        let description = format!("{} pays {}", from, to);
        Self {
            from,
            to,
            amount,
            description,
        }
    }

    /// Whether the participant sends or receives this payment
    pub fn involves(&self, participant: &ParticipantId) -> bool {
        &self.from == participant || &self.to == participant
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}: {}", self.from, self.to, self.amount)
    }
}

/// Datastore query scope
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// Every split of one group
    Group(GroupId),
    /// Every split, across all groups, that involves this participant
    Participant(ParticipantId),
}
