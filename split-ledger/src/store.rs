//! Split datastore boundary
//!
//! The engine never talks to persistence directly. It asks a [`SplitStore`] for a
//! snapshot of active splits in some [`Scope`] and computes over that snapshot.
//! Every split for the requested scope is fetched before computation begins.

use crate::{
    money::Precision,
    types::{ParticipantId, Scope, Split, SplitId, SplitStatus},
    validation::validate_split,
    Error, Result,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Datastore collaborator
#[async_trait]
pub trait SplitStore: Send + Sync {
    /// All non-settled splits in scope, as one consistent snapshot
    async fn fetch_active_splits(&self, scope: &Scope) -> Result<Vec<Split>>;
}

/// In-memory datastore
#[derive(Debug, Clone)]
pub struct InMemorySplitStore {
    splits: Arc<RwLock<HashMap<SplitId, Split>>>,
    precision: Precision,
}

impl InMemorySplitStore {
    /// Create an empty store validating with the given precision
    pub fn new(precision: Precision) -> Self {
        Self {
            splits: Arc::new(RwLock::new(HashMap::new())),
            precision,
        }
    }

    /// Validate and store a split, replacing any split with the same ID
    pub async fn insert_split(&self, split: Split) -> Result<SplitId> {
        validate_split(&split, &self.precision)?;

        let id = split.id;
        debug!(
            "Storing split {} in group {} ({} members)",
            id,
            split.group_id,
            split.members.len()
        );
        self.splits.write().await.insert(id, split);

        Ok(id)
    }

    /// Get a split by ID
    pub async fn get_split(&self, id: SplitId) -> Option<Split> {
        self.splits.read().await.get(&id).cloned()
    }

    /// Remove a split
    pub async fn remove_split(&self, id: SplitId) -> Result<Split> {
        self.splits
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| Error::SplitNotFound(id.to_string()))
    }

    /// Record that `participant` paid their share.
    ///
    /// The split is marked settled once every member other than the payer has paid.
    pub async fn record_payment(&self, id: SplitId, participant: &ParticipantId) -> Result<Split> {
        let mut splits = self.splits.write().await;
        let split = splits
            .get_mut(&id)
            .ok_or_else(|| Error::SplitNotFound(id.to_string()))?;

        let member = split
            .members
            .iter_mut()
            .find(|m| &m.participant == participant)
            .ok_or_else(|| Error::MemberNotFound(format!("{} in split {}", participant, id)))?;
        member.is_paid = true;

        if split.outstanding_members().next().is_none() {
            split.status = SplitStatus::Settled;
            info!("Split {} fully paid, marked settled", id);
        }

        Ok(split.clone())
    }

    /// Close a split regardless of outstanding shares
    pub async fn settle_split(&self, id: SplitId) -> Result<()> {
        let mut splits = self.splits.write().await;
        let split = splits
            .get_mut(&id)
            .ok_or_else(|| Error::SplitNotFound(id.to_string()))?;
        split.status = SplitStatus::Settled;
        Ok(())
    }

    /// Number of stored splits, settled included
    pub async fn len(&self) -> usize {
        self.splits.read().await.len()
    }

    /// Whether the store holds no splits
    pub async fn is_empty(&self) -> bool {
        self.splits.read().await.is_empty()
    }
}

impl Default for InMemorySplitStore {
    fn default() -> Self {
        Self::new(Precision::default())
    }
}

#[async_trait]
impl SplitStore for InMemorySplitStore {
    async fn fetch_active_splits(&self, scope: &Scope) -> Result<Vec<Split>> {
        let splits = self.splits.read().await;

        let mut active: Vec<Split> = splits
            .values()
            .filter(|s| !s.is_settled())
            .filter(|s| match scope {
                Scope::Group(group_id) => &s.group_id == group_id,
                Scope::Participant(participant) => s.involves(participant),
            })
            .cloned()
            .collect();

        // Stable order for reproducible reports
        active.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        Ok(active)
    }
}
