//! Main settlement engine
//!
//! Orchestrates snapshot fetching, name resolution and the pure computations.
//! All I/O happens here; balance calculation, settlement and aggregation run
//! over the fetched snapshot only.

use crate::{
    dues::DuesAggregator,
    labels::DisplayNames,
    types::{DuesReport, SettlementResult},
    Result,
};
use split_ledger::{Config, GroupId, NameResolver, ParticipantId, Scope, Split, SplitStore};
use std::collections::{BTreeMap, BTreeSet};

/// Settlement engine
#[derive(Debug)]
pub struct SettlementEngine<S, N> {
    /// Datastore
    store: S,

    /// Naming collaborator
    names: N,

    /// Dues aggregator
    aggregator: DuesAggregator,

    /// Configuration
    config: Config,
}

impl<S: SplitStore, N: NameResolver> SettlementEngine<S, N> {
    /// Create new settlement engine
    pub fn new(config: Config, store: S, names: N) -> Result<Self> {
        let precision = config.precision()?;

        Ok(Self {
            store,
            names,
            aggregator: DuesAggregator::new(precision),
            config,
        })
    }

    /// Settle one group
    pub async fn group_settlement(&self, group_id: &GroupId) -> Result<SettlementResult> {
        let splits = self
            .store
            .fetch_active_splits(&Scope::Group(group_id.clone()))
            .await?;

        tracing::info!("Settling group {} over {} splits", group_id, splits.len());

        let result = self.aggregator.compute_group_settlement(&splits)?;

        match result.total_amount() {
            Ok(total) => tracing::info!(
                "Group {} settled with {} transactions totalling {}",
                group_id,
                result.transactions.len(),
                total
            ),
            Err(e) => tracing::warn!(
                "Group {} settled with {} transactions ({})",
                group_id,
                result.transactions.len(),
                e
            ),
        }

        Ok(result)
    }

    /// Dues report for one user across every group they belong to
    pub async fn user_dues(&self, user: &ParticipantId) -> Result<DuesReport> {
        // Snapshot everything before computing
        let splits = self
            .store
            .fetch_active_splits(&Scope::Participant(user.clone()))
            .await?;

        tracing::info!("Computing dues for {} over {} splits", user, splits.len());

        let splits_by_group = group_by_id(splits);
        let names = self.resolve_names(user, &splits_by_group).await;

        Ok(self
            .aggregator
            .compute_user_dues_with_names(user, &splits_by_group, &names))
    }

    /// Best-effort name lookup; a failed lookup falls back to the raw ID
    async fn resolve_names(
        &self,
        user: &ParticipantId,
        splits_by_group: &BTreeMap<GroupId, Vec<Split>>,
    ) -> DisplayNames {
        let mut names = DisplayNames::new();
        if !self.config.names.enabled {
            return names;
        }

        let counterparties: BTreeSet<&ParticipantId> = splits_by_group
            .values()
            .flatten()
            .flat_map(|s| {
                std::iter::once(&s.payer).chain(s.members.iter().map(|m| &m.participant))
            })
            .filter(|p| *p != user)
            .collect();

        for participant in counterparties {
            match self.names.display_name(participant).await {
                Ok(Some(name)) => {
                    names.insert(participant.clone(), name);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("Name lookup failed for {}: {}", participant, e);
                }
            }
        }

        names
    }
}

fn group_by_id(splits: Vec<Split>) -> BTreeMap<GroupId, Vec<Split>> {
    let mut grouped: BTreeMap<GroupId, Vec<Split>> = BTreeMap::new();
    for split in splits {
        grouped.entry(split.group_id.clone()).or_default().push(split);
    }
    grouped
}
