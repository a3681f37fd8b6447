//! Display-name resolution
//!
//! Names label transactions for humans and never affect arithmetic.
//! Caching is an injected capability with an explicit get/put contract and an
//! expiry timestamp per entry; nothing here is global state.

use crate::{types::ParticipantId, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

/// Longest cache lifetime honoured (one year)
pub const MAX_TTL_SECONDS: u64 = 365 * 24 * 60 * 60;

/// Naming collaborator (ENS-style lookups and the like)
#[async_trait]
pub trait NameResolver: Send + Sync {
    /// Human readable name, if the participant has one
    async fn display_name(&self, participant: &ParticipantId) -> Result<Option<String>>;
}

/// Cached lookup result; `name: None` records a negative lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedName {
    /// Resolved name
    pub name: Option<String>,
    /// Entry is invalid from this instant on
    pub expires_at: DateTime<Utc>,
}

/// Name cache contract
pub trait NameCache: Send + Sync {
    /// Unexpired entry for the participant as of `now`
    fn get(&self, participant: &ParticipantId, now: DateTime<Utc>) -> Option<CachedName>;

    /// Store a lookup result until `expires_at`
    fn put(&self, participant: ParticipantId, name: Option<String>, expires_at: DateTime<Utc>);
}

/// In-process name cache
#[derive(Debug, Default)]
pub struct InMemoryNameCache {
    entries: RwLock<HashMap<ParticipantId, CachedName>>,
}

impl InMemoryNameCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }
}

impl NameCache for InMemoryNameCache {
    fn get(&self, participant: &ParticipantId, now: DateTime<Utc>) -> Option<CachedName> {
        self.entries
            .read()
            .get(participant)
            .filter(|entry| entry.expires_at > now)
            .cloned()
    }

    fn put(&self, participant: ParticipantId, name: Option<String>, expires_at: DateTime<Utc>) {
        self.entries
            .write()
            .insert(participant, CachedName { name, expires_at });
    }
}

/// Resolver consulting a cache before the inner resolver
#[derive(Debug)]
pub struct CachedNameResolver<R, C> {
    inner: R,
    cache: C,
    ttl: Duration,
}

impl<R: NameResolver, C: NameCache> CachedNameResolver<R, C> {
    /// Wrap `inner`, caching results for `ttl_seconds`
    pub fn new(inner: R, cache: C, ttl_seconds: u64) -> Self {
        Self {
            inner,
            cache,
            ttl: Duration::seconds(ttl_seconds.min(MAX_TTL_SECONDS) as i64),
        }
    }

    /// The injected cache
    pub fn cache(&self) -> &C {
        &self.cache
    }
}

#[async_trait]
impl<R: NameResolver, C: NameCache> NameResolver for CachedNameResolver<R, C> {
    async fn display_name(&self, participant: &ParticipantId) -> Result<Option<String>> {
        let now = Utc::now();
        if let Some(hit) = self.cache.get(participant, now) {
            return Ok(hit.name);
        }

        let name = self.inner.display_name(participant).await?;
        debug!("Resolved {} -> {:?}", participant, name);

        let expires_at = now.checked_add_signed(self.ttl).unwrap_or(now);
        self.cache.put(participant.clone(), name.clone(), expires_at);

        Ok(name)
    }
}

/// Fixed name table
#[derive(Debug, Clone, Default)]
pub struct StaticNameResolver {
    names: HashMap<ParticipantId, String>,
}

impl StaticNameResolver {
    /// Create an empty table (every lookup misses)
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a name
    pub fn with(mut self, participant: ParticipantId, name: impl Into<String>) -> Self {
        self.names.insert(participant, name.into());
        self
    }
}

#[async_trait]
impl NameResolver for StaticNameResolver {
    async fn display_name(&self, participant: &ParticipantId) -> Result<Option<String>> {
        Ok(self.names.get(participant).cloned())
    }
}
