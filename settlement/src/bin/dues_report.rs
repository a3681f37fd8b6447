//! Dues report binary
//!
//! Usage: `dues-report <splits.json> <participant>`
//!
//! `DUES_CONFIG` points at a TOML config file; otherwise configuration comes from
//! the environment. `DUES_NAMES` optionally points at a JSON object mapping
//! participant IDs to display names.

use anyhow::{bail, Context};
use settlement::SettlementEngine;
use split_ledger::{
    CachedNameResolver, Config, InMemoryNameCache, InMemorySplitStore, ParticipantId, Split,
    StaticNameResolver,
};
use std::collections::HashMap;
use std::path::Path;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing (stdout carries the report)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        bail!("usage: dues-report <splits.json> <participant>");
    }
    let participant = ParticipantId::new(args[2].as_str());

    // Load configuration
    let config = match std::env::var("DUES_CONFIG") {
        Ok(path) => Config::from_file(&path)
            .with_context(|| format!("failed to load config from {}", path))?,
        Err(_) => Config::from_env()?,
    };
    let precision = config.precision()?;

    // Seed the store
    let store = InMemorySplitStore::new(precision);
    for split in load_splits(Path::new(&args[1]))? {
        let id = split.id;
        store
            .insert_split(split)
            .await
            .with_context(|| format!("rejected split {}", id))?;
    }
    tracing::info!("Loaded {} splits", store.len().await);

    let names = CachedNameResolver::new(
        load_names()?,
        InMemoryNameCache::new(),
        config.names.cache_ttl_seconds,
    );

    let engine = SettlementEngine::new(config, store, names)?;
    let report = engine.user_dues(&participant).await?;

    if report.is_degraded() {
        tracing::warn!(
            "Report for {} is degraded ({} groups failed)",
            participant,
            report.errored_groups().count()
        );
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn load_splits(path: &Path) -> anyhow::Result<Vec<Split>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid splits in {}", path.display()))
}

fn load_names() -> anyhow::Result<StaticNameResolver> {
    let Ok(path) = std::env::var("DUES_NAMES") else {
        return Ok(StaticNameResolver::new());
    };

    let content =
        std::fs::read_to_string(&path).with_context(|| format!("failed to read {}", path))?;
    let table: HashMap<ParticipantId, String> =
        serde_json::from_str(&content).with_context(|| format!("invalid names in {}", path))?;

    Ok(table
        .into_iter()
        .fold(StaticNameResolver::new(), |resolver, (participant, name)| {
            resolver.with(participant, name)
        }))
}
