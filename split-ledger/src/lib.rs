//! Split Ledger
//!
//! Record model and collaborator boundary for group expense splitting.
//!
//! # Architecture
//!
//! - **Records**: Splits are flat, in-memory values (payer, members, owed shares)
//! - **Datastore**: [`store::SplitStore`] hands out consistent snapshots per scope
//! - **Naming**: [`names::NameResolver`] maps participants to display names,
//!   optionally through an injected [`names::NameCache`]

#![forbid(unsafe_code)]
//!
//! # Invariants
//!
//! - Member owed shares sum to the split total (within epsilon)
//! - Members are unique by participant within a split
//! - Amounts are exact decimals, never binary floating point

#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod money;
pub mod validation;
pub mod store;
pub mod names;
pub mod error;
pub mod config;

// Re-exports
pub use error::{Error, Result};
pub use types::{
    GroupId, ParticipantId, Scope, Split, SplitId, SplitMember, SplitStatus, Transaction,
};
pub use money::Precision;
pub use store::{InMemorySplitStore, SplitStore};
pub use names::{CachedNameResolver, InMemoryNameCache, NameCache, NameResolver, StaticNameResolver};
pub use config::Config;
