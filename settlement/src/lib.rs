//! Settlement
//!
//! Balance calculation, debt simplification and dues aggregation over split records.
//!
//! # Architecture

#![forbid(unsafe_code)]
//!
//! Every report is computed from one snapshot of active splits:
//!
//! 1. **Balances**: Net position per participant (credit positive, debt negative)
//! 2. **Settlement**: Greedy largest-first matching into point-to-point transactions
//! 3. **Aggregation**: Per-group views plus one pooled global view for a user
//! 4. **Labelling**: Descriptions rewritten from the user's point of view
//!
//! A group that fails to compute degrades to an error entry; the report is still
//! produced for every other group.
//!
//! # Example
//!
//! ```no_run
//! use settlement::SettlementEngine;
//! use split_ledger::{Config, InMemorySplitStore, ParticipantId, StaticNameResolver};
//!
//! #[tokio::main]
//! async fn main() -> settlement::Result<()> {
//!     let engine = SettlementEngine::new(
//!         Config::default(),
//!         InMemorySplitStore::default(),
//!         StaticNameResolver::new(),
//!     )?;
//!
//!     let report = engine.user_dues(&ParticipantId::new("0xabc")).await?;
//!     println!("Owes {}, owed {}", report.total_owed, report.total_owed_to_user);
//!
//!     Ok(())
//! }
//! ```

#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod balance;
pub mod solver;
pub mod labels;
pub mod dues;
pub mod error;
pub mod engine;

// Re-exports
pub use error::{Error, Result};
pub use types::*;
pub use balance::BalanceCalculator;
pub use solver::SettlementSolver;
pub use labels::{DisplayNames, PerspectiveLabeler};
pub use dues::DuesAggregator;
pub use engine::SettlementEngine;
