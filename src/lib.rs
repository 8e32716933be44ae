//! Selector healer CLI library.
//!
//! The healing engine itself lives in the workspace crates; this crate is
//! the glue around it: configuration, the scan runner, report rendering
//! and the optional GitHub integration.

pub mod config;
pub mod github;
pub mod report;
pub mod scan;

pub use config::{ConfigError, HealerConfig};
pub use report::{Confidence, HealingReport, Recommendation, ReportStats};

// Re-export the engine surface so embedders need only this crate.
pub use dom_snapshot_store::DomSnapshotStore;
pub use heal_engine::{HealingCache, HealingPage, PagePort, SelectorHealer};
pub use healer_core_types::{
    DomSnapshot, HealStatus, HealingOutcome, LedgerEntry, PageError, SelectorKind,
    SuggestionRequest,
};
pub use result_ledger::ResultLedger;
pub use suggest_client::{ProviderKind, SuggestClient, SuggestionBackend};
