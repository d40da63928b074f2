//! Core synchronization and aggregation logic for a document-backed journal.
//!
//! Everything here operates through read-modify-write calls against the
//! remote tree store: entries, their insight fragments and the rolling
//! analytics aggregate all live inside the same document tree, with no
//! database on the side.
//!
//! The store offers no transactions, so correctness rests on sequential
//! access: batch processing is strictly one entry at a time, and nothing in
//! this crate may run two aggregate merges against the same root
//! concurrently. That invariant is documented, not enforced.

pub mod aggregate;
pub mod classify;
pub mod codec;
pub mod extract;
pub mod processor;
pub mod seed;

pub use aggregate::{AggregateRecord, AggregateStore, DailyMood, ThemeCount, AGGREGATE_MARKER};
pub use codec::INSIGHT_MARKER;
pub use processor::{BatchReport, EntryStatus, Processor, ProcessorOptions};
pub use seed::SeedEntry;

use capsule_llm::AnalyzerError;
use capsule_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),

    /// Insight or aggregate record failed to serialize. Should not happen
    /// for well-formed records, but never panics the caller.
    #[error("failed to serialize record: {0}")]
    Encode(#[from] serde_json::Error),

    /// No document with the configured journal title exists. Requires user
    /// action; never silently defaulted.
    #[error("journal root document {0:?} not found")]
    RootNotFound(String),

    /// The store broke a structural expectation this engine cannot repair
    /// (e.g. an insert that did not return the inserted marker).
    #[error("aggregate fragment inconsistent: {0}")]
    Aggregate(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
