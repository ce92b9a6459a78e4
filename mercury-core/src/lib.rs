//! Mercury - pruned top-k query execution
//!
//! Evaluates weighted sums of per-term and per-window scoring contributors
//! over an inverted index and returns the K best documents while scoring as
//! few candidates as possible:
//! - Sentinel/soft partitioning of contributors (MaxScore-style)
//! - Interval-bounded estimators for features too costly to score exactly
//! - Split-heap collection of confirmed and provisional candidates
//! - Working-set re-ranking and exact second-pass completion

pub mod batch;
pub mod config;
pub mod error;
pub mod index;
pub mod query;
pub mod structures;

pub use batch::{BatchQuery, execute_batch};
pub use config::ExecutionConfig;
pub use error::{Error, Result};
pub use index::{MemoryIndex, MemoryIndexBuilder};
pub use query::{
    CandidateSource, CompiledQuery, Contributor, EstimatedDocument, EstimatingScorer,
    ExactRebuild, ExecutionStats, ExhaustiveExecutor, HardScorer, PrunedExecutor, QueryCompiler,
    QueryResults, ScoredDocument, ScoringContext, ScoringContributor, SortStrategy,
};
pub use structures::{DocumentLengths, LengthTable, PostingList, TERMINATED};

pub type DocId = u32;
pub type TermFreq = u32;
pub type Score = f32;
