//! Parallel execution of independent queries
//!
//! Each query is compiled and executed on a rayon worker with its own
//! contributors, context and heaps; only the index is shared.

use std::sync::Arc;

use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::DocId;
use crate::config::ExecutionConfig;
use crate::error::Result;
use crate::index::MemoryIndex;
use crate::query::{ExecutionStats, PrunedExecutor, QueryCompiler, QueryResults};

/// One query of a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchQuery {
    pub text: String,
    /// Restrict scoring to these documents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_set: Option<Vec<DocId>>,
}

impl BatchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            working_set: None,
        }
    }

    pub fn with_working_set(mut self, docs: Vec<DocId>) -> Self {
        self.working_set = Some(docs);
        self
    }
}

fn execute_one(index: &MemoryIndex, query: &BatchQuery, config: &ExecutionConfig) -> Result<QueryResults> {
    let compiled = QueryCompiler::new(index)
        .with_sequential_dependence(config.sequential_dependence)
        .compile(&query.text)?;
    let mut executor = PrunedExecutor::new(compiled, config)?;
    if let Some(docs) = &query.working_set {
        executor.define_working_set(docs.clone())?;
    }
    executor.execute()
}

/// Execute `queries` in parallel; results keep the input order
pub fn execute_batch(
    index: &Arc<MemoryIndex>,
    queries: &[BatchQuery],
    config: &ExecutionConfig,
) -> Vec<Result<QueryResults>> {
    let results: Vec<Result<QueryResults>> = queries
        .par_iter()
        .map(|query| execute_one(index, query, config))
        .collect();

    let mut total = ExecutionStats::default();
    for stats in results.iter().filter_map(|r| r.as_ref().ok()).map(|r| &r.stats) {
        total.merge(stats);
    }
    debug!(
        "Batch executed: queries={}, failed={}, candidates={}, fully_scored={}, truncated={}",
        queries.len(),
        results.iter().filter(|r| r.is_err()).count(),
        total.candidates,
        total.fully_scored,
        total.truncated
    );
    results
}
