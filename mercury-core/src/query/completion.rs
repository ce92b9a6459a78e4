//! Exact second pass over the first pass's retained candidates
//!
//! Estimating contributors are swapped for exact hard replacements. Each
//! retained candidate keeps the partial score the first pass confirmed and
//! only the replacements are evaluated on top of it.

use std::sync::Arc;

use log::debug;

use crate::error::Result;
use crate::query::collector::ExactCollector;
use crate::query::compiler::ExactRebuild;
use crate::query::context::ScoringContext;
use crate::query::document::{EstimatedDocument, ScoredDocument, rank_estimated};
use crate::query::stats::ExecutionStats;
use crate::structures::DocumentLengths;

pub fn complete(
    mut candidates: Vec<EstimatedDocument>,
    rebuild: Option<&dyn ExactRebuild>,
    lengths: Option<Arc<dyn DocumentLengths>>,
    limit: Option<usize>,
    stats: &mut ExecutionStats,
) -> Result<Vec<ScoredDocument>> {
    let mut scorers = match rebuild {
        Some(rebuild) => rebuild.rebuild_exact()?,
        None => Vec::new(),
    };
    if scorers.is_empty() {
        debug!("Completion: no exact replacements, ranking {} candidates", candidates.len());
        return Ok(rank_estimated(candidates, limit)
            .iter()
            .map(ScoredDocument::from)
            .collect());
    }

    scorers.sort_by_key(|scorer| scorer.total_entries());
    let mut ctx = ScoringContext::new(Vec::new(), lengths);
    for scorer in &scorers {
        scorer.aggregate_potentials(&mut ctx);
    }
    let base = ctx.starting_potential;

    candidates.sort_unstable_by_key(|doc| doc.doc_id);
    let mut collector = ExactCollector::new(limit);
    for candidate in &candidates {
        ctx.begin_candidate(candidate.doc_id);
        ctx.running_score = base + candidate.score;
        for scorer in &mut scorers {
            scorer.sync_to(candidate.doc_id);
            scorer.delta_score(&mut ctx);
        }
        stats.completed += 1;
        collector.insert(candidate.doc_id, ctx.running_score);
    }

    debug!(
        "Completion re-scored {} candidates with {} exact scorers",
        candidates.len(),
        scorers.len()
    );
    Ok(collector.into_sorted_results())
}
