//! Candidate documents produced by an execution

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::query::context::ScoringContext;
use crate::{DocId, Score};

/// A fully scored candidate whose estimator contributions are still an interval.
///
/// The true score lies in `[score + min, score + max]`.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimatedDocument {
    pub doc_id: DocId,
    pub score: Score,
    pub min: Score,
    pub max: Score,
    pub length: u32,
    pub counts: Vec<u16>,
}

impl EstimatedDocument {
    /// Snapshot the context's current candidate
    pub fn from_context(ctx: &ScoringContext) -> Self {
        Self {
            doc_id: ctx.document,
            score: ctx.running_score,
            min: ctx.min,
            max: ctx.max,
            length: ctx.length,
            counts: ctx.counts.clone(),
        }
    }

    #[inline]
    pub fn lower_bound(&self) -> Score {
        self.score + self.min
    }

    #[inline]
    pub fn upper_bound(&self) -> Score {
        self.score + self.max
    }

    /// `Greater` when `self` ranks ahead by confirmed score:
    /// higher lower bound, then higher upper bound, then smaller doc id.
    pub fn cmp_confirmed(&self, other: &Self) -> Ordering {
        self.lower_bound()
            .total_cmp(&other.lower_bound())
            .then_with(|| self.upper_bound().total_cmp(&other.upper_bound()))
            .then_with(|| other.doc_id.cmp(&self.doc_id))
    }

    /// `Greater` when `self` ranks ahead by potential score:
    /// higher upper bound, then higher lower bound, then smaller doc id.
    pub fn cmp_potential(&self, other: &Self) -> Ordering {
        self.upper_bound()
            .total_cmp(&other.upper_bound())
            .then_with(|| self.lower_bound().total_cmp(&other.lower_bound()))
            .then_with(|| other.doc_id.cmp(&self.doc_id))
    }
}

/// A final result
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub doc_id: DocId,
    pub score: Score,
}

impl ScoredDocument {
    pub fn new(doc_id: DocId, score: Score) -> Self {
        Self { doc_id, score }
    }
}

impl From<&EstimatedDocument> for ScoredDocument {
    fn from(doc: &EstimatedDocument) -> Self {
        Self::new(doc.doc_id, doc.lower_bound())
    }
}

/// Sort by descending score, ties by ascending doc id
pub fn sort_scored(results: &mut [ScoredDocument]) {
    results.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.doc_id.cmp(&b.doc_id))
    });
}

/// Order retained candidates best-first by confirmed score and keep `limit`
pub fn rank_estimated(
    mut docs: Vec<EstimatedDocument>,
    limit: Option<usize>,
) -> Vec<EstimatedDocument> {
    docs.sort_by(|a, b| b.cmp_confirmed(a));
    if let Some(k) = limit {
        docs.truncate(k);
    }
    docs
}
