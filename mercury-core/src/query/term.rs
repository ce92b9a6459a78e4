//! Hard scorers over single posting lists

use crate::query::bm25::{bm25_idf, bm25_score, bm25_upper_bound};
use crate::query::context::ScoringContext;
use crate::query::contributor::{HardScorer, ScoringContributor};
use crate::structures::{ImpactCursor, ImpactList, PostingCursor, PostingList};
use crate::{DocId, Score};

/// BM25 scorer for one query term
pub struct TermScorer {
    cursor: PostingCursor,
    idf: f32,
    avg_doc_len: f32,
    weight: Score,
    max_score: Score,
    entries: u64,
}

impl TermScorer {
    /// `num_docs` is the collection size the idf is computed against
    pub fn new(postings: &PostingList, num_docs: u32, avg_doc_len: f32, weight: Score) -> Self {
        let idf = bm25_idf(postings.doc_count() as f32, num_docs as f32);
        Self {
            cursor: postings.cursor(),
            idf,
            avg_doc_len,
            weight,
            max_score: bm25_upper_bound(postings.max_term_freq() as f32, idf),
            entries: postings.doc_count() as u64,
        }
    }

    pub fn idf(&self) -> f32 {
        self.idf
    }
}

impl ScoringContributor for TermScorer {
    #[inline]
    fn current_candidate(&self) -> DocId {
        self.cursor.doc()
    }

    #[inline]
    fn sync_to(&mut self, doc: DocId) {
        if self.cursor.doc() < doc {
            self.cursor.seek(doc);
        }
    }

    #[inline]
    fn move_past(&mut self, doc: DocId) {
        if self.cursor.doc() <= doc {
            self.cursor.seek(doc.saturating_add(1));
        }
    }

    fn total_entries(&self) -> u64 {
        self.entries
    }

    fn weight(&self) -> Score {
        self.weight
    }

    fn maximum_score(&self) -> Score {
        self.max_score
    }
}

impl HardScorer for TermScorer {
    #[inline]
    fn delta_score(&mut self, ctx: &mut ScoringContext) {
        let actual = if self.cursor.doc() == ctx.document {
            bm25_score(
                self.cursor.term_freq() as f32,
                self.idf,
                ctx.length as f32,
                self.avg_doc_len,
            )
        } else {
            0.0
        };
        ctx.running_score -= self.weight * (self.max_score - actual);
    }
}

/// Scorer over precomputed impacts: `weight * impact`
///
/// Used for sparse-vector style features and static priors.
pub struct ImpactScorer {
    cursor: ImpactCursor,
    weight: Score,
    max_impact: Score,
    entries: u64,
}

impl ImpactScorer {
    pub fn new(impacts: ImpactList, weight: Score) -> Self {
        Self {
            cursor: impacts.cursor(),
            weight,
            max_impact: impacts.max_impact(),
            entries: impacts.doc_count() as u64,
        }
    }
}

impl ScoringContributor for ImpactScorer {
    #[inline]
    fn current_candidate(&self) -> DocId {
        self.cursor.doc()
    }

    #[inline]
    fn sync_to(&mut self, doc: DocId) {
        if self.cursor.doc() < doc {
            self.cursor.seek(doc);
        }
    }

    #[inline]
    fn move_past(&mut self, doc: DocId) {
        if self.cursor.doc() <= doc {
            self.cursor.seek(doc.saturating_add(1));
        }
    }

    fn total_entries(&self) -> u64 {
        self.entries
    }

    fn weight(&self) -> Score {
        self.weight
    }

    fn maximum_score(&self) -> Score {
        self.max_impact
    }
}

impl HardScorer for ImpactScorer {
    #[inline]
    fn delta_score(&mut self, ctx: &mut ScoringContext) {
        let actual = if self.cursor.doc() == ctx.document {
            self.cursor.impact()
        } else {
            0.0
        };
        ctx.running_score -= self.weight * (self.max_impact - actual);
    }
}
