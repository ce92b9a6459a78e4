//! Scoring contributor contracts
//!
//! A contributor is one weighted feature of a query. Every contributor
//! walks its matches forward and carries an admissible per-document bound.
//! Its capability decides how it scores a candidate:
//! - a [`HardScorer`] subtracts `weight * (max - actual)` from the running score
//! - an [`EstimatingScorer`] gives up its assumed maximum and reports an
//!   interval `[lo, hi]` that contains its true weighted contribution
//!
//! The capability is fixed by the [`Contributor`] variant when the query is
//! compiled, so the engine never probes types at scoring time.

use crate::query::context::ScoringContext;
use crate::query::document::EstimatedDocument;
use crate::structures::TERMINATED;
use crate::{DocId, Score};

/// Cursor and bound contract shared by all contributors
pub trait ScoringContributor: Send {
    /// Next document this contributor matches, TERMINATED once exhausted
    fn current_candidate(&self) -> DocId;

    fn is_done(&self) -> bool {
        self.current_candidate() == TERMINATED
    }

    /// Move forward to the first match >= `doc`. Never moves backwards.
    fn sync_to(&mut self, doc: DocId);

    /// Move forward to the first match > `doc`
    fn move_past(&mut self, doc: DocId);

    /// Posting list length, used for ordering
    fn total_entries(&self) -> u64;

    /// Query weight applied to the unweighted score
    fn weight(&self) -> Score;

    /// Unweighted upper bound of the per-document score
    fn maximum_score(&self) -> Score;

    /// Unweighted lower bound of the per-document score
    fn minimum_score(&self) -> Score {
        0.0
    }

    /// Weighted width of the score interval
    fn maximum_difference(&self) -> Score {
        self.weight() * (self.maximum_score() - self.minimum_score())
    }

    /// Fold this contributor's potential into the starting potential
    fn aggregate_potentials(&self, ctx: &mut ScoringContext) {
        ctx.starting_potential += self.weight() * self.maximum_score();
    }

    /// Indices of contributors that match wherever this one matches
    fn dependencies(&self) -> &[usize] {
        &[]
    }
}

pub trait HardScorer: ScoringContributor {
    /// Score the context's document exactly, lowering `ctx.running_score`
    fn delta_score(&mut self, ctx: &mut ScoringContext);
}

pub trait EstimatingScorer: ScoringContributor {
    /// Bound the weighted contribution for the context's document.
    ///
    /// Records whatever `adjust_estimate` needs later in `ctx.counts[slot]`.
    fn estimate(&mut self, ctx: &mut ScoringContext, slot: usize) -> (Score, Score);

    /// Add a refined `[lo, hi]` for a retained document to `doc.min` and `doc.max`,
    /// using the snapshot in `doc.counts[slot]` and the bounds gathered so far.
    fn adjust_estimate(&self, ctx: &ScoringContext, doc: &mut EstimatedDocument, slot: usize);
}

/// A contributor tagged with its scoring capability
pub enum Contributor {
    Hard(Box<dyn HardScorer>),
    Estimating(Box<dyn EstimatingScorer>),
}

macro_rules! delegate {
    ($self:expr, $inner:ident => $body:expr) => {
        match $self {
            Contributor::Hard($inner) => $body,
            Contributor::Estimating($inner) => $body,
        }
    };
}

impl Contributor {
    pub fn hard(scorer: impl HardScorer + 'static) -> Self {
        Contributor::Hard(Box::new(scorer))
    }

    pub fn estimating(scorer: impl EstimatingScorer + 'static) -> Self {
        Contributor::Estimating(Box::new(scorer))
    }

    #[inline]
    pub fn is_estimator(&self) -> bool {
        matches!(self, Contributor::Estimating(_))
    }

    #[inline]
    pub fn current_candidate(&self) -> DocId {
        delegate!(self, c => c.current_candidate())
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        delegate!(self, c => c.is_done())
    }

    #[inline]
    pub fn sync_to(&mut self, doc: DocId) {
        delegate!(self, c => c.sync_to(doc))
    }

    #[inline]
    pub fn move_past(&mut self, doc: DocId) {
        delegate!(self, c => c.move_past(doc))
    }

    pub fn total_entries(&self) -> u64 {
        delegate!(self, c => c.total_entries())
    }

    pub fn weight(&self) -> Score {
        delegate!(self, c => c.weight())
    }

    pub fn maximum_score(&self) -> Score {
        delegate!(self, c => c.maximum_score())
    }

    pub fn maximum_difference(&self) -> Score {
        delegate!(self, c => c.maximum_difference())
    }

    pub fn aggregate_potentials(&self, ctx: &mut ScoringContext) {
        delegate!(self, c => c.aggregate_potentials(ctx))
    }

    pub fn dependencies(&self) -> &[usize] {
        delegate!(self, c => c.dependencies())
    }

    /// Score the context's document.
    ///
    /// `slot` is the estimator's counts slot and is ignored for hard scorers.
    #[inline]
    pub fn score(&mut self, ctx: &mut ScoringContext, slot: Option<usize>) {
        self.sync_to(ctx.document);
        match self {
            Contributor::Hard(scorer) => scorer.delta_score(ctx),
            Contributor::Estimating(estimator) => {
                ctx.running_score -= estimator.weight() * estimator.maximum_score();
                let (lo, hi) = estimator.estimate(ctx, slot.unwrap_or(0));
                ctx.min += lo;
                ctx.max += hi;
            }
        }
    }
}

impl std::fmt::Debug for Contributor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.is_estimator() { "Estimating" } else { "Hard" };
        f.debug_struct(kind)
            .field("weight", &self.weight())
            .field("maximum_score", &self.maximum_score())
            .field("total_entries", &self.total_entries())
            .finish()
    }
}
