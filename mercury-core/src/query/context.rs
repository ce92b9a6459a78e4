//! Per-execution scoring state shared by the engine and its contributors

use std::sync::Arc;

use crate::structures::DocumentLengths;
use crate::{DocId, Score};

/// Mutable scratch state for one query execution.
///
/// While a candidate is scored, `running_score + min` and
/// `running_score + max` bracket its true score.
pub struct ScoringContext {
    /// Candidate being scored
    pub document: DocId,
    /// Starting potential minus what has been given up so far
    pub running_score: Score,
    /// Accumulated estimator lower bounds
    pub min: Score,
    /// Accumulated estimator upper bounds
    pub max: Score,
    /// Sum of every contributor's weighted maximum plus the group potentials
    pub starting_potential: Score,
    /// Per-group potentials supplied by the compiler
    pub starting_potentials: Vec<Score>,
    /// Working copy of `starting_potentials`, reset per candidate
    pub potentials: Vec<Score>,
    /// Admission threshold, NEG_INFINITY until the top heap fills
    pub min_candidate_score: Score,
    /// Number of leading sentinels scored unconditionally
    pub sentinel_index: usize,
    /// Length of `document`, snapshotted when scoring starts
    pub length: u32,
    /// Estimator counts for `document`, one slot per estimator
    pub counts: Vec<u16>,
    lengths: Option<Arc<dyn DocumentLengths>>,
}

impl ScoringContext {
    pub fn new(starting_potentials: Vec<Score>, lengths: Option<Arc<dyn DocumentLengths>>) -> Self {
        let starting_potential = starting_potentials.iter().sum();
        Self {
            document: 0,
            running_score: starting_potential,
            min: 0.0,
            max: 0.0,
            starting_potential,
            potentials: starting_potentials.clone(),
            starting_potentials,
            min_candidate_score: Score::NEG_INFINITY,
            sentinel_index: 0,
            length: 0,
            counts: Vec::new(),
            lengths,
        }
    }

    pub fn with_estimator_slots(mut self, slots: usize) -> Self {
        self.counts = vec![0; slots];
        self
    }

    pub fn lengths(&self) -> Option<&Arc<dyn DocumentLengths>> {
        self.lengths.as_ref()
    }

    /// Average document length, 0 without a length source
    pub fn average_length(&self) -> f32 {
        self.lengths.as_ref().map_or(0.0, |l| l.average())
    }

    /// Snapshot the length of `doc`
    #[inline]
    pub fn move_lengths(&mut self, doc: DocId) {
        self.length = self.lengths.as_ref().map_or(0, |l| l.length(doc));
    }

    /// Reset per-candidate state before scoring `doc`
    #[inline]
    pub fn begin_candidate(&mut self, doc: DocId) {
        self.document = doc;
        self.move_lengths(doc);
        self.running_score = self.starting_potential;
        self.min = 0.0;
        self.max = 0.0;
        self.potentials.copy_from_slice(&self.starting_potentials);
        self.counts.fill(0);
    }

    #[inline]
    pub fn upper_bound(&self) -> Score {
        self.running_score + self.max
    }

    #[inline]
    pub fn lower_bound(&self) -> Score {
        self.running_score + self.min
    }

    /// Whether the candidate could still be admitted
    #[inline]
    pub fn can_beat_threshold(&self) -> bool {
        self.upper_bound() > self.min_candidate_score
    }
}

impl std::fmt::Debug for ScoringContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringContext")
            .field("document", &self.document)
            .field("running_score", &self.running_score)
            .field("min", &self.min)
            .field("max", &self.max)
            .field("starting_potential", &self.starting_potential)
            .field("min_candidate_score", &self.min_candidate_score)
            .field("sentinel_index", &self.sentinel_index)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_candidate_resets_state() {
        let lengths: Arc<dyn DocumentLengths> = Arc::new(vec![4u32, 9, 2]);
        let mut ctx = ScoringContext::new(vec![0.5, 1.5], Some(lengths)).with_estimator_slots(2);
        assert_eq!(ctx.starting_potential, 2.0);
        assert_eq!(ctx.min_candidate_score, Score::NEG_INFINITY);

        ctx.running_score = -3.0;
        ctx.max = 4.0;
        ctx.potentials[0] = 0.0;
        ctx.counts[1] = 7;
        ctx.begin_candidate(1);

        assert_eq!(ctx.document, 1);
        assert_eq!(ctx.length, 9);
        assert_eq!(ctx.running_score, 2.0);
        assert_eq!(ctx.upper_bound(), 2.0);
        assert_eq!(ctx.potentials, vec![0.5, 1.5]);
        assert_eq!(ctx.counts, vec![0, 0]);
        assert!(ctx.can_beat_threshold());
    }
}
