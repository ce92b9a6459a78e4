//! Pruned top-k executor
//!
//! One document-at-a-time loop over a partition of the query's contributors:
//! 1. Select the smallest candidate among the live sentinels (or the next
//!    working-set id)
//! 2. Score every sentinel unconditionally
//! 3. Score soft contributors in partition order while the candidate's upper
//!    bound still beats the admission threshold
//! 4. Offer fully scored candidates to the split-heap collector; a rising
//!    threshold shrinks the sentinel set
//! 5. Move the sentinels past the candidate
//!
//! With admissible bounds the result equals scoring every document.

use log::{debug, trace, warn};

use crate::config::ExecutionConfig;
use crate::error::{Error, Result};
use crate::query::collector::{Admission, SplitHeapCollector};
use crate::query::compiler::{CompiledQuery, ExactRebuild};
use crate::query::completion;
use crate::query::context::ScoringContext;
use crate::query::contributor::Contributor;
use crate::query::document::{EstimatedDocument, ScoredDocument};
use crate::query::sentinel::{PartitionStrategy, SentinelPartition};
use crate::query::stats::ExecutionStats;
use crate::structures::TERMINATED;
use crate::{DocId, Score};

/// Where candidates come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateSource {
    /// Merge the sentinels' posting lists
    Index,
    /// Re-rank an explicit ascending list of documents
    WorkingSet(Vec<DocId>),
}

/// Ranked documents plus the work it took to find them
#[derive(Debug, Clone, Default)]
pub struct QueryResults {
    pub documents: Vec<ScoredDocument>,
    pub stats: ExecutionStats,
}

pub struct PrunedExecutor {
    contributors: Vec<Contributor>,
    partition: SentinelPartition,
    context: ScoringContext,
    strategy: PartitionStrategy,
    limit: Option<usize>,
    source: CandidateSource,
    completion: bool,
    rebuild: Option<Box<dyn ExactRebuild>>,
    stats: ExecutionStats,
}

impl PrunedExecutor {
    /// Validate `config` against the query and partition its contributors.
    /// Nothing is scored until [`execute`](Self::execute).
    pub fn new(query: CompiledQuery, config: &ExecutionConfig) -> Result<Self> {
        let strategy = config.validate(query.sequential_dependence)?;
        let CompiledQuery {
            contributors,
            starting_potentials,
            lengths,
            rebuild,
            ..
        } = query;

        let partition = SentinelPartition::build(&contributors, strategy)?;
        let mut context = ScoringContext::new(starting_potentials, lengths)
            .with_estimator_slots(partition.num_estimators());
        for contributor in &contributors {
            contributor.aggregate_potentials(&mut context);
        }
        context.sentinel_index = partition.determine_sentinel_index(&context);

        let limit = config.limit();
        if config.completion && limit.is_none() {
            warn!("Completion with an unbounded limit re-scores every retained candidate");
        }

        debug!(
            "Creating PrunedExecutor: contributors={}, estimators={}, limit={:?}, strategy={}, dependency_aware={}, completion={}, starting_potential={:.4}",
            contributors.len(),
            partition.num_estimators(),
            limit,
            strategy.sort,
            strategy.dependency_aware,
            config.completion,
            context.starting_potential
        );

        Ok(Self {
            contributors,
            partition,
            context,
            strategy,
            limit,
            source: CandidateSource::Index,
            completion: config.completion,
            rebuild,
            stats: ExecutionStats::default(),
        })
    }

    /// Score only the given documents instead of merging posting lists
    pub fn define_working_set(&mut self, mut docs: Vec<DocId>) -> Result<()> {
        if self.completion {
            return Err(Error::Configuration(
                "completion cannot be combined with a working set".to_string(),
            ));
        }
        if !docs.windows(2).all(|w| w[0] < w[1]) {
            warn!(
                "Working set of {} documents is not strictly ascending, sorting",
                docs.len()
            );
            docs.sort_unstable();
            docs.dedup();
        }
        self.source = CandidateSource::WorkingSet(docs);
        Ok(())
    }

    pub fn with_working_set(mut self, docs: Vec<DocId>) -> Result<Self> {
        self.define_working_set(docs)?;
        Ok(self)
    }

    pub fn strategy(&self) -> PartitionStrategy {
        self.strategy
    }

    pub fn partition(&self) -> &SentinelPartition {
        &self.partition
    }

    /// Leading sentinels currently scored for every candidate
    pub fn sentinel_index(&self) -> usize {
        self.context.sentinel_index
    }

    pub fn threshold(&self) -> Score {
        self.context.min_candidate_score
    }

    pub fn execute(mut self) -> Result<QueryResults> {
        if self.limit == Some(0) || self.contributors.is_empty() {
            debug!(
                "PrunedExecutor: nothing to score (limit={:?}, contributors={})",
                self.limit,
                self.contributors.len()
            );
            return Ok(QueryResults {
                documents: Vec::new(),
                stats: self.stats,
            });
        }

        let mut collector = SplitHeapCollector::new(self.limit);
        match std::mem::replace(&mut self.source, CandidateSource::Index) {
            CandidateSource::Index => self.run_index(&mut collector),
            CandidateSource::WorkingSet(docs) => self.run_working_set(&docs, &mut collector),
        }
        if self.partition.num_estimators() > 0 {
            self.tighten(&mut collector);
        }

        let documents = if self.completion {
            completion::complete(
                collector.into_candidates(),
                self.rebuild.as_deref(),
                self.context.lengths().cloned(),
                self.limit,
                &mut self.stats,
            )?
        } else {
            collector
                .into_ranked()
                .iter()
                .map(ScoredDocument::from)
                .collect()
        };

        debug!(
            "PrunedExecutor completed: candidates={}, fully_scored={}, truncated={}, results={}, threshold={:.4}, sentinel_changes={}",
            self.stats.candidates,
            self.stats.fully_scored,
            self.stats.truncated,
            documents.len(),
            self.context.min_candidate_score,
            self.stats.sentinel_changes
        );

        Ok(QueryResults {
            documents,
            stats: self.stats,
        })
    }

    fn run_index(&mut self, collector: &mut SplitHeapCollector) {
        let mut last: Option<DocId> = None;
        while let Some(doc) = self.select_candidate() {
            debug_assert!(last.is_none_or(|prev| prev < doc), "candidates must ascend");
            self.process(doc, collector);
            self.advance_sentinels(doc);
            last = Some(doc);
        }
    }

    fn run_working_set(&mut self, docs: &[DocId], collector: &mut SplitHeapCollector) {
        for &doc in docs {
            if doc == TERMINATED {
                break;
            }
            self.process(doc, collector);
        }
    }

    /// Smallest current candidate among the live sentinels
    fn select_candidate(&self) -> Option<DocId> {
        self.partition.sentinels()[..self.context.sentinel_index]
            .iter()
            .map(|sentinel| self.contributors[sentinel.anchor()].current_candidate())
            .min()
            .filter(|&doc| doc != TERMINATED)
    }

    fn process(&mut self, doc: DocId, collector: &mut SplitHeapCollector) {
        self.stats.candidates += 1;
        self.context.begin_candidate(doc);

        let total = self.partition.len();
        let hard = self.context.sentinel_index;
        for index in 0..hard {
            self.score_sentinel(index);
        }
        let mut next = hard;
        while next < total && self.context.can_beat_threshold() {
            self.score_sentinel(next);
            next += 1;
        }
        if next < total {
            self.stats.truncated += 1;
            trace!(
                "Truncated doc={} after {}/{} sentinels: upper={:.4}, threshold={:.4}",
                doc,
                next,
                total,
                self.context.upper_bound(),
                self.context.min_candidate_score
            );
            return;
        }

        self.stats.fully_scored += 1;
        let threshold = self.context.min_candidate_score;
        let candidate = EstimatedDocument::from_context(&self.context);
        match collector.offer(candidate, &mut self.context, &mut self.stats) {
            Admission::Filled {
                threshold_set: true,
            } => self.refresh_sentinel_index(),
            Admission::Promoted { threshold_raised } => {
                let tightened =
                    self.partition.num_estimators() > 0 && self.tighten(collector);
                if threshold_raised || tightened {
                    self.refresh_sentinel_index();
                }
            }
            _ => {}
        }
        debug_assert!(
            self.context.min_candidate_score >= threshold,
            "admission threshold fell from {threshold} to {}",
            self.context.min_candidate_score
        );
    }

    fn score_sentinel(&mut self, index: usize) {
        let sentinel = &self.partition.sentinels()[index];
        for &member in &sentinel.members {
            let slot = self.partition.estimator_slot(member);
            let contributor = &mut self.contributors[member];
            if contributor.is_estimator() {
                self.stats.estimates += 1;
            } else {
                self.stats.hard_scores += 1;
            }
            contributor.score(&mut self.context, slot);
        }
    }

    fn advance_sentinels(&mut self, doc: DocId) {
        for sentinel in &self.partition.sentinels()[..self.context.sentinel_index] {
            for &member in &sentinel.members {
                self.contributors[member].move_past(doc);
            }
        }
    }

    /// Re-derive the sentinel set after the threshold rose
    fn refresh_sentinel_index(&mut self) {
        let index = self.partition.determine_sentinel_index(&self.context);
        if index != self.context.sentinel_index {
            debug!(
                "Sentinel index {} -> {} at threshold={:.4}",
                self.context.sentinel_index, index, self.context.min_candidate_score
            );
            self.stats.sentinel_changes += 1;
            self.context.sentinel_index = index;
        }
    }

    /// Refine every retained candidate's estimator bounds. Returns whether
    /// the threshold rose.
    fn tighten(&mut self, collector: &mut SplitHeapCollector) -> bool {
        let contributors = &self.contributors;
        let partition = &self.partition;
        collector.tighten(&mut self.context, &mut self.stats, |ctx, doc| {
            refine_estimates(contributors, partition, ctx, doc)
        })
    }
}

/// Recompute a retained document's estimator interval from scratch
fn refine_estimates(
    contributors: &[Contributor],
    partition: &SentinelPartition,
    ctx: &ScoringContext,
    doc: &mut EstimatedDocument,
) {
    doc.min = 0.0;
    doc.max = 0.0;
    for (index, contributor) in contributors.iter().enumerate() {
        if let Contributor::Estimating(estimator) = contributor
            && let Some(slot) = partition.estimator_slot(index)
        {
            estimator.adjust_estimate(ctx, doc, slot);
        }
    }
}
