//! Unpruned document-at-a-time OR
//!
//! Scores every document any contributor matches, in the same contributor
//! order the pruned executor uses, so that results can be compared exactly.
//! Estimating contributors give up their potential and are replaced by
//! their exact rebuild, as completion does.

use log::debug;

use crate::config::ExecutionConfig;
use crate::error::{Error, Result};
use crate::query::collector::ExactCollector;
use crate::query::compiler::CompiledQuery;
use crate::query::context::ScoringContext;
use crate::query::contributor::{Contributor, HardScorer};
use crate::query::engine::QueryResults;
use crate::query::sentinel::SentinelPartition;
use crate::query::stats::ExecutionStats;
use crate::structures::TERMINATED;

pub struct ExhaustiveExecutor {
    contributors: Vec<Contributor>,
    order: Vec<usize>,
    replacements: Vec<Box<dyn HardScorer>>,
    context: ScoringContext,
    exact_context: ScoringContext,
    limit: Option<usize>,
}

impl ExhaustiveExecutor {
    pub fn new(query: CompiledQuery, config: &ExecutionConfig) -> Result<Self> {
        let strategy = config.validate(query.sequential_dependence)?;
        let estimators = query.num_estimators();
        let CompiledQuery {
            contributors,
            starting_potentials,
            lengths,
            rebuild,
            ..
        } = query;

        let partition = SentinelPartition::build(&contributors, strategy)?;
        let order = partition.scoring_order().collect();

        let mut replacements = match (&rebuild, estimators) {
            (_, 0) => Vec::new(),
            (Some(rebuild), _) => rebuild.rebuild_exact()?,
            (None, _) => {
                return Err(Error::Query(
                    "exhaustive scoring of estimating contributors needs an exact rebuild"
                        .to_string(),
                ));
            }
        };
        replacements.sort_by_key(|scorer| scorer.total_entries());

        let mut context = ScoringContext::new(starting_potentials, lengths.clone());
        for contributor in &contributors {
            contributor.aggregate_potentials(&mut context);
        }
        let mut exact_context = ScoringContext::new(Vec::new(), lengths);
        for scorer in &replacements {
            scorer.aggregate_potentials(&mut exact_context);
        }

        Ok(Self {
            contributors,
            order,
            replacements,
            context,
            exact_context,
            limit: config.limit(),
        })
    }

    pub fn execute(mut self) -> Result<QueryResults> {
        let mut stats = ExecutionStats::default();
        if self.limit == Some(0) || self.contributors.is_empty() {
            return Ok(QueryResults {
                documents: Vec::new(),
                stats,
            });
        }

        let mut collector = ExactCollector::new(self.limit);
        let exact_base = self.exact_context.starting_potential;
        loop {
            let doc = self
                .contributors
                .iter()
                .map(Contributor::current_candidate)
                .min()
                .unwrap_or(TERMINATED);
            if doc == TERMINATED {
                break;
            }
            stats.candidates += 1;

            self.context.begin_candidate(doc);
            for &index in &self.order {
                let contributor = &mut self.contributors[index];
                contributor.sync_to(doc);
                match contributor {
                    Contributor::Hard(scorer) => scorer.delta_score(&mut self.context),
                    Contributor::Estimating(estimator) => {
                        self.context.running_score -=
                            estimator.weight() * estimator.maximum_score();
                    }
                }
                stats.hard_scores += 1;
            }

            let mut score = self.context.running_score;
            if !self.replacements.is_empty() {
                self.exact_context.begin_candidate(doc);
                self.exact_context.running_score = exact_base + score;
                for scorer in &mut self.replacements {
                    scorer.sync_to(doc);
                    scorer.delta_score(&mut self.exact_context);
                    stats.hard_scores += 1;
                }
                score = self.exact_context.running_score;
            }

            stats.fully_scored += 1;
            collector.insert(doc, score);
            for contributor in &mut self.contributors {
                contributor.move_past(doc);
            }
        }

        debug!(
            "ExhaustiveExecutor completed: candidates={}, results={}",
            stats.candidates,
            collector.len()
        );
        Ok(QueryResults {
            documents: collector.into_sorted_results(),
            stats,
        })
    }
}
