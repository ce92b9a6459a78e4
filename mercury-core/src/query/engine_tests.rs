//! End-to-end tests for pruned execution
//!
//! Tests cover:
//! - Hand-checked scenarios (single sentinel, estimator resolution, working set, no truncation)
//! - Degenerate inputs (K = 0, no contributors, empty index, unbounded K)
//! - Configuration errors
//! - Exactness against the exhaustive executor on seeded random corpora

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rustc_hash::FxHashMap;

    use crate::config::ExecutionConfig;
    use crate::error::{Error, Result};
    use crate::index::{MemoryIndex, MemoryIndexBuilder};
    use crate::query::{
        CompiledQuery, Contributor, EstimatedDocument, EstimatingScorer, ExactRebuild,
        ExhaustiveExecutor, HardScorer, ImpactScorer, PrunedExecutor, QueryCompiler,
        QueryResults, ScoredDocument, ScoringContext, ScoringContributor, SortStrategy,
    };
    use crate::structures::{ImpactList, TERMINATED};
    use crate::{DocId, Score};

    // ── Helpers ──────────────────────────────────────────────────────────

    fn impacts(entries: &[(DocId, Score)]) -> Contributor {
        Contributor::hard(ImpactScorer::new(ImpactList::new(entries.to_vec()), 1.0))
    }

    fn run(query: CompiledQuery, config: &ExecutionConfig) -> QueryResults {
        PrunedExecutor::new(query, config).unwrap().execute().unwrap()
    }

    fn run_exhaustive(query: CompiledQuery, config: &ExecutionConfig) -> QueryResults {
        ExhaustiveExecutor::new(query, config)
            .unwrap()
            .execute()
            .unwrap()
    }

    fn pairs(results: &QueryResults) -> Vec<(DocId, Score)> {
        results
            .documents
            .iter()
            .map(|d| (d.doc_id, d.score))
            .collect()
    }

    fn k(requested: i64) -> ExecutionConfig {
        ExecutionConfig::default().with_requested(requested)
    }

    const SCENARIO_A: [(DocId, Score); 5] = [(1, 3.0), (2, 5.0), (3, 1.0), (4, 4.0), (5, 2.0)];

    /// Estimator over fixed per-document values, reported as `[0, bound]`
    /// until bound refinement resolves them exactly.
    struct FixedEstimator {
        entries: Vec<(DocId, Score)>,
        position: usize,
        bound: Score,
    }

    impl FixedEstimator {
        fn new(entries: &[(DocId, Score)], bound: Score) -> Self {
            Self {
                entries: entries.to_vec(),
                position: 0,
                bound,
            }
        }

        fn exact(&self, doc: DocId) -> Score {
            self.entries
                .iter()
                .find(|&&(d, _)| d == doc)
                .map_or(0.0, |&(_, s)| s)
        }
    }

    impl ScoringContributor for FixedEstimator {
        fn current_candidate(&self) -> DocId {
            self.entries.get(self.position).map_or(TERMINATED, |e| e.0)
        }

        fn sync_to(&mut self, doc: DocId) {
            while self.current_candidate() < doc {
                self.position += 1;
            }
        }

        fn move_past(&mut self, doc: DocId) {
            while self.current_candidate() <= doc && self.current_candidate() != TERMINATED {
                self.position += 1;
            }
        }

        fn total_entries(&self) -> u64 {
            self.entries.len() as u64
        }

        fn weight(&self) -> Score {
            1.0
        }

        fn maximum_score(&self) -> Score {
            self.bound
        }
    }

    impl EstimatingScorer for FixedEstimator {
        fn estimate(&mut self, ctx: &mut ScoringContext, slot: usize) -> (Score, Score) {
            if self.current_candidate() == ctx.document {
                ctx.counts[slot] = 1;
                (0.0, self.bound)
            } else {
                (0.0, 0.0)
            }
        }

        fn adjust_estimate(&self, _ctx: &ScoringContext, doc: &mut EstimatedDocument, slot: usize) {
            if doc.counts[slot] == 1 {
                let exact = self.exact(doc.doc_id);
                doc.min += exact;
                doc.max += exact;
            }
        }
    }

    struct FixedRebuild(Vec<(DocId, Score)>);

    impl ExactRebuild for FixedRebuild {
        fn rebuild_exact(&self) -> Result<Vec<Box<dyn HardScorer>>> {
            Ok(vec![Box::new(ImpactScorer::new(
                ImpactList::new(self.0.clone()),
                1.0,
            ))])
        }
    }

    const SCENARIO_B_EXACT: [(DocId, Score); 3] = [(1, 0.5), (2, 0.9), (3, 0.1)];

    fn scenario_b() -> CompiledQuery {
        CompiledQuery::new(vec![
            impacts(&[(1, 2.0), (2, 2.0), (3, 2.0)]),
            Contributor::estimating(FixedEstimator::new(&SCENARIO_B_EXACT, 1.0)),
        ])
        .with_rebuild(FixedRebuild(SCENARIO_B_EXACT.to_vec()))
    }

    // ── Scenarios ────────────────────────────────────────────────────────

    #[test]
    fn test_single_sentinel_top_two() {
        let results = run(CompiledQuery::new(vec![impacts(&SCENARIO_A)]), &k(2));
        assert_eq!(pairs(&results), vec![(2, 5.0), (4, 4.0)]);
        assert_eq!(results.stats.candidates, 5);
    }

    #[test]
    fn test_estimator_resolves_to_exact_order() {
        let results = run(scenario_b(), &k(1));
        let top = pairs(&results);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].0, 2);
        assert!((top[0].1 - 2.9).abs() < 1e-5);
        // Docs 2 and 3 were held provisionally behind doc 1
        assert_eq!(results.stats.bottom_inserts, 2);

        let exhaustive = run_exhaustive(scenario_b(), &k(1));
        assert_eq!(exhaustive.documents[0].doc_id, 2);
        assert!((exhaustive.documents[0].score - top[0].1).abs() < 1e-5);
    }

    #[test]
    fn test_completion_rescoring() {
        let config = k(2).with_completion(true);
        let completed = run(scenario_b(), &config);
        let exhaustive = run_exhaustive(scenario_b(), &config);
        assert_eq!(completed.documents, exhaustive.documents);
        let ids: Vec<DocId> = completed.documents.iter().map(|d| d.doc_id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert!(completed.stats.completed >= 2);
    }

    #[test]
    fn test_completion_without_estimators_sorts_and_truncates() {
        let config = k(3).with_completion(true);
        let results = run(CompiledQuery::new(vec![impacts(&SCENARIO_A)]), &config);
        assert_eq!(pairs(&results), vec![(2, 5.0), (4, 4.0), (1, 3.0)]);
        assert_eq!(results.stats.completed, 0);
    }

    #[test]
    fn test_working_set() {
        let executor = PrunedExecutor::new(CompiledQuery::new(vec![impacts(&SCENARIO_A)]), &k(2))
            .unwrap()
            .with_working_set(vec![2, 4])
            .unwrap();
        let results = executor.execute().unwrap();
        assert_eq!(pairs(&results), vec![(2, 5.0), (4, 4.0)]);
        assert_eq!(results.stats.candidates, 2);
    }

    #[test]
    fn test_working_set_unsorted_and_unmatched() {
        let executor = PrunedExecutor::new(CompiledQuery::new(vec![impacts(&SCENARIO_A)]), &k(10))
            .unwrap()
            .with_working_set(vec![9, 4, 2, 4])
            .unwrap();
        let results = executor.execute().unwrap();
        // Doc 9 matches nothing and scores zero
        assert_eq!(pairs(&results), vec![(2, 5.0), (4, 4.0), (9, 0.0)]);
        assert_eq!(results.stats.candidates, 3);
    }

    #[test]
    fn test_large_soft_bound_never_truncates() {
        let query = || {
            CompiledQuery::new(vec![
                impacts(&SCENARIO_A),
                impacts(&[(2, 0.5), (3, 0.5), (6, 1000.0)]),
            ])
        };
        let results = run(query(), &k(2));
        assert_eq!(results.stats.truncated, 0);
        assert_eq!(results.stats.fully_scored, results.stats.candidates);
        assert_eq!(pairs(&results), vec![(6, 1000.0), (2, 5.5)]);
        assert_eq!(results.documents, run_exhaustive(query(), &k(2)).documents);
    }

    #[test]
    fn test_truncation_and_sentinel_shrink() {
        let query = || {
            CompiledQuery::new(vec![
                impacts(&[(1, 5.0), (2, 5.0), (3, 1.0), (4, 1.0)]),
                impacts(&(1..=10).map(|d| (d, 0.5)).collect::<Vec<(DocId, Score)>>()),
            ])
        };
        let results = run(query(), &k(1));
        assert_eq!(pairs(&results), vec![(1, 5.5)]);
        assert_eq!(results.stats.candidates, 4);
        // Doc 2 ties the threshold and is fully scored; docs 3 and 4 are cut short
        assert_eq!(results.stats.truncated, 2);
        assert_eq!(results.stats.sentinel_changes, 1);

        let exhaustive = run_exhaustive(query(), &k(1));
        assert_eq!(exhaustive.documents, results.documents);
        assert_eq!(exhaustive.stats.candidates, 10);
    }

    #[test]
    fn test_threshold_prunes_candidate_generation() {
        let query = || {
            CompiledQuery::new(vec![
                impacts(&[(1, 10.0), (2, 9.0)]),
                impacts(&(1..=100).map(|d| (d, 1.0)).collect::<Vec<(DocId, Score)>>()),
            ])
        };
        let results = run(query(), &k(2));
        assert_eq!(pairs(&results), vec![(1, 11.0), (2, 10.0)]);
        // Once the threshold reaches 10 only the short list drives candidates
        assert_eq!(results.stats.candidates, 2);
        assert_eq!(run_exhaustive(query(), &k(2)).stats.candidates, 100);
    }

    // ── Degenerate inputs ────────────────────────────────────────────────

    #[test]
    fn test_zero_limit_and_no_contributors() {
        let results = run(CompiledQuery::new(vec![impacts(&SCENARIO_A)]), &k(0));
        assert!(results.documents.is_empty());
        assert_eq!(results.stats.candidates, 0);

        let results = run(CompiledQuery::new(Vec::new()), &k(10));
        assert!(results.documents.is_empty());
    }

    #[test]
    fn test_empty_index() {
        let index = MemoryIndexBuilder::new().build();
        for seqdep in [false, true] {
            let query = QueryCompiler::new(&index)
                .with_sequential_dependence(seqdep)
                .compile("anything at all")
                .unwrap();
            let config = k(10).with_sequential_dependence(seqdep).with_dependency_aware(seqdep);
            assert!(run(query, &config).documents.is_empty());
        }
    }

    #[test]
    fn test_unbounded_limit_returns_all_matches() {
        let results = run(CompiledQuery::new(vec![impacts(&SCENARIO_A)]), &k(-1));
        assert_eq!(
            pairs(&results),
            vec![(2, 5.0), (4, 4.0), (1, 3.0), (5, 2.0), (3, 1.0)]
        );
    }

    #[test]
    fn test_single_contributor_every_strategy() {
        for strategy in SortStrategy::ALL {
            let config = k(3).with_sort(strategy.name());
            let results = run(CompiledQuery::new(vec![impacts(&SCENARIO_A)]), &config);
            assert_eq!(pairs(&results), vec![(2, 5.0), (4, 4.0), (1, 3.0)], "{strategy}");
        }
    }

    #[test]
    fn test_ties_prefer_smaller_doc_id() {
        let query = CompiledQuery::new(vec![impacts(&[(3, 1.0), (5, 2.0), (7, 1.0), (8, 1.0)])]);
        let results = run(query, &k(2));
        assert_eq!(pairs(&results), vec![(5, 2.0), (3, 1.0)]);
    }

    #[test]
    fn test_tied_estimate_keeps_smaller_doc_id() {
        // Doc 1 scores [1, 2] in the first pass and exactly 2; doc 2 scores exactly 2
        let query = || {
            CompiledQuery::new(vec![
                impacts(&[(1, 1.0), (2, 2.0)]),
                Contributor::estimating(FixedEstimator::new(&[(1, 1.0)], 1.0)),
            ])
            .with_rebuild(FixedRebuild(vec![(1, 1.0)]))
        };
        for completion in [false, true] {
            let config = k(1).with_completion(completion);
            let pruned = run(query(), &config);
            let exact = run_exhaustive(query(), &config);
            assert_eq!(pairs(&pruned), vec![(1, 2.0)], "completion={completion}");
            assert_eq!(pruned.documents, exact.documents, "completion={completion}");
        }
    }

    #[test]
    fn test_resolved_estimate_raises_threshold() {
        let query = || {
            CompiledQuery::new(vec![
                impacts(&[(1, 1.0), (2, 1.5), (3, 2.0)]),
                Contributor::estimating(FixedEstimator::new(&[(1, 2.0)], 2.0)),
            ])
            .with_rebuild(FixedRebuild(vec![(1, 2.0)]))
        };
        let results = run(query(), &k(1));
        assert_eq!(pairs(&results), vec![(1, 3.0)]);
        // Doc 1 is swapped back into the top heap before doc 3 arrives
        assert_eq!(results.stats.rebalanced, 1);
        assert_eq!(results.stats.top_inserts, 2);
        assert_eq!(results.documents, run_exhaustive(query(), &k(1)).documents);
    }

    #[test]
    fn test_threshold_rises_monotonically() {
        let scores: Vec<(DocId, Score)> = [5.0, 1.0, 4.0, 2.0, 6.0, 3.0, 7.0]
            .into_iter()
            .zip(1..)
            .map(|(score, doc)| (doc, score))
            .collect();
        let results = run(CompiledQuery::new(vec![impacts(&scores)]), &k(3));
        assert_eq!(pairs(&results), vec![(7, 7.0), (5, 6.0), (1, 5.0)]);
        // Threshold goes 1 -> 2 -> 4 -> 5; doc 6 (3.0) falls below 4
        assert_eq!(results.stats.threshold_changes, 4);
        assert_eq!(results.stats.top_evictions, 3);
        assert_eq!(results.stats.heap_misses, 1);
        assert_eq!(results.stats.fully_scored, 7);
    }

    #[test]
    fn test_idempotent() {
        let index = random_corpus(7, 200);
        let compile = || {
            QueryCompiler::new(&index)
                .with_sequential_dependence(true)
                .compile("alpha beta gamma")
                .unwrap()
        };
        let config = k(10).with_completion(true);
        let first = run(compile(), &config);
        let second = run(compile(), &config);
        assert_eq!(first.documents, second.documents);
        assert_eq!(first.stats, second.stats);
    }

    // ── Configuration errors ─────────────────────────────────────────────

    #[test]
    fn test_unknown_strategy_fails_before_scoring() {
        let result = PrunedExecutor::new(
            CompiledQuery::new(vec![impacts(&SCENARIO_A)]),
            &k(2).with_sort("fastest-first"),
        );
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_dependency_aware_requires_expansion() {
        let index = MemoryIndex::from_texts(["a b", "b a"]);
        let query = QueryCompiler::new(&index).compile("a b").unwrap();
        let config = k(2).with_dependency_aware(true);
        assert!(matches!(
            PrunedExecutor::new(query, &config),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_completion_rejects_working_set() {
        let mut executor =
            PrunedExecutor::new(scenario_b(), &k(1).with_completion(true)).unwrap();
        assert!(matches!(
            executor.define_working_set(vec![1, 2]),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_invalid_dependencies_rejected() {
        struct Dependent(FixedEstimator, Vec<usize>);

        impl ScoringContributor for Dependent {
            fn current_candidate(&self) -> DocId {
                self.0.current_candidate()
            }
            fn sync_to(&mut self, doc: DocId) {
                self.0.sync_to(doc)
            }
            fn move_past(&mut self, doc: DocId) {
                self.0.move_past(doc)
            }
            fn total_entries(&self) -> u64 {
                self.0.total_entries()
            }
            fn weight(&self) -> Score {
                self.0.weight()
            }
            fn maximum_score(&self) -> Score {
                self.0.maximum_score()
            }
            fn dependencies(&self) -> &[usize] {
                &self.1
            }
        }

        impl EstimatingScorer for Dependent {
            fn estimate(&mut self, ctx: &mut ScoringContext, slot: usize) -> (Score, Score) {
                self.0.estimate(ctx, slot)
            }
            fn adjust_estimate(&self, ctx: &ScoringContext, doc: &mut EstimatedDocument, slot: usize) {
                self.0.adjust_estimate(ctx, doc, slot)
            }
        }

        let config = k(2).with_dependency_aware(true);
        for deps in [vec![5], vec![1]] {
            let query = CompiledQuery::new(vec![
                impacts(&SCENARIO_A),
                Contributor::estimating(Dependent(FixedEstimator::new(&[(2, 0.5)], 1.0), deps)),
            ])
            .with_sequential_dependence(true);
            assert!(matches!(
                PrunedExecutor::new(query, &config),
                Err(Error::Query(_))
            ));
        }

        // A valid dependency stacks the estimator onto its anchor
        let query = CompiledQuery::new(vec![
            impacts(&SCENARIO_A),
            Contributor::estimating(Dependent(FixedEstimator::new(&[(2, 0.5)], 1.0), vec![0])),
        ])
        .with_sequential_dependence(true)
        .with_rebuild(FixedRebuild(vec![(2, 0.5)]));
        let executor = PrunedExecutor::new(query, &config.clone().with_completion(true)).unwrap();
        assert_eq!(executor.partition().len(), 1);
        assert_eq!(executor.partition().sentinels()[0].members, vec![0, 1]);
        let results = executor.execute().unwrap();
        assert_eq!(pairs(&results), vec![(2, 5.5), (4, 4.0)]);
    }

    // ── Exactness on random corpora ──────────────────────────────────────

    const VOCAB: [&str; 12] = [
        "alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta", "theta", "iota", "kappa",
        "lambda", "mu",
    ];

    /// Skewed term choice so that posting list lengths vary
    fn pick(rng: &mut StdRng) -> &'static str {
        let a = rng.random_range(0..VOCAB.len());
        let b = rng.random_range(0..VOCAB.len());
        VOCAB[a.min(b)]
    }

    fn random_corpus(seed: u64, num_docs: usize) -> MemoryIndex {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut builder = MemoryIndexBuilder::new();
        for _ in 0..num_docs {
            let len = rng.random_range(3..16);
            let tokens: Vec<&str> = (0..len).map(|_| pick(&mut rng)).collect();
            builder.add_document(tokens);
        }
        builder.build()
    }

    fn random_queries(seed: u64, count: usize) -> Vec<String> {
        let mut rng = StdRng::seed_from_u64(seed ^ 0x9e37_79b9);
        (0..count)
            .map(|_| {
                let len = rng.random_range(1..5);
                (0..len).map(|_| pick(&mut rng)).collect::<Vec<_>>().join(" ")
            })
            .collect()
    }

    fn assert_same_ranking(pruned: &[ScoredDocument], exact: &[ScoredDocument], context: &str) {
        assert_eq!(pruned.len(), exact.len(), "{context}");
        for (i, (p, e)) in pruned.iter().zip(exact).enumerate() {
            assert!(
                (p.score - e.score).abs() <= 1e-4,
                "{context}: rank {i}: {p:?} vs {e:?}"
            );
        }
    }

    #[test]
    fn test_hard_scorers_match_exhaustive() {
        for seed in 0..4 {
            let index = random_corpus(seed, 300);
            for text in random_queries(seed, 8) {
                let compile = || QueryCompiler::new(&index).compile(&text).unwrap();
                for strategy in SortStrategy::ALL {
                    for requested in [1, 3, 10, -1] {
                        let config = k(requested).with_sort(strategy.name());
                        let pruned = run(compile(), &config);
                        let exact = run_exhaustive(compile(), &config);
                        assert_eq!(
                            pruned.documents, exact.documents,
                            "seed={seed} query={text:?} strategy={strategy} k={requested}"
                        );
                        assert!(pruned.stats.candidates <= exact.stats.candidates);
                    }
                }
            }
        }
    }

    #[test]
    fn test_completion_matches_exhaustive() {
        for seed in 10..13 {
            let index = random_corpus(seed, 300);
            for text in random_queries(seed, 6) {
                let compile = || {
                    QueryCompiler::new(&index)
                        .with_sequential_dependence(true)
                        .with_weights(1.0, 0.5)
                        .compile(&text)
                        .unwrap()
                };
                for strategy in SortStrategy::ALL {
                    for dependency_aware in [false, true] {
                        for requested in [1, 5, 20] {
                            let config = k(requested)
                                .with_sort(strategy.name())
                                .with_dependency_aware(dependency_aware)
                                .with_completion(true);
                            let pruned = run(compile(), &config);
                            let exact = run_exhaustive(compile(), &config);
                            assert_same_ranking(
                                &pruned.documents,
                                &exact.documents,
                                &format!(
                                    "seed={seed} query={text:?} strategy={strategy} dep={dependency_aware} k={requested}"
                                ),
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_single_pass_scores_are_lower_bounds() {
        let index = random_corpus(21, 300);
        for text in random_queries(21, 6) {
            let compile = || {
                QueryCompiler::new(&index)
                    .with_sequential_dependence(true)
                    .compile(&text)
                    .unwrap()
            };
            let exact: FxHashMap<DocId, Score> = run_exhaustive(compile(), &k(-1))
                .documents
                .iter()
                .map(|d| (d.doc_id, d.score))
                .collect();
            let pruned = run(compile(), &k(10));
            let mut previous = Score::INFINITY;
            for doc in &pruned.documents {
                assert!(doc.score <= exact[&doc.doc_id] + 1e-4, "{text:?}: {doc:?}");
                assert!(doc.score <= previous);
                previous = doc.score;
            }
        }
    }
}
