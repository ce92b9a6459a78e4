//! Query compilation against a [`MemoryIndex`]
//!
//! A bag of query terms becomes one BM25 [`TermScorer`] per distinct known
//! term. With sequential dependence enabled, every adjacent pair of known
//! terms also becomes a [`WindowEstimator`] that depends on its two term
//! contributors; the [`ExactRebuild`] attached to the compiled query turns
//! those into exact [`WindowScorer`]s for completion.

use std::sync::Arc;

use log::debug;
use rustc_hash::FxHashMap;

use crate::Score;
use crate::error::{Error, Result};
use crate::index::{MemoryIndex, tokenize};
use crate::query::contributor::{Contributor, HardScorer};
use crate::query::term::TermScorer;
use crate::query::window::{WindowEstimator, WindowScorer};
use crate::structures::{DocumentLengths, PostingList};

/// Starting-potential group of term contributors
pub const UNIGRAM_GROUP: usize = 0;
/// Starting-potential group of window contributors
pub const WINDOW_GROUP: usize = 1;

/// Produces exact replacements for a query's estimating contributors
pub trait ExactRebuild: Send + Sync {
    fn rebuild_exact(&self) -> Result<Vec<Box<dyn HardScorer>>>;
}

/// Everything an executor needs to run one query
pub struct CompiledQuery {
    pub contributors: Vec<Contributor>,
    /// Per-group score offsets added to every candidate
    pub starting_potentials: Vec<Score>,
    pub lengths: Option<Arc<dyn DocumentLengths>>,
    /// Whether the query was expanded with dependent window features
    pub sequential_dependence: bool,
    pub rebuild: Option<Box<dyn ExactRebuild>>,
}

impl CompiledQuery {
    pub fn new(contributors: Vec<Contributor>) -> Self {
        Self {
            contributors,
            starting_potentials: Vec::new(),
            lengths: None,
            sequential_dependence: false,
            rebuild: None,
        }
    }

    pub fn with_lengths(mut self, lengths: Arc<dyn DocumentLengths>) -> Self {
        self.lengths = Some(lengths);
        self
    }

    pub fn with_starting_potentials(mut self, potentials: Vec<Score>) -> Self {
        self.starting_potentials = potentials;
        self
    }

    pub fn with_sequential_dependence(mut self, enabled: bool) -> Self {
        self.sequential_dependence = enabled;
        self
    }

    pub fn with_rebuild(mut self, rebuild: impl ExactRebuild + 'static) -> Self {
        self.rebuild = Some(Box::new(rebuild));
        self
    }

    pub fn len(&self) -> usize {
        self.contributors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contributors.is_empty()
    }

    pub fn num_estimators(&self) -> usize {
        self.contributors.iter().filter(|c| c.is_estimator()).count()
    }
}

impl std::fmt::Debug for CompiledQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledQuery")
            .field("contributors", &self.contributors)
            .field("starting_potentials", &self.starting_potentials)
            .field("sequential_dependence", &self.sequential_dependence)
            .field("rebuild", &self.rebuild.is_some())
            .finish()
    }
}

struct WindowSpec {
    lists: Vec<PostingList>,
    weight: Score,
}

/// Rebuilds window estimators as exact scorers, in compilation order
pub struct WindowRebuild {
    windows: Vec<WindowSpec>,
    width: u32,
    num_docs: u32,
    avg_doc_len: f32,
}

impl ExactRebuild for WindowRebuild {
    fn rebuild_exact(&self) -> Result<Vec<Box<dyn HardScorer>>> {
        Ok(self
            .windows
            .iter()
            .map(|w| {
                Box::new(WindowScorer::new(
                    &w.lists,
                    self.width,
                    self.num_docs,
                    self.avg_doc_len,
                    w.weight,
                )) as Box<dyn HardScorer>
            })
            .collect())
    }
}

pub struct QueryCompiler<'a> {
    index: &'a MemoryIndex,
    sequential_dependence: bool,
    term_weight: Score,
    window_weight: Score,
    window_width: u32,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(index: &'a MemoryIndex) -> Self {
        Self {
            index,
            sequential_dependence: false,
            term_weight: 0.85,
            window_weight: 0.15,
            window_width: 1,
        }
    }

    pub fn with_sequential_dependence(mut self, enabled: bool) -> Self {
        self.sequential_dependence = enabled;
        self
    }

    pub fn with_weights(mut self, term_weight: Score, window_weight: Score) -> Self {
        self.term_weight = term_weight;
        self.window_weight = window_weight;
        self
    }

    pub fn with_window_width(mut self, width: u32) -> Self {
        self.window_width = width;
        self
    }

    /// Tokenize and compile a free-text query
    pub fn compile(&self, text: &str) -> Result<CompiledQuery> {
        self.compile_terms(&tokenize(text))
    }

    /// Compile already normalized terms; unknown terms contribute nothing
    pub fn compile_terms<S: AsRef<str>>(&self, terms: &[S]) -> Result<CompiledQuery> {
        if !(self.term_weight >= 0.0 && self.window_weight >= 0.0) {
            return Err(Error::Query(format!(
                "weights must be non-negative: term={}, window={}",
                self.term_weight, self.window_weight
            )));
        }
        if self.window_width == 0 {
            return Err(Error::Query("window width must be at least 1".to_string()));
        }

        let num_docs = self.index.num_docs();
        let avg_doc_len = self.index.avg_doc_len();
        let mut contributors = Vec::new();
        let mut term_slots: FxHashMap<&str, usize> = FxHashMap::default();
        // Query position -> contributor index, None for unknown terms
        let mut positions = Vec::with_capacity(terms.len());

        for term in terms {
            let term = term.as_ref();
            let slot = match term_slots.get(term) {
                Some(&slot) => Some(slot),
                None => self.index.postings(term).map(|postings| {
                    contributors.push(Contributor::hard(TermScorer::new(
                        postings,
                        num_docs,
                        avg_doc_len,
                        self.term_weight,
                    )));
                    term_slots.insert(term, contributors.len() - 1);
                    contributors.len() - 1
                }),
            };
            positions.push(slot.map(|s| (s, term)));
        }

        let mut windows = Vec::new();
        if self.sequential_dependence {
            let mut seen: Vec<(usize, usize)> = Vec::new();
            for pair in positions.windows(2) {
                let (Some((a, term_a)), Some((b, term_b))) = (pair[0], pair[1]) else {
                    continue;
                };
                if seen.contains(&(a, b)) {
                    continue;
                }
                seen.push((a, b));
                let lists: Vec<PostingList> = [term_a, term_b]
                    .iter()
                    .filter_map(|t| self.index.postings(t).cloned())
                    .collect();
                let mut dependencies = vec![a, b];
                dependencies.dedup();
                contributors.push(Contributor::estimating(WindowEstimator::new(
                    &lists,
                    self.window_width,
                    dependencies,
                    num_docs,
                    avg_doc_len,
                    self.window_weight,
                )));
                windows.push(WindowSpec {
                    lists,
                    weight: self.window_weight,
                });
            }
        }

        debug!(
            "Compiled query: terms={}, term_contributors={}, windows={}, sequential_dependence={}",
            terms.len(),
            term_slots.len(),
            windows.len(),
            self.sequential_dependence
        );

        let potentials = vec![0.0; WINDOW_GROUP + 1];
        let query = CompiledQuery::new(contributors)
            .with_lengths(self.index.length_source())
            .with_starting_potentials(potentials)
            .with_sequential_dependence(self.sequential_dependence);
        Ok(if windows.is_empty() {
            query
        } else {
            query.with_rebuild(WindowRebuild {
                windows,
                width: self.window_width,
                num_docs,
                avg_doc_len,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> MemoryIndex {
        MemoryIndex::from_texts(["new york pizza", "york new", "pizza place", "new york"])
    }

    #[test]
    fn test_compile_terms_only() {
        let index = index();
        let query = QueryCompiler::new(&index).compile("New York unknown york").unwrap();
        assert_eq!(query.len(), 2);
        assert_eq!(query.num_estimators(), 0);
        assert!(query.rebuild.is_none());
        assert!(!query.sequential_dependence);
        assert_eq!(query.starting_potentials.len(), WINDOW_GROUP + 1);
        assert_eq!(query.starting_potentials[UNIGRAM_GROUP], 0.0);
    }

    #[test]
    fn test_compile_sequential_dependence() {
        let index = index();
        let query = QueryCompiler::new(&index)
            .with_sequential_dependence(true)
            .compile("new york pizza zebra new york")
            .unwrap();
        // Terms: new, york, pizza. Windows: new-york, york-pizza
        assert_eq!(query.len(), 5);
        assert_eq!(query.num_estimators(), 2);
        assert_eq!(query.contributors[3].dependencies(), &[0, 1]);
        assert_eq!(query.contributors[4].dependencies(), &[1, 2]);

        let exact = query.rebuild.as_ref().unwrap().rebuild_exact().unwrap();
        assert_eq!(exact.len(), 2);
        // new-york occurs in docs 0 and 3
        assert_eq!(exact[0].total_entries(), 2);
    }

    #[test]
    fn test_unknown_terms_compile_empty() {
        let index = index();
        let query = QueryCompiler::new(&index)
            .with_sequential_dependence(true)
            .compile("zebra unicorn")
            .unwrap();
        assert!(query.is_empty());
        assert!(query.rebuild.is_none());
    }

    #[test]
    fn test_invalid_weights() {
        let index = index();
        let result = QueryCompiler::new(&index).with_weights(-1.0, 0.5).compile("new");
        assert!(matches!(result, Err(Error::Query(_))));
    }
}
