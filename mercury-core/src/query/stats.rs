//! Execution counters

use serde::{Deserialize, Serialize};

/// Work done by one query execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStats {
    /// Candidates selected by the merge loop or the working set
    pub candidates: u64,
    pub fully_scored: u64,
    /// Candidates abandoned because their upper bound fell to the threshold
    pub truncated: u64,
    pub hard_scores: u64,
    pub estimates: u64,
    pub top_inserts: u64,
    pub top_evictions: u64,
    pub bottom_inserts: u64,
    pub bottom_evictions: u64,
    /// Fully scored candidates that entered neither heap
    pub heap_misses: u64,
    /// Provisional candidates promoted over a confirmed one by a sweep
    pub rebalanced: u64,
    pub threshold_changes: u64,
    pub sentinel_changes: u64,
    pub peak_heap_size: usize,
    /// Candidates re-scored by the second pass
    pub completed: u64,
}

impl ExecutionStats {
    pub fn merge(&mut self, other: &ExecutionStats) {
        self.candidates += other.candidates;
        self.fully_scored += other.fully_scored;
        self.truncated += other.truncated;
        self.hard_scores += other.hard_scores;
        self.estimates += other.estimates;
        self.top_inserts += other.top_inserts;
        self.top_evictions += other.top_evictions;
        self.bottom_inserts += other.bottom_inserts;
        self.bottom_evictions += other.bottom_evictions;
        self.heap_misses += other.heap_misses;
        self.rebalanced += other.rebalanced;
        self.threshold_changes += other.threshold_changes;
        self.sentinel_changes += other.sentinel_changes;
        self.peak_heap_size = self.peak_heap_size.max(other.peak_heap_size);
        self.completed += other.completed;
    }
}
