//! Top-k collectors
//!
//! - `SplitHeapCollector`: first-pass collector holding confirmed candidates
//!   (top heap, ordered by lower bound) and provisional ones (bottom heap,
//!   ordered by upper bound) whose estimator intervals still straddle the
//!   admission threshold
//! - `ExactCollector`: plain bounded min-heap for exactly scored documents

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use log::trace;

use crate::query::context::ScoringContext;
use crate::query::document::{EstimatedDocument, ScoredDocument, rank_estimated, sort_scored};
use crate::query::stats::ExecutionStats;
use crate::{DocId, Score};

fn heap_capacity(limit: Option<usize>) -> usize {
    // Cap capacity to avoid allocation overflow for very large k
    limit.map_or(1024, |k| k.saturating_add(1).min(1_000_000))
}

/// Top heap entry; the heap's peek is the weakest confirmed candidate
struct TopEntry(EstimatedDocument);

impl Ord for TopEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.cmp_confirmed(&self.0)
    }
}

impl PartialOrd for TopEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for TopEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TopEntry {}

/// Bottom heap entry; the heap's peek has the lowest upper bound
struct BottomEntry(EstimatedDocument);

impl Ord for BottomEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.cmp_potential(&self.0)
    }
}

impl PartialOrd for BottomEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for BottomEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for BottomEntry {}

/// Outcome of offering a fully scored candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Inserted while the top heap had room; `threshold_set` once it filled up
    Filled { threshold_set: bool },
    /// Displaced the weakest confirmed candidate into the bottom heap
    Promoted { threshold_raised: bool },
    /// Kept in the bottom heap only
    Provisional,
    Rejected,
}

pub struct SplitHeapCollector {
    top: BinaryHeap<TopEntry>,
    bottom: BinaryHeap<BottomEntry>,
    limit: Option<usize>,
}

impl SplitHeapCollector {
    /// `limit` of `None` keeps every offered candidate
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            top: BinaryHeap::with_capacity(heap_capacity(limit)),
            bottom: BinaryHeap::new(),
            limit,
        }
    }

    #[inline]
    fn is_full(&self) -> bool {
        self.limit.is_some_and(|k| self.top.len() >= k)
    }

    /// Lower bound of the weakest confirmed candidate once the top heap is full
    pub fn threshold(&self) -> Score {
        match self.top.peek() {
            Some(weakest) if self.is_full() => weakest.0.lower_bound(),
            _ => Score::NEG_INFINITY,
        }
    }

    pub fn len(&self) -> usize {
        self.top.len() + self.bottom.len()
    }

    pub fn is_empty(&self) -> bool {
        self.top.is_empty() && self.bottom.is_empty()
    }

    pub fn top_len(&self) -> usize {
        self.top.len()
    }

    pub fn bottom_len(&self) -> usize {
        self.bottom.len()
    }

    /// Offer a fully scored candidate against `ctx.min_candidate_score`,
    /// raising the threshold when the confirmed set improves.
    pub fn offer(
        &mut self,
        doc: EstimatedDocument,
        ctx: &mut ScoringContext,
        stats: &mut ExecutionStats,
    ) -> Admission {
        let doc_id = doc.doc_id;
        let admission = if !self.is_full() {
            self.top.push(TopEntry(doc));
            stats.top_inserts += 1;
            Admission::Filled {
                threshold_set: self.raise_threshold(ctx, stats),
            }
        } else if doc.lower_bound() > ctx.min_candidate_score {
            self.top.push(TopEntry(doc));
            stats.top_inserts += 1;
            if let Some(TopEntry(evicted)) = self.top.pop() {
                stats.top_evictions += 1;
                self.bottom.push(BottomEntry(evicted));
                stats.bottom_inserts += 1;
            }
            let threshold_raised = self.raise_threshold(ctx, stats);
            self.trim_bottom(ctx.min_candidate_score, stats);
            Admission::Promoted { threshold_raised }
        } else if self.can_still_enter(&doc, ctx.min_candidate_score) {
            self.bottom.push(BottomEntry(doc));
            stats.bottom_inserts += 1;
            Admission::Provisional
        } else {
            stats.heap_misses += 1;
            Admission::Rejected
        };
        stats.peak_heap_size = stats.peak_heap_size.max(self.len());
        trace!(
            "Offered doc={}: {:?}, threshold={:.4}",
            doc_id, admission, ctx.min_candidate_score
        );
        admission
    }

    /// Refine every retained candidate, swap provisional candidates that now
    /// rank ahead of confirmed ones into the top heap, then raise the
    /// threshold and drop provisional candidates that can no longer be
    /// admitted. Returns whether the threshold rose.
    pub fn tighten<F>(
        &mut self,
        ctx: &mut ScoringContext,
        stats: &mut ExecutionStats,
        mut refine: F,
    ) -> bool
    where
        F: FnMut(&ScoringContext, &mut EstimatedDocument),
    {
        if self.is_empty() {
            return false;
        }
        let mut top = std::mem::take(&mut self.top).into_vec();
        for entry in &mut top {
            refine(ctx, &mut entry.0);
        }
        self.top = BinaryHeap::from(top);

        let mut bottom = std::mem::take(&mut self.bottom).into_vec();
        for entry in &mut bottom {
            refine(ctx, &mut entry.0);
        }
        // Best provisional candidate last
        bottom.sort_unstable_by(|a, b| a.0.cmp_confirmed(&b.0));
        self.rebalance(&mut bottom, stats);
        let raised = self.raise_threshold(ctx, stats);

        let threshold = ctx.min_candidate_score;
        let before = bottom.len();
        bottom.retain(|entry| self.can_still_enter(&entry.0, threshold));
        stats.bottom_evictions += (before - bottom.len()) as u64;
        self.bottom = BinaryHeap::from(bottom);
        raised
    }

    /// Swap the best provisional candidate with the weakest confirmed one
    /// while it ranks ahead. `bottom` is sorted by `cmp_confirmed` ascending
    /// and stays sorted.
    fn rebalance(&mut self, bottom: &mut Vec<BottomEntry>, stats: &mut ExecutionStats) {
        loop {
            let ahead = match (bottom.last(), self.top.peek()) {
                (Some(best), Some(weakest)) => {
                    best.0.cmp_confirmed(&weakest.0) == Ordering::Greater
                }
                _ => false,
            };
            if !ahead {
                return;
            }
            let (Some(BottomEntry(promoted)), Some(TopEntry(demoted))) =
                (bottom.pop(), self.top.pop())
            else {
                return;
            };
            trace!(
                "Rebalanced doc={} over doc={}",
                promoted.doc_id, demoted.doc_id
            );
            self.top.push(TopEntry(promoted));
            let at = bottom.partition_point(|e| e.0.cmp_confirmed(&demoted) == Ordering::Less);
            bottom.insert(at, BottomEntry(demoted));
            stats.rebalanced += 1;
        }
    }

    /// Whether a provisional candidate can still reach the final top-k.
    /// Equal scores go to the smaller doc id, so an upper bound equal to the
    /// threshold survives while a confirmed document on the threshold has a
    /// larger id.
    fn can_still_enter(&self, doc: &EstimatedDocument, threshold: Score) -> bool {
        let upper = doc.upper_bound();
        upper > threshold
            || (upper == threshold
                && self
                    .top
                    .iter()
                    .any(|e| e.0.lower_bound() <= threshold && e.0.doc_id > doc.doc_id))
    }

    /// Set the threshold to the weakest confirmed lower bound if that is higher
    fn raise_threshold(&self, ctx: &mut ScoringContext, stats: &mut ExecutionStats) -> bool {
        let threshold = self.threshold();
        if threshold > ctx.min_candidate_score {
            ctx.min_candidate_score = threshold;
            stats.threshold_changes += 1;
            true
        } else {
            false
        }
    }

    fn trim_bottom(&mut self, threshold: Score, stats: &mut ExecutionStats) {
        while let Some(weakest) = self.bottom.peek()
            && !self.can_still_enter(&weakest.0, threshold)
        {
            self.bottom.pop();
            stats.bottom_evictions += 1;
        }
    }

    /// Every retained candidate, confirmed and provisional, in no particular order
    pub fn into_candidates(self) -> Vec<EstimatedDocument> {
        let mut docs: Vec<EstimatedDocument> = self.top.into_vec().into_iter().map(|e| e.0).collect();
        docs.extend(self.bottom.into_vec().into_iter().map(|e| e.0));
        docs
    }

    /// Retained candidates best-first, truncated to the limit
    pub fn into_ranked(self) -> Vec<EstimatedDocument> {
        let limit = self.limit;
        rank_estimated(self.into_candidates(), limit)
    }
}

/// Entry for the exact min-heap
#[derive(Clone, Copy)]
struct HeapEntry {
    doc_id: DocId,
    score: Score,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Weakest on top: lowest score, then largest doc id
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.doc_id.cmp(&other.doc_id))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Bounded top-k collector for exact scores.
///
/// Documents must be inserted in ascending doc id order, at most once each,
/// for ties to resolve towards the smaller doc id.
pub struct ExactCollector {
    heap: BinaryHeap<HeapEntry>,
    limit: Option<usize>,
}

impl ExactCollector {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(heap_capacity(limit)),
            limit,
        }
    }

    #[inline]
    fn is_full(&self) -> bool {
        self.limit.is_some_and(|k| self.heap.len() >= k)
    }

    /// Minimum score to enter, NEG_INFINITY while there is room
    #[inline]
    pub fn threshold(&self) -> Score {
        match self.heap.peek() {
            Some(weakest) if self.is_full() => weakest.score,
            _ => Score::NEG_INFINITY,
        }
    }

    /// Returns true if the document was kept
    pub fn insert(&mut self, doc_id: DocId, score: Score) -> bool {
        if self.limit == Some(0) {
            return false;
        }
        if !self.is_full() {
            self.heap.push(HeapEntry { doc_id, score });
            true
        } else if score > self.threshold() {
            self.heap.push(HeapEntry { doc_id, score });
            self.heap.pop();
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn into_sorted_results(self) -> Vec<ScoredDocument> {
        let mut results: Vec<ScoredDocument> = self
            .heap
            .into_vec()
            .into_iter()
            .map(|e| ScoredDocument::new(e.doc_id, e.score))
            .collect();
        sort_scored(&mut results);
        results
    }
}
