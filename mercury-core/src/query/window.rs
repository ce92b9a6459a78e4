//! Ordered-window (phrase) features
//!
//! A window matches wherever its terms occur in order, each within `width`
//! positions of the previous one (`width = 1` is an exact phrase). The index
//! stores no statistics for windows, so the first pass scores them with
//! [`WindowEstimator`], which brackets the unknown document frequency, and
//! completion swaps in [`WindowScorer`], which resolves it with a full scan.

use crate::query::bm25::{bm25_idf, bm25_score, bm25_upper_bound};
use crate::query::context::ScoringContext;
use crate::query::contributor::{EstimatingScorer, HardScorer, ScoringContributor};
use crate::query::document::EstimatedDocument;
use crate::structures::{PostingCursor, PostingList, TERMINATED};
use crate::{DocId, Score};

/// Conjunction of term cursors positioned on documents containing the window
pub struct WindowCursor {
    cursors: Vec<PostingCursor>,
    width: u32,
    doc: DocId,
    count: u32,
}

impl WindowCursor {
    pub fn new(lists: &[PostingList], width: u32) -> Self {
        let mut cursor = Self {
            cursors: lists.iter().map(PostingList::cursor).collect(),
            width: width.max(1),
            doc: 0,
            count: 0,
        };
        cursor.find_match(0);
        cursor
    }

    #[inline]
    pub fn doc(&self) -> DocId {
        self.doc
    }

    /// Window occurrences in the current document
    #[inline]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Move to the first matching document >= target
    pub fn seek(&mut self, target: DocId) -> DocId {
        if self.doc < target {
            self.find_match(target);
        }
        self.doc
    }

    pub fn advance(&mut self) -> DocId {
        if self.doc != TERMINATED {
            self.find_match(self.doc.saturating_add(1));
        }
        self.doc
    }

    /// Number of documents containing the window
    pub fn count_documents(lists: &[PostingList], width: u32) -> u32 {
        let mut cursor = Self::new(lists, width);
        let mut df = 0;
        while cursor.doc() != TERMINATED {
            df += 1;
            cursor.advance();
        }
        df
    }

    fn find_match(&mut self, mut target: DocId) {
        loop {
            let doc = self.align(target);
            if doc == TERMINATED {
                self.doc = TERMINATED;
                self.count = 0;
                return;
            }
            let count = self.count_windows();
            if count > 0 {
                self.doc = doc;
                self.count = count;
                return;
            }
            target = doc.saturating_add(1);
        }
    }

    /// First document >= target containing every term
    fn align(&mut self, target: DocId) -> DocId {
        if self.cursors.is_empty() || target == TERMINATED {
            return TERMINATED;
        }
        let mut candidate = target;
        loop {
            let mut max_doc = candidate;
            for cursor in &mut self.cursors {
                let doc = cursor.seek(candidate);
                if doc == TERMINATED {
                    return TERMINATED;
                }
                max_doc = max_doc.max(doc);
            }
            if max_doc == candidate {
                return candidate;
            }
            candidate = max_doc;
        }
    }

    /// Count start positions of the first term that extend to a full window
    fn count_windows(&self) -> u32 {
        let Some((first, rest)) = self.cursors.split_first() else {
            return 0;
        };
        let mut count = 0;
        'starts: for &start in first.positions() {
            let mut prev = start;
            for cursor in rest {
                let positions = cursor.positions();
                let next = positions.partition_point(|&p| p <= prev);
                match positions.get(next) {
                    Some(&pos) if pos - prev <= self.width => prev = pos,
                    _ => continue 'starts,
                }
            }
            count += 1;
        }
        count
    }
}

fn max_window_count(lists: &[PostingList]) -> u32 {
    lists.first().map_or(0, PostingList::max_term_freq)
}

/// First-pass window feature with an interval-bounded document frequency.
///
/// The df lies between the number of matching documents observed so far and
/// the smallest component df. Scores use BM25 over the window count.
pub struct WindowEstimator {
    window: WindowCursor,
    dependencies: Vec<usize>,
    weight: Score,
    num_docs: f32,
    avg_doc_len: f32,
    df_high: u32,
    observed: u32,
    last_observed: Option<DocId>,
    max_count: u32,
    max_score: Score,
    entries: u64,
}

impl WindowEstimator {
    /// `dependencies` are the indices of the component term contributors
    pub fn new(
        lists: &[PostingList],
        width: u32,
        dependencies: Vec<usize>,
        num_docs: u32,
        avg_doc_len: f32,
        weight: Score,
    ) -> Self {
        let df_high = lists.iter().map(PostingList::doc_count).min().unwrap_or(0);
        let max_count = max_window_count(lists);
        let num_docs = num_docs as f32;
        Self {
            window: WindowCursor::new(lists, width),
            dependencies,
            weight,
            num_docs,
            avg_doc_len,
            df_high,
            observed: 0,
            last_observed: None,
            max_count,
            max_score: bm25_upper_bound(max_count as f32, bm25_idf(1.0, num_docs)),
            entries: df_high as u64,
        }
    }

    /// Current `[low, high]` bracket of the document frequency
    pub fn df_bounds(&self) -> (u32, u32) {
        let high = self.df_high.max(1);
        (self.observed.clamp(1, high), high)
    }

    fn bounds(&self, count: u32, length: u32) -> (Score, Score) {
        if count == 0 {
            return (0.0, 0.0);
        }
        let (df_low, df_high) = self.df_bounds();
        let tf = count as f32;
        let len = length as f32;
        let lo = bm25_score(tf, bm25_idf(df_high as f32, self.num_docs), len, self.avg_doc_len);
        let hi = bm25_score(tf, bm25_idf(df_low as f32, self.num_docs), len, self.avg_doc_len);
        (self.weight * lo, self.weight * hi)
    }
}

impl ScoringContributor for WindowEstimator {
    #[inline]
    fn current_candidate(&self) -> DocId {
        self.window.doc()
    }

    fn sync_to(&mut self, doc: DocId) {
        self.window.seek(doc);
    }

    fn move_past(&mut self, doc: DocId) {
        self.window.seek(doc.saturating_add(1));
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

    fn dependencies(&self) -> &[usize] {
        &self.dependencies
    }
}

impl EstimatingScorer for WindowEstimator {
    fn estimate(&mut self, ctx: &mut ScoringContext, slot: usize) -> (Score, Score) {
        let count = if self.window.doc() == ctx.document {
            self.window.count()
        } else {
            0
        };
        if count > 0 && self.last_observed != Some(ctx.document) {
            self.observed += 1;
            self.last_observed = Some(ctx.document);
        }
        if let Some(snapshot) = ctx.counts.get_mut(slot) {
            *snapshot = count.min(u16::MAX as u32) as u16;
        }
        self.bounds(count, ctx.length)
    }

    fn adjust_estimate(&self, _ctx: &ScoringContext, doc: &mut EstimatedDocument, slot: usize) {
        let snapshot = doc.counts.get(slot).copied().unwrap_or(0);
        let (lo, mut hi) = self.bounds(snapshot as u32, doc.length);
        if snapshot == u16::MAX {
            // Saturated snapshot, fall back to the largest possible count
            hi = hi.max(self.bounds(self.max_count, doc.length).1);
        }
        doc.min += lo;
        doc.max += hi;
    }
}

/// Exact window scorer with the document frequency resolved by a full scan
pub struct WindowScorer {
    window: WindowCursor,
    weight: Score,
    idf: f32,
    avg_doc_len: f32,
    max_score: Score,
    entries: u64,
}

impl WindowScorer {
    pub fn new(lists: &[PostingList], width: u32, num_docs: u32, avg_doc_len: f32, weight: Score) -> Self {
        let df = WindowCursor::count_documents(lists, width);
        let idf = bm25_idf(df as f32, num_docs as f32);
        let max_score = if df == 0 {
            0.0
        } else {
            bm25_upper_bound(max_window_count(lists) as f32, idf)
        };
        Self {
            window: WindowCursor::new(lists, width),
            weight,
            idf,
            avg_doc_len,
            max_score,
            entries: df as u64,
        }
    }
}

impl ScoringContributor for WindowScorer {
    #[inline]
    fn current_candidate(&self) -> DocId {
        self.window.doc()
    }

    fn sync_to(&mut self, doc: DocId) {
        self.window.seek(doc);
    }

    fn move_past(&mut self, doc: DocId) {
        self.window.seek(doc.saturating_add(1));
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

impl HardScorer for WindowScorer {
    fn delta_score(&mut self, ctx: &mut ScoringContext) {
        let actual = if self.window.doc() == ctx.document {
            bm25_score(
                self.window.count() as f32,
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
