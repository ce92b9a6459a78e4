//! In-memory posting lists with term positions and precomputed impacts
//!
//! Lists are immutable once built and share their storage through `Arc`, so
//! every scorer compiled for a query owns a cheap cursor over the same data.

use std::sync::Arc;

use crate::{DocId, Score, TermFreq};

/// Sentinel doc id of an exhausted cursor
pub const TERMINATED: DocId = DocId::MAX;

/// A posting entry: document plus the token positions of the term in it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub doc_id: DocId,
    pub positions: Vec<u32>,
}

impl Posting {
    #[inline]
    pub fn term_freq(&self) -> TermFreq {
        self.positions.len() as TermFreq
    }
}

/// Accumulates postings for one term during indexing
#[derive(Debug, Clone, Default)]
pub struct PostingListBuilder {
    postings: Vec<Posting>,
}

impl PostingListBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one occurrence, extending the last posting if it is the same doc
    pub fn add(&mut self, doc_id: DocId, position: u32) {
        if let Some(last) = self.postings.last_mut()
            && last.doc_id == doc_id
        {
            last.positions.push(position);
            return;
        }
        debug_assert!(
            self.postings.last().is_none_or(|p| p.doc_id < doc_id),
            "Postings must be added in sorted order"
        );
        self.postings.push(Posting {
            doc_id,
            positions: vec![position],
        });
    }

    pub fn build(self) -> PostingList {
        PostingList::from_sorted(self.postings)
    }
}

/// Immutable posting list with positions
#[derive(Debug, Clone)]
pub struct PostingList {
    postings: Arc<[Posting]>,
    max_term_freq: TermFreq,
}

impl PostingList {
    /// Build from postings in strictly increasing doc order
    pub fn from_sorted(postings: Vec<Posting>) -> Self {
        let max_term_freq = postings.iter().map(Posting::term_freq).max().unwrap_or(0);
        Self {
            postings: postings.into(),
            max_term_freq,
        }
    }

    /// Number of documents containing the term
    #[inline]
    pub fn doc_count(&self) -> u32 {
        self.postings.len() as u32
    }

    /// Total occurrences across the collection
    pub fn collection_freq(&self) -> u64 {
        self.postings.iter().map(|p| p.term_freq() as u64).sum()
    }

    #[inline]
    pub fn max_term_freq(&self) -> TermFreq {
        self.max_term_freq
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Posting> {
        self.postings.iter()
    }

    pub fn cursor(&self) -> PostingCursor {
        PostingCursor {
            postings: Arc::clone(&self.postings),
            position: 0,
        }
    }
}

/// Forward-only cursor over a [`PostingList`]
#[derive(Debug, Clone)]
pub struct PostingCursor {
    postings: Arc<[Posting]>,
    position: usize,
}

impl PostingCursor {
    /// Current document ID, or TERMINATED if exhausted
    #[inline]
    pub fn doc(&self) -> DocId {
        self.postings
            .get(self.position)
            .map_or(TERMINATED, |p| p.doc_id)
    }

    /// Term frequency at the current document (0 when exhausted)
    #[inline]
    pub fn term_freq(&self) -> TermFreq {
        self.postings
            .get(self.position)
            .map_or(0, Posting::term_freq)
    }

    /// Positions at the current document
    #[inline]
    pub fn positions(&self) -> &[u32] {
        self.postings
            .get(self.position)
            .map_or(&[], |p| p.positions.as_slice())
    }

    pub fn advance(&mut self) -> DocId {
        if self.position < self.postings.len() {
            self.position += 1;
        }
        self.doc()
    }

    /// Seek to the first document >= target
    pub fn seek(&mut self, target: DocId) -> DocId {
        let remaining = &self.postings[self.position.min(self.postings.len())..];
        self.position += remaining.partition_point(|p| p.doc_id < target);
        self.doc()
    }
}

/// Posting list of precomputed, non-negative per-document impacts
#[derive(Debug, Clone)]
pub struct ImpactList {
    entries: Arc<[(DocId, Score)]>,
    max_impact: Score,
}

impl ImpactList {
    /// Build from `(doc, impact)` pairs; sorted by doc, duplicates keep the last impact
    pub fn new(mut entries: Vec<(DocId, Score)>) -> Self {
        entries.sort_by_key(|&(doc, _)| doc);
        entries.reverse();
        entries.dedup_by_key(|&mut (doc, _)| doc);
        entries.reverse();
        debug_assert!(entries.iter().all(|&(_, s)| s >= 0.0));
        let max_impact = entries.iter().map(|&(_, s)| s).fold(0.0, Score::max);
        Self {
            entries: entries.into(),
            max_impact,
        }
    }

    #[inline]
    pub fn doc_count(&self) -> u32 {
        self.entries.len() as u32
    }

    #[inline]
    pub fn max_impact(&self) -> Score {
        self.max_impact
    }

    pub fn iter(&self) -> impl Iterator<Item = &(DocId, Score)> {
        self.entries.iter()
    }

    pub fn cursor(&self) -> ImpactCursor {
        ImpactCursor {
            entries: Arc::clone(&self.entries),
            position: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImpactCursor {
    entries: Arc<[(DocId, Score)]>,
    position: usize,
}

impl ImpactCursor {
    #[inline]
    pub fn doc(&self) -> DocId {
        self.entries
            .get(self.position)
            .map_or(TERMINATED, |&(doc, _)| doc)
    }

    #[inline]
    pub fn impact(&self) -> Score {
        self.entries.get(self.position).map_or(0.0, |&(_, s)| s)
    }

    pub fn advance(&mut self) -> DocId {
        if self.position < self.entries.len() {
            self.position += 1;
        }
        self.doc()
    }

    pub fn seek(&mut self, target: DocId) -> DocId {
        let remaining = &self.entries[self.position.min(self.entries.len())..];
        self.position += remaining.partition_point(|&(doc, _)| doc < target);
        self.doc()
    }
}
