//! In-memory inverted index
//!
//! Holds one text field: a term dictionary of positional posting lists,
//! a dense document length table, and the collection statistics the
//! BM25 scorers need. Document ids are assigned densely from 0 in
//! insertion order, so postings are built already sorted.

use std::sync::Arc;

use log::debug;
use rustc_hash::FxHashMap;

use crate::DocId;
use crate::structures::{DocumentLengths, LengthTable, PostingList, PostingListBuilder};

/// Lowercase and split on anything that is not alphanumeric
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[derive(Debug, Default)]
pub struct MemoryIndexBuilder {
    postings: FxHashMap<String, PostingListBuilder>,
    lengths: Vec<u32>,
}

impl MemoryIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an already tokenized document, returning its id
    pub fn add_document<I, S>(&mut self, tokens: I) -> DocId
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let doc_id = self.lengths.len() as DocId;
        let mut position = 0u32;
        for token in tokens {
            self.postings
                .entry(token.as_ref().to_string())
                .or_default()
                .add(doc_id, position);
            position += 1;
        }
        self.lengths.push(position);
        doc_id
    }

    /// Tokenize and add a document
    pub fn add_text(&mut self, text: &str) -> DocId {
        self.add_document(tokenize(text))
    }

    pub fn num_docs(&self) -> u32 {
        self.lengths.len() as u32
    }

    pub fn build(self) -> MemoryIndex {
        let terms: FxHashMap<String, PostingList> = self
            .postings
            .into_iter()
            .map(|(term, builder)| (term, builder.build()))
            .collect();
        let lengths = Arc::new(LengthTable::new(self.lengths));
        debug!(
            "Built MemoryIndex: num_docs={}, num_terms={}, avg_doc_len={:.2}",
            lengths.num_docs(),
            terms.len(),
            lengths.average()
        );
        MemoryIndex { terms, lengths }
    }
}

/// Immutable single-field index
#[derive(Debug, Clone)]
pub struct MemoryIndex {
    terms: FxHashMap<String, PostingList>,
    lengths: Arc<LengthTable>,
}

impl MemoryIndex {
    pub fn builder() -> MemoryIndexBuilder {
        MemoryIndexBuilder::new()
    }

    /// Build an index from raw texts, one document per entry
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = MemoryIndexBuilder::new();
        for text in texts {
            builder.add_text(text.as_ref());
        }
        builder.build()
    }

    pub fn postings(&self, term: &str) -> Option<&PostingList> {
        self.terms.get(term)
    }

    pub fn doc_freq(&self, term: &str) -> u32 {
        self.terms.get(term).map_or(0, PostingList::doc_count)
    }

    pub fn num_docs(&self) -> u32 {
        self.lengths.num_docs()
    }

    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    pub fn avg_doc_len(&self) -> f32 {
        self.lengths.average()
    }

    pub fn lengths(&self) -> Arc<LengthTable> {
        Arc::clone(&self.lengths)
    }

    /// Length table as a shareable scoring source
    pub fn length_source(&self) -> Arc<dyn DocumentLengths> {
        self.lengths.clone()
    }
}
