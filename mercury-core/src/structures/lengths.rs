//! Per-document length lookup used by length-normalized scorers

use crate::DocId;

/// Source of document lengths, consulted once per scored candidate
pub trait DocumentLengths: Send + Sync {
    /// Length of `doc` in tokens (0 for unknown documents)
    fn length(&self, doc: DocId) -> u32;

    /// Mean length over the collection
    fn average(&self) -> f32;
}

/// Dense length table indexed by doc id
#[derive(Debug, Clone, Default)]
pub struct LengthTable {
    lengths: Vec<u32>,
    total: u64,
}

impl LengthTable {
    pub fn new(lengths: Vec<u32>) -> Self {
        let total = lengths.iter().map(|&l| l as u64).sum();
        Self { lengths, total }
    }

    pub fn num_docs(&self) -> u32 {
        self.lengths.len() as u32
    }

    pub fn total_length(&self) -> u64 {
        self.total
    }
}

impl DocumentLengths for LengthTable {
    #[inline]
    fn length(&self, doc: DocId) -> u32 {
        self.lengths.get(doc as usize).copied().unwrap_or(0)
    }

    fn average(&self) -> f32 {
        if self.lengths.is_empty() {
            0.0
        } else {
            self.total as f32 / self.lengths.len() as f32
        }
    }
}

impl DocumentLengths for Vec<u32> {
    #[inline]
    fn length(&self, doc: DocId) -> u32 {
        self.get(doc as usize).copied().unwrap_or(0)
    }

    fn average(&self) -> f32 {
        if self.is_empty() {
            0.0
        } else {
            self.iter().map(|&l| l as f64).sum::<f64>() as f32 / self.len() as f32
        }
    }
}
