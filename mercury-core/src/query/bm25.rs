//! BM25 scoring functions shared by term and window contributors
//!
//! Scores are unweighted; contributors multiply by their query weight.

use crate::Score;

/// Term frequency saturation
pub const BM25_K1: f32 = 1.2;

/// Length normalization strength
pub const BM25_B: f32 = 0.75;

/// BM25 score of `tf` occurrences in a document of `doc_len` tokens
#[inline]
pub fn bm25_score(tf: f32, idf: f32, doc_len: f32, avg_doc_len: f32) -> Score {
    if tf <= 0.0 {
        return 0.0;
    }
    let length_norm = 1.0 - BM25_B + BM25_B * (doc_len / avg_doc_len.max(1.0));
    idf * (tf * (BM25_K1 + 1.0)) / (tf + BM25_K1 * length_norm)
}

/// Admissible maximum of [`bm25_score`] over any document: the largest
/// frequency in the shortest possible document.
#[inline]
pub fn bm25_upper_bound(max_tf: f32, idf: f32) -> Score {
    bm25_score(max_tf, idf, 0.0, 1.0)
}

/// BM25 idf, always positive and decreasing in `doc_freq`
#[inline]
pub fn bm25_idf(doc_freq: f32, total_docs: f32) -> f32 {
    ((total_docs - doc_freq + 0.5) / (doc_freq + 0.5) + 1.0).ln()
}
