//! BM25 relevance scoring.

use serde::{Deserialize, Serialize};

/// BM25 parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25 {
    /// Term frequency saturation.
    pub k1: f32,

    /// Field length normalization.
    pub b: f32,
}

impl Default for Bm25 {
    fn default() -> Self {
        Bm25 { k1: 1.2, b: 0.75 }
    }
}

impl Bm25 {
    /// Inverse document frequency of a term found in `doc_freq` of
    /// `doc_count` documents. Always positive.
    pub fn idf(&self, doc_count: u64, doc_freq: u64) -> f32 {
        let n = doc_count as f32;
        let df = doc_freq as f32;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    /// Score of one clause matching `freq` times in a field of `field_length`
    /// tokens, where fields average `avg_length` tokens.
    pub fn score(&self, freq: f32, idf: f32, field_length: f32, avg_length: f32) -> f32 {
        if freq <= 0.0 {
            return 0.0;
        }
        let norm = if avg_length > 0.0 {
            1.0 - self.b + self.b * (field_length / avg_length)
        } else {
            1.0
        };
        idf * (freq * (self.k1 + 1.0)) / (freq + self.k1 * norm)
    }
}
