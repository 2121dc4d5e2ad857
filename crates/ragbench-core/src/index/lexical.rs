//! Lexical backend: BM25 over an inverted index of token postings.
//!
//! ```text
//!                      tf × (k1 + 1)
//! score = Σ idf(t) × ─────────────────────────────────
//!                    tf + k1 × (1 − b + b × len / avgdl)
//!
//! idf(t) = ln(1 + (N − df + 0.5) / (df + 0.5))
//! ```
//!
//! Only chunks containing at least one query term are scored.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::tokenize::tokenize;
use super::{BackendKind, Ranker};
use crate::error::Result;
use crate::models::Chunk;

const K1: f64 = 1.2;
const B: f64 = 0.75;

pub struct LexicalRanker {
    /// term → [(ordinal, term frequency)]
    postings: HashMap<String, Vec<(usize, u32)>>,
    doc_lens: Vec<usize>,
    avg_len: f64,
}

impl LexicalRanker {
    pub fn new(chunks: &[Chunk]) -> Self {
        let mut postings: HashMap<String, Vec<(usize, u32)>> = HashMap::new();
        let mut doc_lens = Vec::with_capacity(chunks.len());

        for (ordinal, chunk) in chunks.iter().enumerate() {
            let tokens = tokenize(&chunk.text);
            doc_lens.push(tokens.len());
            let mut tf: HashMap<String, u32> = HashMap::new();
            for t in tokens {
                *tf.entry(t).or_insert(0) += 1;
            }
            for (term, count) in tf {
                postings.entry(term).or_default().push((ordinal, count));
            }
        }

        let total: usize = doc_lens.iter().sum();
        let avg_len = if doc_lens.is_empty() {
            0.0
        } else {
            total as f64 / doc_lens.len() as f64
        };

        Self {
            postings,
            doc_lens,
            avg_len,
        }
    }

    fn idf(&self, df: usize) -> f64 {
        let n = self.doc_lens.len() as f64;
        let df = df as f64;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }
}

#[async_trait]
impl Ranker for LexicalRanker {
    fn kind(&self) -> BackendKind {
        BackendKind::Lexical
    }

    async fn rank(&self, query: &str, _chunks: &[Arc<Chunk>]) -> Result<Vec<(usize, f64)>> {
        let terms: HashSet<String> = tokenize(query).into_iter().collect();
        let mut scores: HashMap<usize, f64> = HashMap::new();

        for term in &terms {
            let Some(list) = self.postings.get(term) else {
                continue;
            };
            let idf = self.idf(list.len());
            for &(ordinal, tf) in list {
                let tf = f64::from(tf);
                let len_norm = if self.avg_len > 0.0 {
                    self.doc_lens[ordinal] as f64 / self.avg_len
                } else {
                    1.0
                };
                let denom = tf + K1 * (1.0 - B + B * len_norm);
                *scores.entry(ordinal).or_insert(0.0) += idf * tf * (K1 + 1.0) / denom;
            }
        }

        Ok(scores.into_iter().collect())
    }
}
