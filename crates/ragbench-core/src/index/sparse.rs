//! Sparse-vector backend: TF-IDF bag-of-words vectors with cosine scoring.
//!
//! Each chunk becomes an L2-normalized sparse vector of
//! `tf × idf` weights with the smoothed `idf(t) = ln((1 + N) / (1 + df)) + 1`.
//! A query is vectorized against the same vocabulary; terms unseen at
//! build time are ignored. Only chunks with a positive dot product are
//! returned.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use super::tokenize::tokenize;
use super::{BackendKind, Ranker};
use crate::error::Result;
use crate::models::Chunk;

/// `(term id, weight)` pairs sorted by term id.
type SparseVec = Vec<(usize, f64)>;

pub struct SparseRanker {
    vocab: HashMap<String, usize>,
    idf: Vec<f64>,
    vectors: Vec<SparseVec>,
}

impl SparseRanker {
    pub fn new(chunks: &[Chunk]) -> Self {
        let mut vocab: HashMap<String, usize> = HashMap::new();
        let mut df: Vec<usize> = Vec::new();
        let mut counts: Vec<HashMap<usize, f64>> = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            let mut tf: HashMap<usize, f64> = HashMap::new();
            for token in tokenize(&chunk.text) {
                let next_id = vocab.len();
                let id = *vocab.entry(token).or_insert(next_id);
                if id == df.len() {
                    df.push(0);
                }
                *tf.entry(id).or_insert(0.0) += 1.0;
            }
            for id in tf.keys() {
                df[*id] += 1;
            }
            counts.push(tf);
        }

        let n = chunks.len() as f64;
        let idf: Vec<f64> = df
            .iter()
            .map(|&d| ((1.0 + n) / (1.0 + d as f64)).ln() + 1.0)
            .collect();

        let vectors = counts
            .into_iter()
            .map(|tf| normalize(tf.into_iter().map(|(id, c)| (id, c * idf[id])).collect()))
            .collect();

        Self {
            vocab,
            idf,
            vectors,
        }
    }

    fn vectorize(&self, text: &str) -> SparseVec {
        let mut tf: HashMap<usize, f64> = HashMap::new();
        for token in tokenize(text) {
            if let Some(&id) = self.vocab.get(&token) {
                *tf.entry(id).or_insert(0.0) += 1.0;
            }
        }
        normalize(
            tf.into_iter()
                .map(|(id, c)| (id, c * self.idf[id]))
                .collect(),
        )
    }
}

fn normalize(mut v: SparseVec) -> SparseVec {
    v.sort_by_key(|(id, _)| *id);
    let norm = v.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
    if norm > f64::EPSILON {
        for (_, w) in &mut v {
            *w /= norm;
        }
    }
    v
}

/// Dot product of two id-sorted sparse vectors.
fn dot(a: &[(usize, f64)], b: &[(usize, f64)]) -> f64 {
    let (mut i, mut j, mut sum) = (0, 0, 0.0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                sum += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    sum
}

#[async_trait]
impl Ranker for SparseRanker {
    fn kind(&self) -> BackendKind {
        BackendKind::Sparse
    }

    async fn rank(&self, query: &str, _chunks: &[Arc<Chunk>]) -> Result<Vec<(usize, f64)>> {
        let q = self.vectorize(query);
        if q.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .vectors
            .iter()
            .enumerate()
            .map(|(ordinal, v)| (ordinal, dot(&q, v)))
            .filter(|(_, s)| *s > 0.0)
            .collect())
    }
}
