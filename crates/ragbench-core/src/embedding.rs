//! Embedding provider trait and vector utilities.
//!
//! Defines the [`EmbeddingProvider`] trait that dense-index backends call,
//! a deterministic offline [`HashingEmbedder`], and [`cosine_similarity`].
//!
//! Network-backed providers (OpenAI) live in the `ragbench` app crate.

use anyhow::Result;
use async_trait::async_trait;

use crate::index::tokenize::tokenize;

/// Trait for embedding providers.
///
/// `embed` must be deterministic for identical input within one model
/// configuration, and must always return vectors of length [`dims`](EmbeddingProvider::dims).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;
    /// Embed one text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Texts per [`embed_batch`](EmbeddingProvider::embed_batch) call when
    /// an index is built.
    fn batch_size(&self) -> usize {
        1
    }

    /// Embed several texts, returning one vector per text in input order.
    ///
    /// The default embeds them one at a time. Providers with a batch
    /// endpoint should override this together with `batch_size`.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

/// Feature-hashing embedder that needs no model files or network.
///
/// Each token is hashed (FNV-1a) into one of `dims` buckets with a sign
/// taken from a second hash bit, and the resulting vector is L2-normalized.
/// Texts sharing vocabulary land close together under cosine similarity.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dims: usize,
}

impl HashingEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    /// Synchronous form of [`EmbeddingProvider::embed`].
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for token in tokenize(text) {
            let h = fnv1a(token.as_bytes());
            let bucket = (h % self.dims as u64) as usize;
            let sign = if (h >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    fn model_name(&self) -> &str {
        "hash"
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_empty_and_mismatched() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_hashing_embedder_deterministic() {
        let e = HashingEmbedder::new(64);
        let a = e.embed_sync("capybaras live near rivers");
        let b = e.embed_sync("capybaras live near rivers");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hashing_embedder_similarity_tracks_overlap() {
        let e = HashingEmbedder::new(256);
        let q = e.embed_sync("capybara habitat rivers");
        let near = e.embed_sync("the capybara habitat is near rivers and lakes");
        let far = e.embed_sync("compilers translate source programs");
        assert!(cosine_similarity(&q, &near) > cosine_similarity(&q, &far));
    }

    #[test]
    fn test_hashing_embedder_empty_text_is_zero() {
        let e = HashingEmbedder::new(8);
        assert!(e.embed_sync("").iter().all(|x| *x == 0.0));
    }
}
