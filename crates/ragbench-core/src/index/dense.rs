//! Dense-vector backend: cosine similarity against cached chunk embeddings.
//!
//! Chunk vectors are computed once by [`embed_chunks`] at build time and
//! stored on [`Chunk::embedding`]. Each query embeds the query text with
//! the same provider and scores every chunk.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{BackendKind, Ranker};
use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::error::{CoreError, Result};
use crate::models::Chunk;

/// Embed every chunk in batches of `provider.batch_size()`, failing fast
/// on the first failed batch.
///
/// A failed batch is reported against its first chunk. A vector whose
/// length differs from `provider.dims()` counts as a failure, so the index
/// never mixes dimensionalities.
pub async fn embed_chunks(
    mut chunks: Vec<Chunk>,
    provider: &dyn EmbeddingProvider,
) -> Result<Vec<Chunk>> {
    let dims = provider.dims();
    let batch_size = provider.batch_size().max(1);
    let mut batches = 0usize;

    for batch in chunks.chunks_mut(batch_size) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let first = batch[0].id.clone();
        let vectors = provider
            .embed_batch(&texts)
            .await
            .map_err(|e| CoreError::EmbeddingFailed {
                chunk: first.clone(),
                reason: e.to_string(),
            })?;
        if vectors.len() != batch.len() {
            return Err(CoreError::EmbeddingFailed {
                chunk: first,
                reason: format!("expected {} vectors, got {}", batch.len(), vectors.len()),
            });
        }
        for (chunk, vector) in batch.iter_mut().zip(vectors) {
            if vector.len() != dims {
                return Err(CoreError::EmbeddingFailed {
                    chunk: chunk.id.clone(),
                    reason: format!("expected {} dims, got {}", dims, vector.len()),
                });
            }
            chunk.embedding = Some(vector);
        }
        batches += 1;
    }

    debug!(
        model = provider.model_name(),
        dims,
        count = chunks.len(),
        batches,
        "chunks embedded"
    );
    Ok(chunks)
}

pub struct DenseRanker {
    provider: Arc<dyn EmbeddingProvider>,
}

impl DenseRanker {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Ranker for DenseRanker {
    fn kind(&self) -> BackendKind {
        BackendKind::Dense
    }

    async fn rank(&self, query: &str, chunks: &[Arc<Chunk>]) -> Result<Vec<(usize, f64)>> {
        let qv = self
            .provider
            .embed(query)
            .await
            .map_err(|e| CoreError::TransientToolFailure(format!("query embedding: {}", e)))?;
        if qv.len() != self.provider.dims() {
            return Err(CoreError::TransientToolFailure(format!(
                "query embedding has {} dims, expected {}",
                qv.len(),
                self.provider.dims()
            )));
        }

        Ok(chunks
            .iter()
            .enumerate()
            .filter_map(|(ordinal, c)| {
                c.embedding
                    .as_deref()
                    .map(|v| (ordinal, f64::from(cosine_similarity(&qv, v))))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use crate::index::{IndexBackend, SearchIndex};
    use crate::models::Document;
    use crate::chunk::{chunk_document, ChunkParams};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails on the n-th call, counting calls.
    struct FlakyProvider {
        calls: AtomicUsize,
        fail_on: usize,
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyProvider {
        fn model_name(&self) -> &str {
            "flaky"
        }
        fn dims(&self) -> usize {
            4
        }
        async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n == self.fail_on {
                anyhow::bail!("model offline");
            }
            Ok(vec![1.0, 0.0, 0.0, 0.0])
        }
    }

    /// Batches of `size`, recording how many texts each call carried.
    struct BatchingProvider {
        size: usize,
        batches: std::sync::Mutex<Vec<usize>>,
        short_by: usize,
    }

    impl BatchingProvider {
        fn new(size: usize) -> Self {
            Self {
                size,
                batches: std::sync::Mutex::new(Vec::new()),
                short_by: 0,
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for BatchingProvider {
        fn model_name(&self) -> &str {
            "batching"
        }
        fn dims(&self) -> usize {
            4
        }
        fn batch_size(&self) -> usize {
            self.size
        }
        async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            Ok(vec![0.0, 1.0, 0.0, 0.0])
        }
        async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            self.batches.lock().unwrap().push(texts.len());
            let n = texts.len().saturating_sub(self.short_by);
            Ok(vec![vec![0.0, 1.0, 0.0, 0.0]; n])
        }
    }

    fn chunks() -> Vec<Chunk> {
        let doc = Document::new("d", "abcdefghijklmnopqrstuvwxyz");
        chunk_document(&doc, &ChunkParams::new(5, 0.0).unwrap())
    }

    #[tokio::test]
    async fn test_embeddings_cached_on_chunks() {
        let provider = Arc::new(HashingEmbedder::new(16));
        let index = SearchIndex::build(chunks(), &IndexBackend::Dense(provider))
            .await
            .unwrap();
        assert!(index
            .chunks()
            .iter()
            .all(|c| c.embedding.as_ref().map(|v| v.len()) == Some(16)));
    }

    #[tokio::test]
    async fn test_build_fails_fast_on_embedding_error() {
        let provider = Arc::new(FlakyProvider {
            calls: AtomicUsize::new(0),
            fail_on: 3,
        });
        let err = SearchIndex::build(chunks(), &IndexBackend::Dense(provider.clone()))
            .await
            .unwrap_err();
        match err {
            CoreError::EmbeddingFailed { chunk, .. } => assert_eq!(chunk, "d#2"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_build_embeds_in_batches() {
        let provider = Arc::new(BatchingProvider::new(4));
        let index = SearchIndex::build(chunks(), &IndexBackend::Dense(provider.clone()))
            .await
            .unwrap();
        assert_eq!(index.chunks().len(), 6);
        assert_eq!(*provider.batches.lock().unwrap(), vec![4, 2]);
        assert!(index.chunks().iter().all(|c| c.embedding.is_some()));
    }

    #[tokio::test]
    async fn test_short_batch_reply_fails_build() {
        let provider = BatchingProvider {
            short_by: 1,
            ..BatchingProvider::new(4)
        };
        match embed_chunks(chunks(), &provider).await.unwrap_err() {
            CoreError::EmbeddingFailed { chunk, reason } => {
                assert_eq!(chunk, "d#0");
                assert!(reason.contains("expected 4 vectors, got 3"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(provider.batches.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_query_embedding_failure_is_transient() {
        let provider = Arc::new(FlakyProvider {
            calls: AtomicUsize::new(0),
            fail_on: chunks().len() + 1,
        });
        let index = SearchIndex::build(chunks(), &IndexBackend::Dense(provider))
            .await
            .unwrap();
        assert!(matches!(
            index.query("anything", 3).await,
            Err(CoreError::TransientToolFailure(_))
        ));
    }
}
