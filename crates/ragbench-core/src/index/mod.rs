//! Search index over an immutable chunk snapshot.
//!
//! One [`SearchIndex`] type fronts three interchangeable ranking backends,
//! selected at construction by an [`IndexBackend`] value:
//!
//! | Backend | Module | Scoring |
//! |---------|--------|---------|
//! | Lexical | [`lexical`] | BM25 over token postings |
//! | Sparse vector | [`sparse`] | TF-IDF bag-of-words, cosine |
//! | Dense vector | [`dense`] | Embedding cosine similarity |
//!
//! The external contract is identical for all three: `query` returns at
//! most `top_k` results, strictly ordered by descending score, ties broken
//! by the chunk's position in the snapshot (lower first). Scores are only
//! comparable within one backend.
//!
//! An index is never mutated after [`SearchIndex::build`]. Rebuilding for a
//! new corpus or chunking configuration constructs a fresh index, so a
//! shared `&SearchIndex` needs no locking.

pub mod dense;
pub mod lexical;
pub mod sparse;
pub mod tokenize;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::embedding::EmbeddingProvider;
use crate::error::{CoreError, Result};
use crate::models::{Chunk, SearchResult};

/// Which ranking structure to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Lexical,
    Sparse,
    Dense,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Lexical => "lexical",
            BackendKind::Sparse => "sparse",
            BackendKind::Dense => "dense",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "lexical" | "keyword" => Ok(BackendKind::Lexical),
            "sparse" | "sparse-vector" => Ok(BackendKind::Sparse),
            "dense" | "dense-vector" | "semantic" => Ok(BackendKind::Dense),
            other => Err(CoreError::InvalidParameter(format!(
                "unknown index backend '{}'. Use lexical, sparse, or dense.",
                other
            ))),
        }
    }
}

/// Backend selection, carrying what each backend needs to build.
#[derive(Clone)]
pub enum IndexBackend {
    Lexical,
    Sparse,
    Dense(Arc<dyn EmbeddingProvider>),
}

impl IndexBackend {
    pub fn kind(&self) -> BackendKind {
        match self {
            IndexBackend::Lexical => BackendKind::Lexical,
            IndexBackend::Sparse => BackendKind::Sparse,
            IndexBackend::Dense(_) => BackendKind::Dense,
        }
    }
}

impl std::fmt::Debug for IndexBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexBackend::Dense(p) => write!(f, "Dense({})", p.model_name()),
            other => write!(f, "{}", other.kind()),
        }
    }
}

/// The one capability every backend provides: score the snapshot
/// against a query.
///
/// Implementations return `(ordinal, score)` pairs for the chunks they
/// consider candidates, in any order. [`SearchIndex::query`] applies the
/// shared ordering and truncation rules.
#[async_trait]
pub trait Ranker: Send + Sync {
    fn kind(&self) -> BackendKind;
    async fn rank(&self, query: &str, chunks: &[Arc<Chunk>]) -> Result<Vec<(usize, f64)>>;
}

/// Immutable search index: a chunk snapshot plus one ranking backend.
pub struct SearchIndex {
    chunks: Vec<Arc<Chunk>>,
    ranker: Box<dyn Ranker>,
}

impl std::fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIndex")
            .field("backend", &self.ranker.kind())
            .field("chunks", &self.chunks.len())
            .finish()
    }
}

impl SearchIndex {
    /// Build an index over `chunks` with the chosen backend.
    ///
    /// Fails with [`CoreError::EmptyCorpus`] for an empty chunk set. In
    /// dense mode every chunk is embedded exactly once and the vector is
    /// cached on the chunk; any embedding failure fails the whole build.
    pub async fn build(chunks: Vec<Chunk>, backend: &IndexBackend) -> Result<Self> {
        if chunks.is_empty() {
            return Err(CoreError::EmptyCorpus);
        }

        let (chunks, ranker): (Vec<Chunk>, Box<dyn Ranker>) = match backend {
            IndexBackend::Lexical => {
                let ranker = lexical::LexicalRanker::new(&chunks);
                (chunks, Box::new(ranker))
            }
            IndexBackend::Sparse => {
                let ranker = sparse::SparseRanker::new(&chunks);
                (chunks, Box::new(ranker))
            }
            IndexBackend::Dense(provider) => {
                let embedded = dense::embed_chunks(chunks, provider.as_ref()).await?;
                (embedded, Box::new(dense::DenseRanker::new(provider.clone())))
            }
        };

        debug!(
            backend = %ranker.kind(),
            chunks = chunks.len(),
            "search index built"
        );

        Ok(Self {
            chunks: chunks.into_iter().map(Arc::new).collect(),
            ranker,
        })
    }

    /// Rank the snapshot against `text` and return the best `top_k` hits.
    ///
    /// Blank queries return no results. Lexical backends return only
    /// chunks sharing at least one token with the query.
    pub async fn query(&self, text: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        if top_k == 0 {
            return Err(CoreError::InvalidParameter("top_k must be > 0".to_string()));
        }
        if text.trim().is_empty() || self.chunks.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored = self.ranker.rank(text, &self.chunks).await?;
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .enumerate()
            .map(|(i, (ordinal, score))| SearchResult {
                chunk: self.chunks[ordinal].clone(),
                score,
                rank: i + 1,
            })
            .collect())
    }

    pub fn backend(&self) -> BackendKind {
        self.ranker.kind()
    }

    pub fn chunks(&self) -> &[Arc<Chunk>] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}
