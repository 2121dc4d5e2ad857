//! Error taxonomy shared by every ragbench component.
//!
//! Every failure that crosses a component boundary is one of these
//! variants. Collaborator errors (HTTP, model output parsing, timeouts)
//! are converted at the point of call, never propagated raw.

use thiserror::Error;

/// Typed failures of the retrieval-and-orchestration engine.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CoreError {
    /// Bad chunking or query configuration. Caller error, never retried.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Index build refused because the chunk set was empty.
    #[error("cannot build a search index over an empty corpus")]
    EmptyCorpus,

    /// Dense index build aborted because one chunk failed to embed.
    #[error("embedding failed for chunk {chunk}: {reason}")]
    EmbeddingFailed { chunk: String, reason: String },

    /// A search or fetch collaborator failed in a way worth retrying.
    #[error("transient tool failure: {0}")]
    TransientToolFailure(String),

    /// The fetch collaborator has no content for this source.
    #[error("source not found: {0}")]
    NotFound(String),

    /// The question contains a blocked keyword; no tool call was made.
    #[error("query contains blocked keyword: {0}")]
    QueryBlocked(String),

    /// The generation collaborator failed during synthesis.
    #[error("synthesis failed: {0}")]
    SynthesisFailed(String),

    /// A successful run reported zero tokens; indicates a measurement bug.
    #[error("degenerate token count: combined score needs num_tokens > 0")]
    DegenerateTokenCount,
}

/// Convenience alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, CoreError>;
