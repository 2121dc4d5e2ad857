//! Collaborator traits for the orchestration loop and evaluation harness.
//!
//! The loop drives four external capabilities through these seams, so the
//! same control flow runs against live models in production and against
//! scripted mocks in tests:
//!
//! | Trait | Role | Implementations |
//! |-------|------|-----------------|
//! | [`Fetcher`] | Full-page content by source id | [`CorpusFetcher`](crate::fetch::CorpusFetcher), [`HttpFetcher`](crate::fetch::HttpFetcher) |
//! | [`Reasoner`] | Picks the next tool call or stops | [`LlmReasoner`](crate::reasoner::LlmReasoner), [`HeuristicReasoner`](crate::reasoner::HeuristicReasoner) |
//! | [`Generator`] | Writes the final answer | [`LlmGenerator`](crate::generate::LlmGenerator) |
//! | [`Judge`] | Scores an answer | [`LlmJudge`](crate::judge::LlmJudge) |
//!
//! All traits are object-safe and `Send + Sync` so a single instance can be
//! shared across concurrently evaluated questions via `Arc<dyn Trait>`.

use async_trait::async_trait;
use ragbench_core::models::{AgentResponse, JudgeEvaluation, Phase, ToolCall, ToolRequest};
use ragbench_core::CoreError;
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════
// Fetcher
// ═══════════════════════════════════════════════════════════════════════

/// Why a page fetch yielded nothing.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    /// The source does not exist. Cached and never retried.
    #[error("source not found: {0}")]
    NotFound(String),
    /// Network, timeout, or server trouble. Retried with backoff.
    #[error("fetch failed: {0}")]
    Transient(String),
}

impl From<FetchError> for CoreError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::NotFound(id) => CoreError::NotFound(id),
            FetchError::Transient(msg) => CoreError::TransientToolFailure(msg),
        }
    }
}

/// Retrieves the full text of a source document by its id.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, source_id: &str) -> Result<String, FetchError>;
}

// ═══════════════════════════════════════════════════════════════════════
// Reasoner
// ═══════════════════════════════════════════════════════════════════════

/// One ranked hit as shown to the reasoner.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub source_id: String,
    pub score: f64,
    pub snippet: String,
}

/// What the most recent tool call produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Search { query: String, hits: Vec<Hit> },
    Page { source_id: String, text: String },
    Failed { request: ToolRequest, error: String },
}

/// Read-only snapshot of loop state handed to the reasoner each step.
#[derive(Debug, Clone, Copy)]
pub struct LoopView<'a> {
    pub question: &'a str,
    pub phase: Phase,
    pub calls: &'a [ToolCall],
    /// Distinct sources referenced so far, in encounter order.
    pub sources: &'a [String],
    /// Sources whose full page has already been fetched.
    pub fetched: &'a [String],
    pub last: Option<&'a Observation>,
    pub broad_done: usize,
    pub specific_done: usize,
    pub min_broad: usize,
    pub min_specific: usize,
    pub remaining_calls: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Call(ToolRequest),
    Stop,
}

/// A reasoner's choice plus its self-reported confidence in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub action: Action,
    pub confidence: f64,
    /// Tokens consumed producing this decision.
    pub tokens: u64,
}

impl Decision {
    pub fn call(request: ToolRequest, confidence: f64) -> Self {
        Self {
            action: Action::Call(request),
            confidence,
            tokens: 0,
        }
    }

    pub fn stop(confidence: f64) -> Self {
        Self {
            action: Action::Stop,
            confidence,
            tokens: 0,
        }
    }

    pub fn with_tokens(mut self, tokens: u64) -> Self {
        self.tokens = tokens;
        self
    }
}

/// Decides the next step of the loop.
#[async_trait]
pub trait Reasoner: Send + Sync {
    async fn decide(&self, view: LoopView<'_>) -> anyhow::Result<Decision>;
}

// ═══════════════════════════════════════════════════════════════════════
// Generator
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub answer: String,
    pub confidence: f64,
    pub tokens: u64,
}

/// Synthesizes the final answer from the rendered evidence.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, question: &str, context: &str) -> anyhow::Result<Generation>;
}

// ═══════════════════════════════════════════════════════════════════════
// Judge
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct Judgment {
    pub evaluation: JudgeEvaluation,
    pub tokens: u64,
}

/// The judge gave up. Carries the tokens its failed attempts still cost.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{message}")]
pub struct JudgeFailure {
    pub message: String,
    pub tokens: u64,
}

/// Scores one answer against its question.
///
/// Implementations handle their own retries; an `Err` means the judge gave
/// up and the caller falls back to a zero judgment. Return a
/// [`JudgeFailure`] inside the error to have spent tokens counted.
#[async_trait]
pub trait Judge: Send + Sync {
    async fn judge(&self, question: &str, response: &AgentResponse) -> anyhow::Result<Judgment>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_maps_to_core() {
        assert_eq!(
            CoreError::from(FetchError::NotFound("x".into())),
            CoreError::NotFound("x".into())
        );
        assert!(matches!(
            CoreError::from(FetchError::Transient("503".into())),
            CoreError::TransientToolFailure(_)
        ));
    }

    #[test]
    fn test_decision_builders() {
        let d = Decision::stop(0.7).with_tokens(12);
        assert_eq!(d.action, Action::Stop);
        assert_eq!(d.tokens, 12);
        let c = Decision::call(
            ToolRequest::BroadSearch {
                query: "q".into(),
            },
            0.1,
        );
        assert!(matches!(c.action, Action::Call(_)));
    }
}
