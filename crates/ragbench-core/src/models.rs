//! Core data models that flow through chunking, retrieval, orchestration,
//! and evaluation.
//!
//! All of these are value objects: created once, shared read-only, never
//! mutated afterwards. Chunks are handed out behind [`Arc`] so search
//! results can reference them without copying the payload.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{CoreError, Result};

/// Where a document came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceMeta {
    /// Origin path or URL.
    pub origin: String,
    /// Content format label (e.g. `"markdown"`, `"text"`, `"transcript"`).
    pub format: String,
}

/// A source document, already converted to plain text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Stable source identifier. This is the id that ground truth refers to.
    pub id: String,
    /// Full plain text.
    pub text: String,
    pub source: SourceMeta,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            source: SourceMeta::default(),
        }
    }

    pub fn with_source(mut self, origin: impl Into<String>, format: impl Into<String>) -> Self {
        self.source = SourceMeta {
            origin: origin.into(),
            format: format.into(),
        };
        self
    }
}

/// A contiguous slice of a document's text, the unit of retrieval.
///
/// `start` and `end` are character offsets (not bytes) into the owning
/// document's text, half-open: `[start, end)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Deterministic id: `"{document_id}#{chunk_index}"`.
    pub id: String,
    pub document_id: String,
    /// Ordinal within the owning document, contiguous from 0.
    pub chunk_index: usize,
    pub start: usize,
    pub end: usize,
    pub text: String,
    /// Cached embedding, populated once by a dense index build.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    /// Length in characters.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// One ranked hit from [`SearchIndex::query`](crate::index::SearchIndex::query).
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub chunk: Arc<Chunk>,
    /// Backend-specific relevance; comparable only within one backend.
    pub score: f64,
    /// 1-based position in the result list.
    pub rank: usize,
}

/// The fixed set of tools the orchestration loop can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    BroadSearch,
    SpecificSearch,
    FetchPage,
}

impl ToolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::BroadSearch => "broad_search",
            ToolKind::SpecificSearch => "specific_search",
            ToolKind::FetchPage => "fetch_page",
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool invocation with its argument schema fixed per kind.
///
/// Serialized as `{"tool": "broad_search", "query": "..."}` so that a
/// reasoning model can emit it directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum ToolRequest {
    BroadSearch { query: String },
    SpecificSearch { query: String },
    FetchPage { source_id: String },
}

impl ToolRequest {
    pub fn kind(&self) -> ToolKind {
        match self {
            ToolRequest::BroadSearch { .. } => ToolKind::BroadSearch,
            ToolRequest::SpecificSearch { .. } => ToolKind::SpecificSearch,
            ToolRequest::FetchPage { .. } => ToolKind::FetchPage,
        }
    }

    /// The free-text argument: the query for searches, the id for fetches.
    pub fn argument(&self) -> &str {
        match self {
            ToolRequest::BroadSearch { query } | ToolRequest::SpecificSearch { query } => query,
            ToolRequest::FetchPage { source_id } => source_id,
        }
    }
}

/// Orchestration loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Broad,
    Specific,
    Synthesis,
    Done,
}

/// A tool call as it actually happened inside one loop run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// 1-based order within the run.
    pub seq: usize,
    pub request: ToolRequest,
    /// Phase the call was issued in.
    pub phase: Phase,
    /// Number of results (searches) or pages (fetches, 0 or 1) returned.
    pub results: usize,
    /// Fetch served from the run's page cache.
    #[serde(default)]
    pub cached: bool,
    /// Failure recorded for this call, if it yielded nothing because of one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolCall {
    pub fn kind(&self) -> ToolKind {
        self.request.kind()
    }
}

/// The single product of one orchestration loop invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub answer: String,
    pub tool_calls: Vec<ToolCall>,
    /// Distinct source ids, in the order first encountered across tool calls.
    pub sources: Vec<String>,
    /// In `[0, 1]`.
    pub confidence: f64,
    pub total_tokens: u64,
    /// The global budget tripped and the answer is best-effort.
    #[serde(default)]
    pub aborted: bool,
}

/// One curated question with the sources that should be found for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundTruthItem {
    pub question: String,
    pub expected_sources: Vec<String>,
}

impl GroundTruthItem {
    pub fn validate(&self) -> Result<()> {
        if self.question.trim().is_empty() {
            return Err(CoreError::InvalidParameter(
                "ground truth question must not be empty".to_string(),
            ));
        }
        if self.expected_sources.is_empty() {
            return Err(CoreError::InvalidParameter(format!(
                "ground truth item '{}' has no expected sources",
                self.question
            )));
        }
        Ok(())
    }
}

/// An external quality judgment of one answer. All scores in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeEvaluation {
    pub overall_score: f64,
    pub accuracy: f64,
    pub completeness: f64,
    pub relevance: f64,
    pub reasoning: String,
}

impl JudgeEvaluation {
    /// All-zero judgment used when the judge could not produce one.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            overall_score: 0.0,
            accuracy: 0.0,
            completeness: 0.0,
            relevance: 0.0,
            reasoning: reason.into(),
        }
    }

    /// Clamp every score into `[0, 1]`, mapping NaN to 0.
    pub fn clamped(mut self) -> Self {
        for s in [
            &mut self.overall_score,
            &mut self.accuracy,
            &mut self.completeness,
            &mut self.relevance,
        ] {
            *s = if s.is_nan() { 0.0 } else { s.clamp(0.0, 1.0) };
        }
        self
    }
}

/// Per-question evaluation row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question: String,
    pub hit_rate: f64,
    pub mrr: f64,
    pub judge_score: f64,
    pub accuracy: f64,
    pub completeness: f64,
    pub relevance: f64,
    pub num_tokens: u64,
    pub combined_score: f64,
    /// Why this row is zero-scored, when the question failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QuestionResult {
    /// Zero-scored row for a question whose run failed outright.
    pub fn failed(question: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            hit_rate: 0.0,
            mrr: 0.0,
            judge_score: 0.0,
            accuracy: 0.0,
            completeness: 0.0,
            relevance: 0.0,
            num_tokens: 0,
            combined_score: 0.0,
            error: Some(error.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Dataset-level aggregate over all question rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub avg_hit_rate: f64,
    pub avg_mrr: f64,
    pub avg_judge_score: f64,
    pub avg_num_tokens: f64,
    pub total_tokens: u64,
    pub avg_combined_score: f64,
    pub best_combined_score: f64,
    pub failed: usize,
}
