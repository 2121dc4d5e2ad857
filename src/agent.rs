//! Tool-orchestration loop.
//!
//! An [`Orchestrator`] answers one question by driving a bounded,
//! sequential sequence of tool calls chosen by a [`Reasoner`]:
//!
//! ```text
//! ┌──────────┐  min_broad   ┌────────────┐  min_specific  ┌───────────┐    ┌──────┐
//! │  Broad   │─────────────▶│  Specific  │───────────────▶│ Synthesis │───▶│ Done │
//! └──────────┘              └────────────┘  or max_calls  └───────────┘    └──────┘
//! ```
//!
//! # Control rules
//!
//! - Below `min_broad` every request is coerced into a broad search.
//! - After the broad floor, the first specific search or fetch moves the
//!   loop to the specific phase. Broad searches stay legal there but do
//!   not count toward `min_specific`.
//! - A reasoner `Stop` below the floors is overridden with a forced call.
//! - In evaluation mode, once the calls left under `max_calls` are exactly
//!   the ones still owed to `min_specific`, broad searches run as specific
//!   searches with the same query.
//! - Once both floors are met, the loop stops when the reasoner stops or
//!   its confidence reaches `confidence_threshold`.
//! - `max_calls` is a hard cap. Production mode may additionally stop
//!   right after the broad floor when confidence reaches
//!   `early_stop_confidence`.
//!
//! # Guardrails
//!
//! A question containing one of `blocked_keywords` (case-insensitive) is
//! refused with [`CoreError::QueryBlocked`] before any call. The wall-clock
//! `budget` and the `token_budget` both end the tool phase early; the
//! answer is then synthesized from what was gathered and marked `aborted`.
//!
//! # Failure handling
//!
//! Search and fetch failures are retried up to `tool_retries` times with
//! exponential backoff, each attempt under `call_timeout`. An exhausted
//! call is recorded with its error and counts as a zero-result call. A
//! generator failure is fatal and surfaces as
//! [`CoreError::SynthesisFailed`].
//!
//! Fetches are cached per run by source id; `NotFound` is cached as well so
//! a missing page is asked for at most once.

use anyhow::Result;
use ragbench_core::index::SearchIndex;
use ragbench_core::models::{AgentResponse, Phase, SearchResult, ToolCall, ToolKind, ToolRequest};
use ragbench_core::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::pipeline;
use crate::report::{save_run_log, RunLog};
use crate::traits::{
    Action, Decision, Fetcher, Generator, Hit, LoopView, Observation, Reasoner,
};

const SNIPPET_CHARS: usize = 300;

/// Evaluation mode enforces both floors; production mode may stop early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Evaluation,
    Production,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Evaluation => "evaluation",
            SearchMode::Production => "production",
        }
    }
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "evaluation" | "eval" => Ok(SearchMode::Evaluation),
            "production" | "prod" => Ok(SearchMode::Production),
            other => anyhow::bail!(
                "Unknown search mode: '{}'. Use evaluation or production.",
                other
            ),
        }
    }
}

/// Limits and thresholds for one loop invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopConfig {
    pub mode: SearchMode,
    pub min_broad: usize,
    pub min_specific: usize,
    pub max_calls: usize,
    pub confidence_threshold: f64,
    pub early_stop_confidence: f64,
    pub broad_top_k: usize,
    pub specific_top_k: usize,
    pub tool_retries: u32,
    pub call_timeout: Duration,
    pub synthesis_timeout: Duration,
    /// Base delay between retries; doubles per attempt.
    pub retry_backoff: Duration,
    /// Global wall-clock budget for the tool phase.
    pub budget: Option<Duration>,
    /// Reasoner tokens after which the tool phase ends.
    pub token_budget: Option<u64>,
    pub max_page_chars: usize,
    pub blocked_keywords: Vec<String>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            mode: SearchMode::Evaluation,
            min_broad: 3,
            min_specific: 8,
            max_calls: 20,
            confidence_threshold: 0.8,
            early_stop_confidence: 0.95,
            broad_top_k: 5,
            specific_top_k: 3,
            tool_retries: 2,
            call_timeout: Duration::from_secs(10),
            synthesis_timeout: Duration::from_secs(60),
            retry_backoff: Duration::from_millis(250),
            budget: None,
            token_budget: None,
            max_page_chars: 15_000,
            blocked_keywords: Vec::new(),
        }
    }
}

impl LoopConfig {
    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        let invalid = |msg: String| Err(CoreError::InvalidParameter(msg));
        if self.max_calls == 0 {
            return invalid("max_calls must be >= 1".to_string());
        }
        if self.min_broad + self.min_specific > self.max_calls {
            return invalid(format!(
                "min_broad ({}) + min_specific ({}) exceeds max_calls ({})",
                self.min_broad, self.min_specific, self.max_calls
            ));
        }
        for (name, v) in [
            ("confidence_threshold", self.confidence_threshold),
            ("early_stop_confidence", self.early_stop_confidence),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return invalid(format!("{} must be in [0, 1], got {}", name, v));
            }
        }
        if self.broad_top_k == 0 || self.specific_top_k == 0 {
            return invalid("broad_top_k and specific_top_k must be >= 1".to_string());
        }
        if self.max_page_chars == 0 {
            return invalid("max_page_chars must be >= 1".to_string());
        }
        if self.token_budget == Some(0) {
            return invalid("token_budget must be >= 1".to_string());
        }
        Ok(())
    }

    /// First configured keyword found in `question`, ignoring case.
    pub fn blocked_keyword(&self, question: &str) -> Option<&str> {
        let lowered = question.to_lowercase();
        self.blocked_keywords
            .iter()
            .map(|k| k.trim())
            .find(|k| !k.is_empty() && lowered.contains(&k.to_lowercase()))
    }
}

/// Passage kept for the synthesis context.
#[derive(Debug, Clone)]
struct Passage {
    source_id: String,
    chunk_id: String,
    text: String,
}

/// Mutable state of one run. Never shared across runs.
struct RunState {
    phase: Phase,
    calls: Vec<ToolCall>,
    sources: Vec<String>,
    seen: HashSet<String>,
    /// Fetch cache by source id. `None` records a `NotFound`.
    pages: HashMap<String, Option<String>>,
    fetched: Vec<String>,
    passages: Vec<Passage>,
    passage_ids: HashSet<String>,
    last: Option<Observation>,
    broad_done: usize,
    specific_done: usize,
    tokens: u64,
    confidence: f64,
    aborted: bool,
}

impl RunState {
    fn new() -> Self {
        Self {
            phase: Phase::Broad,
            calls: Vec::new(),
            sources: Vec::new(),
            seen: HashSet::new(),
            pages: HashMap::new(),
            fetched: Vec::new(),
            passages: Vec::new(),
            passage_ids: HashSet::new(),
            last: None,
            broad_done: 0,
            specific_done: 0,
            tokens: 0,
            confidence: 0.0,
            aborted: false,
        }
    }

    fn reference(&mut self, source_id: &str) {
        if self.seen.insert(source_id.to_string()) {
            self.sources.push(source_id.to_string());
        }
    }
}

pub struct Orchestrator {
    index: Arc<SearchIndex>,
    fetcher: Arc<dyn Fetcher>,
    reasoner: Arc<dyn Reasoner>,
    generator: Arc<dyn Generator>,
    config: LoopConfig,
}

impl Orchestrator {
    pub fn new(
        index: Arc<SearchIndex>,
        fetcher: Arc<dyn Fetcher>,
        reasoner: Arc<dyn Reasoner>,
        generator: Arc<dyn Generator>,
        config: LoopConfig,
    ) -> Self {
        Self {
            index,
            fetcher,
            reasoner,
            generator,
            config,
        }
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    /// Same collaborators, different limits.
    pub fn with_config(&self, config: LoopConfig) -> Self {
        Self {
            index: self.index.clone(),
            fetcher: self.fetcher.clone(),
            reasoner: self.reasoner.clone(),
            generator: self.generator.clone(),
            config,
        }
    }

    /// Answer `question`, producing exactly one [`AgentResponse`].
    ///
    /// Only [`CoreError::SynthesisFailed`], [`CoreError::QueryBlocked`] and
    /// configuration errors escape; tool failures are absorbed into the
    /// call trace.
    pub async fn run(&self, question: &str) -> Result<AgentResponse, CoreError> {
        self.config.validate()?;
        if let Some(keyword) = self.config.blocked_keyword(question) {
            warn!(keyword, "query blocked");
            return Err(CoreError::QueryBlocked(keyword.to_string()));
        }
        let mut state = RunState::new();
        let deadline = self
            .config
            .budget
            .map(|b| tokio::time::Instant::now() + b);

        while state.calls.len() < self.config.max_calls {
            let proceed = match deadline {
                Some(d) if tokio::time::Instant::now() >= d => {
                    state.aborted = true;
                    false
                }
                Some(d) => match tokio::time::timeout_at(d, self.step(question, &mut state)).await {
                    Ok(p) => p,
                    Err(_) => {
                        state.aborted = true;
                        false
                    }
                },
                None => self.step(question, &mut state).await,
            };
            if !proceed {
                break;
            }
            if let Some(limit) = self.config.token_budget {
                if state.tokens >= limit {
                    warn!(tokens = state.tokens, limit, "token budget exhausted");
                    state.aborted = true;
                    break;
                }
            }
        }

        if state.aborted {
            warn!(
                calls = state.calls.len(),
                "loop budget exhausted, synthesizing best-effort answer"
            );
        } else if state.calls.len() >= self.config.max_calls {
            debug!(max_calls = self.config.max_calls, "call cap reached");
        }

        self.synthesize(question, state).await
    }

    /// One decide-and-execute step. Returns `false` when the loop should
    /// move to synthesis.
    async fn step(&self, question: &str, state: &mut RunState) -> bool {
        let decision = self.decide(question, state).await;
        state.tokens += decision.tokens;
        state.confidence = clamp_unit(decision.confidence);

        let request = match self.next_request(question, state, decision.action) {
            Some(r) => r,
            None => return false,
        };

        if state.phase == Phase::Broad
            && state.broad_done >= self.config.min_broad
            && request.kind() != ToolKind::BroadSearch
        {
            debug!(broad_done = state.broad_done, "entering specific phase");
            state.phase = Phase::Specific;
        }

        self.execute(request, state).await;
        true
    }

    async fn decide(&self, question: &str, state: &RunState) -> Decision {
        let view = LoopView {
            question,
            phase: state.phase,
            calls: &state.calls,
            sources: &state.sources,
            fetched: &state.fetched,
            last: state.last.as_ref(),
            broad_done: state.broad_done,
            specific_done: state.specific_done,
            min_broad: self.config.min_broad,
            min_specific: self.config.min_specific,
            remaining_calls: self.config.max_calls.saturating_sub(state.calls.len()),
        };
        match tokio::time::timeout(self.config.call_timeout, self.reasoner.decide(view)).await {
            Ok(Ok(decision)) => decision,
            Ok(Err(e)) => {
                warn!(error = %format!("{:#}", e), "reasoner failed, treating as stop");
                Decision::stop(0.0)
            }
            Err(_) => {
                warn!("reasoner timed out, treating as stop");
                Decision::stop(0.0)
            }
        }
    }

    fn floors_met(&self, state: &RunState) -> bool {
        state.broad_done >= self.config.min_broad && state.specific_done >= self.config.min_specific
    }

    fn early_stop(&self, state: &RunState) -> bool {
        self.config.mode == SearchMode::Production
            && state.broad_done >= self.config.min_broad
            && state.confidence >= self.config.early_stop_confidence
    }

    /// In evaluation mode, true once every remaining call is needed to reach
    /// `min_specific`.
    fn specific_calls_reserved(&self, state: &RunState) -> bool {
        let missing = self.config.min_specific.saturating_sub(state.specific_done);
        let remaining = self.config.max_calls.saturating_sub(state.calls.len());
        self.config.mode == SearchMode::Evaluation && missing > 0 && remaining <= missing
    }

    /// Apply the phase rules to the reasoner's choice. `None` means stop.
    fn next_request(&self, question: &str, state: &RunState, action: Action) -> Option<ToolRequest> {
        match action {
            Action::Stop => {
                if self.floors_met(state) || self.early_stop(state) {
                    return None;
                }
                Some(self.forced_request(question, state))
            }
            Action::Call(request) => {
                if self.floors_met(state) && state.confidence >= self.config.confidence_threshold {
                    return None;
                }
                if self.early_stop(state) {
                    return None;
                }
                Some(self.coerce(question, state, request))
            }
        }
    }

    fn coerce(&self, question: &str, state: &RunState, request: ToolRequest) -> ToolRequest {
        if state.broad_done >= self.config.min_broad {
            return match request {
                ToolRequest::BroadSearch { query } if self.specific_calls_reserved(state) => {
                    debug!(query = %query, "remaining calls reserved for the specific floor");
                    ToolRequest::SpecificSearch { query }
                }
                other => other,
            };
        }
        match request {
            ToolRequest::BroadSearch { .. } => request,
            ToolRequest::SpecificSearch { query } => ToolRequest::BroadSearch { query },
            ToolRequest::FetchPage { .. } => ToolRequest::BroadSearch {
                query: question.to_string(),
            },
        }
    }

    fn forced_request(&self, question: &str, state: &RunState) -> ToolRequest {
        if state.broad_done < self.config.min_broad {
            return ToolRequest::BroadSearch {
                query: question.to_string(),
            };
        }
        match state.sources.iter().find(|s| !state.pages.contains_key(*s)) {
            Some(source_id) => ToolRequest::FetchPage {
                source_id: source_id.clone(),
            },
            None => ToolRequest::SpecificSearch {
                query: question.to_string(),
            },
        }
    }

    async fn execute(&self, request: ToolRequest, state: &mut RunState) {
        let seq = state.calls.len() + 1;
        let phase = state.phase;
        let kind = request.kind();

        let (results, cached, error, observation) = match &request {
            ToolRequest::BroadSearch { query } | ToolRequest::SpecificSearch { query } => {
                let top_k = if kind == ToolKind::BroadSearch {
                    self.config.broad_top_k
                } else {
                    self.config.specific_top_k
                };
                match self.search(query, top_k).await {
                    Ok(hits) => {
                        let observed = record_hits(state, &hits);
                        let n = hits.len();
                        (
                            n,
                            false,
                            None,
                            Observation::Search {
                                query: query.clone(),
                                hits: observed,
                            },
                        )
                    }
                    Err(e) => (0, false, Some(e.to_string()), failed(&request, &e)),
                }
            }
            ToolRequest::FetchPage { source_id } => match state.pages.get(source_id).cloned() {
                Some(Some(text)) => (
                    1,
                    true,
                    None,
                    Observation::Page {
                        source_id: source_id.clone(),
                        text,
                    },
                ),
                Some(None) => {
                    let e = CoreError::NotFound(source_id.clone());
                    (0, true, Some(e.to_string()), failed(&request, &e))
                }
                None => match self.fetch(source_id).await {
                    Ok(text) => {
                        let text = truncate_chars(&text, self.config.max_page_chars);
                        state.pages.insert(source_id.clone(), Some(text.clone()));
                        state.fetched.push(source_id.clone());
                        state.reference(source_id);
                        (
                            1,
                            false,
                            None,
                            Observation::Page {
                                source_id: source_id.clone(),
                                text,
                            },
                        )
                    }
                    Err(e) => {
                        if matches!(e, CoreError::NotFound(_)) {
                            state.pages.insert(source_id.clone(), None);
                        }
                        (0, false, Some(e.to_string()), failed(&request, &e))
                    }
                },
            },
        };

        match kind {
            ToolKind::BroadSearch => state.broad_done += 1,
            ToolKind::SpecificSearch | ToolKind::FetchPage => {
                if phase == Phase::Specific {
                    state.specific_done += 1;
                }
            }
        }

        info!(
            seq,
            tool = %kind,
            phase = ?phase,
            arg = request.argument(),
            results,
            cached,
            "tool call"
        );
        if let Some(err) = &error {
            warn!(seq, tool = %kind, error = %err, "tool call yielded nothing");
        }

        state.calls.push(ToolCall {
            seq,
            request,
            phase,
            results,
            cached,
            error,
        });
        state.last = Some(observation);
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>, CoreError> {
        let index = &self.index;
        self.with_retry("search", move || async move { index.query(query, top_k).await })
            .await
    }

    async fn fetch(&self, source_id: &str) -> Result<String, CoreError> {
        let fetcher = &self.fetcher;
        self.with_retry("fetch", move || async move {
            fetcher.fetch(source_id).await.map_err(CoreError::from)
        })
        .await
    }

    /// Run `op` under the per-call timeout, retrying transient failures.
    async fn with_retry<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, CoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            let outcome = match tokio::time::timeout(self.config.call_timeout, op()).await {
                Ok(r) => r,
                Err(_) => Err(CoreError::TransientToolFailure(format!(
                    "{} timed out after {:?}",
                    what, self.config.call_timeout
                ))),
            };
            match outcome {
                Err(CoreError::TransientToolFailure(msg)) if attempt < self.config.tool_retries => {
                    attempt += 1;
                    warn!(what, attempt, error = %msg, "transient failure, retrying");
                    let delay = self.config.retry_backoff * (1u32 << (attempt - 1).min(5));
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }

    async fn synthesize(&self, question: &str, mut state: RunState) -> Result<AgentResponse, CoreError> {
        state.phase = Phase::Synthesis;
        let context = render_context(&state);
        debug!(
            passages = state.passages.len(),
            pages = state.fetched.len(),
            context_chars = context.len(),
            "synthesizing"
        );

        let generation = match tokio::time::timeout(
            self.config.synthesis_timeout,
            self.generator.generate(question, &context),
        )
        .await
        {
            Ok(Ok(g)) => g,
            Ok(Err(e)) => return Err(CoreError::SynthesisFailed(format!("{:#}", e))),
            Err(_) => {
                return Err(CoreError::SynthesisFailed(format!(
                    "generation timed out after {:?}",
                    self.config.synthesis_timeout
                )))
            }
        };

        state.phase = Phase::Done;
        let response = AgentResponse {
            answer: generation.answer,
            tool_calls: state.calls,
            sources: state.sources,
            confidence: clamp_unit(generation.confidence),
            total_tokens: state.tokens + generation.tokens,
            aborted: state.aborted,
        };
        info!(
            calls = response.tool_calls.len(),
            sources = response.sources.len(),
            confidence = response.confidence,
            tokens = response.total_tokens,
            aborted = response.aborted,
            "answer ready"
        );
        Ok(response)
    }
}

fn record_hits(state: &mut RunState, hits: &[SearchResult]) -> Vec<Hit> {
    hits.iter()
        .map(|hit| {
            let chunk = &hit.chunk;
            state.reference(&chunk.document_id);
            if state.passage_ids.insert(chunk.id.clone()) {
                state.passages.push(Passage {
                    source_id: chunk.document_id.clone(),
                    chunk_id: chunk.id.clone(),
                    text: chunk.text.clone(),
                });
            }
            Hit {
                source_id: chunk.document_id.clone(),
                score: hit.score,
                snippet: truncate_chars(&chunk.text, SNIPPET_CHARS),
            }
        })
        .collect()
}

fn failed(request: &ToolRequest, err: &CoreError) -> Observation {
    Observation::Failed {
        request: request.clone(),
        error: err.to_string(),
    }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// First `max` characters of `text`.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte, _)) => text[..byte].to_string(),
        None => text.to_string(),
    }
}

/// Render accumulated evidence: fetched pages first, then search passages
/// whose source was not fetched in full.
fn render_context(state: &RunState) -> String {
    let mut out = String::new();
    for source_id in &state.fetched {
        if let Some(Some(text)) = state.pages.get(source_id) {
            out.push_str(&format!("<PAGE source=\"{}\">\n{}\n</PAGE>\n\n", source_id, text));
        }
    }
    let fetched: HashSet<&str> = state.fetched.iter().map(String::as_str).collect();
    for p in &state.passages {
        if fetched.contains(p.source_id.as_str()) {
            continue;
        }
        out.push_str(&format!(
            "<PASSAGE source=\"{}\" chunk=\"{}\">\n{}\n</PASSAGE>\n\n",
            p.source_id, p.chunk_id, p.text
        ));
    }
    out
}

/// `rbench ask`: run the loop once and print the answer with its trace.
///
/// With a log directory (flag or `agent.log_dir`) the run is also written
/// there as a JSON [`RunLog`].
pub async fn run_ask(
    config: &Config,
    question: &str,
    mode: Option<SearchMode>,
    log_dir: Option<PathBuf>,
) -> Result<()> {
    let orchestrator = pipeline::build_orchestrator(config, mode).await?;
    let response = orchestrator.run(question).await?;

    if let Some(dir) = log_dir.or_else(|| config.agent.log_dir.clone()) {
        let log = RunLog::new(config, orchestrator.config().mode, question, response.clone());
        let path = save_run_log(&log, &dir)?;
        info!(path = %path.display(), run_id = %log.run_id, "run log written");
    }

    println!("{}\n", response.answer.trim());
    if response.aborted {
        println!("(best effort: loop budget exhausted)\n");
    }
    println!("Sources:");
    if response.sources.is_empty() {
        println!("  (none)");
    }
    for (i, s) in response.sources.iter().enumerate() {
        println!("  {}. {}", i + 1, s);
    }
    println!("\nTool calls:");
    for call in &response.tool_calls {
        let note = match (&call.error, call.cached) {
            (Some(e), _) => format!(" [error: {}]", e),
            (None, true) => " [cached]".to_string(),
            (None, false) => String::new(),
        };
        println!(
            "  {:>2}. {:<15} {:?} \"{}\" -> {}{}",
            call.seq,
            call.kind().as_str(),
            call.phase,
            call.request.argument(),
            call.results,
            note
        );
    }
    println!(
        "\nconfidence: {:.2}  tokens: {}  mode: {}",
        response.confidence,
        response.total_tokens,
        orchestrator.config().mode
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_loop_config_is_valid() {
        assert!(LoopConfig::default().validate().is_ok());
    }

    #[test]
    fn test_blocked_keyword_ignores_case() {
        let config = LoopConfig {
            blocked_keywords: vec!["  ".to_string(), "Password".to_string()],
            ..LoopConfig::default()
        };
        assert_eq!(config.blocked_keyword("what is the admin PASSWORD?"), Some("Password"));
        assert_eq!(config.blocked_keyword("where do capybaras live?"), None);
        assert_eq!(LoopConfig::default().blocked_keyword("password"), None);
    }

    #[test]
    fn test_zero_token_budget_rejected() {
        let config = LoopConfig {
            token_budget: Some(0),
            ..LoopConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_floors_above_cap_rejected() {
        let config = LoopConfig {
            min_broad: 5,
            min_specific: 5,
            max_calls: 9,
            ..LoopConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CoreError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_threshold_range_checked() {
        let config = LoopConfig {
            confidence_threshold: 1.5,
            ..LoopConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_search_mode_parse() {
        assert_eq!("evaluation".parse::<SearchMode>().unwrap(), SearchMode::Evaluation);
        assert_eq!("prod".parse::<SearchMode>().unwrap(), SearchMode::Production);
        assert!("fast".parse::<SearchMode>().is_err());
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("héllo wörld", 4), "héll");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn test_clamp_unit() {
        assert_eq!(clamp_unit(f64::NAN), 0.0);
        assert_eq!(clamp_unit(1.7), 1.0);
        assert_eq!(clamp_unit(-0.1), 0.0);
        assert_eq!(clamp_unit(0.4), 0.4);
    }
}
