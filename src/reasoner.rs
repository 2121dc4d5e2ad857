//! Reasoner implementations: what the loop does next.
//!
//! [`LlmReasoner`] asks a chat model for one JSON action per step. A reply
//! that does not parse ends the loop but its tokens are still counted.
//! [`HeuristicReasoner`] is deterministic and offline: broad searches over
//! keyword variants of the question, then full-page fetches of every
//! source those searches surfaced, then stop.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use ragbench_core::index::tokenize::tokenize;
use ragbench_core::models::{ToolKind, ToolRequest};
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

use crate::agent::truncate_chars;
use crate::llm::{extract_json_object, ChatModel, Completion, Message};
use crate::traits::{Decision, LoopView, Observation, Reasoner};

const OBSERVATION_CHARS: usize = 1500;

// ============ Heuristic ============

#[derive(Debug, Clone, Default)]
pub struct HeuristicReasoner;

impl HeuristicReasoner {
    /// Query for the `n`-th search: the question itself first, then
    /// rotating windows of its keywords.
    fn query_variant(question: &str, n: usize) -> String {
        if n == 0 {
            return question.to_string();
        }
        let mut keywords: Vec<String> = Vec::new();
        for t in tokenize(question) {
            if !keywords.contains(&t) {
                keywords.push(t);
            }
        }
        if keywords.is_empty() {
            return question.to_string();
        }
        let width = keywords.len().min(3);
        keywords
            .iter()
            .cycle()
            .skip((n - 1) % keywords.len())
            .take(width)
            .cloned()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl Reasoner for HeuristicReasoner {
    async fn decide(&self, view: LoopView<'_>) -> Result<Decision> {
        let fetched = view.fetched.len() as f64;
        let confidence = (fetched / (view.min_specific.max(1) as f64)).min(1.0) * 0.9;

        if view.broad_done < view.min_broad {
            let query = Self::query_variant(view.question, view.broad_done);
            return Ok(Decision::call(ToolRequest::BroadSearch { query }, confidence));
        }

        let attempted = |id: &str| {
            view.calls.iter().any(|c| {
                c.kind() == ToolKind::FetchPage && c.request.argument() == id
            })
        };
        if let Some(source_id) = view.sources.iter().find(|s| !attempted(s.as_str())) {
            return Ok(Decision::call(
                ToolRequest::FetchPage {
                    source_id: source_id.clone(),
                },
                confidence,
            ));
        }

        if view.specific_done < view.min_specific {
            let query = Self::query_variant(view.question, view.specific_done + 1);
            return Ok(Decision::call(ToolRequest::SpecificSearch { query }, confidence));
        }

        Ok(Decision::stop(confidence))
    }
}

// ============ LLM ============

const REASONER_INSTRUCTIONS: &str = r#"You are a research agent answering a question from a document collection.
You can call exactly one tool per step:

- broad_search {"query": "..."}: wide search to discover candidate sources.
- specific_search {"query": "..."}: narrow search for a detail.
- fetch_page {"source_id": "..."}: read the full text of one source.

Work in two phases. First run 3 to 5 broad searches with different
phrasings to map the topic. Then run 8 to 12 specific searches or page
fetches to collect precise evidence. Prefer fetching pages that searches
surfaced over repeating searches. Never fetch the same source twice.

Reply with a single JSON object and nothing else:
{"action": "call", "tool": "broad_search", "query": "...", "confidence": 0.3}
{"action": "call", "tool": "fetch_page", "source_id": "...", "confidence": 0.6}
{"action": "stop", "confidence": 0.9}

confidence is your estimate in [0, 1] that the evidence gathered so far is
enough to answer the question fully."#;

pub struct LlmReasoner {
    client: Arc<dyn ChatModel>,
}

impl LlmReasoner {
    pub fn new(client: Arc<dyn ChatModel>) -> Self {
        Self { client }
    }
}

/// Turn a completion into a decision. A reply that does not parse is a
/// stop at zero confidence; the tokens it cost are still charged.
pub fn decision_from_completion(completion: &Completion) -> Decision {
    match parse_decision(&completion.content) {
        Ok(decision) => decision.with_tokens(completion.total_tokens),
        Err(e) => {
            warn!(
                error = %format!("{:#}", e),
                reply = %truncate_chars(&completion.content, 200),
                "unparseable reasoner reply, stopping"
            );
            Decision::stop(0.0).with_tokens(completion.total_tokens)
        }
    }
}

#[async_trait]
impl Reasoner for LlmReasoner {
    async fn decide(&self, view: LoopView<'_>) -> Result<Decision> {
        let messages = [
            Message::system(REASONER_INSTRUCTIONS),
            Message::user(render_view(&view)),
        ];
        let completion = self.client.complete(&messages).await?;
        Ok(decision_from_completion(&completion))
    }
}

#[derive(Deserialize)]
struct Reply {
    action: String,
    #[serde(default)]
    confidence: f64,
}

/// Parse one model reply into a [`Decision`].
pub fn parse_decision(text: &str) -> Result<Decision> {
    let json = extract_json_object(text).context("no JSON object in reply")?;
    let reply: Reply = serde_json::from_str(json)?;
    match reply.action.as_str() {
        "stop" => Ok(Decision::stop(reply.confidence)),
        "call" => {
            let request: ToolRequest = serde_json::from_str(json)?;
            Ok(Decision::call(request, reply.confidence))
        }
        other => bail!("unknown action '{}'", other),
    }
}

fn render_view(view: &LoopView<'_>) -> String {
    let mut out = format!(
        "<QUESTION>\n{}\n</QUESTION>\n\n<STATE>\nphase: {:?}\nbroad searches: {} (minimum {})\nspecific calls: {} (minimum {})\ncalls remaining: {}\n</STATE>\n",
        view.question,
        view.phase,
        view.broad_done,
        view.min_broad,
        view.specific_done,
        view.min_specific,
        view.remaining_calls
    );

    if !view.sources.is_empty() {
        out.push_str("\n<SOURCES_SEEN>\n");
        for s in view.sources {
            let mark = if view.fetched.contains(s) { " (fetched)" } else { "" };
            out.push_str(&format!("- {}{}\n", s, mark));
        }
        out.push_str("</SOURCES_SEEN>\n");
    }

    if !view.calls.is_empty() {
        out.push_str("\n<TOOL_CALLS>\n");
        for c in view.calls {
            out.push_str(&format!(
                "{}. {} \"{}\" -> {} result(s){}\n",
                c.seq,
                c.kind(),
                c.request.argument(),
                c.results,
                c.error.as_deref().map(|e| format!(" [{}]", e)).unwrap_or_default()
            ));
        }
        out.push_str("</TOOL_CALLS>\n");
    }

    if let Some(last) = view.last {
        out.push_str("\n<LAST_RESULT>\n");
        match last {
            Observation::Search { query, hits } => {
                out.push_str(&format!("search \"{}\":\n", query));
                for h in hits {
                    out.push_str(&format!("- [{}] ({:.3}) {}\n", h.source_id, h.score, h.snippet));
                }
            }
            Observation::Page { source_id, text } => {
                out.push_str(&format!(
                    "page {}:\n{}\n",
                    source_id,
                    truncate_chars(text, OBSERVATION_CHARS)
                ));
            }
            Observation::Failed { request, error } => {
                out.push_str(&format!("{} failed: {}\n", request.kind(), error));
            }
        }
        out.push_str("</LAST_RESULT>\n");
    }
    out
}
