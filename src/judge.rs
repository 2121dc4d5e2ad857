//! LLM-as-a-judge scoring of agent answers.
//!
//! The judge sees the question, the answer, the sources the agent used and
//! its tool-call trace, each in its own XML-tagged section, and replies with
//! a JSON [`JudgeEvaluation`]. Scores are clamped to `[0, 1]`.
//!
//! A reply that fails (transport or parse) is retried with exponential
//! backoff (1s, 2s, 4s, ...). Tokens are summed over every attempt that got
//! a reply, parseable or not. After the last attempt a [`JudgeFailure`]
//! carrying those tokens is returned and the harness records a zero
//! judgment for that question.

use anyhow::{Context, Result};
use async_trait::async_trait;
use ragbench_core::models::{AgentResponse, JudgeEvaluation};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::llm::{extract_json_object, ChatModel, Message};
use crate::traits::{Judge, JudgeFailure, Judgment};

const JUDGE_INSTRUCTIONS: &str = r#"You are an expert evaluator of question-answering systems.
Score the ANSWER to the QUESTION on three criteria, each from 0.0 to 1.0:

- accuracy: is every claim correct and supported by the listed SOURCES?
- completeness: does it cover everything the question asks?
- relevance: does it stay on the question without padding?

overall_score is your holistic judgment, not necessarily the mean.
Use TOOL_CALLS only to understand how the evidence was gathered.

Reply with a single JSON object:
{"overall_score": 0.0, "accuracy": 0.0, "completeness": 0.0, "relevance": 0.0, "reasoning": "..."}"#;

pub struct LlmJudge {
    client: Arc<dyn ChatModel>,
    max_attempts: u32,
    backoff: Duration,
}

impl LlmJudge {
    pub fn new(client: Arc<dyn ChatModel>) -> Self {
        Self {
            client,
            max_attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }

    pub fn with_retries(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff = backoff;
        self
    }
}

#[async_trait]
impl Judge for LlmJudge {
    async fn judge(&self, question: &str, response: &AgentResponse) -> Result<Judgment> {
        let messages = [
            Message::system(JUDGE_INSTRUCTIONS),
            Message::user(build_prompt(question, response)),
        ];
        let mut tokens = 0u64;
        let mut last_err = None;

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let delay = self.backoff * (1u32 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }
            let outcome = match self.client.complete(&messages).await {
                Ok(completion) => {
                    tokens += completion.total_tokens;
                    parse_evaluation(&completion.content)
                }
                Err(e) => Err(e.into()),
            };
            match outcome {
                Ok(evaluation) => {
                    info!(
                        model = self.client.model(),
                        overall = evaluation.overall_score,
                        tokens,
                        "judge evaluation complete"
                    );
                    return Ok(Judgment { evaluation, tokens });
                }
                Err(e) => {
                    warn!(attempt = attempt + 1, error = %format!("{:#}", e), "judge attempt failed");
                    last_err = Some(e);
                }
            }
        }

        let cause = last_err.map_or_else(|| "no attempts made".to_string(), |e| format!("{:#}", e));
        Err(JudgeFailure {
            message: format!("judge failed after {} attempts: {}", self.max_attempts, cause),
            tokens,
        }
        .into())
    }
}

/// Render the judge's user prompt.
pub fn build_prompt(question: &str, response: &AgentResponse) -> String {
    let sources = if response.sources.is_empty() {
        "None".to_string()
    } else {
        response.sources.join(", ")
    };

    let mut prompt = format!(
        "<QUESTION>{}</QUESTION>\n\n<ANSWER>{}</ANSWER>\n\n<SOURCES>{}</SOURCES>",
        question, response.answer, sources
    );

    if !response.tool_calls.is_empty() {
        let calls: Vec<serde_json::Value> = response
            .tool_calls
            .iter()
            .map(|c| {
                json!({
                    "tool": c.kind().as_str(),
                    "args": c.request.argument(),
                    "results": c.results,
                })
            })
            .collect();
        let rendered = serde_json::to_string_pretty(&calls).unwrap_or_default();
        prompt.push_str(&format!("\n\n<TOOL_CALLS>\n{}\n</TOOL_CALLS>", rendered));
    }

    prompt.push_str(
        "\n\nEvaluate this answer on accuracy, completeness, and relevance to the question.",
    );
    prompt
}

/// Parse and clamp a judge reply.
pub fn parse_evaluation(text: &str) -> Result<JudgeEvaluation> {
    let json = extract_json_object(text).context("no JSON object in judge reply")?;
    let evaluation: JudgeEvaluation =
        serde_json::from_str(json).context("judge reply is not a valid evaluation")?;
    Ok(evaluation.clamped())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragbench_core::models::{Phase, ToolCall, ToolRequest};

    fn response() -> AgentResponse {
        AgentResponse {
            answer: "Capybaras live near rivers.".to_string(),
            tool_calls: vec![ToolCall {
                seq: 1,
                request: ToolRequest::BroadSearch {
                    query: "capybara habitat".to_string(),
                },
                phase: Phase::Broad,
                results: 2,
                cached: false,
                error: None,
            }],
            sources: vec!["Capybara".to_string(), "Rodent".to_string()],
            confidence: 0.8,
            total_tokens: 900,
            aborted: false,
        }
    }

    #[test]
    fn test_build_prompt_sections() {
        let prompt = build_prompt("Where do capybaras live?", &response());
        assert!(prompt.contains("<QUESTION>Where do capybaras live?</QUESTION>"));
        assert!(prompt.contains("<ANSWER>Capybaras live near rivers.</ANSWER>"));
        assert!(prompt.contains("<SOURCES>Capybara, Rodent</SOURCES>"));
        assert!(prompt.contains("<TOOL_CALLS>"));
        assert!(prompt.contains("\"broad_search\""));
    }

    #[test]
    fn test_build_prompt_without_sources() {
        let mut r = response();
        r.sources.clear();
        r.tool_calls.clear();
        let prompt = build_prompt("Q", &r);
        assert!(prompt.contains("<SOURCES>None</SOURCES>"));
        assert!(!prompt.contains("<TOOL_CALLS>"));
    }

    #[test]
    fn test_parse_evaluation_clamps() {
        let e = parse_evaluation(
            "```json\n{\"overall_score\": 1.2, \"accuracy\": 0.9, \"completeness\": 0.7, \"relevance\": -1, \"reasoning\": \"ok\"}\n```",
        )
        .unwrap();
        assert_eq!(e.overall_score, 1.0);
        assert_eq!(e.accuracy, 0.9);
        assert_eq!(e.relevance, 0.0);
        assert_eq!(e.reasoning, "ok");
    }

    #[test]
    fn test_parse_evaluation_rejects_missing_fields() {
        assert!(parse_evaluation("{\"overall_score\": 0.5}").is_err());
        assert!(parse_evaluation("great answer").is_err());
    }
}
