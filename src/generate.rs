//! Answer synthesis through a chat model.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::llm::{extract_json_object, ChatModel, Message};
use crate::traits::{Generation, Generator};

const GENERATOR_INSTRUCTIONS: &str = r#"You answer questions using only the evidence in CONTEXT.
Cite the source ids you relied on inline, in square brackets.
If the context does not contain the answer, say so plainly.

Reply with a single JSON object:
{"answer": "...", "confidence": 0.0}
where confidence in [0, 1] reflects how fully the context supports the answer."#;

pub struct LlmGenerator {
    client: Arc<dyn ChatModel>,
}

impl LlmGenerator {
    pub fn new(client: Arc<dyn ChatModel>) -> Self {
        Self { client }
    }
}

#[derive(Deserialize)]
struct Reply {
    answer: String,
    #[serde(default)]
    confidence: f64,
}

/// Build the user prompt for one synthesis call.
pub fn build_prompt(question: &str, context: &str) -> String {
    format!(
        "<QUESTION>\n{}\n</QUESTION>\n\n<CONTEXT>\n{}\n</CONTEXT>",
        question.trim(),
        context.trim()
    )
}

/// Parse the model reply. A reply that is not JSON is taken verbatim as
/// the answer with zero confidence.
pub fn parse_generation(text: &str) -> Result<(String, f64)> {
    if let Some(json) = extract_json_object(text) {
        if let Ok(reply) = serde_json::from_str::<Reply>(json) {
            if reply.answer.trim().is_empty() {
                bail!("model returned an empty answer");
            }
            return Ok((reply.answer, reply.confidence));
        }
    }
    if text.trim().is_empty() {
        bail!("model returned an empty answer");
    }
    Ok((text.trim().to_string(), 0.0))
}

#[async_trait]
impl Generator for LlmGenerator {
    async fn generate(&self, question: &str, context: &str) -> Result<Generation> {
        let messages = [
            Message::system(GENERATOR_INSTRUCTIONS),
            Message::user(build_prompt(question, context)),
        ];
        let completion = self.client.complete(&messages).await?;
        let (answer, confidence) = parse_generation(&completion.content)?;
        Ok(Generation {
            answer,
            confidence,
            tokens: completion.total_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_generation_json() {
        let (answer, conf) =
            parse_generation("{\"answer\": \"Near rivers [capybara.md]\", \"confidence\": 0.8}")
                .unwrap();
        assert_eq!(answer, "Near rivers [capybara.md]");
        assert_eq!(conf, 0.8);
    }

    #[test]
    fn test_parse_generation_plain_text() {
        let (answer, conf) = parse_generation("  They live near water.  ").unwrap();
        assert_eq!(answer, "They live near water.");
        assert_eq!(conf, 0.0);
    }

    #[test]
    fn test_parse_generation_empty() {
        assert!(parse_generation("   ").is_err());
        assert!(parse_generation("{\"answer\": \"\", \"confidence\": 1}").is_err());
    }

    #[test]
    fn test_build_prompt_sections() {
        let p = build_prompt(" Q? ", "ctx");
        assert!(p.starts_with("<QUESTION>\nQ?\n</QUESTION>"));
        assert!(p.contains("<CONTEXT>\nctx\n</CONTEXT>"));
    }
}
