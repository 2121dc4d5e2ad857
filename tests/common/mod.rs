//! Mock collaborators shared by the loop and harness integration tests.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ragbench::agent::{LoopConfig, Orchestrator};
use ragbench::core::chunk::{chunk_corpus, ChunkParams};
use ragbench::core::index::{IndexBackend, SearchIndex};
use ragbench::core::models::{AgentResponse, Document, JudgeEvaluation};
use ragbench::llm::{ChatModel, Completion, LlmError, Message};
use ragbench::traits::{
    Decision, FetchError, Fetcher, Generation, Generator, Judge, JudgeFailure, Judgment, LoopView,
    Reasoner,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn docs() -> Vec<Document> {
    vec![
        Document::new(
            "capybara.md",
            "The capybara is the largest living rodent. Capybaras live near rivers and lakes.",
        ),
        Document::new(
            "rust.md",
            "Rust is a systems programming language. Cargo builds crates.",
        ),
        Document::new(
            "rodents.md",
            "Rodents include mice, rats, beavers and the capybara.",
        ),
    ]
}

pub async fn lexical_index(docs: &[Document]) -> Arc<SearchIndex> {
    let chunks = chunk_corpus(docs, &ChunkParams::new(2000, 0.5).unwrap());
    Arc::new(SearchIndex::build(chunks, &IndexBackend::Lexical).await.unwrap())
}

/// Small floors, no real backoff.
pub fn fast_config(min_broad: usize, min_specific: usize, max_calls: usize) -> LoopConfig {
    LoopConfig {
        min_broad,
        min_specific,
        max_calls,
        retry_backoff: Duration::from_millis(1),
        ..LoopConfig::default()
    }
}

pub fn orchestrator(
    index: Arc<SearchIndex>,
    fetcher: Arc<dyn Fetcher>,
    reasoner: Arc<dyn Reasoner>,
    generator: Arc<dyn Generator>,
    config: LoopConfig,
) -> Orchestrator {
    Orchestrator::new(index, fetcher, reasoner, generator, config)
}

// ============ Reasoners ============

/// Plays back a fixed list of decisions, then repeats `fallback`.
pub struct ScriptedReasoner {
    script: Mutex<VecDeque<Decision>>,
    fallback: Decision,
}

impl ScriptedReasoner {
    pub fn new(script: Vec<Decision>, fallback: Decision) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
        }
    }

    pub fn always(decision: Decision) -> Self {
        Self::new(Vec::new(), decision)
    }
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    async fn decide(&self, _view: LoopView<'_>) -> Result<Decision> {
        let next = self.script.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.fallback.clone()))
    }
}

/// Sleeps before every decision.
pub struct SlowReasoner {
    pub delay: Duration,
    pub decision: Decision,
}

#[async_trait]
impl Reasoner for SlowReasoner {
    async fn decide(&self, _view: LoopView<'_>) -> Result<Decision> {
        tokio::time::sleep(self.delay).await;
        Ok(self.decision.clone())
    }
}

// ============ Fetchers ============

/// Serves pages from a map, counting calls per id. The first
/// `transient_failures` calls for any id fail with a transient error.
pub struct MockFetcher {
    pages: HashMap<String, String>,
    transient_failures: usize,
    calls: Mutex<HashMap<String, usize>>,
}

impl MockFetcher {
    pub fn new(docs: &[Document]) -> Self {
        Self {
            pages: docs.iter().map(|d| (d.id.clone(), d.text.clone())).collect(),
            transient_failures: 0,
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn failing_first(mut self, n: usize) -> Self {
        self.transient_failures = n;
        self
    }

    pub fn calls_for(&self, id: &str) -> usize {
        self.calls.lock().unwrap().get(id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, source_id: &str) -> Result<String, FetchError> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            let n = calls.entry(source_id.to_string()).or_insert(0);
            *n += 1;
            *n
        };
        if n <= self.transient_failures {
            return Err(FetchError::Transient(format!("503 on attempt {}", n)));
        }
        self.pages
            .get(source_id)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(source_id.to_string()))
    }
}

// ============ Generators ============

pub struct MockGenerator {
    pub tokens: u64,
    pub fail: bool,
    pub contexts: Mutex<Vec<String>>,
}

impl MockGenerator {
    pub fn new(tokens: u64) -> Self {
        Self {
            tokens,
            fail: false,
            contexts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            tokens: 0,
            fail: true,
            contexts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(&self, question: &str, context: &str) -> Result<Generation> {
        self.contexts.lock().unwrap().push(context.to_string());
        if self.fail {
            return Err(anyhow!("model unavailable"));
        }
        Ok(Generation {
            answer: format!("answer to: {}", question),
            confidence: 0.7,
            tokens: self.tokens,
        })
    }
}

// ============ Judges ============

pub struct MockJudge {
    pub score: f64,
    pub tokens: u64,
    pub fail: bool,
    pub seen: Mutex<Vec<AgentResponse>>,
    pub calls: AtomicUsize,
}

impl MockJudge {
    pub fn scoring(score: f64, tokens: u64) -> Self {
        Self {
            score,
            tokens,
            fail: false,
            seen: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self::failing_after(0)
    }

    /// Gives up after its attempts cost `tokens`.
    pub fn failing_after(tokens: u64) -> Self {
        Self {
            fail: true,
            ..Self::scoring(0.0, tokens)
        }
    }
}

#[async_trait]
impl Judge for MockJudge {
    async fn judge(&self, _question: &str, response: &AgentResponse) -> Result<Judgment> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(response.clone());
        if self.fail {
            return Err(JudgeFailure {
                message: "judge returned malformed JSON".to_string(),
                tokens: self.tokens,
            }
            .into());
        }
        Ok(Judgment {
            evaluation: JudgeEvaluation {
                overall_score: self.score,
                accuracy: self.score,
                completeness: self.score,
                relevance: self.score,
                reasoning: "mock".to_string(),
            },
            tokens: self.tokens,
        })
    }
}

/// Chat model that replays canned completions, then repeats `fallback`.
pub struct CannedChat {
    replies: Mutex<VecDeque<Completion>>,
    fallback: Completion,
    pub calls: AtomicUsize,
}

impl CannedChat {
    pub fn new(replies: Vec<(&str, u64)>, fallback: (&str, u64)) -> Self {
        let completion = |(content, total_tokens): (&str, u64)| Completion {
            content: content.to_string(),
            total_tokens,
        };
        Self {
            replies: Mutex::new(replies.into_iter().map(completion).collect()),
            fallback: completion(fallback),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ChatModel for CannedChat {
    fn model(&self) -> &str {
        "canned"
    }

    async fn complete(&self, _messages: &[Message]) -> Result<Completion, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.replies.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.fallback.clone()))
    }
}
