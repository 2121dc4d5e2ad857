//! Wiring: configuration in, ready-to-run components out.
//!
//! ```text
//! [corpus] ──▶ load_corpus ──▶ chunk_corpus ──▶ SearchIndex::build
//!                  │                                   │
//!                  └──▶ CorpusFetcher        Orchestrator ◀── Reasoner, Generator
//! ```

use anyhow::{Context, Result};
use ragbench_core::chunk::chunk_corpus;
use ragbench_core::index::{BackendKind, IndexBackend, SearchIndex};
use ragbench_core::models::{Chunk, Document};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::agent::{Orchestrator, SearchMode};
use crate::config::Config;
use crate::corpus::load_corpus;
use crate::embedding::create_provider;
use crate::fetch::{CorpusFetcher, HttpFetcher};
use crate::generate::LlmGenerator;
use crate::judge::LlmJudge;
use crate::llm::{ChatClient, ChatModel};
use crate::reasoner::{HeuristicReasoner, LlmReasoner};
use crate::traits::{Fetcher, Judge, Reasoner};

/// Load the corpus and split it into chunks.
pub fn load_chunks(config: &Config) -> Result<(Vec<Document>, Vec<Chunk>)> {
    let docs = load_corpus(&config.corpus)?;
    let params = config.chunking.params()?;
    let chunks = chunk_corpus(&docs, &params);
    Ok((docs, chunks))
}

/// Resolve the backend, building an embedding provider for dense mode.
pub fn index_backend(config: &Config, kind: BackendKind) -> Result<IndexBackend> {
    Ok(match kind {
        BackendKind::Lexical => IndexBackend::Lexical,
        BackendKind::Sparse => IndexBackend::Sparse,
        BackendKind::Dense => {
            if !config.embedding.is_enabled() {
                anyhow::bail!("Backend 'dense' requires embeddings. Set [embedding] provider in config.");
            }
            IndexBackend::Dense(create_provider(&config.embedding, &config.llm.base_url)?)
        }
    })
}

/// Load, chunk and index the corpus.
pub async fn build_index(
    config: &Config,
    backend: Option<BackendKind>,
) -> Result<(Vec<Document>, SearchIndex)> {
    let (docs, chunks) = load_chunks(config)?;
    let kind = match backend {
        Some(k) => k,
        None => config.index.kind()?,
    };
    let backend = index_backend(config, kind)?;
    let index = SearchIndex::build(chunks, &backend)
        .await
        .with_context(|| format!("Failed to build {} index", kind))?;
    info!(
        documents = docs.len(),
        chunks = index.len(),
        backend = %kind,
        "index ready"
    );
    Ok((docs, index))
}

pub fn build_fetcher(config: &Config, docs: &[Document]) -> Result<Arc<dyn Fetcher>> {
    match config.fetch.kind.as_str() {
        "corpus" => Ok(Arc::new(CorpusFetcher::new(docs))),
        "http" => {
            let template = config
                .fetch
                .url_template
                .as_deref()
                .context("fetch.url_template required for kind = \"http\"")?;
            Ok(Arc::new(HttpFetcher::new(
                template,
                Duration::from_secs(config.fetch.timeout_secs),
            )?))
        }
        other => anyhow::bail!("Unknown fetch kind: {}", other),
    }
}

pub fn build_reasoner(config: &Config) -> Result<Arc<dyn Reasoner>> {
    match config.agent.reasoner.as_str() {
        "heuristic" => Ok(Arc::new(HeuristicReasoner)),
        "llm" => {
            let client: Arc<dyn ChatModel> = Arc::new(ChatClient::from_config(
                &config.llm,
                &config.llm.model,
                config.llm.temperature,
            )?);
            Ok(Arc::new(LlmReasoner::new(client)))
        }
        other => anyhow::bail!("Unknown reasoner: {}", other),
    }
}

pub fn build_judge(config: &Config) -> Result<Arc<dyn Judge>> {
    let client: Arc<dyn ChatModel> = Arc::new(ChatClient::from_config(
        &config.llm,
        &config.llm.judge_model,
        config.llm.judge_temperature,
    )?);
    Ok(Arc::new(LlmJudge::new(client)))
}

/// Everything `ask` and `eval` need, with an optional mode override.
pub async fn build_orchestrator(config: &Config, mode: Option<SearchMode>) -> Result<Orchestrator> {
    let mut loop_config = config.agent.loop_config(config.llm.timeout_secs)?;
    if let Some(mode) = mode {
        loop_config = loop_config.with_mode(mode);
    }

    let reasoner = build_reasoner(config)?;
    let chat: Arc<dyn ChatModel> = Arc::new(ChatClient::from_config(
        &config.llm,
        &config.llm.model,
        config.llm.temperature,
    )?);
    let generator = Arc::new(LlmGenerator::new(chat));
    let (docs, index) = build_index(config, None).await?;
    let fetcher = build_fetcher(config, &docs)?;

    Ok(Orchestrator::new(
        Arc::new(index),
        fetcher,
        reasoner,
        generator,
        loop_config,
    ))
}
