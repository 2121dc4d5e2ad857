//! TOML configuration parsing and validation.
//!
//! Every tunable of the pipeline lives here: corpus location, chunking,
//! index backend, embedding and LLM providers, orchestration-loop limits,
//! fetch strategy, and evaluation weights. Missing sections fall back to
//! defaults; [`load_config`] rejects inconsistent values up front.
//!
//! ```toml
//! [corpus]
//! root = "./docs"
//!
//! [chunking]
//! chunk_size = 2000
//! overlap_ratio = 0.5
//!
//! [index]
//! backend = "lexical"
//!
//! [agent]
//! mode = "evaluation"
//! min_broad = 3
//! min_specific = 8
//! max_calls = 20
//! ```

use anyhow::{bail, Context, Result};
use ragbench_core::chunk::ChunkParams;
use ragbench_core::index::BackendKind;
use ragbench_core::metrics::ScoreWeights;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::agent::{LoopConfig, SearchMode};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub eval: EvalConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.md".to_string(),
        "**/*.mdx".to_string(),
        "**/*.txt".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap_ratio")]
    pub overlap_ratio: f64,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap_ratio: default_overlap_ratio(),
        }
    }
}

fn default_chunk_size() -> usize {
    2000
}
fn default_overlap_ratio() -> f64 {
    0.5
}

impl ChunkingConfig {
    pub fn params(&self) -> Result<ChunkParams> {
        Ok(ChunkParams::new(self.chunk_size, self.overlap_ratio)?)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            top_k: default_top_k(),
        }
    }
}

fn default_backend() -> String {
    "lexical".to_string()
}
fn default_top_k() -> usize {
    5
}

impl IndexConfig {
    pub fn kind(&self) -> Result<BackendKind> {
        Ok(self.backend.parse::<BackendKind>()?)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Chunks sent per embeddings request during an index build.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            max_retries: 5,
            timeout_secs: 30,
            batch_size: 64,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_batch_size() -> usize {
    64
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_judge_model")]
    pub judge_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_judge_temperature")]
    pub judge_temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_llm_retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            judge_model: default_judge_model(),
            temperature: default_temperature(),
            judge_temperature: default_judge_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout_secs(),
            max_retries: default_llm_retries(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_judge_model() -> String {
    "gpt-4o".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_judge_temperature() -> f32 {
    0.0
}
fn default_max_tokens() -> u32 {
    2000
}
fn default_llm_timeout_secs() -> u64 {
    60
}
fn default_llm_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default = "default_reasoner")]
    pub reasoner: String,
    #[serde(default = "default_min_broad")]
    pub min_broad: usize,
    #[serde(default = "default_min_specific")]
    pub min_specific: usize,
    #[serde(default = "default_max_calls")]
    pub max_calls: usize,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    #[serde(default = "default_early_stop_confidence")]
    pub early_stop_confidence: f64,
    #[serde(default = "default_broad_top_k")]
    pub broad_top_k: usize,
    #[serde(default = "default_specific_top_k")]
    pub specific_top_k: usize,
    #[serde(default = "default_tool_retries")]
    pub tool_retries: u32,
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    #[serde(default)]
    pub budget_secs: Option<u64>,
    #[serde(default = "default_max_page_chars")]
    pub max_page_chars: usize,
    /// Questions containing any of these (case-insensitive) are refused.
    #[serde(default)]
    pub blocked_keywords: Vec<String>,
    /// Reasoner tokens after which the tool phase ends early.
    #[serde(default)]
    pub max_tokens_budget: Option<u64>,
    /// Where `rbench ask` writes JSON run logs. Unset disables them.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            reasoner: default_reasoner(),
            min_broad: default_min_broad(),
            min_specific: default_min_specific(),
            max_calls: default_max_calls(),
            confidence_threshold: default_confidence_threshold(),
            early_stop_confidence: default_early_stop_confidence(),
            broad_top_k: default_broad_top_k(),
            specific_top_k: default_specific_top_k(),
            tool_retries: default_tool_retries(),
            call_timeout_secs: default_call_timeout_secs(),
            budget_secs: None,
            max_page_chars: default_max_page_chars(),
            blocked_keywords: Vec::new(),
            max_tokens_budget: None,
            log_dir: None,
        }
    }
}

fn default_mode() -> String {
    "evaluation".to_string()
}
fn default_reasoner() -> String {
    "llm".to_string()
}
fn default_min_broad() -> usize {
    3
}
fn default_min_specific() -> usize {
    8
}
fn default_max_calls() -> usize {
    20
}
fn default_confidence_threshold() -> f64 {
    0.8
}
fn default_early_stop_confidence() -> f64 {
    0.95
}
fn default_broad_top_k() -> usize {
    5
}
fn default_specific_top_k() -> usize {
    3
}
fn default_tool_retries() -> u32 {
    2
}
fn default_call_timeout_secs() -> u64 {
    10
}
fn default_max_page_chars() -> usize {
    15_000
}

impl AgentConfig {
    /// Convert to the loop's runtime configuration.
    pub fn loop_config(&self, llm_timeout_secs: u64) -> Result<LoopConfig> {
        let mode: SearchMode = self.mode.parse()?;
        Ok(LoopConfig {
            mode,
            min_broad: self.min_broad,
            min_specific: self.min_specific,
            max_calls: self.max_calls,
            confidence_threshold: self.confidence_threshold,
            early_stop_confidence: self.early_stop_confidence,
            broad_top_k: self.broad_top_k,
            specific_top_k: self.specific_top_k,
            tool_retries: self.tool_retries,
            call_timeout: Duration::from_secs(self.call_timeout_secs),
            synthesis_timeout: Duration::from_secs(llm_timeout_secs),
            budget: self.budget_secs.map(Duration::from_secs),
            token_budget: self.max_tokens_budget,
            max_page_chars: self.max_page_chars,
            blocked_keywords: self.blocked_keywords.clone(),
            ..LoopConfig::default()
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_fetch_kind")]
    pub kind: String,
    #[serde(default)]
    pub url_template: Option<String>,
    #[serde(default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            kind: default_fetch_kind(),
            url_template: None,
            timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

fn default_fetch_kind() -> String {
    "corpus".to_string()
}
fn default_fetch_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct EvalConfig {
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default = "default_beta")]
    pub beta: f64,
    #[serde(default = "default_gamma")]
    pub gamma: f64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            beta: default_beta(),
            gamma: default_gamma(),
            concurrency: default_concurrency(),
            output: default_output(),
        }
    }
}

fn default_alpha() -> f64 {
    2.0
}
fn default_beta() -> f64 {
    0.5
}
fn default_gamma() -> f64 {
    1.5
}
fn default_concurrency() -> usize {
    4
}
fn default_output() -> PathBuf {
    PathBuf::from("evals/results/evaluation.json")
}

impl EvalConfig {
    pub fn weights(&self) -> ScoreWeights {
        ScoreWeights {
            alpha: self.alpha,
            beta: self.beta,
            gamma: self.gamma,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Reject inconsistent settings before anything is built.
pub fn validate(config: &Config) -> Result<()> {
    config
        .chunking
        .params()
        .context("invalid [chunking] section")?;

    let backend = config.index.kind()?;
    if config.index.top_k == 0 {
        bail!("index.top_k must be >= 1");
    }

    if backend == BackendKind::Dense && !config.embedding.is_enabled() {
        bail!("index.backend = \"dense\" requires an [embedding] provider");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "hash" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or hash.",
            other
        ),
    }
    if config.embedding.dims == Some(0) {
        bail!("embedding.dims must be > 0");
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }
    if config.embedding.provider == "openai" {
        if config.embedding.model.is_none() {
            bail!("embedding.model must be specified when provider is 'openai'");
        }
        if config.embedding.dims.is_none() {
            bail!("embedding.dims must be specified when provider is 'openai'");
        }
    }

    match config.agent.reasoner.as_str() {
        "llm" | "heuristic" => {}
        other => bail!("Unknown agent.reasoner: '{}'. Must be llm or heuristic.", other),
    }
    config
        .agent
        .loop_config(config.llm.timeout_secs)?
        .validate()
        .context("invalid [agent] section")?;

    match config.fetch.kind.as_str() {
        "corpus" => {}
        "http" => {
            let template = config
                .fetch
                .url_template
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("fetch.url_template is required for kind = \"http\""))?;
            if !template.contains("{id}") {
                bail!("fetch.url_template must contain the {{id}} placeholder");
            }
        }
        other => bail!("Unknown fetch.kind: '{}'. Must be corpus or http.", other),
    }

    config.eval.weights().validate().context("invalid [eval] weights")?;
    if config.eval.concurrency == 0 {
        bail!("eval.concurrency must be >= 1");
    }

    Ok(())
}
