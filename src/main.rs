//! # ragbench CLI (`rbench`)
//!
//! Loads a corpus, builds a search index, answers questions with the
//! tool-orchestration loop, and evaluates the loop against ground truth.
//!
//! ## Usage
//!
//! ```bash
//! rbench --config ./config/rbench.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rbench stats` | Document and chunk counts for the configured corpus |
//! | `rbench search "<query>"` | Rank chunks against a query |
//! | `rbench ask "<question>"` | Run the orchestration loop once |
//! | `rbench eval <ground_truth.json>` | Score the loop against ground truth |
//!
//! Logs go to stderr; set `RUST_LOG=debug` for per-call detail.

use clap::{Parser, Subcommand};
use ragbench::agent::{self, SearchMode};
use ragbench::core::index::BackendKind;
use ragbench::{config, harness, search, stats};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// ragbench: agentic retrieval over local corpora with a built-in
/// evaluation harness.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/rbench.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "rbench",
    about = "Agentic retrieval over local corpora with a built-in evaluation harness",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/rbench.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Show corpus statistics.
    ///
    /// Loads and chunks the corpus with the configured globs and chunking
    /// parameters, then prints counts per content format.
    Stats,

    /// Search the corpus.
    ///
    /// Builds an index with the configured (or overridden) backend and
    /// prints the ranked chunks.
    Search {
        /// The search query.
        query: String,

        /// Index backend: `lexical`, `sparse`, or `dense`.
        #[arg(long)]
        backend: Option<BackendKind>,

        /// Maximum number of results (defaults to `index.top_k`).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Answer a question with the tool-orchestration loop.
    Ask {
        /// The question.
        question: String,

        /// `evaluation` enforces both call floors; `production` may stop early.
        #[arg(long)]
        mode: Option<SearchMode>,

        /// Write a JSON run log into this directory (defaults to `agent.log_dir`).
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },

    /// Evaluate the loop against a ground-truth file.
    ///
    /// The file is a JSON array of `{"question": ..., "expected_sources": [...]}`.
    Eval {
        /// Path to the ground-truth JSON file.
        ground_truth: PathBuf,

        /// Where to write the JSON report (defaults to `eval.output`).
        #[arg(long)]
        output: Option<PathBuf>,

        /// Questions evaluated concurrently (defaults to `eval.concurrency`).
        #[arg(long)]
        concurrency: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Search {
            query,
            backend,
            limit,
        } => {
            search::run_search(&cfg, &query, backend, limit).await?;
        }
        Commands::Ask {
            question,
            mode,
            log_dir,
        } => {
            agent::run_ask(&cfg, &question, mode, log_dir).await?;
        }
        Commands::Eval {
            ground_truth,
            output,
            concurrency,
        } => {
            harness::run_eval(&cfg, &ground_truth, output, concurrency).await?;
        }
    }

    Ok(())
}
