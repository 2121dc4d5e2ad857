//! # ragbench
//!
//! Agentic retrieval over a local corpus, with an evaluation harness that
//! scores every run on retrieval quality, answer quality, and token cost.
//!
//! The pure algorithms (chunking, the three search backends, metrics) live
//! in `ragbench-core`. This crate adds configuration, collaborators that
//! talk to the outside world, the tool-orchestration loop, the harness, and
//! the `rbench` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌─────────────┐
//! │  Corpus  │──▶│ Chunk+Index  │──▶│ Orchestrator│──▶ AgentResponse
//! │ (walkdir)│   │ lex/sparse/  │   │ tool calls  │          │
//! └──────────┘   │ dense        │   │ → synthesis │          ▼
//!                └──────────────┘   └─────────────┘   ┌────────────┐
//!                                                     │ Evaluator  │──▶ report.json
//!                                                     │ + Judge    │
//!                                                     └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rbench stats
//! rbench search "capybara habitat" --backend sparse
//! rbench ask "Where do capybaras live?" --mode production
//! rbench eval ./evals/ground_truth.json --output ./evals/results/run.json
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`corpus`] | Filesystem corpus loader |
//! | [`pipeline`] | Builds index and collaborators from config |
//! | [`embedding`] | Embedding providers for the dense backend |
//! | [`llm`] | OpenAI-compatible chat client |
//! | [`traits`] | Collaborator traits (fetch, reason, generate, judge) |
//! | [`fetch`] | Corpus and HTTP page fetchers |
//! | [`reasoner`] | LLM and heuristic next-step reasoners |
//! | [`generate`] | Answer synthesis |
//! | [`judge`] | LLM-as-a-judge |
//! | [`agent`] | Tool-orchestration loop |
//! | [`harness`] | Evaluation harness |
//! | [`report`] | JSON reports and summaries |
//! | [`search`] | `search` command |
//! | [`stats`] | `stats` command |

pub mod agent;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod fetch;
pub mod generate;
pub mod harness;
pub mod judge;
pub mod llm;
pub mod pipeline;
pub mod reasoner;
pub mod report;
pub mod search;
pub mod stats;
pub mod traits;

pub use ragbench_core as core;
