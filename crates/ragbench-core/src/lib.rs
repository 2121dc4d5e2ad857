//! # ragbench core
//!
//! Runtime-agnostic logic for ragbench: data models, the sliding-window
//! chunker, the three-backend search index, the embedding trait, and the
//! evaluation metrics.
//!
//! This crate contains no tokio, HTTP, or filesystem I/O. Everything that
//! talks to the outside world (language models, fetchers, config files)
//! lives in the `ragbench` app crate.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod index;
pub mod metrics;
pub mod models;

pub use error::{CoreError, Result};
