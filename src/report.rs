//! Evaluation report persistence and console summary.
//!
//! Reports are JSON documents:
//!
//! ```json
//! {
//!   "run_id": "6f1c...",
//!   "timestamp": "2026-03-01T12:00:00Z",
//!   "num_questions": 20,
//!   "metadata": { "ground_truth": "...", "search_mode": "evaluation", ... },
//!   "summary": { "avg_hit_rate": 0.85, "avg_mrr": 0.61, ... },
//!   "results": [ { "question": "...", "combined_score": 0.49, ... } ]
//! }
//! ```
//!
//! `results` are sorted by `combined_score`, best first.
//!
//! `rbench ask` can also leave a [`RunLog`] per question: the question,
//! the model setup and the full [`AgentResponse`] with its tool trace.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use ragbench_core::metrics::ScoreWeights;
use ragbench_core::models::{AgentResponse, EvaluationSummary, QuestionResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::agent::{LoopConfig, SearchMode};
use crate::config::Config;
use crate::harness::EvaluationRun;

/// Configuration identifiers recorded with every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub ground_truth: String,
    pub search_mode: String,
    pub index_backend: String,
    pub chunk_size: usize,
    pub overlap_ratio: f64,
    pub reasoner: String,
    pub agent_model: String,
    pub judge_model: String,
    pub embedding_model: Option<String>,
    pub min_broad: usize,
    pub min_specific: usize,
    pub max_calls: usize,
    pub weights: ScoreWeights,
}

impl ReportMetadata {
    pub fn from_config(config: &Config, ground_truth: &Path, loop_config: &LoopConfig) -> Self {
        Self {
            ground_truth: ground_truth.display().to_string(),
            search_mode: loop_config.mode.to_string(),
            index_backend: config.index.backend.clone(),
            chunk_size: config.chunking.chunk_size,
            overlap_ratio: config.chunking.overlap_ratio,
            reasoner: config.agent.reasoner.clone(),
            agent_model: config.llm.model.clone(),
            judge_model: config.llm.judge_model.clone(),
            embedding_model: config.embedding.is_enabled().then(|| {
                config
                    .embedding
                    .model
                    .clone()
                    .unwrap_or_else(|| config.embedding.provider.clone())
            }),
            min_broad: loop_config.min_broad,
            min_specific: loop_config.min_specific,
            max_calls: loop_config.max_calls,
            weights: config.eval.weights(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub num_questions: usize,
    pub metadata: ReportMetadata,
    pub summary: EvaluationSummary,
    pub results: Vec<QuestionResult>,
}

impl EvaluationReport {
    pub fn new(run: EvaluationRun, metadata: ReportMetadata) -> Self {
        let mut results = run.results;
        results.sort_by(|a, b| b.combined_score.total_cmp(&a.combined_score));
        Self {
            run_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            num_questions: results.len(),
            metadata,
            summary: run.summary,
            results,
        }
    }
}

/// Write `report` as pretty JSON. The `.json` extension is enforced and
/// missing parent directories are created. Returns the path written.
pub fn save_report(report: &EvaluationReport, path: &Path) -> Result<PathBuf> {
    let path = if path.extension().and_then(|e| e.to_str()) == Some("json") {
        path.to_path_buf()
    } else {
        path.with_extension("json")
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

/// One `rbench ask` run as written to the log directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLog {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub question: String,
    pub search_mode: SearchMode,
    pub reasoner: String,
    pub agent_model: String,
    pub response: AgentResponse,
}

impl RunLog {
    pub fn new(config: &Config, mode: SearchMode, question: &str, response: AgentResponse) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            question: question.to_string(),
            search_mode: mode,
            reasoner: config.agent.reasoner.clone(),
            agent_model: config.llm.model.clone(),
            response,
        }
    }

    /// `<timestamp>_<run id prefix>.json`, sortable by time.
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}.json",
            self.timestamp.format("%Y%m%dT%H%M%S"),
            &self.run_id[..8.min(self.run_id.len())]
        )
    }
}

/// Write `log` into `dir`, creating it if needed. Returns the path written.
pub fn save_run_log(log: &RunLog, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(log.file_name());
    let json = serde_json::to_string_pretty(log)?;
    std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

pub fn print_summary(report: &EvaluationReport) {
    let s = &report.summary;
    println!("Evaluation Summary");
    println!("==================");
    println!();
    println!("  Run:             {}", report.run_id);
    println!("  Questions:       {}", report.num_questions);
    println!("  Failed:          {}", s.failed);
    println!("  Mode:            {}", report.metadata.search_mode);
    println!("  Backend:         {}", report.metadata.index_backend);
    println!();
    println!("  Avg hit rate:    {:.3}", s.avg_hit_rate);
    println!("  Avg MRR:         {:.3}", s.avg_mrr);
    println!("  Avg judge score: {:.3}", s.avg_judge_score);
    println!("  Avg tokens:      {:.0}", s.avg_num_tokens);
    println!("  Total tokens:    {}", s.total_tokens);
    println!("  Avg combined:    {:.4}", s.avg_combined_score);
    println!("  Best combined:   {:.4}", s.best_combined_score);

    if !report.results.is_empty() {
        println!();
        println!(
            "  {:<48} {:>5} {:>5} {:>6} {:>7} {:>8}",
            "QUESTION", "HIT", "MRR", "JUDGE", "TOKENS", "COMBINED"
        );
        for r in &report.results {
            let q: String = r.question.chars().take(46).collect();
            let q = if r.question.chars().count() > 46 {
                format!("{}..", q)
            } else {
                q
            };
            println!(
                "  {:<48} {:>5.2} {:>5.2} {:>6.2} {:>7} {:>8.4}{}",
                q,
                r.hit_rate,
                r.mrr,
                r.judge_score,
                r.num_tokens,
                r.combined_score,
                if r.is_failed() { "  !" } else { "" }
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(q: &str, combined: f64) -> QuestionResult {
        let mut r = QuestionResult::failed(q, "x");
        r.error = None;
        r.combined_score = combined;
        r.num_tokens = 1000;
        r
    }

    fn metadata() -> ReportMetadata {
        ReportMetadata {
            ground_truth: "gt.json".to_string(),
            search_mode: "evaluation".to_string(),
            index_backend: "lexical".to_string(),
            chunk_size: 2000,
            overlap_ratio: 0.5,
            reasoner: "heuristic".to_string(),
            agent_model: "m".to_string(),
            judge_model: "j".to_string(),
            embedding_model: None,
            min_broad: 3,
            min_specific: 8,
            max_calls: 20,
            weights: ScoreWeights::default(),
        }
    }

    #[test]
    fn test_report_sorts_best_first() {
        let results = vec![row("a", 0.1), row("b", 0.7), row("c", 0.3)];
        let summary = ragbench_core::metrics::summarize(&results);
        let report = EvaluationReport::new(EvaluationRun { results, summary }, metadata());
        let order: Vec<&str> = report.results.iter().map(|r| r.question.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
        assert_eq!(report.num_questions, 3);
        assert_eq!(report.summary.best_combined_score, 0.7);
    }

    #[test]
    fn test_save_report_forces_json_and_creates_dirs() {
        let tmp = tempfile::TempDir::new().unwrap();
        let results = vec![row("a", 0.2)];
        let summary = ragbench_core::metrics::summarize(&results);
        let report = EvaluationReport::new(EvaluationRun { results, summary }, metadata());

        let written = save_report(&report, &tmp.path().join("nested/dir/run.txt")).unwrap();
        assert_eq!(written, tmp.path().join("nested/dir/run.json"));

        let raw = std::fs::read_to_string(&written).unwrap();
        let parsed: EvaluationReport = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.run_id, report.run_id);
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["summary"]["avg_combined_score"], 0.2);
        assert_eq!(json["metadata"]["search_mode"], "evaluation");
    }

    #[test]
    fn test_run_log_written_to_dir() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config: Config = toml::from_str("[corpus]\nroot = \".\"\n").unwrap();
        let response = AgentResponse {
            answer: "Near rivers.".to_string(),
            tool_calls: vec![],
            sources: vec!["capybara.md".to_string()],
            confidence: 0.8,
            total_tokens: 420,
            aborted: false,
        };
        let log = RunLog::new(&config, SearchMode::Production, "Where?", response);

        let written = save_run_log(&log, &tmp.path().join("runs")).unwrap();
        assert_eq!(written.parent().unwrap(), tmp.path().join("runs"));
        assert!(written.file_name().unwrap().to_string_lossy().ends_with(".json"));

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&written).unwrap()).unwrap();
        assert_eq!(json["question"], "Where?");
        assert_eq!(json["search_mode"], "production");
        assert_eq!(json["agent_model"], "gpt-4o-mini");
        assert_eq!(json["response"]["total_tokens"], 420);
        assert_eq!(json["run_id"], log.run_id);
    }
}
