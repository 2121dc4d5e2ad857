//! Evaluation harness: replay ground-truth questions and score the answers.
//!
//! For every [`GroundTruthItem`] the harness runs the orchestration loop in
//! evaluation mode, measures retrieval against the expected sources, asks
//! the judge for a quality score, and folds both with the token cost into a
//! combined score:
//!
//! ```text
//! question ──▶ Orchestrator ──▶ AgentResponse ──┬──▶ hit_rate, mrr
//!                                               ├──▶ Judge ──▶ judge_score
//!                                               └──▶ num_tokens
//!                                                        │
//!                                          combined_score ◀┘
//! ```
//!
//! Questions run with bounded concurrency; results keep ground-truth order
//! and the summary is computed only after every question finished.
//!
//! A question whose loop fails (for example [`CoreError::SynthesisFailed`])
//! becomes a zero-scored row and the batch carries on. A judge failure
//! keeps the retrieval metrics and zeroes the judge score; tokens spent by
//! its failed attempts still count.
//! [`CoreError::DegenerateTokenCount`] aborts the whole batch.

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt, TryStreamExt};
use ragbench_core::metrics::{combined_score, hit_rate, reciprocal_rank, summarize, ScoreWeights};
use ragbench_core::models::{
    EvaluationSummary, GroundTruthItem, JudgeEvaluation, QuestionResult,
};
use ragbench_core::CoreError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::agent::{LoopConfig, Orchestrator, SearchMode};
use crate::config::Config;
use crate::pipeline;
use crate::report::{print_summary, save_report, EvaluationReport, ReportMetadata};
use crate::traits::{Judge, JudgeFailure};

/// Per-question rows in ground-truth order plus their aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRun {
    pub results: Vec<QuestionResult>,
    pub summary: EvaluationSummary,
}

pub struct Evaluator {
    orchestrator: Arc<Orchestrator>,
    judge: Arc<dyn Judge>,
    weights: ScoreWeights,
    concurrency: usize,
}

impl Evaluator {
    pub fn new(orchestrator: Arc<Orchestrator>, judge: Arc<dyn Judge>, weights: ScoreWeights) -> Self {
        Self {
            orchestrator,
            judge,
            weights,
            concurrency: 4,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Evaluate every item. `loop_config` is forced into evaluation mode.
    pub async fn evaluate(
        &self,
        ground_truth: &[GroundTruthItem],
        loop_config: &LoopConfig,
    ) -> Result<EvaluationRun, CoreError> {
        self.weights.validate()?;
        for item in ground_truth {
            item.validate()?;
        }
        let config = loop_config.clone().with_mode(SearchMode::Evaluation);
        config.validate()?;
        let orchestrator = self.orchestrator.with_config(config);

        info!(
            questions = ground_truth.len(),
            concurrency = self.concurrency,
            "starting evaluation"
        );

        let results: Vec<QuestionResult> = stream::iter(ground_truth.iter().enumerate())
            .map(|(i, item)| self.evaluate_one(&orchestrator, i, item))
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let summary = summarize(&results);
        info!(
            avg_hit_rate = summary.avg_hit_rate,
            avg_mrr = summary.avg_mrr,
            avg_judge_score = summary.avg_judge_score,
            avg_combined_score = summary.avg_combined_score,
            failed = summary.failed,
            "evaluation complete"
        );
        Ok(EvaluationRun { results, summary })
    }

    async fn evaluate_one(
        &self,
        orchestrator: &Orchestrator,
        index: usize,
        item: &GroundTruthItem,
    ) -> Result<QuestionResult, CoreError> {
        let response = match orchestrator.run(&item.question).await {
            Ok(r) => r,
            Err(CoreError::DegenerateTokenCount) => return Err(CoreError::DegenerateTokenCount),
            Err(e) => {
                warn!(question = index + 1, error = %e, "question failed");
                return Ok(QuestionResult::failed(&item.question, e.to_string()));
            }
        };

        let hit = hit_rate(&item.expected_sources, &response.sources);
        let mrr = reciprocal_rank(&item.expected_sources, &response.sources);

        let (evaluation, judge_tokens, error) =
            match self.judge.judge(&item.question, &response).await {
                Ok(j) => (j.evaluation.clamped(), j.tokens, None),
                Err(e) => {
                    let spent = e.downcast_ref::<JudgeFailure>().map_or(0, |f| f.tokens);
                    let msg = format!("judge failed: {:#}", e);
                    warn!(question = index + 1, error = %msg, tokens = spent, "falling back to zero judgment");
                    (JudgeEvaluation::failed(msg.clone()), spent, Some(msg))
                }
            };

        let num_tokens = response.total_tokens + judge_tokens;
        let combined = combined_score(hit, evaluation.overall_score, num_tokens, &self.weights)?;

        info!(
            question = index + 1,
            hit_rate = hit,
            mrr,
            judge_score = evaluation.overall_score,
            num_tokens,
            combined_score = combined,
            "question scored"
        );

        Ok(QuestionResult {
            question: item.question.clone(),
            hit_rate: hit,
            mrr,
            judge_score: evaluation.overall_score,
            accuracy: evaluation.accuracy,
            completeness: evaluation.completeness,
            relevance: evaluation.relevance,
            num_tokens,
            combined_score: combined,
            error,
        })
    }
}

/// Load a ground-truth file: a JSON array of `{question, expected_sources}`.
pub fn load_ground_truth(path: &Path) -> Result<Vec<GroundTruthItem>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read ground truth: {}", path.display()))?;
    let items: Vec<GroundTruthItem> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse ground truth: {}", path.display()))?;
    for (i, item) in items.iter().enumerate() {
        item.validate()
            .with_context(|| format!("ground truth item {}", i + 1))?;
    }
    Ok(items)
}

/// `rbench eval`: run the harness and write the JSON report.
pub async fn run_eval(
    config: &Config,
    ground_truth_path: &Path,
    output: Option<PathBuf>,
    concurrency: Option<usize>,
) -> Result<()> {
    let ground_truth = load_ground_truth(ground_truth_path)?;
    if ground_truth.is_empty() {
        anyhow::bail!("Ground truth file has no questions: {}", ground_truth_path.display());
    }

    let orchestrator = Arc::new(pipeline::build_orchestrator(config, Some(SearchMode::Evaluation)).await?);
    let judge = pipeline::build_judge(config)?;
    let loop_config = orchestrator.config().clone();

    let evaluator = Evaluator::new(orchestrator, judge, config.eval.weights())
        .with_concurrency(concurrency.unwrap_or(config.eval.concurrency));
    let run = evaluator.evaluate(&ground_truth, &loop_config).await?;

    let metadata = ReportMetadata::from_config(config, ground_truth_path, &loop_config);
    let report = EvaluationReport::new(run, metadata);
    let path = save_report(&report, &output.unwrap_or_else(|| config.eval.output.clone()))?;

    print_summary(&report);
    println!("\nReport written to {}", path.display());
    Ok(())
}
