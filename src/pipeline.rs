//! Batch driver: load → baseline metrics → rerank → reranked metrics → write.
//!
//! Usage:
//! ```bash
//! OPENAI_API_KEY=... jeopardy-rerank --input queriesProcessed.txt --output queriesReranked.txt
//! ```
//!
//! Records are processed one at a time, in input order, with a fixed pause
//! between completion requests.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::dataset::{load_records, write_records, DatasetError, Record};
use crate::gateway::{Attribution, UsageTally, UsageTotals};
use crate::rerank::evaluation::{compute_metrics, EvaluationError, MetricsComparison};
use crate::rerank::{RerankClient, RerankOutcome};

// =============================================================================
// Types
// =============================================================================

pub const DEFAULT_INPUT: &str = "src/main/resources/queriesProcessed.txt";
pub const DEFAULT_OUTPUT: &str = "src/main/resources/queriesReranked.txt";
pub const DEFAULT_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Optional JSON metrics report.
    pub report: Option<PathBuf>,
    /// Pause between completion requests.
    pub delay: Duration,
    pub show_progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_INPUT),
            output: PathBuf::from(DEFAULT_OUTPUT),
            report: None,
            delay: DEFAULT_DELAY,
            show_progress: true,
        }
    }
}

/// How each record fared in the rerank pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RerankCounts {
    /// Model reply produced a different order.
    pub reranked: usize,
    /// Model reply kept the original order.
    pub unchanged: usize,
    /// Request or reply failed; original order kept.
    pub failed: usize,
    /// No candidates, no request.
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    pub records: usize,
    pub counts: RerankCounts,
    pub metrics: MetricsComparison,
    pub usage: Option<UsageTotals>,
}

#[derive(Debug, Serialize)]
struct RunReport<'a> {
    input: String,
    output: String,
    model: &'a str,
    finished_at: String,
    #[serde(flatten)]
    summary: &'a PipelineSummary,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write report {path}: {source}")]
    Report {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// =============================================================================
// Rerank pass
// =============================================================================

/// Attach `reranked_preds` to every record with candidates.
///
/// One request at a time, pausing `delay` between requests. Failures leave the
/// original order in place.
pub async fn rerank_records(
    client: &RerankClient,
    records: &mut [Record],
    delay: Duration,
    progress: &ProgressBar,
) -> RerankCounts {
    let mut counts = RerankCounts::default();
    let mut requests_sent = 0usize;

    for (index, record) in records.iter_mut().enumerate() {
        progress.inc(1);
        if record.preds.is_empty() {
            counts.skipped += 1;
            continue;
        }
        if requests_sent > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        requests_sent += 1;

        let outcome = client
            .rerank_outcome(
                &record.question,
                &record.preds,
                Attribution::new("pipeline::rerank").with_record(index),
            )
            .await;

        match &outcome {
            RerankOutcome::Reranked(m) if m.changed => counts.reranked += 1,
            RerankOutcome::Reranked(m) => {
                tracing::debug!(record = index, matched = m.matched, "order unchanged");
                counts.unchanged += 1;
            }
            RerankOutcome::Failed(e) => {
                tracing::warn!(
                    record = index,
                    code = e.code(),
                    error = %e,
                    "rerank failed; keeping original order"
                );
                counts.failed += 1;
            }
            RerankOutcome::Skipped => counts.skipped += 1,
        }

        record.reranked_preds = Some(outcome.into_ranking(&record.preds));
    }

    counts
}

// =============================================================================
// Full pipeline
// =============================================================================

pub struct Pipeline {
    client: RerankClient,
    config: PipelineConfig,
    usage: Option<Arc<UsageTally>>,
}

impl Pipeline {
    pub fn new(client: RerankClient, config: PipelineConfig) -> Self {
        Self {
            client,
            config,
            usage: None,
        }
    }

    /// Include totals from this tally in the summary.
    pub fn with_usage(mut self, usage: Arc<UsageTally>) -> Self {
        self.usage = Some(usage);
        self
    }

    pub async fn run(&self) -> Result<PipelineSummary, PipelineError> {
        println!("Reading queries file...");
        let mut records = load_records(&self.config.input)?;
        println!("Loaded {} questions", records.len());

        let baseline = compute_metrics(&records, false)?;
        println!("\nBaseline Metrics:\n{baseline}");

        println!(
            "\nReranking predictions using {}...",
            self.client.config().model
        );
        let progress = self.progress_bar(records.len());
        let counts =
            rerank_records(&self.client, &mut records, self.config.delay, &progress).await;
        progress.finish_and_clear();
        tracing::info!(
            reranked = counts.reranked,
            unchanged = counts.unchanged,
            failed = counts.failed,
            skipped = counts.skipped,
            "rerank pass complete"
        );

        let reranked = compute_metrics(&records, true)?;
        println!("\nReranked Metrics:\n{reranked}");

        write_records(&self.config.output, &records)?;
        println!(
            "\nReranked results written to {}",
            self.config.output.display()
        );

        let summary = PipelineSummary {
            records: records.len(),
            counts,
            metrics: MetricsComparison::new(baseline, reranked),
            usage: self.usage.as_ref().map(|u| u.totals()),
        };

        if let Some(path) = &self.config.report {
            self.write_report(path, &summary)?;
        }

        Ok(summary)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar().template("{msg} [{bar:40}] {pos}/{len}")
        {
            pb.set_style(style);
        }
        pb.set_message("Records");
        pb
    }

    fn write_report(&self, path: &Path, summary: &PipelineSummary) -> Result<(), PipelineError> {
        let report = RunReport {
            input: self.config.input.display().to_string(),
            output: self.config.output.display().to_string(),
            model: &self.client.config().model,
            finished_at: Utc::now().to_rfc3339(),
            summary,
        };
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json).map_err(|source| PipelineError::Report {
            path: path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::gateway::{
        ChatGateway, ChatRequest, ChatResponse, ErrorContext, FinishReason, ProviderError,
    };
    use crate::rerank::RerankConfig;

    /// Reverses whatever candidates it is shown; fails on questions containing "boom".
    struct ReversingGateway {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChatGateway for ReversingGateway {
        async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let user = &req.messages[1].content;
            if user.contains("boom") {
                return Err(ProviderError::upstream("boom", ErrorContext::new()));
            }
            let mut items: Vec<&str> = user
                .lines()
                .filter_map(|l| {
                    let (num, rest) = l.split_once(". ")?;
                    num.parse::<usize>().ok().map(|_| rest)
                })
                .collect();
            items.reverse();
            let content = items
                .iter()
                .enumerate()
                .map(|(i, item)| format!("{}. {}", i + 1, item))
                .collect::<Vec<_>>()
                .join("\n");
            Ok(ChatResponse {
                content,
                input_tokens: 0,
                output_tokens: 0,
                cost_nanodollars: 0,
                latency: Duration::ZERO,
                finish_reason: FinishReason::Stop,
                request_id: None,
            })
        }
    }

    fn owned(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn rerank_pass_counts_each_outcome() {
        let gateway = Arc::new(ReversingGateway {
            calls: AtomicUsize::new(0),
        });
        let client = RerankClient::new(gateway.clone(), RerankConfig::default());
        let mut records = vec![
            Record::new("first", "b", owned(&["a", "b"])),
            Record::new("nothing", "x", vec![]),
            Record::new("boom", "a", owned(&["a", "b"])),
            Record::new("single", "z", owned(&["z"])),
        ];

        let counts = rerank_records(
            &client,
            &mut records,
            Duration::ZERO,
            &ProgressBar::hidden(),
        )
        .await;

        assert_eq!(
            counts,
            RerankCounts {
                reranked: 1,
                unchanged: 1,
                failed: 1,
                skipped: 1,
            }
        );
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 3);
        assert_eq!(records[0].reranked_preds, Some(owned(&["b", "a"])));
        assert_eq!(records[1].reranked_preds, None);
        assert_eq!(records[2].reranked_preds, Some(owned(&["a", "b"])));
        assert_eq!(records[3].reranked_preds, Some(owned(&["z"])));
    }
}
