#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jeopardy_rerank::gateway::{ProviderConfig, ProviderGateway, UsageTally};
use jeopardy_rerank::pipeline::{self, Pipeline, PipelineConfig};
use jeopardy_rerank::rerank::client::{DEFAULT_MAX_TOKENS, DEFAULT_MODEL};
use jeopardy_rerank::rerank::{RerankClient, RerankConfig};

/// Rerank retrieved Jeopardy answers with an LLM and report MRR / P@1.
///
/// Reads OPENAI_API_KEY (and optionally OPENAI_BASE_URL,
/// OPENAI_TIMEOUT_SECONDS) from the environment or a `.env` file in the
/// working directory.
#[derive(Parser)]
#[command(name = "jeopardy-rerank", version, about)]
struct Cli {
    /// Input record file
    #[arg(long, default_value = pipeline::DEFAULT_INPUT)]
    input: PathBuf,

    /// Output file for records with reranked candidates
    #[arg(long, default_value = pipeline::DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Chat model used for reranking
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Completion length cap
    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
    max_tokens: u32,

    /// Pause between requests, in milliseconds
    #[arg(long, default_value_t = pipeline::DEFAULT_DELAY.as_millis() as u64)]
    delay_ms: u64,

    /// Also write baseline/reranked metrics as JSON
    #[arg(long)]
    report: Option<PathBuf>,

    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is fine; real environment variables take precedence.
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jeopardy_rerank=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let provider = ProviderConfig::from_env()?;
    tracing::debug!(?provider, "provider configured");

    let usage = Arc::new(UsageTally::new());
    let gateway = Arc::new(ProviderGateway::new(&provider, usage.clone())?);

    let client = RerankClient::new(
        gateway,
        RerankConfig {
            model: cli.model,
            max_tokens: cli.max_tokens,
            ..RerankConfig::default()
        },
    );

    let config = PipelineConfig {
        input: cli.input,
        output: cli.output,
        report: cli.report,
        delay: Duration::from_millis(cli.delay_ms),
        show_progress: !cli.no_progress,
    };

    let summary = Pipeline::new(client, config).with_usage(usage).run().await?;

    if let Some(usage) = summary.usage {
        tracing::info!(
            calls = usage.calls,
            errors = usage.errors,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "estimated cost: ${:.4}",
            usage.cost_usd()
        );
    }

    Ok(())
}
