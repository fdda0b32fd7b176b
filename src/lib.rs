#![forbid(unsafe_code)]

//! # jeopardy-rerank
//!
//! Reorders retrieved answer candidates for Jeopardy clues with a chat model
//! and measures the effect.
//!
//! Candidate lists come from an upstream retrieval run. Each list is shown to
//! the model as a numbered list; the model's reply is mapped back onto the
//! candidates (exact match first, then case-insensitive containment), so the
//! result is always a permutation of the input. MRR and P@1 are reported
//! before and after.

pub mod dataset;
pub mod gateway;
pub mod literal;
pub mod pipeline;
pub mod prompts;
pub mod rerank;

pub use dataset::{load_records, parse_records, render_records, write_records, Record};
pub use gateway::{Attribution, ChatGateway, ProviderConfig, ProviderGateway, UsageSink};
pub use literal::{decode_list, encode_list};
pub use pipeline::{Pipeline, PipelineConfig, PipelineError, PipelineSummary};
pub use rerank::{
    compute_metrics, MatchedRanking, MetricsResult, RerankClient, RerankConfig, RerankOutcome,
};
