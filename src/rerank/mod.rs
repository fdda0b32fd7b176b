//! LLM reranking of retrieved answer candidates.
//!
//! - `client`: one completion request per candidate list
//! - `matching`: map the model's numbered reply back onto the candidates
//! - `evaluation`: MRR and P@1 before and after reranking

pub mod client;
pub mod evaluation;
pub mod matching;

pub use client::{RerankClient, RerankConfig, RerankError, RerankOutcome};
pub use evaluation::{compute_metrics, EvaluationError, MetricsComparison, MetricsResult};
pub use matching::{match_ranking, parse_numbered_items, MatchedRanking};
