//! LLM reranking of one record's candidate list.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::gateway::{Attribution, ChatGateway, ChatModel, ChatRequest, ProviderError};
use crate::prompts::RERANK_V1;

use super::matching::{match_ranking, parse_numbered_items, MatchedRanking};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_MAX_TOKENS: u32 = 500;

/// Request parameters for the rerank call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: 0.0,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RerankError {
    #[error("completion request failed: {0}")]
    Provider(#[from] ProviderError),
    #[error("reply contained no numbered items")]
    UnparsableReply { reply: String },
}

impl RerankError {
    pub fn code(&self) -> &'static str {
        match self {
            RerankError::Provider(e) => e.code(),
            RerankError::UnparsableReply { .. } => "unparsable_reply",
        }
    }
}

/// What happened to one candidate list.
#[derive(Debug)]
pub enum RerankOutcome {
    /// No candidates, so no request was made.
    Skipped,
    /// The model replied with a usable list.
    Reranked(MatchedRanking),
    /// The request or the reply failed; the original order stands.
    Failed(RerankError),
}

impl RerankOutcome {
    /// The ranking to keep: the reranked list, or `preds` when there is none.
    pub fn into_ranking(self, preds: &[String]) -> Vec<String> {
        match self {
            RerankOutcome::Reranked(m) => m.ranking,
            RerankOutcome::Skipped | RerankOutcome::Failed(_) => preds.to_vec(),
        }
    }
}

/// Reranks candidate lists through a chat gateway, one request per list.
pub struct RerankClient {
    gateway: Arc<dyn ChatGateway>,
    config: RerankConfig,
}

impl RerankClient {
    pub fn new(gateway: Arc<dyn ChatGateway>, config: RerankConfig) -> Self {
        Self { gateway, config }
    }

    pub fn config(&self) -> &RerankConfig {
        &self.config
    }

    /// Rerank `preds` for `question`, reporting exactly what happened.
    pub async fn rerank_outcome(
        &self,
        question: &str,
        preds: &[String],
        attribution: Attribution,
    ) -> RerankOutcome {
        if preds.is_empty() {
            return RerankOutcome::Skipped;
        }

        let prompt = RERANK_V1.render(question, preds);
        tracing::debug!(
            template = %prompt.template_slug,
            record = ?attribution.record_index,
            candidates = preds.len(),
            "requesting rerank"
        );
        let req = ChatRequest::new(
            ChatModel::new(&self.config.model),
            prompt.to_messages(),
            attribution,
        )
        .temperature(self.config.temperature)
        .max_tokens(self.config.max_tokens);

        let resp = match self.gateway.chat(req).await {
            Ok(resp) => resp,
            Err(e) => return RerankOutcome::Failed(e.into()),
        };

        let items = parse_numbered_items(&resp.content);
        if items.is_empty() {
            return RerankOutcome::Failed(RerankError::UnparsableReply {
                reply: resp.content,
            });
        }

        RerankOutcome::Reranked(match_ranking(&items, preds))
    }

    /// Best-effort rerank: any failure is logged and `preds` returned as-is.
    pub async fn rerank(&self, question: &str, preds: &[String]) -> Vec<String> {
        let outcome = self
            .rerank_outcome(question, preds, Attribution::new("rerank::client"))
            .await;
        if let RerankOutcome::Failed(ref e) = outcome {
            tracing::warn!(code = e.code(), error = %e, "rerank failed; keeping original order");
        }
        outcome.into_ranking(preds)
    }
}
