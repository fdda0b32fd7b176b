//! Chat gateway for the completion service.
//!
//! One request in, one response (or error) out. Every call, failed or not, is
//! reported to a [`UsageSink`]; nothing is retried.

pub mod error;
pub mod openai;
pub mod pricing;
pub mod types;
pub mod usage;

use std::sync::Arc;
use std::time::Instant;

use openai::{ChatProvider, OpenAiAdapter};

pub use error::{ErrorContext, ProviderError};
pub use openai::ProviderConfig;
pub use pricing::{chat_cost, get_pricing, ModelPricing};
pub use types::{
    Attribution, ChatModel, ChatRequest, ChatResponse, FinishReason, Message, Role,
};
pub use usage::{
    CallStatus, NoopUsageSink, ProviderCallRecord, TracingUsageSink, UsageSink, UsageTally,
    UsageTotals,
};

/// The seam the rerank client talks to; tests swap in scripted gateways.
#[async_trait::async_trait]
pub trait ChatGateway: Send + Sync {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError>;
}

/// Completion adapter plus usage accounting.
pub struct ProviderGateway<U: UsageSink> {
    provider: OpenAiAdapter,
    usage_sink: Arc<U>,
}

#[async_trait::async_trait]
impl<U: UsageSink> ChatGateway for ProviderGateway<U> {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        ProviderGateway::chat(self, req).await
    }
}

impl<U: UsageSink> ProviderGateway<U> {
    pub fn new(config: &ProviderConfig, usage_sink: Arc<U>) -> Result<Self, ProviderError> {
        Ok(Self::with_adapter(OpenAiAdapter::new(config)?, usage_sink))
    }

    pub fn with_adapter(provider: OpenAiAdapter, usage_sink: Arc<U>) -> Self {
        Self {
            provider,
            usage_sink,
        }
    }

    pub async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let started = Instant::now();
        let result = self.provider.chat(&req).await;
        self.usage_sink
            .record(ProviderCallRecord::from_result(
                &req,
                &result,
                started.elapsed(),
            ))
            .await;
        result
    }
}
