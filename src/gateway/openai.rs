//! Adapter for OpenAI-compatible `/chat/completions` endpoints.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::error::{ErrorContext, ProviderError};
use super::pricing::chat_cost;
use super::types::{ChatRequest, ChatResponse, FinishReason, Message};

/// Name recorded in usage records for this backend.
pub const PROVIDER: &str = "openai";

/// Anything that can turn one [`ChatRequest`] into one [`ChatResponse`].
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError>;
}

// =============================================================================
// CONFIG
// =============================================================================

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Connection settings, read once per run.
#[derive(Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ProviderConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn base_url(self, base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..self
        }
    }

    pub fn timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    /// `OPENAI_API_KEY` is required; `OPENAI_BASE_URL` and
    /// `OPENAI_TIMEOUT_SECONDS` fall back to the defaults when unset or unparsable.
    pub fn from_env() -> Result<Self, ProviderError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ProviderError::config("OPENAI_API_KEY not set"))?;

        let mut config = Self::new(api_key);
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            if !url.trim().is_empty() {
                config = config.base_url(url);
            }
        }
        if let Some(secs) = std::env::var("OPENAI_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
        {
            config = config.timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct CompletionReply {
    #[serde(default)]
    choices: Vec<ReplyChoice>,
    usage: Option<ReplyUsage>,
    error: Option<ReplyError>,
}

#[derive(Deserialize)]
struct ReplyChoice {
    message: Option<ReplyMessage>,
    finish_reason: Option<FinishReason>,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct ReplyUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Deserialize)]
struct ReplyError {
    message: Option<String>,
    code: Option<String>,
}

/// `{"error": {...}}` bodies sent with non-success statuses.
#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ReplyError,
}

// =============================================================================
// ADAPTER
// =============================================================================

/// Replies larger than this are rejected (1MB).
const MAX_RESPONSE_BYTES: usize = 1_024 * 1_024;

/// Prompts larger than this are rejected before sending.
const MAX_INPUT_CHARS: usize = 500_000;

/// Client for `POST {base_url}/chat/completions`.
#[derive(Debug, Clone)]
pub struct OpenAiAdapter {
    http: reqwest::Client,
    endpoint: String,
}

impl OpenAiAdapter {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|_| ProviderError::config("API key contains invalid header characters"))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(AUTHORIZATION, bearer);

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .gzip(true)
            .build()
            .map_err(|e| ProviderError::config(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
        })
    }

    /// Full URL requests are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Read the body, refusing anything over [`MAX_RESPONSE_BYTES`].
    async fn read_capped(
        mut response: reqwest::Response,
        ctx: &ErrorContext,
    ) -> Result<String, ProviderError> {
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if bytes.len() + chunk.len() > MAX_RESPONSE_BYTES {
                return Err(ProviderError::malformed(
                    format!("response exceeds {MAX_RESPONSE_BYTES} bytes"),
                    ctx.clone(),
                ));
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn request_id(headers: &HeaderMap) -> Option<&str> {
    headers.get("x-request-id").and_then(|v| v.to_str().ok())
}

/// Leading-line refusal check; a list that merely mentions "I cannot" later
/// on is still a list.
fn is_refusal(text: &str) -> bool {
    const OPENERS: &[&str] = &[
        "i cannot",
        "i can't",
        "i won't",
        "i will not",
        "i am unable to",
        "i'm unable to",
        "unable to comply",
        "unable to assist",
    ];
    let first_line = text.trim_start().lines().next().unwrap_or("").to_lowercase();
    OPENERS.iter().any(|o| first_line.starts_with(o))
}

/// `Retry-After` in its delta-seconds form; HTTP-date values are ignored.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Map a non-success status to an error, using the JSON error object when
/// the body carries one.
fn status_error(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
    ctx: ErrorContext,
) -> ProviderError {
    let (message, ctx) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope { error }) => {
            let ctx = match error.code {
                Some(code) => ctx.with_code(code),
                None => ctx,
            };
            (error.message.unwrap_or_default(), ctx)
        }
        Err(_) => (format!("HTTP {}", status.as_u16()), ctx),
    };

    match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::rate_limited(retry_after, ctx),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ProviderError::unauthorized(message, ctx)
        }
        _ => ProviderError::upstream(message, ctx),
    }
}

#[async_trait]
impl ChatProvider for OpenAiAdapter {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let input_chars = req.input_chars();
        if input_chars > MAX_INPUT_CHARS {
            return Err(ProviderError::invalid_request(format!(
                "prompt is {input_chars} chars (max {MAX_INPUT_CHARS})"
            )));
        }

        let started = Instant::now();
        let body = CompletionBody {
            model: req.model.id(),
            messages: &req.messages,
            temperature: req.temperature,
            max_tokens: req.max_tokens,
        };
        let response = self.http.post(&self.endpoint).json(&body).send().await?;

        let status = response.status();
        let ctx = ErrorContext::new()
            .with_status(status.as_u16())
            .with_request_id(request_id(response.headers()));
        let wait = retry_after(response.headers());
        let raw = Self::read_capped(response, &ctx).await?;

        if !status.is_success() {
            return Err(status_error(status, wait, &raw, ctx));
        }

        let reply: CompletionReply = match serde_json::from_str(&raw) {
            Ok(reply) => reply,
            Err(e) => return Err(ProviderError::malformed(format!("invalid JSON: {e}"), ctx)),
        };

        if let Some(error) = reply.error {
            let message = error.message.unwrap_or_default();
            if is_refusal(&message) {
                return Err(ProviderError::refused(message));
            }
            let ctx = match error.code {
                Some(code) => ctx.with_code(code),
                None => ctx,
            };
            return Err(ProviderError::upstream(message, ctx));
        }

        let Some(choice) = reply.choices.into_iter().next() else {
            return Err(ProviderError::malformed("No choices in response", ctx));
        };
        let content = choice.message.and_then(|m| m.content).unwrap_or_default();
        if content.trim().is_empty() {
            return Err(ProviderError::malformed("empty completion content", ctx));
        }
        if is_refusal(&content) {
            return Err(ProviderError::refused(content));
        }

        // Some compatible servers omit usage; tokens then count as zero.
        let usage = reply.usage.unwrap_or_default();

        Ok(ChatResponse {
            content,
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            cost_nanodollars: chat_cost(
                req.model.id(),
                usage.prompt_tokens,
                usage.completion_tokens,
            ),
            latency: started.elapsed(),
            finish_reason: choice.finish_reason.unwrap_or_default(),
            request_id: ctx.request_id,
        })
    }
}
