//! Failure modes of a single completion request.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// What the completion service told us about a failed exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    pub http_status: Option<u16>,
    /// `error.code` from the response body, e.g. "insufficient_quota".
    pub provider_code: Option<String>,
    /// `x-request-id` response header.
    pub request_id: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn with_request_id(mut self, id: Option<impl Into<String>>) -> Self {
        self.request_id = id.map(Into::into);
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.http_status {
            Some(status) => write!(f, "HTTP {status}")?,
            None => f.write_str("no status")?,
        }
        if let Some(code) = &self.provider_code {
            write!(f, ", code {code}")?;
        }
        if let Some(id) = &self.request_id {
            write!(f, ", request {id}")?;
        }
        Ok(())
    }
}

/// Errors from one completion request.
///
/// None of these are retried; the rerank client falls back to the original
/// candidate order.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// 429 from the service. `retry_after` is the `Retry-After` header, if sent.
    #[error("rate limited ({context}){}", retry_hint(.retry_after))]
    RateLimited {
        retry_after: Option<Duration>,
        context: ErrorContext,
    },

    /// 401 or 403: the API key was rejected.
    #[error("unauthorized ({context}): {message}")]
    Unauthorized {
        message: String,
        context: ErrorContext,
    },

    /// Any other non-success status, or an error object in a 200 body.
    #[error("upstream error ({context}): {message}")]
    Upstream {
        message: String,
        context: ErrorContext,
    },

    /// The body could not be used: bad JSON, no choices, empty content, oversized.
    #[error("malformed response ({context}): {message}")]
    MalformedResponse {
        message: String,
        context: ErrorContext,
    },

    /// Rejected locally before sending.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The model declined to answer.
    #[error("refused: {0}")]
    Refused(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Missing API key, unusable client settings.
    #[error("configuration error: {0}")]
    Config(String),
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(wait) => format!(", retry after {}s", wait.as_secs()),
        None => String::new(),
    }
}

impl ProviderError {
    pub fn rate_limited(retry_after: Option<Duration>, context: ErrorContext) -> Self {
        Self::RateLimited {
            retry_after,
            context,
        }
    }

    pub fn unauthorized(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Unauthorized {
            message: message.into(),
            context,
        }
    }

    pub fn upstream(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Upstream {
            message: message.into(),
            context,
        }
    }

    pub fn malformed(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::MalformedResponse {
            message: message.into(),
            context,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn refused(message: impl Into<String>) -> Self {
        Self::Refused(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Short error code for logging and usage records.
    pub fn code(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::Unauthorized { .. } => "unauthorized",
            Self::Upstream { .. } => "upstream_error",
            Self::MalformedResponse { .. } => "malformed_response",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Refused(_) => "refused",
            Self::Http(e) if e.is_timeout() => "timeout",
            Self::Http(_) => "http_error",
            Self::Config(_) => "config_error",
        }
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::RateLimited { context, .. }
            | Self::Unauthorized { context, .. }
            | Self::Upstream { context, .. }
            | Self::MalformedResponse { context, .. } => Some(context),
            Self::InvalidRequest(_) | Self::Refused(_) | Self::Http(_) | Self::Config(_) => None,
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        self.context().and_then(|c| c.request_id.as_deref())
    }
}
