//! Per-call usage accounting.
//!
//! The gateway hands every call to a [`UsageSink`]. The CLI uses
//! [`UsageTally`] for the end-of-run cost line; tests mostly use
//! [`NoopUsageSink`].

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::error::ProviderError;
use super::openai::PROVIDER;
use super::types::{ChatRequest, ChatResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    Success,
    /// Carries [`ProviderError::code`].
    Error(&'static str),
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Success => "success",
            CallStatus::Error(code) => code,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, CallStatus::Error(_))
    }
}

/// One completion call as seen by the gateway.
#[derive(Debug, Clone)]
pub struct ProviderCallRecord {
    pub provider: &'static str,
    pub model: String,
    pub caller: &'static str,
    pub record_index: Option<usize>,
    pub input_tokens: u32,
    pub output_tokens: u32,
    /// Estimated cost in nanodollars (1e-9 USD).
    pub cost_nanodollars: i64,
    pub latency: Duration,
    pub status: CallStatus,
    pub request_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ProviderCallRecord {
    /// Summarize a finished call. Failed calls carry no tokens or cost.
    pub fn from_result(
        req: &ChatRequest,
        result: &Result<ChatResponse, ProviderError>,
        elapsed: Duration,
    ) -> Self {
        let mut record = Self {
            provider: PROVIDER,
            model: req.model.id().to_string(),
            caller: req.attribution.caller,
            record_index: req.attribution.record_index,
            input_tokens: 0,
            output_tokens: 0,
            cost_nanodollars: 0,
            latency: elapsed,
            status: CallStatus::Success,
            request_id: None,
            timestamp: Utc::now(),
        };
        match result {
            Ok(resp) => {
                record.input_tokens = resp.input_tokens;
                record.output_tokens = resp.output_tokens;
                record.cost_nanodollars = resp.cost_nanodollars;
                record.latency = resp.latency;
                record.request_id = resp.request_id.clone();
            }
            Err(err) => {
                record.status = CallStatus::Error(err.code());
                record.request_id = err.request_id().map(str::to_string);
            }
        }
        record
    }
}

#[async_trait]
pub trait UsageSink: Send + Sync {
    /// Fire-and-forget; a sink never fails the call it records.
    async fn record(&self, record: ProviderCallRecord);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopUsageSink;

#[async_trait]
impl UsageSink for NoopUsageSink {
    async fn record(&self, _record: ProviderCallRecord) {}
}

/// Emits one debug event per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingUsageSink;

#[async_trait]
impl UsageSink for TracingUsageSink {
    async fn record(&self, record: ProviderCallRecord) {
        tracing::debug!(
            provider = record.provider,
            model = %record.model,
            caller = record.caller,
            record_index = ?record.record_index,
            input_tokens = record.input_tokens,
            output_tokens = record.output_tokens,
            cost_nanos = record.cost_nanodollars,
            latency_ms = record.latency.as_millis() as u64,
            status = record.status.as_str(),
            request_id = record.request_id.as_deref().unwrap_or(""),
            "completion call"
        );
    }
}

/// Totals over a run, as included in the JSON report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageTotals {
    pub calls: u64,
    pub errors: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_nanodollars: i64,
}

impl UsageTotals {
    pub fn cost_usd(&self) -> f64 {
        self.cost_nanodollars as f64 / 1_000_000_000.0
    }
}

/// Accumulates [`UsageTotals`] and forwards each record to [`TracingUsageSink`].
#[derive(Debug, Default)]
pub struct UsageTally {
    calls: AtomicU64,
    errors: AtomicU64,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
    cost_nanodollars: AtomicI64,
}

impl UsageTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn totals(&self) -> UsageTotals {
        UsageTotals {
            calls: self.calls.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            input_tokens: self.input_tokens.load(Ordering::Relaxed),
            output_tokens: self.output_tokens.load(Ordering::Relaxed),
            cost_nanodollars: self.cost_nanodollars.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl UsageSink for UsageTally {
    async fn record(&self, record: ProviderCallRecord) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if record.status.is_error() {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
        self.input_tokens
            .fetch_add(u64::from(record.input_tokens), Ordering::Relaxed);
        self.output_tokens
            .fetch_add(u64::from(record.output_tokens), Ordering::Relaxed);
        self.cost_nanodollars
            .fetch_add(record.cost_nanodollars, Ordering::Relaxed);
        TracingUsageSink.record(record).await;
    }
}
