//! Recording helpers for efficepart metrics.
//!
//! `MetricsCollector` wraps the raw Prometheus globals so call sites never
//! deal with label arrays or uninitialized registries.

use super::prometheus::{
    DOWNLOADS_TOTAL, FILES_PURGED_TOTAL, HTTP_REQUESTS_TOTAL, LLM_LATENCY, LLM_REQUESTS_TOTAL,
    LLM_TOKENS_TOTAL, STORED_BYTES, UPLOADS_TOTAL, UPLOAD_BYTES_TOTAL,
};

/// Token usage information for LLM requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    /// Number of input/prompt tokens.
    pub input_tokens: u64,
    /// Number of output/completion tokens.
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Outcome label of a download attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    Served,
    NotFound,
    PasswordRequired,
    PasswordMismatch,
}

impl DownloadOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadOutcome::Served => "served",
            DownloadOutcome::NotFound => "not_found",
            DownloadOutcome::PasswordRequired => "password_required",
            DownloadOutcome::PasswordMismatch => "password_mismatch",
        }
    }
}

/// Metrics collector for recording efficepart operational metrics.
///
/// Recording is a no-op until `init_metrics()` has run.
///
/// # Example
///
/// ```ignore
/// use efficepart::metrics::{init_metrics, MetricsCollector};
///
/// init_metrics().expect("Failed to init metrics");
/// let collector = MetricsCollector::new();
/// collector.record_upload("transfer", 1024);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Self {
        Self
    }

    /// Record a finished HTTP request.
    pub fn record_request(&self, tool: &str, status: u16) {
        if let Some(requests) = HTTP_REQUESTS_TOTAL.get() {
            let status_label = status.to_string();
            requests
                .with_label_values(&[tool, status_label.as_str()])
                .inc();
        }

        tracing::trace!(tool = tool, status = status, "Recorded request metric");
    }

    /// Record an accepted upload.
    ///
    /// # Arguments
    ///
    /// * `tool` - Tool name that accepted the upload
    /// * `bytes` - Size of the uploaded body
    pub fn record_upload(&self, tool: &str, bytes: u64) {
        if let Some(uploads) = UPLOADS_TOTAL.get() {
            uploads.with_label_values(&[tool]).inc();
        }

        if let Some(upload_bytes) = UPLOAD_BYTES_TOTAL.get() {
            upload_bytes.with_label_values(&[tool]).inc_by(bytes as f64);
        }

        tracing::trace!(tool = tool, bytes = bytes, "Recorded upload metric");
    }

    /// Record a download attempt.
    pub fn record_download(&self, tool: &str, outcome: DownloadOutcome) {
        if let Some(downloads) = DOWNLOADS_TOTAL.get() {
            downloads
                .with_label_values(&[tool, outcome.as_str()])
                .inc();
        }

        tracing::trace!(tool = tool, outcome = outcome.as_str(), "Recorded download metric");
    }

    /// Record files removed by an expiry sweep.
    pub fn record_purge(&self, bucket: &str, files: u64) {
        if files == 0 {
            return;
        }

        if let Some(purged) = FILES_PURGED_TOTAL.get() {
            purged.with_label_values(&[bucket]).inc_by(files as f64);
        }

        tracing::trace!(bucket = bucket, files = files, "Recorded purge metric");
    }

    /// Update the live byte count of a bucket.
    pub fn set_stored_bytes(&self, bucket: &str, bytes: u64) {
        if let Some(stored) = STORED_BYTES.get() {
            stored.with_label_values(&[bucket]).set(bytes as f64);
        }
    }

    /// Record an LLM API request.
    ///
    /// # Arguments
    ///
    /// * `model` - LLM model identifier
    /// * `success` - Whether the request succeeded
    /// * `latency_secs` - Request latency in seconds
    /// * `tokens` - Token usage for the request
    pub fn record_llm_request(
        &self,
        model: &str,
        success: bool,
        latency_secs: f64,
        tokens: TokenUsage,
    ) {
        let status = if success { "success" } else { "failure" };

        if let Some(llm_requests) = LLM_REQUESTS_TOTAL.get() {
            llm_requests.with_label_values(&[model, status]).inc();
        }

        if let Some(llm_latency) = LLM_LATENCY.get() {
            llm_latency
                .with_label_values(&[model])
                .observe(latency_secs);
        }

        if let Some(llm_tokens) = LLM_TOKENS_TOTAL.get() {
            llm_tokens
                .with_label_values(&[model, "input"])
                .inc_by(tokens.input_tokens as f64);
            llm_tokens
                .with_label_values(&[model, "output"])
                .inc_by(tokens.output_tokens as f64);
        }

        tracing::trace!(
            model = model,
            status = status,
            latency_secs = latency_secs,
            input_tokens = tokens.input_tokens,
            output_tokens = tokens.output_tokens,
            "Recorded LLM request metric"
        );
    }
}
