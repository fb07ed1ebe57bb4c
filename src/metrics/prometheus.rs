//! Prometheus metrics registration and export.
//!
//! This module defines all Prometheus metrics used by efficepart and provides
//! functions for initializing, registering, and exporting metrics.

use prometheus::{CounterVec, Encoder, GaugeVec, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::{Mutex, OnceLock};

static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Global Prometheus registry for all efficepart metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Total HTTP requests, labeled by tool and status code.
pub static HTTP_REQUESTS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Total accepted uploads, labeled by tool.
pub static UPLOADS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Total uploaded bytes, labeled by tool.
pub static UPLOAD_BYTES_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Download attempts, labeled by tool and outcome.
pub static DOWNLOADS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Files removed by the expiry sweep, labeled by bucket.
pub static FILES_PURGED_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Bytes currently held by live uploads, labeled by bucket.
pub static STORED_BYTES: OnceLock<GaugeVec> = OnceLock::new();

/// Total LLM API requests, labeled by model and status.
pub static LLM_REQUESTS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// LLM API request latency in seconds, labeled by model.
pub static LLM_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Total tokens used, labeled by model and type (input/output).
pub static LLM_TOKENS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Initialize all metrics and register them with the registry.
///
/// Call once at startup. Later calls are no-ops.
///
/// # Errors
///
/// Returns a `prometheus::Error` if metric registration fails, typically due to
/// duplicate metric names or invalid metric configurations.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let _guard = INIT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    if REGISTRY.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    // HTTP metrics
    let http_requests_total = CounterVec::new(
        Opts::new("efficepart_http_requests_total", "Total HTTP requests"),
        &["tool", "status"],
    )?;

    // Transfer metrics
    let uploads_total = CounterVec::new(
        Opts::new("efficepart_uploads_total", "Total accepted uploads"),
        &["tool"],
    )?;

    let upload_bytes_total = CounterVec::new(
        Opts::new("efficepart_upload_bytes_total", "Total uploaded bytes"),
        &["tool"],
    )?;

    let downloads_total = CounterVec::new(
        Opts::new("efficepart_downloads_total", "Download attempts by outcome"),
        &["tool", "outcome"],
    )?;

    let files_purged_total = CounterVec::new(
        Opts::new(
            "efficepart_files_purged_total",
            "Files removed by the expiry sweep",
        ),
        &["bucket"],
    )?;

    let stored_bytes = GaugeVec::new(
        Opts::new("efficepart_stored_bytes", "Bytes held by live uploads"),
        &["bucket"],
    )?;

    // LLM metrics
    let llm_requests_total = CounterVec::new(
        Opts::new("efficepart_llm_requests_total", "Total LLM API requests"),
        &["model", "status"],
    )?;

    let llm_latency = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "efficepart_llm_latency_seconds",
            "LLM API request latency in seconds",
        )
        .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        &["model"],
    )?;

    let llm_tokens_total = CounterVec::new(
        Opts::new("efficepart_llm_tokens_total", "Total tokens used"),
        &["model", "type"],
    )?;

    registry.register(Box::new(http_requests_total.clone()))?;
    registry.register(Box::new(uploads_total.clone()))?;
    registry.register(Box::new(upload_bytes_total.clone()))?;
    registry.register(Box::new(downloads_total.clone()))?;
    registry.register(Box::new(files_purged_total.clone()))?;
    registry.register(Box::new(stored_bytes.clone()))?;
    registry.register(Box::new(llm_requests_total.clone()))?;
    registry.register(Box::new(llm_latency.clone()))?;
    registry.register(Box::new(llm_tokens_total.clone()))?;

    let _ = REGISTRY.set(registry);
    let _ = HTTP_REQUESTS_TOTAL.set(http_requests_total);
    let _ = UPLOADS_TOTAL.set(uploads_total);
    let _ = UPLOAD_BYTES_TOTAL.set(upload_bytes_total);
    let _ = DOWNLOADS_TOTAL.set(downloads_total);
    let _ = FILES_PURGED_TOTAL.set(files_purged_total);
    let _ = STORED_BYTES.set(stored_bytes);
    let _ = LLM_REQUESTS_TOTAL.set(llm_requests_total);
    let _ = LLM_LATENCY.set(llm_latency);
    let _ = LLM_TOKENS_TOTAL.set(llm_tokens_total);

    tracing::info!("Prometheus metrics initialized successfully");

    Ok(())
}

/// Export all registered metrics in Prometheus text format.
///
/// Returns a comment line instead when the registry is not initialized or
/// encoding fails.
pub fn export_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return "# Metrics not initialized. Call init_metrics() first.\n".to_string();
    };

    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}\n", e);
    }

    String::from_utf8(buffer)
        .unwrap_or_else(|e| format!("# Error converting metrics to UTF-8: {}\n", e))
}

/// Axum handler for `GET /metrics`.
pub async fn metrics_handler() -> String {
    export_metrics()
}
