//! Prometheus metrics for requests, transfers and LLM usage.
//!
//! # Example
//!
//! ```ignore
//! use efficepart::metrics::{init_metrics, export_metrics, MetricsCollector};
//!
//! init_metrics().expect("Failed to initialize metrics");
//!
//! let collector = MetricsCollector::new();
//! collector.record_upload("transfer", 1024);
//!
//! let metrics_text = export_metrics();
//! ```

pub mod collectors;
pub mod prometheus;

pub use collectors::{DownloadOutcome, MetricsCollector, TokenUsage};
pub use prometheus::{export_metrics, init_metrics, metrics_handler};

pub use prometheus::{
    DOWNLOADS_TOTAL, FILES_PURGED_TOTAL, HTTP_REQUESTS_TOTAL, LLM_LATENCY, LLM_REQUESTS_TOTAL,
    LLM_TOKENS_TOTAL, REGISTRY, STORED_BYTES, UPLOADS_TOTAL, UPLOAD_BYTES_TOTAL,
};
