//! efficepart: office productivity tools served over HTTP.
//!
//! PDF page editing, shift tables, name-tag badges, tables of contents,
//! file conversion, expiring file transfer and Japanese proofreading, each
//! mounted under its own path by one axum dispatcher.

pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod metrics;
pub mod office;
pub mod pdf;
pub mod server;
pub mod storage;
pub mod tools;
pub mod upload;
pub mod utils;

pub use config::{AppConfig, ToolKind};
pub use error::{
    ApiError, ConvertError, LlmError, OfficeError, PdfError, ShiftError, UploadError,
};
pub use server::{build_dispatcher, build_standalone, AppState};
