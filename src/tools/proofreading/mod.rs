//! Japanese proofreading: a rule engine, an optional LLM reviewer and a
//! history of past runs.

pub mod extract;
pub mod reviewer;
pub mod rules;

use std::collections::BTreeMap;

use axum::extract::{Multipart, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, LlmError, UploadError};
use crate::server::AppState;
use crate::storage::{ProofreadRecord, StructureRecord};
use crate::upload::{check_extension, FormData, PROOFREADING_EXTENSIONS};

pub use extract::{decode_text, extract_text};
pub use reviewer::{generate_structure, merge, parse_review, review, StructureKind};
pub use rules::{check, Color, Suggestion};

/// Texts shorter than this never get an outline suggestion.
const STRUCTURE_MIN_CHARS: usize = 100;
const HISTORY_LIMIT: u32 = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/proofread", post(proofread))
        .route("/upload", post(upload))
        .route("/history", get(history))
        .route("/generate-structure", post(create_structure))
}

/// Runs the rule engine on the blocking pool.
async fn check_blocking(text: &str) -> Result<Vec<Suggestion>, ApiError> {
    let owned = text.to_string();
    tokio::task::spawn_blocking(move || check(&owned))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// Rule checks plus, when configured, the reviewer's non-duplicate items.
pub async fn proofread_text(state: &AppState, text: &str) -> Result<Vec<Suggestion>, ApiError> {
    let mut suggestions = check_blocking(text).await?;
    let rule_count = suggestions.len();

    if let Some(provider) = &state.llm {
        match review(provider.as_ref(), text).await {
            Ok(items) => {
                let added = merge(&mut suggestions, items);
                tracing::debug!(added, "Merged reviewer suggestions");
            }
            Err(e) => tracing::warn!(error = %e, "Reviewer failed, using rule results only"),
        }
    }

    tracing::info!(
        chars = text.chars().count(),
        rules = rule_count,
        total = suggestions.len(),
        "Proofreading finished"
    );
    Ok(suggestions)
}

async fn record_run(state: &AppState, text: &str, suggestions: &[Suggestion]) {
    let record = ProofreadRecord {
        id: Uuid::new_v4().to_string(),
        original: text.to_string(),
        corrected: text.to_string(),
        suggestions: serde_json::to_value(suggestions).unwrap_or_default(),
        timestamp: Utc::now(),
    };
    if let Err(e) = state.db.save_proofread(&record).await {
        tracing::warn!(error = %e, "Could not record proofreading history");
    }
}

#[derive(Debug, Deserialize)]
pub struct ProofreadRequest {
    pub text: Option<String>,
    #[serde(default)]
    pub suggest_structure: bool,
}

#[derive(Debug, Serialize)]
pub struct ProofreadResponse {
    pub original: String,
    pub corrected: String,
    pub suggestions: Vec<Suggestion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structure_suggestion: Option<String>,
}

async fn proofread(
    State(state): State<AppState>,
    Json(request): Json<ProofreadRequest>,
) -> Result<Json<ProofreadResponse>, ApiError> {
    let text = request
        .text
        .ok_or_else(|| ApiError::BadRequest("校正するテキストが必要です".to_string()))?;

    let suggestions = proofread_text(&state, &text).await?;

    let mut structure_suggestion = None;
    if request.suggest_structure && text.chars().count() > STRUCTURE_MIN_CHARS {
        if let Some(provider) = &state.llm {
            match generate_structure(provider.as_ref(), &text, 1500, StructureKind::Detailed).await {
                Ok(outline) => structure_suggestion = Some(outline),
                Err(e) => tracing::warn!(error = %e, "Outline suggestion failed"),
            }
        }
    }

    record_run(&state, &text, &suggestions).await;

    Ok(Json(ProofreadResponse {
        corrected: text.clone(),
        original: text,
        suggestions,
        structure_suggestion,
    }))
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub filename: String,
    pub text: String,
    pub suggestions: Vec<Suggestion>,
}

async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let form = FormData::read(&mut multipart).await?;
    let file = form.file("file")?;
    let extension = check_extension(&file.filename, PROOFREADING_EXTENSIONS)?;
    if file.is_empty() {
        return Err(UploadError::EmptyFilename.into());
    }

    let data = file.data.clone();
    let ext = extension.clone();
    let text = tokio::task::spawn_blocking(move || extract_text(&data, &ext))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    if text.trim().is_empty() {
        return Err(ApiError::Internal(
            "テキストの抽出に失敗しました。ファイルの内容を確認してください。".to_string(),
        ));
    }
    tracing::info!(name = %file.filename, extension = %extension, chars = text.chars().count(), "Extracted text");

    let suggestions = proofread_text(&state, &text).await?;
    record_run(&state, &text, &suggestions).await;

    Ok(Json(UploadResponse {
        success: true,
        filename: file.filename.clone(),
        text,
        suggestions,
    }))
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub history: Vec<ProofreadRecord>,
    pub structures: BTreeMap<String, StructureRecord>,
}

async fn history(State(state): State<AppState>) -> Result<Json<HistoryResponse>, ApiError> {
    let history = state.db.list_proofreads(HISTORY_LIMIT).await?;
    let structures = state
        .db
        .list_structures()
        .await?
        .into_iter()
        .map(|record| (record.id.clone(), record))
        .collect();

    Ok(Json(HistoryResponse { history, structures }))
}

fn default_max_tokens() -> u32 {
    1500
}

#[derive(Debug, Deserialize)]
pub struct StructureRequest {
    pub prompt: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default, rename = "type")]
    pub kind: StructureKind,
}

async fn create_structure(
    State(state): State<AppState>,
    Json(request): Json<StructureRequest>,
) -> Result<Json<StructureRecord>, ApiError> {
    let prompt = request
        .prompt
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("プロンプトが必要です".to_string()))?;
    let provider = state.llm.as_ref().ok_or(LlmError::MissingApiBase)?;

    let structure = generate_structure(provider.as_ref(), &prompt, request.max_tokens, request.kind).await?;

    let record = StructureRecord {
        id: Uuid::new_v4().to_string(),
        prompt,
        structure,
        kind: request.kind.as_str().to_string(),
        timestamp: Utc::now(),
    };
    state.db.save_structure(&record).await?;
    tracing::info!(id = %record.id, kind = %record.kind, "Generated outline");

    Ok(Json(record))
}
