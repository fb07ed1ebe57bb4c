//! Plain text out of uploaded documents.

use encoding_rs::SHIFT_JIS;

use crate::error::ApiError;
use crate::office::{document_paragraphs, presentation_slides, read_first_sheet};
use crate::pdf::document_text;

/// Text of a `.txt` upload: UTF-8, falling back to Shift-JIS.
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.trim_start_matches('\u{FEFF}').to_string(),
        Err(_) => {
            let (text, _, had_errors) = SHIFT_JIS.decode(bytes);
            if had_errors {
                tracing::debug!("Shift-JIS decode replaced invalid sequences");
            }
            text.into_owned()
        }
    }
}

/// Extracts the text of a document by extension.
pub fn extract_text(bytes: &[u8], extension: &str) -> Result<String, ApiError> {
    let text = match extension {
        "txt" => decode_text(bytes),
        "docx" => document_paragraphs(bytes)?.join("\n"),
        "pdf" => document_text(bytes)?,
        "xlsx" => read_first_sheet(bytes)?
            .iter()
            .map(|row| row.join(" "))
            .collect::<Vec<_>>()
            .join("\n"),
        "pptx" => presentation_slides(bytes)?
            .into_iter()
            .flat_map(|slide| slide.texts)
            .collect::<Vec<_>>()
            .join("\n"),
        other => {
            return Err(ApiError::BadRequest(format!(
                "未対応のファイル形式です: {}",
                other
            )))
        }
    };
    Ok(text)
}
