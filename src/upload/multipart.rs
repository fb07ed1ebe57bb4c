//! Multipart form helpers shared by the tool handlers.

use std::collections::HashMap;

use axum::extract::Multipart;
use bytes::Bytes;

use super::validation::{check_extension, guess_mime};
use crate::error::UploadError;
use crate::storage::{FileStore, StagedUpload, StorageError, StoredFile};

/// A file part read fully into memory.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: String,
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
}

impl UploadedFile {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Every part of a multipart form, buffered.
#[derive(Debug, Default)]
pub struct FormData {
    files: Vec<UploadedFile>,
    fields: HashMap<String, Vec<String>>,
}

impl FormData {
    /// Reads the whole form. Parts with a file name are files, the rest text.
    pub async fn read(multipart: &mut Multipart) -> Result<Self, UploadError> {
        let mut form = FormData::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();

            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let content_type = field
                        .content_type()
                        .map(str::to_string)
                        .unwrap_or_else(|| guess_mime(&filename));
                    let data = field.bytes().await?;
                    form.files.push(UploadedFile {
                        field: name,
                        filename,
                        content_type,
                        data,
                    });
                }
                None => {
                    let value = field.text().await?;
                    form.fields.entry(name).or_default().push(value);
                }
            }
        }

        Ok(form)
    }

    /// The first non-empty file in `field`.
    pub fn file(&self, field: &str) -> Result<&UploadedFile, UploadError> {
        let file = self
            .files
            .iter()
            .find(|f| f.field == field)
            .ok_or_else(|| UploadError::MissingFile(field.to_string()))?;

        if file.filename.trim().is_empty() {
            return Err(UploadError::EmptyFilename);
        }
        Ok(file)
    }

    /// All files in `field`, in form order.
    pub fn files(&self, field: &str) -> Vec<&UploadedFile> {
        self.files
            .iter()
            .filter(|f| f.field == field && !f.filename.trim().is_empty())
            .collect()
    }

    /// First value of a text field.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// First value of a text field, or an error naming the field.
    pub fn require_text(&self, field: &str) -> Result<&str, UploadError> {
        self.text(field)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| UploadError::MissingField(field.to_string()))
    }

    /// Every value of a repeated text field.
    pub fn texts(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Parses a text field, falling back to `default` when absent or blank.
    pub fn parse_or<T: std::str::FromStr>(&self, field: &str, default: T) -> Result<T, UploadError> {
        match self.text(field).map(str::trim) {
            None | Some("") => Ok(default),
            Some(raw) => raw.parse().map_err(|_| UploadError::InvalidField {
                field: field.to_string(),
                message: format!("could not parse '{}'", raw),
            }),
        }
    }
}

/// Streams the `file_field` part straight into a file store.
///
/// The body is staged while the form is read and committed only once the
/// whole form has been consumed, so a `password` part is honoured whether
/// it arrives before or after the file body. A form that fails after the
/// file part leaves nothing behind. Other parts are ignored.
pub async fn stream_into_store(
    multipart: &mut Multipart,
    store: &FileStore,
    file_field: &str,
    allowed: &[&str],
) -> Result<StoredFile, StorageError> {
    let mut password: Option<String> = None;
    let mut staged: Option<StagedUpload> = None;

    let read = read_upload_form(
        multipart,
        store,
        file_field,
        allowed,
        &mut password,
        &mut staged,
    )
    .await;
    if let Err(e) = read {
        if let Some(staged) = staged.take() {
            tracing::warn!(
                file_id = %staged.id(),
                bytes = staged.size_bytes(),
                error = %e,
                "Upload form failed after the file part, discarding"
            );
            store.discard(staged).await;
        }
        return Err(e);
    }

    let staged = staged.ok_or_else(|| UploadError::MissingFile(file_field.to_string()))?;
    store.commit(staged, password.as_deref()).await
}

async fn read_upload_form(
    multipart: &mut Multipart,
    store: &FileStore,
    file_field: &str,
    allowed: &[&str],
    password: &mut Option<String>,
    staged: &mut Option<StagedUpload>,
) -> Result<(), StorageError> {
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "password" => {
                *password = Some(field.text().await?);
            }
            name if name == file_field && staged.is_none() => {
                let filename = field.file_name().unwrap_or_default().to_string();
                check_extension(&filename, allowed)?;
                let mime = guess_mime(&filename);

                *staged = Some(store.stage_stream(&filename, &mime, field).await?);
            }
            _ => {}
        }
    }
    Ok(())
}
