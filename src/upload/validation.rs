//! Upload validation: extension allow-lists, PDF magic checks and safe
//! on-disk names.

use rand::RngExt;

use crate::error::UploadError;

/// Extensions the transfer tool accepts.
pub const TRANSFER_EXTENSIONS: &[&str] = &[
    "txt", "pdf", "png", "jpg", "jpeg", "gif", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "zip",
    "rar", "7z",
];

/// Extensions the large-file tool accepts.
pub const GIGAFILE_EXTENSIONS: &[&str] = &[
    "txt", "pdf", "png", "jpg", "jpeg", "gif", "zip", "rar", "tar", "gz", "doc", "docx", "xls",
    "xlsx", "ppt", "pptx", "mp3", "mp4", "wav", "avi", "mov",
];

/// Extensions the proofreading tool can extract text from or reject cleanly.
pub const PROOFREADING_EXTENSIONS: &[&str] = &[
    "txt", "doc", "docx", "pdf", "xls", "xlsx", "ppt", "pptx", "odt", "ods", "odp",
];

/// Extensions the converter accepts as input.
pub const CONVERTER_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "pdf", "docx", "xlsx"];

/// Extensions accepted by the generic `secure_filename` helper.
pub const GENERIC_EXTENSIONS: &[&str] = &["pdf", "txt", "csv", "xlsx", "docx", "pptx"];

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Lowercased extension of `filename`, without the dot.
pub fn extension_of(filename: &str) -> Option<String> {
    let name = base_name(filename);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() && !name.starts_with('.') || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Checks `filename` against an allow-list and returns its extension.
pub fn check_extension(filename: &str, allowed: &[&str]) -> Result<String, UploadError> {
    if filename.trim().is_empty() {
        return Err(UploadError::EmptyFilename);
    }

    let extension = extension_of(filename).ok_or(UploadError::MissingExtension)?;
    if allowed.contains(&extension.as_str()) {
        Ok(extension)
    } else {
        Err(UploadError::ExtensionNotAllowed {
            extension,
            allowed: allowed.join(", "),
        })
    }
}

/// Returns true when `filename` has an allowed extension.
pub fn is_allowed(filename: &str, allowed: &[&str]) -> bool {
    check_extension(filename, allowed).is_ok()
}

/// Random hex name that keeps only an allow-listed extension.
///
/// Returns `None` for extensions outside [`GENERIC_EXTENSIONS`].
pub fn secure_filename(filename: &str) -> Option<String> {
    let extension = extension_of(filename)?;
    if !GENERIC_EXTENSIONS.contains(&extension.as_str()) {
        return None;
    }

    let token: [u8; 16] = rand::rng().random();
    Some(format!("{}.{}", hex::encode(token), extension))
}

/// Longest sanitized name in bytes.
///
/// Stored names carry a 36-byte uuid, an underscore and a `.part` suffix
/// while staged, and most file systems cap a component at 255 bytes.
pub const MAX_SANITIZED_BYTES: usize = 255 - 37 - 5;

/// Strips directories and characters that are unsafe in a file name.
///
/// Non-ASCII letters are kept so Japanese names survive. Long names are cut
/// at a char boundary to [`MAX_SANITIZED_BYTES`], keeping the extension.
pub fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = base_name(filename)
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect();

    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        return "file".to_string();
    }
    if trimmed.len() <= MAX_SANITIZED_BYTES {
        return trimmed.to_string();
    }

    let suffix = match trimmed.rfind('.') {
        Some(dot) if dot > 0 && trimmed.len() - dot <= 16 => &trimmed[dot..],
        _ => "",
    };
    let stem = truncate_bytes(
        &trimmed[..trimmed.len() - suffix.len()],
        MAX_SANITIZED_BYTES - suffix.len(),
    );
    format!("{stem}{suffix}")
}

fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Validates a PDF by extension and `%PDF-` header.
pub fn validate_pdf(filename: &str, data: &[u8]) -> Result<(), UploadError> {
    if extension_of(filename).as_deref() != Some("pdf") {
        return Err(UploadError::InvalidPdf(format!(
            "{} does not have a .pdf extension",
            filename
        )));
    }
    if !data.starts_with(PDF_MAGIC) {
        return Err(UploadError::InvalidPdf(format!(
            "{} does not start with a PDF header",
            filename
        )));
    }
    Ok(())
}

/// Guesses a mime type from the file name.
pub fn guess_mime(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string()
}

fn base_name(filename: &str) -> &str {
    filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
}
