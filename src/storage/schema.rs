//! Database schema constants.
//!
//! Timestamps are stored as unix milliseconds so expiry checks are plain
//! integer comparisons.

/// Metadata of uploaded files for the transfer and gigafile buckets.
pub const CREATE_STORED_FILES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS stored_files (
    id TEXT PRIMARY KEY,
    bucket TEXT NOT NULL,
    stored_name TEXT NOT NULL,
    original_name TEXT NOT NULL,
    mime_type TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    checksum TEXT NOT NULL,
    password_hash TEXT,
    downloads INTEGER NOT NULL DEFAULT 0,
    uploaded_at INTEGER NOT NULL,
    expires_at INTEGER NOT NULL
)
"#;

/// Proofreading results kept for the history view.
pub const CREATE_PROOFREAD_ITEMS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS proofread_items (
    id TEXT PRIMARY KEY,
    original TEXT NOT NULL,
    corrected TEXT NOT NULL,
    suggestions TEXT NOT NULL,
    created_at INTEGER NOT NULL
)
"#;

/// Generated document outlines.
pub const CREATE_TEXT_STRUCTURES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS text_structures (
    id TEXT PRIMARY KEY,
    prompt TEXT NOT NULL,
    structure TEXT NOT NULL,
    kind TEXT NOT NULL,
    created_at INTEGER NOT NULL
)
"#;

/// Parsed name-tag workbooks waiting for a design.
pub const CREATE_NAMETAG_BATCHES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS nametag_batches (
    id TEXT PRIMARY KEY,
    source_name TEXT NOT NULL,
    rows TEXT NOT NULL,
    created_at INTEGER NOT NULL
)
"#;

pub const CREATE_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_stored_files_bucket_expiry ON stored_files(bucket, expires_at);
CREATE INDEX IF NOT EXISTS idx_stored_files_stored_name ON stored_files(bucket, stored_name);
CREATE INDEX IF NOT EXISTS idx_proofread_items_created ON proofread_items(created_at DESC);
CREATE INDEX IF NOT EXISTS idx_nametag_batches_created ON nametag_batches(created_at)
"#;

/// Returns all schema creation statements in order.
pub fn all_schema_statements() -> Vec<&'static str> {
    vec![
        CREATE_STORED_FILES_TABLE,
        CREATE_PROOFREAD_ITEMS_TABLE,
        CREATE_TEXT_STRUCTURES_TABLE,
        CREATE_NAMETAG_BATCHES_TABLE,
        CREATE_INDEXES,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_statements_are_idempotent() {
        for statement in all_schema_statements() {
            assert!(statement.contains("IF NOT EXISTS"));
        }
    }
}
