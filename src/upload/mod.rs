//! Upload validation and multipart handling.

pub mod multipart;
pub mod validation;

pub use multipart::{stream_into_store, FormData, UploadedFile};
pub use validation::{
    check_extension, extension_of, guess_mime, is_allowed, sanitize_filename, secure_filename,
    validate_pdf, CONVERTER_EXTENSIONS, GENERIC_EXTENSIONS, GIGAFILE_EXTENSIONS,
    PROOFREADING_EXTENSIONS, TRANSFER_EXTENSIONS,
};
