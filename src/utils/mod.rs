//! Shared helpers.

pub mod json_extraction;

pub use json_extraction::{
    extract_from_generic_code_block, extract_from_json_code_block, extract_json_array,
    find_matching_brace, find_matching_bracket, JsonExtractionError,
};
