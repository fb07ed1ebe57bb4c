//! Minimal OOXML support.
//!
//! Office files are zip packages of XML parts. This module reads the parts
//! the tools need (sheet cells, slide titles, document paragraphs) with
//! `quick-xml` and writes styled single-sheet workbooks.

pub mod docx;
pub mod pptx;
pub mod xlsx;

use std::io::{Cursor, Read};

use quick_xml::events::attributes::Attribute;
use quick_xml::events::BytesStart;
use zip::ZipArchive;

use crate::error::OfficeError;

pub use docx::document_paragraphs;
pub use pptx::{presentation_slides, SlideText};
pub use xlsx::{read_first_sheet, BorderStyle, Borders, CellStyle, Workbook, Worksheet};

/// An opened OOXML package.
pub struct Package {
    archive: ZipArchive<Cursor<Vec<u8>>>,
}

impl Package {
    /// Opens a package from its bytes.
    pub fn open(bytes: impl Into<Vec<u8>>) -> Result<Self, OfficeError> {
        let archive = ZipArchive::new(Cursor::new(bytes.into()))?;
        Ok(Self { archive })
    }

    /// Reads a part as UTF-8 text.
    pub fn read_part(&mut self, name: &str) -> Result<String, OfficeError> {
        let mut file = match self.archive.by_name(name) {
            Ok(file) => file,
            Err(zip::result::ZipError::FileNotFound) => {
                return Err(OfficeError::MissingPart(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let mut text = String::new();
        file.read_to_string(&mut text)?;
        Ok(text)
    }

    /// Reads a part, returning `None` when it does not exist.
    pub fn read_optional_part(&mut self, name: &str) -> Result<Option<String>, OfficeError> {
        match self.read_part(name) {
            Ok(text) => Ok(Some(text)),
            Err(OfficeError::MissingPart(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Wraps a quick-xml error with the part it came from.
pub(crate) fn xml_error(part: &str, err: impl std::fmt::Display) -> OfficeError {
    OfficeError::Xml {
        part: part.to_string(),
        message: err.to_string(),
    }
}

/// Value of the attribute whose local name is `name`.
pub(crate) fn attr(element: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|a: &Attribute<'_>| a.key.local_name().as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Value of the attribute with the exact qualified name, e.g. `r:id`.
pub(crate) fn qualified_attr(element: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|a: &Attribute<'_>| a.key.as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Resolves a relationship target relative to the part that owns it.
///
/// `base_dir` is the owning part's directory, e.g. `xl` or `ppt`.
pub(crate) fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut parts: Vec<&str> = base_dir.split('/').filter(|p| !p.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            ".." => {
                parts.pop();
            }
            "." | "" => {}
            s => parts.push(s),
        }
    }
    parts.join("/")
}

/// Parses a `.rels` part into `(id, target)` pairs.
pub(crate) fn relationships(xml: &str, part: &str) -> Result<Vec<(String, String)>, OfficeError> {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);
    let mut rels = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) = (attr(&e, b"Id"), attr(&e, b"Target")) {
                    rels.push((id, target));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(part, e)),
            _ => {}
        }
    }

    Ok(rels)
}
