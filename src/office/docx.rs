//! Word document text.

use quick_xml::events::Event;
use quick_xml::Reader;

use super::{xml_error, Package};
use crate::error::OfficeError;

const DOCUMENT_PART: &str = "word/document.xml";

/// Paragraph texts of `word/document.xml`, in document order.
///
/// Runs are concatenated and `<w:tab/>` becomes a tab. Empty paragraphs are
/// kept so callers can preserve blank lines.
pub fn document_paragraphs(bytes: &[u8]) -> Result<Vec<String>, OfficeError> {
    let mut package = Package::open(bytes.to_vec())?;
    let xml = package.read_part(DOCUMENT_PART)?;
    paragraphs(&xml)
}

fn paragraphs(xml: &str) -> Result<Vec<String>, OfficeError> {
    let mut reader = Reader::from_str(xml);
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_paragraph = false;
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"p" => {
                    in_paragraph = true;
                    current.clear();
                }
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"p" => out.push(String::new()),
                b"tab" if in_paragraph => current.push('\t'),
                b"br" | b"cr" if in_paragraph => current.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let text = t.unescape().map_err(|e| xml_error(DOCUMENT_PART, e))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    in_paragraph = false;
                    out.push(std::mem::take(&mut current));
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(DOCUMENT_PART, e)),
            _ => {}
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    const BODY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:body>
<w:p><w:r><w:t>これは</w:t></w:r><w:r><w:t xml:space="preserve">テスト です。</w:t></w:r></w:p>
<w:p/>
<w:p><w:r><w:t>A</w:t><w:tab/><w:t>B &amp; C</w:t></w:r></w:p>
</w:body>
</w:document>"#;

    #[test]
    fn test_paragraphs_from_xml() {
        let paras = paragraphs(BODY).unwrap();
        assert_eq!(paras, vec!["これはテスト です。", "", "A\tB & C"]);
    }

    #[test]
    fn test_document_paragraphs_from_package() {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file(DOCUMENT_PART, SimpleFileOptions::default())
            .unwrap();
        zip.write_all(BODY.as_bytes()).unwrap();
        let bytes = zip.finish().unwrap().into_inner();

        let paras = document_paragraphs(&bytes).unwrap();
        assert_eq!(paras.len(), 3);
        assert_eq!(paras[0], "これはテスト です。");
    }

    #[test]
    fn test_missing_document_part() {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("other.xml", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"<x/>").unwrap();
        let bytes = zip.finish().unwrap().into_inner();

        assert!(matches!(
            document_paragraphs(&bytes),
            Err(OfficeError::MissingPart(_))
        ));
    }
}
