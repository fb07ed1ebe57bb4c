//! Presentation slide text.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;

use super::{attr, qualified_attr, relationships, resolve_target, xml_error, Package};
use crate::error::OfficeError;

/// Text found on one slide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlideText {
    /// 1-based position in the presentation.
    pub index: usize,
    pub title: Option<String>,
    /// Non-empty paragraphs of every shape, title included.
    pub texts: Vec<String>,
}

impl SlideText {
    /// Title placeholder text, else the first non-empty paragraph.
    pub fn heading(&self) -> Option<&str> {
        self.title
            .as_deref()
            .or_else(|| self.texts.first().map(String::as_str))
    }
}

/// Slides in presentation order.
pub fn presentation_slides(bytes: &[u8]) -> Result<Vec<SlideText>, OfficeError> {
    let mut package = Package::open(bytes.to_vec())?;

    let presentation = package.read_part("ppt/presentation.xml")?;
    let order = slide_rel_ids(&presentation)?;

    let rels_xml = package.read_part("ppt/_rels/presentation.xml.rels")?;
    let rels = relationships(&rels_xml, "ppt/_rels/presentation.xml.rels")?;

    let mut slides = Vec::with_capacity(order.len());
    for rel_id in order {
        let Some((_, target)) = rels.iter().find(|(id, _)| *id == rel_id) else {
            tracing::warn!(rel_id = %rel_id, "slide relationship missing, skipping");
            continue;
        };
        let path = resolve_target("ppt", target);
        let xml = package.read_part(&path)?;
        let (title, texts) = slide_text(&xml, &path)?;
        slides.push(SlideText {
            index: slides.len() + 1,
            title,
            texts,
        });
    }

    Ok(slides)
}

fn slide_rel_ids(xml: &str) -> Result<Vec<String>, OfficeError> {
    let mut reader = Reader::from_str(xml);
    let mut ids = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"sldId" => {
                if let Some(id) = qualified_attr(&e, b"r:id") {
                    ids.push(id);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error("ppt/presentation.xml", e)),
            _ => {}
        }
    }

    Ok(ids)
}

fn slide_text(xml: &str, part: &str) -> Result<(Option<String>, Vec<String>), OfficeError> {
    let mut reader = Reader::from_str(xml);
    let mut title: Option<String> = None;
    let mut texts = Vec::new();

    let mut shape_is_title = false;
    let mut shape_paragraphs: Vec<String> = Vec::new();
    let mut in_shape = false;
    let mut paragraph = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"sp" => {
                    in_shape = true;
                    shape_is_title = false;
                    shape_paragraphs.clear();
                }
                b"ph" => shape_is_title |= is_title_placeholder(&e),
                b"p" => paragraph.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"ph" => {
                shape_is_title |= is_title_placeholder(&e);
            }
            Ok(Event::Text(t)) if in_text => {
                let text = t.unescape().map_err(|e| xml_error(part, e))?;
                paragraph.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let text = paragraph.trim();
                    if !text.is_empty() {
                        if in_shape {
                            shape_paragraphs.push(text.to_string());
                        } else {
                            texts.push(text.to_string());
                        }
                    }
                }
                b"sp" => {
                    in_shape = false;
                    if shape_is_title && title.is_none() && !shape_paragraphs.is_empty() {
                        title = Some(shape_paragraphs.join(" "));
                    }
                    texts.append(&mut shape_paragraphs);
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(part, e)),
            _ => {}
        }
    }

    Ok((title, texts))
}

fn is_title_placeholder(element: &quick_xml::events::BytesStart<'_>) -> bool {
    matches!(attr(element, b"type").as_deref(), Some("title") | Some("ctrTitle"))
}
