//! Page copying between documents.
//!
//! lopdf has no "import page" primitive, so pages are deep-cloned into the
//! target document. Every referenced object is copied once; the map from
//! source to target ids makes shared resources and reference cycles safe.

use std::collections::HashMap;

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use crate::error::PdfError;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// US Letter, used when neither the page nor its ancestors set a MediaBox.
const DEFAULT_MEDIA_BOX: [i64; 4] = [0, 0, 612, 792];

/// Copies objects from one source document into a target, memoizing ids.
struct PageCopier<'a> {
    source: &'a Document,
    copied: HashMap<ObjectId, ObjectId>,
}

impl<'a> PageCopier<'a> {
    fn new(source: &'a Document) -> Self {
        Self {
            source,
            copied: HashMap::new(),
        }
    }

    fn copy_page(
        &mut self,
        target: &mut Document,
        page_id: ObjectId,
        parent: ObjectId,
    ) -> Result<ObjectId, PdfError> {
        let source = self.source;
        let page = source.get_object(page_id)?.as_dict()?;

        let new_id = target.new_object_id();
        self.copied.insert(page_id, new_id);

        let mut dict = Dictionary::new();
        for (key, value) in page.iter() {
            if key.as_slice() == b"Parent" {
                continue;
            }
            dict.set(key.clone(), self.copy_object(target, value));
        }

        for key in INHERITABLE {
            if dict.has(key) {
                continue;
            }
            if let Some(value) = self.inherited(page, key) {
                let copied = self.copy_object(target, &value);
                dict.set(key.to_vec(), copied);
            }
        }
        if !dict.has(b"MediaBox") {
            dict.set(
                "MediaBox",
                Object::Array(DEFAULT_MEDIA_BOX.iter().map(|v| Object::Integer(*v)).collect()),
            );
        }

        dict.set("Parent", Object::Reference(parent));
        target.objects.insert(new_id, Object::Dictionary(dict));
        Ok(new_id)
    }

    /// Walks the Parent chain looking for `key`.
    fn inherited(&self, page: &Dictionary, key: &[u8]) -> Option<Object> {
        let mut current = page.get(b"Parent").ok()?.as_reference().ok()?;
        // Bounded walk; malformed trees can loop.
        for _ in 0..64 {
            let node = self.source.get_object(current).ok()?.as_dict().ok()?;
            if let Ok(value) = node.get(key) {
                return Some(value.clone());
            }
            current = node.get(b"Parent").ok()?.as_reference().ok()?;
        }
        None
    }

    fn copy_object(&mut self, target: &mut Document, object: &Object) -> Object {
        match object {
            Object::Reference(id) => Object::Reference(self.copy_reference(target, *id)),
            Object::Array(items) => Object::Array(
                items
                    .iter()
                    .map(|item| self.copy_object(target, item))
                    .collect(),
            ),
            Object::Dictionary(dict) => Object::Dictionary(self.copy_dictionary(target, dict)),
            Object::Stream(stream) => {
                let dict = self.copy_dictionary(target, &stream.dict);
                let mut copy = Stream::new(dict, stream.content.clone());
                copy.allows_compression = stream.allows_compression;
                Object::Stream(copy)
            }
            other => other.clone(),
        }
    }

    fn copy_dictionary(&mut self, target: &mut Document, dict: &Dictionary) -> Dictionary {
        let mut out = Dictionary::new();
        for (key, value) in dict.iter() {
            // A Parent pointing into the source page tree would drag the whole
            // source document along.
            if key.as_slice() == b"Parent" && self.is_pages_node(value) {
                continue;
            }
            out.set(key.clone(), self.copy_object(target, value));
        }
        out
    }

    fn is_pages_node(&self, value: &Object) -> bool {
        let Ok(id) = value.as_reference() else {
            return false;
        };
        if self.copied.contains_key(&id) {
            return false;
        }
        self.source
            .get_object(id)
            .and_then(Object::as_dict)
            .and_then(|d| d.get(b"Type"))
            .and_then(Object::as_name)
            .map(|name| name == b"Pages")
            .unwrap_or(false)
    }

    fn copy_reference(&mut self, target: &mut Document, id: ObjectId) -> ObjectId {
        if let Some(existing) = self.copied.get(&id) {
            return *existing;
        }

        let new_id = target.new_object_id();
        self.copied.insert(id, new_id);

        let source = self.source;
        let copy = match source.get_object(id) {
            Ok(object) => self.copy_object(target, object),
            Err(_) => Object::Null,
        };
        target.objects.insert(new_id, copy);
        new_id
    }
}

/// Builds a new document page by page.
pub struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
}

impl Default for PdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfBuilder {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Copies the given 1-based pages of `source`, in the order given.
    ///
    /// Resources shared between those pages are copied once.
    pub fn append_pages(&mut self, source: &Document, numbers: &[u32]) -> Result<usize, PdfError> {
        let pages = source.get_pages();
        let mut copier = PageCopier::new(source);
        let mut added = 0;

        for number in numbers {
            let Some(page_id) = pages.get(number) else {
                continue;
            };
            let new_id = copier.copy_page(&mut self.doc, *page_id, self.pages_id)?;
            self.kids.push(new_id);
            added += 1;
        }

        Ok(added)
    }

    /// Copies every page of `source`.
    pub fn append_document(&mut self, source: &Document) -> Result<usize, PdfError> {
        let numbers: Vec<u32> = source.get_pages().keys().copied().collect();
        self.append_pages(source, &numbers)
    }

    /// Adds a page built from a content stream and a resource dictionary.
    pub fn add_page(&mut self, width: f32, height: f32, content: Vec<u8>, resources: Dictionary) {
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, content));
        let resources_id = self.doc.add_object(resources);
        let page = dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), Object::Real(width), Object::Real(height)],
            "Contents" => content_id,
            "Resources" => resources_id,
        };
        let page_id = self.doc.add_object(page);
        self.kids.push(page_id);
    }

    /// Adds an object to the document being built, e.g. a font or image.
    pub fn add_object(&mut self, object: impl Into<Object>) -> ObjectId {
        self.doc.add_object(object)
    }

    /// Serializes the document. Fails when no page was added.
    pub fn finish(mut self) -> Result<Vec<u8>, PdfError> {
        if self.kids.is_empty() {
            return Err(PdfError::NoPages);
        }

        let count = self.kids.len() as i64;
        let kids: Vec<Object> = self.kids.iter().map(|id| Object::Reference(*id)).collect();
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        self.doc
            .save_to(&mut buffer)
            .map_err(|e| PdfError::Write(e.to_string()))?;
        Ok(buffer)
    }
}

/// Most page numbers a single selection may expand to.
pub const MAX_SELECTED_PAGES: usize = 10_000;

/// Parses a page selection like `"1-3,5,7-10"` into 1-based page numbers.
///
/// Blank and non-numeric tokens are ignored. Pages past `page_count` are
/// dropped and range ends are clamped to it. The result is sorted and keeps
/// duplicates. A range with unparsable bounds is an error, as is a selection
/// longer than [`MAX_SELECTED_PAGES`].
pub fn parse_page_ranges(input: &str, page_count: u32) -> Result<Vec<u32>, PdfError> {
    let mut pages: Vec<u32> = Vec::new();

    for token in input.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if let Some((start, end)) = token.split_once('-') {
            let start: u32 = start
                .trim()
                .parse()
                .map_err(|_| PdfError::InvalidRange(token.to_string()))?;
            let end: u32 = end
                .trim()
                .parse()
                .map_err(|_| PdfError::InvalidRange(token.to_string()))?;
            let (start, end) = (start.max(1), end.min(page_count));
            if start <= end {
                let len = (end - start + 1) as usize;
                if pages.len() + len > MAX_SELECTED_PAGES {
                    return Err(PdfError::SelectionTooLarge(MAX_SELECTED_PAGES));
                }
                pages.extend(start..=end);
            }
        } else if token.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(page) = token.parse::<u32>() {
                if (1..=page_count).contains(&page) {
                    if pages.len() >= MAX_SELECTED_PAGES {
                        return Err(PdfError::SelectionTooLarge(MAX_SELECTED_PAGES));
                    }
                    pages.push(page);
                }
            }
        }
    }

    pages.sort_unstable();
    Ok(pages)
}

/// Loads a PDF from memory.
pub fn load(bytes: &[u8]) -> Result<Document, PdfError> {
    let doc = Document::load_mem(bytes)?;
    if doc.get_pages().is_empty() {
        return Err(PdfError::NoPages);
    }
    Ok(doc)
}

/// Concatenates documents in order.
pub fn merge(documents: &[Document]) -> Result<Vec<u8>, PdfError> {
    let mut builder = PdfBuilder::new();
    for doc in documents {
        builder.append_document(doc)?;
    }
    builder.finish()
}

/// One single-page document per page, as `(page_number, bytes)`.
pub fn split(source: &Document) -> Result<Vec<(u32, Vec<u8>)>, PdfError> {
    let mut out = Vec::new();
    for number in source.get_pages().keys() {
        let mut builder = PdfBuilder::new();
        builder.append_pages(source, &[*number])?;
        out.push((*number, builder.finish()?));
    }
    Ok(out)
}

/// A document holding the selected pages. Pages outside `source` are dropped.
pub fn extract(source: &Document, ranges: &str) -> Result<Vec<u8>, PdfError> {
    let page_count = u32::try_from(source.get_pages().len()).unwrap_or(u32::MAX);
    let numbers = parse_page_ranges(ranges, page_count)?;
    let mut builder = PdfBuilder::new();
    builder.append_pages(source, &numbers)?;
    if builder.page_count() == 0 {
        return Err(PdfError::EmptyRange(ranges.to_string()));
    }
    builder.finish()
}
