//! Raster images inside PDFs.
//!
//! Writing wraps a decoded image in an image XObject on a page of matching
//! size. Reading pulls the largest image XObject off a page; there is no
//! rasterizer, so vector-only pages have nothing to return.

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use super::pages::PdfBuilder;
use crate::error::{ConvertError, PdfError};

/// Points per inch.
const POINTS_PER_INCH: f32 = 72.0;

/// Page size in points for an image of `pixels` at `dpi`.
pub fn page_size_for(width_px: u32, height_px: u32, dpi: u32) -> (f32, f32) {
    let dpi = dpi.max(1) as f32;
    (
        width_px as f32 * POINTS_PER_INCH / dpi,
        height_px as f32 * POINTS_PER_INCH / dpi,
    )
}

/// Builds a one-page PDF showing the image at full page size.
///
/// JPEG input is embedded as-is (`DCTDecode`); anything else is stored as
/// deflated 8-bit RGB.
pub fn image_to_pdf(bytes: &[u8], dpi: u32) -> Result<Vec<u8>, ConvertError> {
    let format = image::guess_format(bytes)?;
    let decoded = image::load_from_memory(bytes)?;
    let (width, height) = (decoded.width(), decoded.height());

    let stream = if format == ImageFormat::Jpeg {
        let color_space = match &decoded {
            DynamicImage::ImageLuma8(_) => "DeviceGray",
            _ => "DeviceRGB",
        };
        let mut stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => color_space,
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            bytes.to_vec(),
        );
        stream.allows_compression = false;
        stream
    } else {
        let rgb = decoded.to_rgb8();
        let mut stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            rgb.into_raw(),
        );
        stream
            .compress()
            .map_err(|e| PdfError::Write(e.to_string()))?;
        stream
    };

    let (page_w, page_h) = page_size_for(width, height, dpi);
    let mut builder = PdfBuilder::new();
    let image_id = builder.add_object(stream);
    let content = format!("q {} 0 0 {} 0 0 cm /Im1 Do Q", page_w, page_h).into_bytes();
    let resources = dictionary! {
        "XObject" => dictionary! { "Im1" => image_id },
    };
    builder.add_page(page_w, page_h, content, resources);
    Ok(builder.finish()?)
}

/// The largest raster image drawn on the first page.
pub fn first_page_image(bytes: &[u8]) -> Result<DynamicImage, ConvertError> {
    let doc = Document::load_mem(bytes)?;
    let page_id = *doc
        .get_pages()
        .get(&1)
        .ok_or(ConvertError::Pdf(PdfError::NoPages))?;

    let resources = page_resources(&doc, page_id).ok_or(ConvertError::NoRasterContent)?;
    let xobjects = match resources.get(b"XObject") {
        Ok(obj) => resolve_dict(&doc, obj).ok_or(ConvertError::NoRasterContent)?,
        Err(_) => return Err(ConvertError::NoRasterContent),
    };

    let mut best: Option<(&Stream, i64)> = None;
    for (_, value) in xobjects.iter() {
        let Ok(id) = value.as_reference() else {
            continue;
        };
        let Ok(Object::Stream(stream)) = doc.get_object(id) else {
            continue;
        };
        if !name_is(&stream.dict, b"Subtype", b"Image") {
            continue;
        }
        let area = int(&stream.dict, b"Width") * int(&stream.dict, b"Height");
        if best.map_or(true, |(_, a)| area > a) {
            best = Some((stream, area));
        }
    }

    let (stream, _) = best.ok_or(ConvertError::NoRasterContent)?;
    decode_image_stream(&doc, stream)
}

fn decode_image_stream(doc: &Document, stream: &Stream) -> Result<DynamicImage, ConvertError> {
    let width = int(&stream.dict, b"Width") as u32;
    let height = int(&stream.dict, b"Height") as u32;

    match last_filter(&stream.dict).as_deref() {
        Some(b"DCTDecode") => {
            let raw = if filters(&stream.dict).len() > 1 {
                stream.decompressed_content()?
            } else {
                stream.content.clone()
            };
            Ok(image::load_from_memory_with_format(&raw, ImageFormat::Jpeg)?)
        }
        None | Some(b"FlateDecode") => {
            if int(&stream.dict, b"BitsPerComponent") != 8 {
                return Err(ConvertError::NoRasterContent);
            }
            let data = if filters(&stream.dict).is_empty() {
                stream.content.clone()
            } else {
                stream.decompressed_content()?
            };
            let components = color_components(doc, &stream.dict);
            let image = match components {
                3 => RgbImage::from_raw(width, height, data).map(DynamicImage::ImageRgb8),
                1 => GrayImage::from_raw(width, height, data).map(DynamicImage::ImageLuma8),
                _ => None,
            };
            image.ok_or(ConvertError::NoRasterContent)
        }
        Some(_) => Err(ConvertError::NoRasterContent),
    }
}

/// Resources of a page, following Parent links when not set on the page.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_object(page_id).ok()?.as_dict().ok()?;
    for _ in 0..64 {
        if let Ok(resources) = node.get(b"Resources") {
            return resolve_dict(doc, resources);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_object(parent).ok()?.as_dict().ok()?;
    }
    None
}

fn resolve_dict<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match object {
        Object::Dictionary(dict) => Some(dict),
        Object::Reference(id) => doc.get_object(*id).ok()?.as_dict().ok(),
        _ => None,
    }
}

fn int(dict: &Dictionary, key: &[u8]) -> i64 {
    match dict.get(key) {
        Ok(Object::Integer(v)) => *v,
        Ok(Object::Real(v)) => *v as i64,
        _ => 0,
    }
}

fn name_is(dict: &Dictionary, key: &[u8], expected: &[u8]) -> bool {
    matches!(dict.get(key), Ok(Object::Name(name)) if name.as_slice() == expected)
}

fn filters(dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Object::Name(name) => Some(name.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn last_filter(dict: &Dictionary) -> Option<Vec<u8>> {
    filters(dict).pop()
}

fn color_components(doc: &Document, dict: &Dictionary) -> usize {
    let color_space = match dict.get(b"ColorSpace") {
        Ok(Object::Reference(id)) => doc.get_object(*id).ok(),
        Ok(other) => Some(other),
        Err(_) => None,
    };
    match color_space {
        Some(Object::Name(name)) => match name.as_slice() {
            b"DeviceRGB" | b"CalRGB" => 3,
            b"DeviceGray" | b"CalGray" => 1,
            _ => 0,
        },
        // [/ICCBased ref] carries the component count as /N.
        Some(Object::Array(items)) => items
            .get(1)
            .and_then(|obj| obj.as_reference().ok())
            .and_then(|id| doc.get_object(id).ok())
            .and_then(|obj| obj.as_stream().ok())
            .map(|s| int(&s.dict, b"N") as usize)
            .unwrap_or(0),
        _ => 0,
    }
}
