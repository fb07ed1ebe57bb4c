//! Japanese text on generated pages.
//!
//! Uses a non-embedded CID font from the Adobe-Japan1 collection, which
//! every conforming reader ships a substitute for. Text is written as
//! UTF-16BE hex strings through the `UniJIS-UCS2-H` CMap.

use lopdf::{dictionary, Object, ObjectId, StringFormat};

use super::pages::PdfBuilder;

pub const JAPANESE_FONT: &str = "HeiseiKakuGo-W5";
const ENCODING: &str = "UniJIS-UCS2-H";

/// Adds the Type0 font and its descendant, returning the Type0 font id.
pub fn add_japanese_font(builder: &mut PdfBuilder) -> ObjectId {
    let descriptor = builder.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => JAPANESE_FONT,
        "Flags" => 4,
        "FontBBox" => vec![(-92).into(), (-250).into(), 1010.into(), 922.into()],
        "ItalicAngle" => 0,
        "Ascent" => 880,
        "Descent" => -120,
        "CapHeight" => 700,
        "StemV" => 80,
    });

    let descendant = builder.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType0",
        "BaseFont" => JAPANESE_FONT,
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::string_literal("Adobe"),
            "Ordering" => Object::string_literal("Japan1"),
            "Supplement" => 2,
        },
        "FontDescriptor" => descriptor,
        "DW" => 1000,
        // Half-width CIDs for the ASCII range.
        "W" => vec![1.into(), 95.into(), 500.into()],
    });

    builder.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => Object::Name(format!("{}-{}", JAPANESE_FONT, ENCODING).into_bytes()),
        "Encoding" => ENCODING,
        "DescendantFonts" => vec![descendant.into()],
    })
}

/// A UTF-16BE hex string operand for `Tj`.
pub fn encode_text(text: &str) -> Object {
    let bytes: Vec<u8> = text.encode_utf16().flat_map(|unit| unit.to_be_bytes()).collect();
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// Estimated advance width in points: half an em for ASCII, a full em
/// otherwise.
pub fn text_width(text: &str, font_size: f32) -> f32 {
    text.chars()
        .map(|c| if c.is_ascii() { 0.5 } else { 1.0 })
        .sum::<f32>()
        * font_size
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_text_is_utf16_be() {
        match encode_text("A山") {
            Object::String(bytes, StringFormat::Hexadecimal) => {
                assert_eq!(bytes, vec![0x00, 0x41, 0x5C, 0x71]);
            }
            other => panic!("unexpected operand: {:?}", other),
        }
    }

    #[test]
    fn test_text_width_estimate() {
        assert_eq!(text_width("ab", 10.0), 10.0);
        assert_eq!(text_width("山田", 10.0), 20.0);
        assert_eq!(text_width("", 12.0), 0.0);
    }
}
