//! Helpers over the lopdf object model shared by the document, page and
//! layer modules

use crate::error::{PdfError, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use lopdf::{Dictionary, Document as LoDocument, Object, ObjectId, StringFormat};

/// Reference chains longer than this are treated as cycles
const MAX_INDIRECTION: usize = 32;

/// Attributes a page inherits from its ancestors in the page tree
pub const INHERITABLE_PAGE_KEYS: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

pub fn catalog_id(doc: &LoDocument) -> Result<ObjectId> {
    doc.trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| PdfError::InvalidStructure("trailer has no /Root reference".to_string()))
}

pub fn catalog(doc: &LoDocument) -> Result<&Dictionary> {
    let id = catalog_id(doc)?;
    Ok(doc.get_object(id)?.as_dict()?)
}

pub fn catalog_mut(doc: &mut LoDocument) -> Result<&mut Dictionary> {
    let id = catalog_id(doc)?;
    Ok(doc.get_object_mut(id)?.as_dict_mut()?)
}

/// Follow references until a direct object is reached
pub fn resolve<'a>(doc: &'a LoDocument, mut object: &'a Object) -> Result<&'a Object> {
    for _ in 0..MAX_INDIRECTION {
        match object {
            Object::Reference(id) => object = doc.get_object(*id)?,
            other => return Ok(other),
        }
    }
    Err(PdfError::InvalidStructure(
        "reference chain too deep".to_string(),
    ))
}

/// Look up `key` in `dict` and resolve it
pub fn resolve_key<'a>(
    doc: &'a LoDocument,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Object> {
    dict.get(key).ok().and_then(|obj| resolve(doc, obj).ok())
}

pub fn page_dict(doc: &LoDocument, page_id: ObjectId) -> Result<&Dictionary> {
    Ok(doc.get_object(page_id)?.as_dict()?)
}

pub fn page_dict_mut(doc: &mut LoDocument, page_id: ObjectId) -> Result<&mut Dictionary> {
    Ok(doc.get_object_mut(page_id)?.as_dict_mut()?)
}

/// Find an inheritable page attribute on the page or the nearest ancestor
pub fn inherited_attribute(
    doc: &LoDocument,
    page_id: ObjectId,
    key: &[u8],
) -> Result<Option<Object>> {
    let mut current = page_id;
    for _ in 0..MAX_INDIRECTION {
        let dict = page_dict(doc, current)?;
        if let Ok(value) = dict.get(key) {
            return Ok(Some(resolve(doc, value)?.clone()));
        }
        match dict.get(b"Parent").and_then(Object::as_reference) {
            Ok(parent) => current = parent,
            Err(_) => return Ok(None),
        }
    }
    Err(PdfError::InvalidStructure("page tree too deep".to_string()))
}

/// Copy inherited attributes onto the page itself so it survives detaching
/// from its original page tree
pub fn materialize_inherited(doc: &mut LoDocument, page_id: ObjectId) -> Result<()> {
    let mut copied = Vec::new();
    for key in INHERITABLE_PAGE_KEYS {
        if page_dict(doc, page_id)?.has(key) {
            continue;
        }
        if let Some(value) = inherited_attribute(doc, page_id, key)? {
            copied.push((key.to_vec(), value));
        }
    }
    let dict = page_dict_mut(doc, page_id)?;
    for (key, value) in copied {
        dict.set(key, value);
    }
    Ok(())
}

pub fn name_of(object: &Object) -> Option<&str> {
    match object {
        Object::Name(bytes) => std::str::from_utf8(bytes).ok(),
        _ => None,
    }
}

pub fn dict_name<'a>(dict: &'a Dictionary, key: &[u8]) -> Option<&'a str> {
    dict.get(key).ok().and_then(name_of)
}

/// Decode a PDF text string: UTF-16BE with BOM, UTF-8 with BOM, otherwise
/// PDFDocEncoding (treated as Latin-1)
pub fn decode_text_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(&bytes[3..]).into_owned();
    }
    bytes.iter().map(|&b| b as char).collect()
}

pub fn text_of(object: &Object) -> Option<String> {
    match object {
        Object::String(bytes, _) => Some(decode_text_string(bytes)),
        Object::Name(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    }
}

pub fn dict_text(doc: &LoDocument, dict: &Dictionary, key: &[u8]) -> Option<String> {
    resolve_key(doc, dict, key).and_then(text_of)
}

/// Encode a text string object; ASCII stays literal, anything else becomes
/// UTF-16BE with a byte order mark
pub fn text_string(value: &str) -> Object {
    if value.is_ascii() {
        return Object::String(value.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in value.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// Encode text for a simple font using WinAnsi; unmappable characters become '?'
pub fn win_ansi_bytes(value: &str) -> Vec<u8> {
    value
        .chars()
        .map(|c| match c as u32 {
            0x20..=0x7E | 0xA0..=0xFF => c as u8,
            0x2022 => 0x95,
            0x2013 => 0x96,
            0x2014 => 0x97,
            0x2018 => 0x91,
            0x2019 => 0x92,
            0x201C => 0x93,
            0x201D => 0x94,
            0x20AC => 0x80,
            _ => b'?',
        })
        .collect()
}

/// Format a timestamp as a PDF date string (`D:YYYYMMDDHHmmSS+HH'mm'`)
pub fn pdf_date<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let fixed = time.fixed_offset();
    let offset = fixed.offset().local_minus_utc();
    let sign = if offset < 0 { '-' } else { '+' };
    let offset = offset.abs();
    format!(
        "D:{}{}{:02}'{:02}'",
        fixed.format("%Y%m%d%H%M%S"),
        sign,
        offset / 3600,
        (offset % 3600) / 60
    )
}

pub fn now_pdf_date() -> String {
    pdf_date(&Utc::now())
}

/// Parse a PDF date string; every field after the year is optional
pub fn parse_pdf_date(value: &str) -> Option<DateTime<FixedOffset>> {
    let raw = value.trim().strip_prefix("D:").unwrap_or(value.trim());
    let digits: String = raw.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() < 4 {
        return None;
    }
    let field = |start: usize, len: usize, default: u32| -> u32 {
        digits
            .get(start..start + len)
            .and_then(|s| s.parse().ok())
            .unwrap_or(default)
    };
    let year: i32 = digits[0..4].parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, field(4, 2, 1), field(6, 2, 1))?;
    let naive = date.and_hms_opt(field(8, 2, 0), field(10, 2, 0), field(12, 2, 0))?;

    let rest = &raw[digits.len()..];
    let offset_secs = match rest.chars().next() {
        Some(sign @ ('+' | '-')) => {
            let tz: String = rest[1..].chars().filter(char::is_ascii_digit).collect();
            let hours: i32 = tz.get(0..2).and_then(|s| s.parse().ok()).unwrap_or(0);
            let minutes: i32 = tz.get(2..4).and_then(|s| s.parse().ok()).unwrap_or(0);
            let secs = hours * 3600 + minutes * 60;
            if sign == '-' {
                -secs
            } else {
                secs
            }
        }
        _ => 0,
    };
    let offset = FixedOffset::east_opt(offset_secs)?;
    offset.from_local_datetime(&naive).single()
}

/// Replace every reference to `from` with `to` inside `object`
pub fn rewrite_references(object: &mut Object, map: &std::collections::HashMap<ObjectId, ObjectId>) {
    match object {
        Object::Reference(id) => {
            if let Some(target) = map.get(id) {
                *id = *target;
            }
        }
        Object::Array(items) => {
            for item in items {
                rewrite_references(item, map);
            }
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter_mut() {
                rewrite_references(value, map);
            }
        }
        Object::Stream(stream) => {
            for (_, value) in stream.dict.iter_mut() {
                rewrite_references(value, map);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn test_text_string_roundtrip() {
        for value in ["Layer 1", "Ebene Ü", "層 レイヤー", ""] {
            let object = text_string(value);
            assert_eq!(text_of(&object).as_deref(), Some(value));
        }
    }

    #[test]
    fn test_decode_latin1_fallback() {
        assert_eq!(decode_text_string(&[0x43, 0x61, 0x66, 0xE9]), "Café");
    }

    #[test]
    fn test_win_ansi_bytes() {
        assert_eq!(win_ansi_bytes("a€b"), vec![b'a', 0x80, b'b']);
        assert_eq!(win_ansi_bytes("x→y"), b"x?y".to_vec());
    }

    #[test]
    fn test_pdf_date_roundtrip() {
        let parsed = parse_pdf_date("D:20240315093000+02'00'").unwrap();
        assert_eq!(pdf_date(&parsed), "D:20240315093000+02'00'");

        let short = parse_pdf_date("D:2023").unwrap();
        assert_eq!(short.format("%Y-%m-%d").to_string(), "2023-01-01");

        assert!(parse_pdf_date("garbage").is_none());
    }

    #[test]
    fn test_inherited_attribute_walks_parents() {
        let mut doc = LoDocument::with_version("1.7");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 200.into(), 300.into()],
                "Rotate" => 90,
            }),
        );

        let media = inherited_attribute(&doc, page_id, b"MediaBox").unwrap().unwrap();
        assert_eq!(
            crate::geometry::Rect::from_objects(media.as_array().unwrap()),
            Some(crate::geometry::Rect::from_size(200.0, 300.0))
        );

        materialize_inherited(&mut doc, page_id).unwrap();
        let dict = page_dict(&doc, page_id).unwrap();
        assert!(dict.has(b"MediaBox"));
        assert_eq!(dict.get(b"Rotate").unwrap().as_i64().unwrap(), 90);
        assert!(!dict.has(b"CropBox"));
    }
}
