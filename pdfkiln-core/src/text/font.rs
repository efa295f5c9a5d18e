//! Font dictionaries as far as text extraction needs them: turning codes
//! into text and knowing how far each code advances

use super::cmap::ToUnicode;
use crate::objects;
use lopdf::{Dictionary, Document as LoDocument, Object};
use std::collections::HashMap;

/// Advance used when a font carries no width information, in glyph units
const FALLBACK_WIDTH: f32 = 500.0;

/// One decoded character code
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedCode {
    pub text: String,
    /// Advance in glyph space units (1/1000 em)
    pub width: f32,
    /// Single-byte code 32 gets word spacing
    pub is_space: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FontInfo {
    pub base_font: String,
    composite: bool,
    to_unicode: Option<ToUnicode>,
    differences: HashMap<u8, char>,
    widths: HashMap<u32, f32>,
    default_width: f32,
}

impl FontInfo {
    pub fn from_dict(doc: &LoDocument, dict: &Dictionary) -> Self {
        let subtype = objects::dict_name(dict, b"Subtype").unwrap_or("Type1");
        let composite = subtype == "Type0";
        let mut font = FontInfo {
            base_font: objects::dict_name(dict, b"BaseFont")
                .unwrap_or_default()
                .to_string(),
            composite,
            default_width: if composite { 1000.0 } else { FALLBACK_WIDTH },
            ..Default::default()
        };

        if let Some(Object::Stream(stream)) = objects::resolve_key(doc, dict, b"ToUnicode") {
            let data = stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone());
            let cmap = ToUnicode::parse(&data);
            if !cmap.is_empty() {
                font.to_unicode = Some(cmap);
            }
        }

        if composite {
            let descendant = objects::resolve_key(doc, dict, b"DescendantFonts")
                .and_then(|fonts| fonts.as_array().ok())
                .and_then(|fonts| fonts.first())
                .and_then(|first| objects::resolve(doc, first).ok())
                .and_then(|first| first.as_dict().ok());
            if let Some(cid_font) = descendant {
                if let Some(dw) = objects::resolve_key(doc, cid_font, b"DW")
                    .and_then(|w| w.as_float().ok())
                {
                    font.default_width = dw;
                }
                if let Some(Object::Array(w)) = objects::resolve_key(doc, cid_font, b"W") {
                    font.widths = cid_widths(doc, w);
                }
            }
        } else {
            let first_char = objects::resolve_key(doc, dict, b"FirstChar")
                .and_then(|v| v.as_i64().ok())
                .unwrap_or(0);
            if let Some(Object::Array(widths)) = objects::resolve_key(doc, dict, b"Widths") {
                for (i, width) in widths.iter().enumerate() {
                    let code = first_char
                        .checked_add(i as i64)
                        .and_then(|code| u32::try_from(code).ok());
                    let width = objects::resolve(doc, width).ok().and_then(|w| w.as_float().ok());
                    if let (Some(code), Some(width)) = (code, width) {
                        font.widths.insert(code, width);
                    }
                }
            }
            if let Some(Object::Dictionary(encoding)) = objects::resolve_key(doc, dict, b"Encoding") {
                if let Some(Object::Array(diffs)) = objects::resolve_key(doc, encoding, b"Differences") {
                    font.differences = differences(diffs);
                }
            }
        }
        font
    }

    /// Split a shown string into codes and decode each of them
    pub fn decode(&self, bytes: &[u8]) -> Vec<DecodedCode> {
        match &self.to_unicode {
            Some(cmap) => cmap
                .decode(bytes)
                .into_iter()
                .map(|(code, text)| self.code(code, text, !self.composite))
                .collect(),
            None if self.composite => self.decode_two_byte(bytes),
            None => bytes
                .iter()
                .map(|&b| {
                    let ch = self
                        .differences
                        .get(&b)
                        .copied()
                        .unwrap_or_else(|| win_ansi_char(b));
                    self.code(b as u32, ch.to_string(), true)
                })
                .collect(),
        }
    }

    /// Identity-encoded CIDs without a ToUnicode map; the code is taken
    /// as a Unicode scalar
    fn decode_two_byte(&self, bytes: &[u8]) -> Vec<DecodedCode> {
        bytes
            .chunks(2)
            .map(|pair| {
                let code = pair.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32);
                let text = char::from_u32(code)
                    .filter(|c| !c.is_control())
                    .map(String::from)
                    .unwrap_or_default();
                self.code(code, text, false)
            })
            .collect()
    }

    fn code(&self, code: u32, text: String, single_byte: bool) -> DecodedCode {
        DecodedCode {
            width: self.widths.get(&code).copied().unwrap_or(self.default_width),
            is_space: single_byte && code == 32,
            text,
        }
    }
}

fn cid_widths(doc: &LoDocument, w: &[Object]) -> HashMap<u32, f32> {
    let mut widths = HashMap::new();
    let number = |o: &Object| objects::resolve(doc, o).ok().and_then(|v| v.as_float().ok());
    let mut i = 0;
    while i < w.len() {
        let Some(first) = number(&w[i]) else { break };
        match w.get(i + 1).and_then(|o| objects::resolve(doc, o).ok()) {
            Some(Object::Array(list)) => {
                for (offset, width) in list.iter().enumerate() {
                    let cid = to_cid(first).and_then(|first| first.checked_add(offset as u32));
                    if let (Some(cid), Some(width)) = (cid, number(width)) {
                        widths.insert(cid, width);
                    }
                }
                i += 2;
            }
            Some(_) => {
                let (Some(last), Some(width)) = (
                    w.get(i + 1).and_then(number),
                    w.get(i + 2).and_then(number),
                ) else {
                    break;
                };
                if let (Some(first), Some(last)) = (to_cid(first), to_cid(last)) {
                    for cid in first..=last.min(first.saturating_add(0xFFFF)) {
                        widths.insert(cid, width);
                    }
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}

fn to_cid(value: f32) -> Option<u32> {
    (value.is_finite() && value >= 0.0 && value <= u32::MAX as f32).then(|| value as u32)
}

fn differences(diffs: &[Object]) -> HashMap<u8, char> {
    let mut map = HashMap::new();
    let mut code: i64 = 0;
    for item in diffs {
        match item {
            Object::Integer(n) => code = *n,
            Object::Name(name) => {
                if let (Ok(slot), Some(ch)) = (u8::try_from(code), glyph_char(name)) {
                    map.insert(slot, ch);
                }
                code += 1;
            }
            _ => {}
        }
    }
    map
}

/// Character for a glyph name: single letters and digits, the common
/// punctuation names and `uniXXXX`
fn glyph_char(name: &[u8]) -> Option<char> {
    let name = std::str::from_utf8(name).ok()?;
    if name.chars().count() == 1 {
        return name.chars().next();
    }
    if let Some(hex) = name.strip_prefix("uni") {
        return u32::from_str_radix(hex.get(0..4)?, 16).ok().and_then(char::from_u32);
    }
    let ch = match name {
        "space" => ' ',
        "period" => '.',
        "comma" => ',',
        "colon" => ':',
        "semicolon" => ';',
        "hyphen" | "minus" => '-',
        "endash" => '\u{2013}',
        "emdash" => '\u{2014}',
        "quoteright" => '\u{2019}',
        "quoteleft" => '\u{2018}',
        "quotedblleft" => '\u{201C}',
        "quotedblright" => '\u{201D}',
        "parenleft" => '(',
        "parenright" => ')',
        "slash" => '/',
        "exclam" => '!',
        "question" => '?',
        "bullet" => '\u{2022}',
        "fi" => '\u{FB01}',
        "fl" => '\u{FB02}',
        "zero" => '0',
        "one" => '1',
        "two" => '2',
        "three" => '3',
        "four" => '4',
        "five" => '5',
        "six" => '6',
        "seven" => '7',
        "eight" => '8',
        "nine" => '9',
        _ => return None,
    };
    Some(ch)
}

/// Inverse of [`objects::win_ansi_bytes`] for the 0x80-0x9F block; other
/// bytes map to Latin-1
pub fn win_ansi_char(byte: u8) -> char {
    match byte {
        0x80 => '\u{20AC}',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '\u{2022}',
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        other => other as char,
    }
}
