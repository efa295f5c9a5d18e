//! `/ToUnicode` CMap parsing
//!
//! Only the parts needed to map character codes to text are read:
//! `codespacerange` (code widths), `bfchar` and `bfrange`.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

lazy_static! {
    static ref CODESPACE_BLOCK: Regex =
        Regex::new(r"(?s)begincodespacerange(.*?)endcodespacerange").unwrap();
    static ref BFCHAR_BLOCK: Regex = Regex::new(r"(?s)beginbfchar(.*?)endbfchar").unwrap();
    static ref BFRANGE_BLOCK: Regex = Regex::new(r"(?s)beginbfrange(.*?)endbfrange").unwrap();
    static ref HEX_PAIR: Regex =
        Regex::new(r"<([0-9A-Fa-f\s]*)>\s*<([0-9A-Fa-f\s]*)>").unwrap();
    static ref RANGE_ENTRY: Regex = Regex::new(
        r"<([0-9A-Fa-f\s]*)>\s*<([0-9A-Fa-f\s]*)>\s*(<[0-9A-Fa-f\s]*>|\[[^\]]*\])"
    )
    .unwrap();
    static ref HEX_TOKEN: Regex = Regex::new(r"<([0-9A-Fa-f\s]*)>").unwrap();
}

/// Upper bound on codes expanded from a single `bfrange` entry
const MAX_RANGE: u32 = 0xFFFF;

#[derive(Debug, Clone, Default)]
pub struct ToUnicode {
    /// Byte widths declared by `codespacerange`, shortest first
    code_lengths: Vec<usize>,
    map: HashMap<(usize, u32), String>,
}

impl ToUnicode {
    pub fn parse(data: &[u8]) -> Self {
        let content = String::from_utf8_lossy(data);
        let mut cmap = Self::default();

        for block in CODESPACE_BLOCK.captures_iter(&content) {
            for pair in HEX_PAIR.captures_iter(&block[1]) {
                let len = hex_bytes(&pair[1]).len();
                if len > 0 && !cmap.code_lengths.contains(&len) {
                    cmap.code_lengths.push(len);
                }
            }
        }

        for block in BFCHAR_BLOCK.captures_iter(&content) {
            for pair in HEX_PAIR.captures_iter(&block[1]) {
                let src = hex_bytes(&pair[1]);
                let dst = utf16_text(&hex_bytes(&pair[2]));
                cmap.insert(&src, dst);
            }
        }

        for block in BFRANGE_BLOCK.captures_iter(&content) {
            for entry in RANGE_ENTRY.captures_iter(&block[1]) {
                let lo = hex_bytes(&entry[1]);
                let hi = hex_bytes(&entry[2]);
                let (Some(start), Some(end)) = (code_value(&lo), code_value(&hi)) else {
                    continue;
                };
                if end < start || end - start > MAX_RANGE {
                    continue;
                }
                let target = &entry[3];
                if target.starts_with('[') {
                    let names = HEX_TOKEN.captures_iter(target);
                    for (offset, name) in names.enumerate() {
                        let code = start + offset as u32;
                        if code > end {
                            break;
                        }
                        cmap.map
                            .insert((lo.len(), code), utf16_text(&hex_bytes(&name[1])));
                    }
                } else {
                    let base = hex_bytes(target.trim_matches(|c| c == '<' || c == '>'));
                    for code in start..=end {
                        let mut dst = base.clone();
                        increment_last(&mut dst, code - start);
                        cmap.map.insert((lo.len(), code), utf16_text(&dst));
                    }
                }
            }
        }

        if cmap.code_lengths.is_empty() {
            let mut lengths: Vec<usize> = cmap.map.keys().map(|(len, _)| *len).collect();
            lengths.sort_unstable();
            lengths.dedup();
            cmap.code_lengths = lengths;
        }
        cmap.code_lengths.sort_unstable();
        cmap
    }

    fn insert(&mut self, src: &[u8], dst: String) {
        if let Some(code) = code_value(src) {
            self.map.insert((src.len(), code), dst);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Width in bytes of the codes this map reads; the widest declared
    /// width when codes are not all the same size
    pub fn code_length(&self) -> usize {
        self.code_lengths.last().copied().unwrap_or(1)
    }

    /// Map a string of character codes to text. Each position tries the
    /// declared code widths, shortest first; unmapped codes are skipped.
    pub fn decode(&self, bytes: &[u8]) -> Vec<(u32, String)> {
        let lengths: &[usize] = if self.code_lengths.is_empty() {
            &[1]
        } else {
            &self.code_lengths
        };
        let mut out = Vec::new();
        let mut pos = 0;
        while pos < bytes.len() {
            let mut step = lengths[lengths.len() - 1].min(bytes.len() - pos);
            let mut found = None;
            for &len in lengths {
                if pos + len > bytes.len() {
                    break;
                }
                if let Some(code) = code_value(&bytes[pos..pos + len]) {
                    if let Some(text) = self.map.get(&(len, code)) {
                        found = Some((code, text.clone()));
                        step = len;
                        break;
                    }
                }
            }
            if let Some(entry) = found {
                out.push(entry);
            } else if let Some(code) = code_value(&bytes[pos..pos + step]) {
                out.push((code, String::new()));
            }
            pos += step.max(1);
        }
        out
    }
}

fn hex_bytes(hex: &str) -> Vec<u8> {
    let digits: Vec<u8> = hex
        .bytes()
        .filter(u8::is_ascii_hexdigit)
        .map(|b| match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b - b'a' + 10,
            _ => b - b'A' + 10,
        })
        .collect();
    digits
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
        .collect()
}

fn code_value(bytes: &[u8]) -> Option<u32> {
    if bytes.is_empty() || bytes.len() > 4 {
        return None;
    }
    Some(bytes.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32))
}

fn increment_last(bytes: &mut [u8], by: u32) {
    let mut carry = by;
    for byte in bytes.iter_mut().rev() {
        if carry == 0 {
            break;
        }
        let sum = *byte as u32 + (carry & 0xFF);
        *byte = sum as u8;
        carry = (carry >> 8) + (sum >> 8);
    }
}

fn utf16_text(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair.get(1).copied().unwrap_or(0)]))
        .collect();
    String::from_utf16_lossy(&units)
}
