//! Text extraction from page content streams
//!
//! The interpreter follows the graphics and text state operators, decodes
//! shown strings through the current font and records each span with its
//! position in user space. Spans are then grouped into lines by baseline,
//! top to bottom and left to right.

mod cmap;
mod font;

pub use cmap::ToUnicode;
pub use font::{win_ansi_char, DecodedCode, FontInfo};

use crate::error::Result;
use crate::geometry::{Matrix, Point, Rect};
use crate::objects;
use lopdf::content::Content;
use lopdf::{Dictionary, Document as LoDocument, Object, ObjectId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Form XObjects nested deeper than this are not entered
const MAX_FORM_DEPTH: usize = 8;

/// A run of text shown by one text-showing operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSpan {
    pub text: String,
    pub bbox: Rect,
    /// Baseline start in user space
    pub origin: Point,
    pub font: String,
    /// Font size after the text and graphics transforms
    pub size: f32,
    /// Horizontal extent of each char of `text`
    #[serde(skip)]
    pub char_extents: Vec<(f32, f32)>,
}

/// Spans sharing a baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    pub text: String,
    pub bbox: Rect,
    /// Largest font size on the line
    pub size: f32,
    /// Font of the first span
    pub font: String,
    #[serde(skip)]
    pub char_extents: Vec<(f32, f32)>,
}

impl TextLine {
    fn from_spans(mut spans: Vec<TextSpan>) -> Self {
        spans.sort_by(|a, b| a.origin.x.total_cmp(&b.origin.x));
        let mut line = TextLine {
            text: String::new(),
            bbox: spans[0].bbox,
            size: 0.0,
            font: spans[0].font.clone(),
            char_extents: Vec::new(),
        };
        let mut last_end: Option<f32> = None;
        for span in spans {
            if let Some(end) = last_end {
                let gap = span.bbox.x0 - end;
                let needs_space = gap > span.size * 0.15
                    && !line.text.ends_with(char::is_whitespace)
                    && !span.text.starts_with(char::is_whitespace);
                if needs_space {
                    line.text.push(' ');
                    line.char_extents.push((end, span.bbox.x0));
                }
            }
            last_end = Some(span.bbox.x1);
            line.bbox = line.bbox.union(&span.bbox);
            line.size = line.size.max(span.size);
            line.text.push_str(&span.text);
            line.char_extents.extend(span.char_extents);
        }
        line
    }
}

/// A case-insensitive match of a search needle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub page_index: usize,
    /// The matched text as it appears on the page
    pub text: String,
    /// Approximate area covered by the match
    pub rect: Rect,
}

/// All text spans of a page in content stream order
pub fn page_spans(doc: &LoDocument, page_id: ObjectId) -> Result<Vec<TextSpan>> {
    let content = doc.get_page_content(page_id)?;
    let resources = match objects::inherited_attribute(doc, page_id, b"Resources")? {
        Some(Object::Dictionary(dict)) => dict,
        _ => Dictionary::new(),
    };
    let mut interpreter = Interpreter {
        doc,
        spans: Vec::new(),
    };
    interpreter.run(&content, &resources, Matrix::identity(), 0)?;
    debug!(page = ?page_id, spans = interpreter.spans.len(), "extracted text spans");
    Ok(interpreter.spans)
}

/// Text lines of a page, top to bottom
pub fn page_lines(doc: &LoDocument, page_id: ObjectId) -> Result<Vec<TextLine>> {
    Ok(group_lines(page_spans(doc, page_id)?))
}

/// Plain text of a page, one line per baseline
pub fn page_text(doc: &LoDocument, page_id: ObjectId) -> Result<String> {
    let lines = page_lines(doc, page_id)?;
    Ok(lines
        .iter()
        .map(|line| line.text.as_str())
        .collect::<Vec<_>>()
        .join("\n"))
}

pub fn search_page(
    doc: &LoDocument,
    page_id: ObjectId,
    page_index: usize,
    needle: &str,
) -> Result<Vec<SearchHit>> {
    let needle: Vec<char> = needle.chars().flat_map(char::to_lowercase).collect();
    if needle.is_empty() {
        return Ok(Vec::new());
    }
    let mut hits = Vec::new();
    for line in page_lines(doc, page_id)? {
        let chars: Vec<char> = line.text.chars().collect();
        // Lowercasing can change length, so compare char by char
        let folded: Vec<char> = chars
            .iter()
            .map(|c| c.to_lowercase().next().unwrap_or(*c))
            .collect();
        let mut start = 0;
        while start + needle.len() <= folded.len() {
            if folded[start..start + needle.len()] == needle[..] {
                let end = start + needle.len();
                let (x0, x1) = extent(&line.char_extents, start, end).unwrap_or((line.bbox.x0, line.bbox.x1));
                hits.push(SearchHit {
                    page_index,
                    text: chars[start..end].iter().collect(),
                    rect: Rect::new(x0, line.bbox.y0, x1, line.bbox.y1),
                });
                start = end;
            } else {
                start += 1;
            }
        }
    }
    Ok(hits)
}

fn extent(extents: &[(f32, f32)], start: usize, end: usize) -> Option<(f32, f32)> {
    let slice = extents.get(start..end)?;
    let x0 = slice.iter().map(|e| e.0).fold(f32::INFINITY, f32::min);
    let x1 = slice.iter().map(|e| e.1).fold(f32::NEG_INFINITY, f32::max);
    (x0 <= x1).then_some((x0, x1))
}

/// Group spans into lines. Spans whose baselines differ by less than half
/// the smaller font size share a line.
pub fn group_lines(mut spans: Vec<TextSpan>) -> Vec<TextLine> {
    spans.retain(|span| !span.text.trim().is_empty());
    spans.sort_by(|a, b| {
        b.origin
            .y
            .total_cmp(&a.origin.y)
            .then(a.origin.x.total_cmp(&b.origin.x))
    });

    let mut lines = Vec::new();
    let mut current: Vec<TextSpan> = Vec::new();
    let mut baseline = f32::NAN;
    for span in spans {
        let tolerance = current
            .iter()
            .map(|s| s.size)
            .fold(span.size, f32::min)
            .max(1.0)
            * 0.5;
        if !current.is_empty() && (baseline - span.origin.y).abs() > tolerance {
            lines.push(TextLine::from_spans(std::mem::take(&mut current)));
        }
        if current.is_empty() {
            baseline = span.origin.y;
        }
        current.push(span);
    }
    if !current.is_empty() {
        lines.push(TextLine::from_spans(current));
    }
    lines
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    char_spacing: f32,
    word_spacing: f32,
    /// Horizontal scaling as a fraction
    scale: f32,
    leading: f32,
    rise: f32,
    font: Option<std::rc::Rc<FontInfo>>,
    font_size: f32,
}

impl GraphicsState {
    fn new(ctm: Matrix) -> Self {
        Self {
            ctm,
            char_spacing: 0.0,
            word_spacing: 0.0,
            scale: 1.0,
            leading: 0.0,
            rise: 0.0,
            font: None,
            font_size: 0.0,
        }
    }
}

struct Interpreter<'a> {
    doc: &'a LoDocument,
    spans: Vec<TextSpan>,
}

impl<'a> Interpreter<'a> {
    fn run(
        &mut self,
        content: &[u8],
        resources: &Dictionary,
        ctm: Matrix,
        depth: usize,
    ) -> Result<()> {
        let content = Content::decode(content)?;
        let mut fonts: HashMap<Vec<u8>, std::rc::Rc<FontInfo>> = HashMap::new();
        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut gs = GraphicsState::new(ctm);
        let mut tm = Matrix::identity();
        let mut tlm = Matrix::identity();

        for op in &content.operations {
            let operands = &op.operands;
            let num = |i: usize| operands.get(i).and_then(|o| o.as_float().ok()).unwrap_or(0.0);
            match op.operator.as_str() {
                "q" => stack.push(gs.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        gs = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        gs.ctm = m.then(&gs.ctm);
                    }
                }
                "BT" => {
                    tm = Matrix::identity();
                    tlm = Matrix::identity();
                }
                "Tf" => {
                    gs.font_size = num(1);
                    gs.font = operands
                        .first()
                        .and_then(|o| o.as_name().ok())
                        .map(|name| self.font(resources, &mut fonts, name));
                }
                "Tc" => gs.char_spacing = num(0),
                "Tw" => gs.word_spacing = num(0),
                "Tz" => gs.scale = num(0) / 100.0,
                "TL" => gs.leading = num(0),
                "Ts" => gs.rise = num(0),
                "Td" => {
                    tlm = translate(num(0), num(1)).then(&tlm);
                    tm = tlm;
                }
                "TD" => {
                    gs.leading = -num(1);
                    tlm = translate(num(0), num(1)).then(&tlm);
                    tm = tlm;
                }
                "Tm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        tlm = m;
                        tm = m;
                    }
                }
                "T*" => {
                    tlm = translate(0.0, -gs.leading).then(&tlm);
                    tm = tlm;
                }
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(&gs, &mut tm, bytes);
                    }
                }
                "'" | "\"" => {
                    if op.operator == "\"" {
                        gs.word_spacing = num(0);
                        gs.char_spacing = num(1);
                    }
                    tlm = translate(0.0, -gs.leading).then(&tlm);
                    tm = tlm;
                    if let Some(Object::String(bytes, _)) = operands.last() {
                        self.show(&gs, &mut tm, bytes);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        for item in items {
                            match item {
                                Object::String(bytes, _) => self.show(&gs, &mut tm, bytes),
                                other => {
                                    let adjust = other.as_float().unwrap_or(0.0);
                                    let tx = -adjust / 1000.0 * gs.font_size * gs.scale;
                                    tm = translate(tx, 0.0).then(&tm);
                                }
                            }
                        }
                    }
                }
                "Do" if depth < MAX_FORM_DEPTH => {
                    if let Some(name) = operands.first().and_then(|o| o.as_name().ok()) {
                        self.run_form(resources, name, gs.ctm, depth)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn font(
        &self,
        resources: &Dictionary,
        cache: &mut HashMap<Vec<u8>, std::rc::Rc<FontInfo>>,
        name: &[u8],
    ) -> std::rc::Rc<FontInfo> {
        if let Some(font) = cache.get(name) {
            return font.clone();
        }
        let font = objects::resolve_key(self.doc, resources, b"Font")
            .and_then(|fonts| fonts.as_dict().ok())
            .and_then(|fonts| objects::resolve_key(self.doc, fonts, name))
            .and_then(|font| font.as_dict().ok())
            .map(|dict| FontInfo::from_dict(self.doc, dict))
            .unwrap_or_default();
        let font = std::rc::Rc::new(font);
        cache.insert(name.to_vec(), font.clone());
        font
    }

    fn run_form(
        &mut self,
        resources: &Dictionary,
        name: &[u8],
        ctm: Matrix,
        depth: usize,
    ) -> Result<()> {
        let stream = objects::resolve_key(self.doc, resources, b"XObject")
            .and_then(|x| x.as_dict().ok())
            .and_then(|x| objects::resolve_key(self.doc, x, name))
            .and_then(|x| x.as_stream().ok());
        let Some(stream) = stream else {
            return Ok(());
        };
        if objects::dict_name(&stream.dict, b"Subtype") != Some("Form") {
            return Ok(());
        }
        let matrix = stream
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|m| m.as_array().ok())
            .and_then(|m| Matrix::from_operands(m))
            .unwrap_or_default();
        let form_resources = match objects::resolve_key(self.doc, &stream.dict, b"Resources") {
            Some(Object::Dictionary(dict)) => dict.clone(),
            _ => resources.clone(),
        };
        let content = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        self.run(&content, &form_resources, matrix.then(&ctm), depth + 1)
    }

    fn show(&mut self, gs: &GraphicsState, tm: &mut Matrix, bytes: &[u8]) {
        let Some(font) = gs.font.clone() else {
            return;
        };
        let size_matrix = Matrix {
            a: gs.font_size * gs.scale,
            d: gs.font_size,
            f: gs.rise,
            ..Matrix::identity()
        };
        let start = size_matrix.then(tm).then(&gs.ctm);
        let size = start.c.hypot(start.d).abs();
        let origin = start.apply(Point::new(0.0, 0.0));

        let mut text = String::new();
        let mut char_extents = Vec::new();
        let mut x_min = origin.x;
        let mut x_max = origin.x;
        for code in font.decode(bytes) {
            let before = Matrix { f: gs.rise, ..Matrix::identity() }.then(tm).then(&gs.ctm);
            let x0 = before.apply(Point::new(0.0, 0.0)).x;

            let mut advance = code.width / 1000.0 * gs.font_size + gs.char_spacing;
            if code.is_space {
                advance += gs.word_spacing;
            }
            *tm = translate(advance * gs.scale, 0.0).then(tm);

            let after = Matrix { f: gs.rise, ..Matrix::identity() }.then(tm).then(&gs.ctm);
            let x1 = after.apply(Point::new(0.0, 0.0)).x;
            let (lo, hi) = (x0.min(x1), x0.max(x1));
            x_min = x_min.min(lo);
            x_max = x_max.max(hi);
            for _ in code.text.chars() {
                char_extents.push((lo, hi));
            }
            text.push_str(&code.text);
        }
        if text.is_empty() {
            return;
        }
        self.spans.push(TextSpan {
            text,
            bbox: Rect::new(x_min, origin.y - size * 0.2, x_max, origin.y + size * 0.8),
            origin,
            font: font.base_font.clone(),
            size,
            char_extents,
        });
    }
}

fn translate(tx: f32, ty: f32) -> Matrix {
    Matrix {
        e: tx,
        f: ty,
        ..Matrix::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};
    use pretty_assertions::assert_eq;

    fn page_with_content(content: &str) -> (LoDocument, ObjectId) {
        let mut doc = LoDocument::with_version("1.7");
        let pages_id = doc.new_object_id();
        let font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let form = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 100.into(), 100.into()],
                "Matrix" => vec![1.into(), 0.into(), 0.into(), 1.into(), 0.into(), 0.into()],
            },
            b"BT /F1 10 Tf 0 0 Td (inside form) Tj ET".to_vec(),
        ));
        let contents = doc.add_object(Stream::new(dictionary! {}, content.as_bytes().to_vec()));
        let page = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 300.into(), 300.into()],
            "Contents" => contents,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font },
                "XObject" => dictionary! { "Fm1" => form },
            },
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page.into()],
                "Count" => 1,
            }),
        );
        let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog);
        (doc, page)
    }

    #[test]
    fn test_lines_are_ordered_top_to_bottom() {
        let (doc, page) = page_with_content(
            "BT /F1 12 Tf 50 100 Td (second line) Tj ET \
             BT /F1 12 Tf 50 200 Td (first) Tj ( line) Tj ET",
        );
        assert_eq!(page_text(&doc, page).unwrap(), "first line\nsecond line");
    }

    #[test]
    fn test_spans_on_one_baseline_get_spaces() {
        let (doc, page) = page_with_content(
            "BT /F1 10 Tf 10 50 Td (left) Tj ET BT /F1 10 Tf 100 50 Td (right) Tj ET",
        );
        let lines = page_lines(&doc, page).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "left right");
        assert_eq!(lines[0].size, 10.0);
    }

    #[test]
    fn test_tj_array_and_leading() {
        let (doc, page) = page_with_content(
            "BT /F1 10 Tf 14 TL 20 200 Td [(Hel) -50 (lo)] TJ T* (next) Tj ET",
        );
        assert_eq!(page_text(&doc, page).unwrap(), "Hello\nnext");
    }

    #[test]
    fn test_transforms_position_spans() {
        let (doc, page) = page_with_content("q 2 0 0 2 10 10 cm BT /F1 10 Tf 5 5 Td (big) Tj ET Q");
        let spans = page_spans(&doc, page).unwrap();
        assert_eq!(spans[0].origin, Point::new(20.0, 20.0));
        assert_eq!(spans[0].size, 20.0);
        assert_eq!(spans[0].font, "Helvetica");
    }

    #[test]
    fn test_form_xobject_text_is_included() {
        let (doc, page) = page_with_content("q 1 0 0 1 0 100 cm /Fm1 Do Q");
        let spans = page_spans(&doc, page).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "inside form");
        assert_eq!(spans[0].origin.y, 100.0);
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let (doc, page) = page_with_content("BT /F1 10 Tf 10 50 Td (Alpha beta ALPHA) Tj ET");
        let hits = search_page(&doc, page, 3, "alpha").unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "Alpha");
        assert_eq!(hits[1].text, "ALPHA");
        assert_eq!(hits[0].page_index, 3);
        assert_eq!(hits[0].rect.x0, 10.0);
        assert!((hits[0].rect.x1 - 35.0).abs() < 1e-3);
        assert!(hits[1].rect.x0 > hits[0].rect.x1);
        assert!(search_page(&doc, page, 0, "").unwrap().is_empty());
    }
}
