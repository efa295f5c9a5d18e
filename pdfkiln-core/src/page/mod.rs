//! Page handle
//!
//! A [`Page`] mutably borrows its [`Document`], so page edits are ordered
//! with every other document edit by the borrow checker.

mod annotations;
mod drawings;
mod images;
mod resources;
mod style;

pub use annotations::{Annotation, AnnotationKind};
pub use drawings::{Drawing, PathItem};
pub use images::{ExtractedImage, ImageInfo};
pub use style::{Color, StandardFont, TextStyle};

use crate::document::Document;
use crate::error::{PdfError, Result};
use crate::geometry::{Point, Rect};
use crate::objects;
use crate::render::{RenderOptions, RenderedPage};
use crate::text::{self, SearchHit, TextLine};
use lopdf::{dictionary, Document as LoDocument, Object, ObjectId};
use resources::{add_resource, append_content, literal};

pub struct Page<'a> {
    doc: &'a mut Document,
    index: usize,
    id: ObjectId,
}

impl<'a> Page<'a> {
    pub(crate) fn new(doc: &'a mut Document, index: usize, id: ObjectId) -> Self {
        Self { doc, index, id }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Object number of the page dictionary
    pub fn xref(&self) -> u32 {
        self.id.0
    }

    fn lo(&self) -> Result<&LoDocument> {
        self.doc.lo()
    }

    fn lo_mut(&mut self) -> Result<&mut LoDocument> {
        self.doc.lo_mut()
    }

    fn inherited_rect(&self, key: &[u8]) -> Result<Option<Rect>> {
        let value = objects::inherited_attribute(self.lo()?, self.id, key)?;
        Ok(value.and_then(|v| v.as_array().ok().and_then(|a| Rect::from_objects(a))))
    }

    /// `/MediaBox`, US Letter when the page tree has none
    pub fn media_box(&self) -> Result<Rect> {
        Ok(self.inherited_rect(b"MediaBox")?.unwrap_or_else(Rect::letter))
    }

    /// `/CropBox`, defaulting to the media box
    pub fn crop_box(&self) -> Result<Rect> {
        match self.inherited_rect(b"CropBox")? {
            Some(crop) => Ok(crop),
            None => self.media_box(),
        }
    }

    /// Clockwise rotation in degrees, normalized to 0, 90, 180 or 270
    pub fn rotation(&self) -> Result<i64> {
        let rotate = objects::inherited_attribute(self.lo()?, self.id, b"Rotate")?
            .and_then(|r| r.as_i64().ok())
            .unwrap_or(0);
        Ok(rotate.rem_euclid(360))
    }

    pub fn set_rotation(&mut self, degrees: i64) -> Result<()> {
        if degrees % 90 != 0 {
            return Err(PdfError::InvalidOptions(format!(
                "rotation {degrees} is not a multiple of 90"
            )));
        }
        let id = self.id;
        objects::page_dict_mut(self.lo_mut()?, id)?.set("Rotate", degrees.rem_euclid(360));
        Ok(())
    }

    pub fn text(&self) -> Result<String> {
        text::page_text(self.lo()?, self.id)
    }

    /// Text lines with their positions
    pub fn lines(&self) -> Result<Vec<TextLine>> {
        text::page_lines(self.lo()?, self.id)
    }

    pub fn search(&self, needle: &str) -> Result<Vec<SearchHit>> {
        text::search_page(self.lo()?, self.id, self.index, needle)
    }

    /// Write `text` starting with its first baseline at `origin`. Line
    /// breaks in `text` start new lines. Characters outside WinAnsi become
    /// `?`.
    pub fn insert_text(&mut self, origin: Point, text: &str, style: &TextStyle) -> Result<()> {
        if style.size <= 0.0 {
            return Err(PdfError::InvalidOptions(format!(
                "font size {} must be positive",
                style.size
            )));
        }
        let id = self.id;
        let doc = self.lo_mut()?;
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => style.font.base_font(),
            "Encoding" => "WinAnsiEncoding",
        };
        let font_ref = doc.add_object(font);
        let name = add_resource(doc, id, "Font", "F", Object::Reference(font_ref))?;

        let mut ops = format!(
            "BT\n{}\n/{name} {} Tf\n{} TL\n{} {} Td\n",
            style.color.operator(false),
            style.size,
            style.size * style.line_height,
            origin.x,
            origin.y
        );
        for (i, line) in text.lines().enumerate() {
            if i > 0 {
                ops.push_str("T*\n");
            }
            ops.push_str(&literal(&objects::win_ansi_bytes(line)));
            ops.push_str(" Tj\n");
        }
        ops.push_str("ET");
        append_content(doc, id, ops.into_bytes())
    }

    /// Outline and optionally fill a rectangle
    pub fn draw_rect(
        &mut self,
        rect: Rect,
        stroke: Option<Color>,
        fill: Option<Color>,
        width: f32,
    ) -> Result<()> {
        let paint = match (stroke.is_some(), fill.is_some()) {
            (true, true) => "B",
            (true, false) => "S",
            (false, true) => "f",
            (false, false) => return Ok(()),
        };
        let mut ops = String::from("q\n");
        if let Some(color) = stroke {
            ops.push_str(&format!("{}\n{width} w\n", color.operator(true)));
        }
        if let Some(color) = fill {
            ops.push_str(&format!("{}\n", color.operator(false)));
        }
        ops.push_str(&format!(
            "{} {} {} {} re {paint}\nQ",
            rect.x0,
            rect.y0,
            rect.width(),
            rect.height()
        ));
        let id = self.id;
        append_content(self.lo_mut()?, id, ops.into_bytes())
    }

    pub fn render(&self, options: &RenderOptions) -> Result<RenderedPage> {
        self.doc.render_page(self.index, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_boxes_and_rotation() {
        let session = Session::default();
        let mut doc = session.create().unwrap();
        doc.new_page(None, 200.0, 300.0).unwrap();
        let mut page = doc.page(0).unwrap();
        assert_eq!(page.media_box().unwrap(), Rect::from_size(200.0, 300.0));
        assert_eq!(page.crop_box().unwrap(), page.media_box().unwrap());
        assert_eq!(page.rotation().unwrap(), 0);

        page.set_rotation(-90).unwrap();
        assert_eq!(page.rotation().unwrap(), 270);
        assert!(matches!(page.set_rotation(45), Err(PdfError::InvalidOptions(_))));
    }

    #[test]
    fn test_insert_text_is_extractable() {
        let session = Session::default();
        let mut doc = session.create().unwrap();
        doc.new_page(None, 300.0, 300.0).unwrap();
        {
            let mut page = doc.page(0).unwrap();
            page.insert_text(
                Point::new(20.0, 250.0),
                "First (line)\nCafé",
                &TextStyle::default().with_size(14.0),
            )
            .unwrap();
            page.insert_text(Point::new(20.0, 100.0), "Lower", &TextStyle::default())
                .unwrap();
        }

        let mut reopened = session.open(doc.to_bytes().unwrap()).unwrap();
        assert_eq!(reopened.text().unwrap(), "First (line)\nCafé\nLower");
        let hits = reopened.page(0).unwrap().search("café").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].rect.x0, 20.0);
    }

    #[test]
    fn test_draw_rect_shows_up_as_drawing() {
        let session = Session::default();
        let mut doc = session.create().unwrap();
        doc.new_page(None, 100.0, 100.0).unwrap();
        let mut page = doc.page(0).unwrap();
        page.draw_rect(
            Rect::new(10.0, 10.0, 50.0, 40.0),
            Some(Color::rgb(1.0, 0.0, 0.0)),
            None,
            2.0,
        )
        .unwrap();
        let drawings = page.drawings().unwrap();
        assert_eq!(drawings.len(), 1);
        assert_eq!(drawings[0].stroke, Some(Color::Rgb(1.0, 0.0, 0.0)));
        assert_eq!(drawings[0].width, 2.0);
        assert_eq!(drawings[0].rect, Rect::new(10.0, 10.0, 50.0, 40.0));
    }

    #[test]
    fn test_invalid_font_size() {
        let session = Session::default();
        let mut doc = session.create().unwrap();
        doc.new_page(None, 100.0, 100.0).unwrap();
        let result = doc.page(0).unwrap().insert_text(
            Point::new(0.0, 0.0),
            "x",
            &TextStyle::default().with_size(0.0),
        );
        assert!(matches!(result, Err(PdfError::InvalidOptions(_))));
    }
}
