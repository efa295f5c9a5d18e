use super::{Color, Page};
use crate::error::{PdfError, Result};
use crate::geometry::{Point, Rect};
use crate::objects;
use lopdf::{dictionary, Dictionary, Document as LoDocument, Object, ObjectId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnnotationKind {
    Text,
    Link,
    FreeText,
    Highlight,
    Underline,
    StrikeOut,
    Square,
    Circle,
    Ink,
    Widget,
    Other(String),
}

impl AnnotationKind {
    fn from_subtype(subtype: &str) -> Self {
        match subtype {
            "Text" => AnnotationKind::Text,
            "Link" => AnnotationKind::Link,
            "FreeText" => AnnotationKind::FreeText,
            "Highlight" => AnnotationKind::Highlight,
            "Underline" => AnnotationKind::Underline,
            "StrikeOut" => AnnotationKind::StrikeOut,
            "Square" => AnnotationKind::Square,
            "Circle" => AnnotationKind::Circle,
            "Ink" => AnnotationKind::Ink,
            "Widget" => AnnotationKind::Widget,
            other => AnnotationKind::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Position in the page's `/Annots` array
    pub index: usize,
    pub kind: AnnotationKind,
    pub rect: Rect,
    pub contents: Option<String>,
    /// Target of a link annotation with a URI action
    pub uri: Option<String>,
    /// Object number, `None` for annotations stored inline
    pub xref: Option<u32>,
}

impl<'a> Page<'a> {
    pub fn annotations(&self) -> Result<Vec<Annotation>> {
        let doc = self.lo()?;
        let mut annotations = Vec::new();
        for (index, entry) in annots(doc, self.id)?.iter().enumerate() {
            let Some(dict) = objects::resolve(doc, entry).ok().and_then(|o| o.as_dict().ok()) else {
                continue;
            };
            let uri = objects::resolve_key(doc, dict, b"A")
                .and_then(|a| a.as_dict().ok())
                .filter(|a| objects::dict_name(a, b"S") == Some("URI"))
                .and_then(|a| objects::dict_text(doc, a, b"URI"));
            annotations.push(Annotation {
                index,
                kind: AnnotationKind::from_subtype(objects::dict_name(dict, b"Subtype").unwrap_or("")),
                rect: objects::resolve_key(doc, dict, b"Rect")
                    .and_then(|r| r.as_array().ok())
                    .and_then(|r| Rect::from_objects(r))
                    .unwrap_or_default(),
                contents: objects::dict_text(doc, dict, b"Contents"),
                uri,
                xref: entry.as_reference().ok().map(|id| id.0),
            });
        }
        Ok(annotations)
    }

    /// Sticky note anchored at `point`; returns the annotation index
    pub fn add_text_annotation(&mut self, point: Point, contents: &str) -> Result<usize> {
        let annot = dictionary! {
            "Type" => "Annot",
            "Subtype" => "Text",
            "Rect" => Rect::new(point.x, point.y, point.x + 20.0, point.y + 20.0).to_object(),
            "Contents" => objects::text_string(contents),
            "Name" => "Note",
            "M" => Object::string_literal(objects::now_pdf_date()),
        };
        self.push_annotation(annot)
    }

    /// Highlight covering `rects`, for example the rectangles of search hits
    pub fn add_highlight(&mut self, rects: &[Rect], color: Color) -> Result<usize> {
        let Some(first) = rects.first() else {
            return Err(PdfError::InvalidOptions(
                "highlight needs at least one rectangle".to_string(),
            ));
        };
        let bounds = rects.iter().fold(*first, |acc, r| acc.union(r));
        let quads: Vec<Object> = rects.iter().flat_map(|r| r.quad_points()).collect();
        let annot = dictionary! {
            "Type" => "Annot",
            "Subtype" => "Highlight",
            "Rect" => bounds.to_object(),
            "QuadPoints" => quads,
            "C" => color.to_object(),
            "M" => Object::string_literal(objects::now_pdf_date()),
        };
        self.push_annotation(annot)
    }

    /// Clickable area opening `uri`
    pub fn add_link(&mut self, rect: Rect, uri: &str) -> Result<usize> {
        let annot = dictionary! {
            "Type" => "Annot",
            "Subtype" => "Link",
            "Rect" => rect.to_object(),
            "Border" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(0)],
            "A" => dictionary! {
                "Type" => "Action",
                "S" => "URI",
                "URI" => Object::string_literal(uri),
            },
        };
        self.push_annotation(annot)
    }

    pub fn delete_annotation(&mut self, index: usize) -> Result<()> {
        let id = self.id;
        let doc = self.lo_mut()?;
        let mut entries = annots(doc, id)?;
        if index >= entries.len() {
            return Err(PdfError::InvalidOptions(format!(
                "annotation {index} out of range ({} annotations)",
                entries.len()
            )));
        }
        let removed = entries.remove(index);
        write_annots(doc, id, entries)?;
        if let Object::Reference(annot) = removed {
            // Keep the object if the page lists it a second time
            let still_used = annots(doc, id)?.iter().any(|a| a.as_reference().ok() == Some(annot));
            if !still_used {
                doc.objects.remove(&annot);
            }
        }
        Ok(())
    }

    fn push_annotation(&mut self, mut annot: Dictionary) -> Result<usize> {
        let id = self.id;
        let doc = self.lo_mut()?;
        annot.set("P", Object::Reference(id));
        let annot_id = doc.add_object(annot);
        let mut entries = annots(doc, id)?;
        entries.push(Object::Reference(annot_id));
        let index = entries.len() - 1;
        write_annots(doc, id, entries)?;
        Ok(index)
    }
}

fn annots(doc: &LoDocument, page: ObjectId) -> Result<Vec<Object>> {
    let dict = objects::page_dict(doc, page)?;
    Ok(match objects::resolve_key(doc, dict, b"Annots") {
        Some(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    })
}

/// Store the annotation list inline on the page
fn write_annots(doc: &mut LoDocument, page: ObjectId, entries: Vec<Object>) -> Result<()> {
    let dict = objects::page_dict_mut(doc, page)?;
    if entries.is_empty() {
        dict.remove(b"Annots");
    } else {
        dict.set("Annots", Object::Array(entries));
    }
    Ok(())
}
