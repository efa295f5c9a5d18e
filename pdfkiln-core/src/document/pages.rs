//! Page-level structure edits
//!
//! Every edit computes the new page order and rebuilds the page tree as a
//! single flat `/Pages` node. Inherited attributes are copied onto each page
//! first, so no page loses its media box or resources when its original
//! parent disappears.

use super::Document;
use crate::error::{PdfError, Result};
use crate::geometry::Rect;
use crate::objects;
use crate::operations::PageRange;
use lopdf::{dictionary, Document as LoDocument, Object, ObjectId, Stream};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Options for [`Document::insert_pdf`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsertOptions {
    /// Pages of the source document to copy
    pub pages: PageRange,
    /// Insert before this page index; append when `None`
    pub start_at: Option<usize>,
}

impl Default for InsertOptions {
    fn default() -> Self {
        Self {
            pages: PageRange::All,
            start_at: None,
        }
    }
}

impl Document {
    /// Add a blank page of `width` x `height` points. `at` is the index the
    /// new page will have; `None` appends.
    pub fn new_page(&mut self, at: Option<usize>, width: f32, height: f32) -> Result<usize> {
        if width <= 0.0 || height <= 0.0 {
            return Err(PdfError::InvalidOptions(format!(
                "page size {width}x{height} must be positive"
            )));
        }
        let mut order = self.page_ids()?;
        let at = at.unwrap_or(order.len());
        if at > order.len() {
            return Err(PdfError::PageIndexOutOfBounds {
                index: at,
                count: order.len(),
            });
        }

        let doc = self.lo_mut()?;
        let content = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
        let page = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => Rect::from_size(width, height).to_object(),
            "Resources" => dictionary! {},
            "Contents" => content,
        });
        order.insert(at, page);
        rebuild_page_tree(doc, &order)?;
        Ok(at)
    }

    pub fn delete_page(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        let mut order = self.page_ids()?;
        let removed = order.remove(index);
        let doc = self.lo_mut()?;
        rebuild_page_tree(doc, &order)?;
        doc.objects.remove(&removed);
        debug!(document = self.id, index, "deleted page");
        Ok(())
    }

    /// Delete several pages. Indices refer to the document before the call;
    /// they are validated up front and removed from the highest down.
    pub fn delete_pages(&mut self, indices: &[usize]) -> Result<()> {
        let count = self.page_count()?;
        let unique: BTreeSet<usize> = indices.iter().copied().collect();
        if let Some(&index) = unique.iter().find(|&&i| i >= count) {
            return Err(PdfError::PageIndexOutOfBounds { index, count });
        }
        for index in unique.into_iter().rev() {
            self.delete_page(index)?;
        }
        Ok(())
    }

    /// Move page `from` so that it ends up at index `to`
    pub fn move_page(&mut self, from: usize, to: usize) -> Result<()> {
        self.check_index(from)?;
        self.check_index(to)?;
        let mut order = self.page_ids()?;
        let page = order.remove(from);
        order.insert(to, page);
        rebuild_page_tree(self.lo_mut()?, &order)
    }

    /// Copy page `from` and insert the copy so it gets index `to`
    pub fn duplicate_page(&mut self, from: usize, to: Option<usize>) -> Result<usize> {
        self.check_index(from)?;
        let mut order = self.page_ids()?;
        let to = to.unwrap_or(order.len());
        if to > order.len() {
            return Err(PdfError::PageIndexOutOfBounds {
                index: to,
                count: order.len(),
            });
        }
        let doc = self.lo_mut()?;
        let copy = copy_page(doc, order[from])?;
        order.insert(to, copy);
        rebuild_page_tree(doc, &order)?;
        Ok(to)
    }

    /// Keep only the listed pages, in the listed order. A page listed twice
    /// is duplicated.
    pub fn select(&mut self, indices: &[usize]) -> Result<()> {
        if indices.is_empty() {
            return Err(PdfError::InvalidPageRange("empty page selection".to_string()));
        }
        let count = self.page_count()?;
        if let Some(&index) = indices.iter().find(|&&i| i >= count) {
            return Err(PdfError::PageIndexOutOfBounds { index, count });
        }
        let current = self.page_ids()?;
        let doc = self.lo_mut()?;

        let mut used = BTreeSet::new();
        let mut order = Vec::with_capacity(indices.len());
        for &index in indices {
            let id = current[index];
            if used.insert(id) {
                order.push(id);
            } else {
                order.push(copy_page(doc, id)?);
            }
        }
        rebuild_page_tree(doc, &order)?;
        for id in current.into_iter().filter(|id| !used.contains(id)) {
            doc.objects.remove(&id);
        }
        Ok(())
    }

    /// Copy pages of `other` into this document
    pub fn insert_pdf(&mut self, other: &Document, options: &InsertOptions) -> Result<usize> {
        let source_count = other.page_count()?;
        let indices = options.pages.indices(source_count)?;
        let mut order = self.page_ids()?;
        let at = options.start_at.unwrap_or(order.len());
        if at > order.len() {
            return Err(PdfError::PageIndexOutOfBounds {
                index: at,
                count: order.len(),
            });
        }

        let mut source = other.lo()?.clone();
        let doc = self.lo_mut()?;
        source.renumber_objects_with(doc.max_id + 1);
        let source_pages: Vec<ObjectId> = source.get_pages().into_values().collect();
        doc.max_id = doc.max_id.max(source.max_id);
        doc.objects.extend(std::mem::take(&mut source.objects));

        let inserted: Vec<ObjectId> = indices.iter().map(|&i| source_pages[i]).collect();
        for (offset, id) in inserted.iter().enumerate() {
            order.insert(at + offset, *id);
        }
        rebuild_page_tree(doc, &order)?;
        debug!(document = self.id, pages = inserted.len(), at, "inserted pages");
        Ok(inserted.len())
    }
}

/// Make `order` the page list of the document's root `/Pages` node
pub(crate) fn rebuild_page_tree(doc: &mut LoDocument, order: &[ObjectId]) -> Result<()> {
    let root = objects::catalog(doc)?
        .get(b"Pages")
        .and_then(Object::as_reference)
        .map_err(|_| PdfError::InvalidStructure("catalog has no /Pages reference".to_string()))?;

    for &page in order {
        objects::materialize_inherited(doc, page)?;
    }
    for &page in order {
        objects::page_dict_mut(doc, page)?.set("Parent", Object::Reference(root));
    }

    let pages = doc.get_object_mut(root)?.as_dict_mut()?;
    pages.set(
        "Kids",
        Object::Array(order.iter().map(|id| Object::Reference(*id)).collect()),
    );
    pages.set("Count", Object::Integer(order.len() as i64));
    pages.remove(b"Parent");
    Ok(())
}

/// Shallow copy of a page; annotations are copied too so each one keeps a
/// single owning page
fn copy_page(doc: &mut LoDocument, page: ObjectId) -> Result<ObjectId> {
    objects::materialize_inherited(doc, page)?;
    let mut dict = objects::page_dict(doc, page)?.clone();
    let copy = doc.new_object_id();

    if let Ok(annots) = dict.get(b"Annots") {
        let annots = objects::resolve(doc, annots)?.as_array()?.clone();
        let mut copied = Vec::with_capacity(annots.len());
        for annot in annots {
            let annot = match annot {
                Object::Reference(id) => match doc.get_object(id)?.as_dict() {
                    Ok(annot_dict) => {
                        let mut annot_dict = annot_dict.clone();
                        annot_dict.set("P", Object::Reference(copy));
                        Object::Reference(doc.add_object(annot_dict))
                    }
                    Err(_) => Object::Reference(id),
                },
                other => other,
            };
            copied.push(annot);
        }
        dict.set("Annots", Object::Array(copied));
    }

    doc.objects.insert(copy, Object::Dictionary(dict));
    Ok(copy)
}
