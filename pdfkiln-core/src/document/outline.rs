//! Bookmarks (`/Outlines`) as a flat, level-annotated table of contents

use super::Document;
use crate::error::{PdfError, Result};
use crate::objects;
use lopdf::{dictionary, Document as LoDocument, Object, ObjectId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    /// Nesting level, starting at 1
    pub level: usize,
    pub title: String,
    /// Zero-based target page; `None` when the destination cannot be
    /// resolved to a page of this document
    pub page: Option<usize>,
}

impl TocEntry {
    pub fn new(level: usize, title: impl Into<String>, page: Option<usize>) -> Self {
        Self {
            level,
            title: title.into(),
            page,
        }
    }
}

impl Document {
    /// Outline entries in reading order
    pub fn toc(&self) -> Result<Vec<TocEntry>> {
        let doc = self.lo()?;
        let pages: HashMap<ObjectId, usize> = self
            .page_ids()?
            .into_iter()
            .enumerate()
            .map(|(index, id)| (id, index))
            .collect();

        let mut entries = Vec::new();
        let Some(root) = objects::resolve_key(doc, objects::catalog(doc)?, b"Outlines") else {
            return Ok(entries);
        };
        if let Ok(root) = root.as_dict() {
            let mut seen = HashSet::new();
            if let Ok(first) = root.get(b"First").and_then(Object::as_reference) {
                collect(doc, first, 1, &pages, &mut seen, &mut entries);
            }
        }
        Ok(entries)
    }

    /// Replace the outline. Levels start at 1 and may grow by at most one
    /// from an entry to the next; an empty list removes the outline.
    pub fn set_toc(&mut self, entries: &[TocEntry]) -> Result<()> {
        validate(entries, self.page_count()?)?;
        let page_ids = self.page_ids()?;
        let doc = self.lo_mut()?;

        if entries.is_empty() {
            objects::catalog_mut(doc)?.remove(b"Outlines");
            return Ok(());
        }

        let root = doc.new_object_id();
        let ids: Vec<ObjectId> = entries.iter().map(|_| doc.new_object_id()).collect();

        // parents[i] is the outline node entry i hangs from
        let mut stack: Vec<ObjectId> = vec![root];
        let mut children: HashMap<ObjectId, Vec<usize>> = HashMap::new();
        let mut parents = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            stack.truncate(entry.level);
            let parent = *stack.last().unwrap_or(&root);
            parents.push(parent);
            children.entry(parent).or_default().push(i);
            stack.push(ids[i]);
        }

        for (i, entry) in entries.iter().enumerate() {
            let mut item = dictionary! {
                "Title" => objects::text_string(&entry.title),
                "Parent" => parents[i],
            };
            if let Some(page) = entry.page {
                item.set(
                    "Dest",
                    vec![Object::Reference(page_ids[page]), Object::Name(b"Fit".to_vec())],
                );
            }
            let siblings = &children[&parents[i]];
            let position = siblings.iter().position(|&s| s == i).unwrap_or(0);
            if position > 0 {
                item.set("Prev", ids[siblings[position - 1]]);
            }
            if let Some(&next) = siblings.get(position + 1) {
                item.set("Next", ids[next]);
            }
            if let Some(kids) = children.get(&ids[i]) {
                item.set("First", ids[kids[0]]);
                item.set("Last", ids[kids[kids.len() - 1]]);
                item.set("Count", kids.len() as i64);
            }
            doc.objects.insert(ids[i], Object::Dictionary(item));
        }

        let top = &children[&root];
        doc.objects.insert(
            root,
            Object::Dictionary(dictionary! {
                "Type" => "Outlines",
                "First" => ids[top[0]],
                "Last" => ids[top[top.len() - 1]],
                "Count" => entries.len() as i64,
            }),
        );
        objects::catalog_mut(doc)?.set("Outlines", root);
        Ok(())
    }
}

fn validate(entries: &[TocEntry], page_count: usize) -> Result<()> {
    let mut previous = 0;
    for (i, entry) in entries.iter().enumerate() {
        if entry.level == 0 || entry.level > previous + 1 {
            return Err(PdfError::InvalidOptions(format!(
                "toc entry {i} has level {} after level {previous}",
                entry.level
            )));
        }
        if let Some(page) = entry.page {
            if page >= page_count {
                return Err(PdfError::PageIndexOutOfBounds {
                    index: page,
                    count: page_count,
                });
            }
        }
        previous = entry.level;
    }
    Ok(())
}

fn collect(
    doc: &LoDocument,
    first: ObjectId,
    level: usize,
    pages: &HashMap<ObjectId, usize>,
    seen: &mut HashSet<ObjectId>,
    out: &mut Vec<TocEntry>,
) {
    let mut current = Some(first);
    while let Some(id) = current {
        if !seen.insert(id) {
            break;
        }
        let Ok(item) = doc.get_dictionary(id) else {
            break;
        };
        out.push(TocEntry {
            level,
            title: objects::dict_text(doc, item, b"Title").unwrap_or_default(),
            page: destination_page(doc, item, pages),
        });
        if let Ok(child) = item.get(b"First").and_then(Object::as_reference) {
            collect(doc, child, level + 1, pages, seen, out);
        }
        current = item.get(b"Next").and_then(Object::as_reference).ok();
    }
}

fn destination_page(
    doc: &LoDocument,
    item: &lopdf::Dictionary,
    pages: &HashMap<ObjectId, usize>,
) -> Option<usize> {
    let dest = match objects::resolve_key(doc, item, b"Dest") {
        Some(dest) => dest.clone(),
        None => {
            let action = objects::resolve_key(doc, item, b"A")?.as_dict().ok()?;
            if objects::dict_name(action, b"S") != Some("GoTo") {
                return None;
            }
            objects::resolve_key(doc, action, b"D")?.clone()
        }
    };
    let dest = match dest {
        Object::Name(name) | Object::String(name, _) => named_destination(doc, &name)?,
        other => other,
    };
    let target = match dest {
        Object::Array(items) => items.first().cloned(),
        Object::Dictionary(dict) => dict.get(b"D").ok().and_then(|d| d.as_array().ok()?.first().cloned()),
        _ => None,
    }?;
    match target {
        Object::Reference(id) => pages.get(&id).copied(),
        // Remote-style integer page numbers
        Object::Integer(n) if n >= 0 => Some(n as usize).filter(|&n| n < pages.len()),
        _ => None,
    }
}

/// Look up a named destination in the catalog `/Dests` dictionary or the
/// `/Names /Dests` name tree
fn named_destination(doc: &LoDocument, name: &[u8]) -> Option<Object> {
    let catalog = objects::catalog(doc).ok()?;
    if let Some(Object::Dictionary(dests)) = objects::resolve_key(doc, catalog, b"Dests") {
        if let Some(dest) = objects::resolve_key(doc, dests, name) {
            return Some(dest.clone());
        }
    }
    let names = objects::resolve_key(doc, catalog, b"Names")?.as_dict().ok()?;
    let tree = objects::resolve_key(doc, names, b"Dests")?.as_dict().ok()?;
    search_name_tree(doc, tree, name, 0)
}

fn search_name_tree(
    doc: &LoDocument,
    node: &lopdf::Dictionary,
    name: &[u8],
    depth: usize,
) -> Option<Object> {
    if depth > 32 {
        return None;
    }
    if let Some(Object::Array(pairs)) = objects::resolve_key(doc, node, b"Names") {
        for pair in pairs.chunks(2) {
            if let [Object::String(key, _), value] = pair {
                if key.as_slice() == name {
                    return objects::resolve(doc, value).ok().cloned();
                }
            }
        }
    }
    if let Some(Object::Array(kids)) = objects::resolve_key(doc, node, b"Kids") {
        for kid in kids {
            let kid = objects::resolve(doc, kid).ok()?.as_dict().ok()?;
            if let Some(found) = search_name_tree(doc, kid, name, depth + 1) {
                return Some(found);
            }
        }
    }
    None
}
