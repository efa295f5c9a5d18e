//! Raw look at saved optional content structures through `lopdf`, without
//! going through the library under test

use anyhow::{anyhow, Context};
use lopdf::{Dictionary, Document, Object, ObjectId};

/// Every reference found in each optional content array, nested `/Order`
/// arrays flattened
#[derive(Debug, Default, Clone, PartialEq)]
pub struct OcArrays {
    pub ocgs: Vec<ObjectId>,
    pub on: Vec<ObjectId>,
    pub off: Vec<ObjectId>,
    pub locked: Vec<ObjectId>,
    pub order: Vec<ObjectId>,
    /// References in the root level of `/Order` only
    pub order_root: Vec<ObjectId>,
}

impl OcArrays {
    pub fn mentions(&self, xref: u32) -> bool {
        [
            &self.ocgs,
            &self.on,
            &self.off,
            &self.locked,
            &self.order,
        ]
        .iter()
        .any(|ids| ids.iter().any(|id| id.0 == xref))
    }
}

pub fn oc_arrays(pdf: &[u8]) -> anyhow::Result<OcArrays> {
    let doc = Document::load_mem(pdf)?;
    let catalog = doc.catalog()?;
    let Ok(properties) = catalog.get(b"OCProperties") else {
        return Ok(OcArrays::default());
    };
    let properties = dict(&doc, properties)?;
    let config = dict(&doc, properties.get(b"D").context("no /D")?)?;

    let order = array(&doc, config, b"Order");
    let mut flat = Vec::new();
    flatten(&doc, &order, &mut flat, 0);
    Ok(OcArrays {
        ocgs: refs(&array(&doc, properties, b"OCGs")),
        on: refs(&array(&doc, config, b"ON")),
        off: refs(&array(&doc, config, b"OFF")),
        locked: refs(&array(&doc, config, b"Locked")),
        order_root: order
            .iter()
            .filter_map(|item| match item {
                Object::Reference(id) if !is_array(&doc, *id) => Some(*id),
                _ => None,
            })
            .collect(),
        order: flat,
    })
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> anyhow::Result<&'a Object> {
    match object {
        Object::Reference(id) => Ok(doc.get_object(*id)?),
        other => Ok(other),
    }
}

fn dict<'a>(doc: &'a Document, object: &'a Object) -> anyhow::Result<&'a Dictionary> {
    resolve(doc, object)?
        .as_dict()
        .map_err(|_| anyhow!("expected a dictionary"))
}

fn array(doc: &Document, dict: &Dictionary, key: &[u8]) -> Vec<Object> {
    dict.get(key)
        .ok()
        .and_then(|object| resolve(doc, object).ok())
        .and_then(|object| object.as_array().ok())
        .cloned()
        .unwrap_or_default()
}

fn is_array(doc: &Document, id: ObjectId) -> bool {
    matches!(doc.get_object(id), Ok(Object::Array(_)))
}

fn refs(items: &[Object]) -> Vec<ObjectId> {
    items
        .iter()
        .filter_map(|item| item.as_reference().ok())
        .collect()
}

fn flatten(doc: &Document, items: &[Object], out: &mut Vec<ObjectId>, nesting: usize) {
    if nesting > 64 {
        return;
    }
    for item in items {
        match item {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(Object::Array(nested)) => flatten(doc, nested, out, nesting + 1),
                _ => out.push(*id),
            },
            Object::Array(nested) => flatten(doc, nested, out, nesting + 1),
            _ => {}
        }
    }
}
