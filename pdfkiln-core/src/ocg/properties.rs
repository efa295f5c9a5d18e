//! Locating the optional-content dictionaries
//!
//! Every piece of `/OCProperties` may be stored inline in its parent or as
//! an indirect object. A [`Slot`] remembers which, so an edited value is
//! written back to the place it was read from.

use crate::error::{PdfError, Result};
use crate::objects;
use lopdf::{Dictionary, Document as LoDocument, Object, ObjectId};

/// Address of a value: an indirect object plus a path of dictionary keys
/// through inline dictionaries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    object: ObjectId,
    path: Vec<Vec<u8>>,
}

impl Slot {
    pub fn object(id: ObjectId) -> Self {
        Self {
            object: id,
            path: Vec::new(),
        }
    }

    pub fn is_indirect(&self) -> bool {
        self.path.is_empty()
    }

    fn child(&self, key: &[u8]) -> Self {
        let mut path = self.path.clone();
        path.push(key.to_vec());
        Self {
            object: self.object,
            path,
        }
    }

    pub fn get<'a>(&self, doc: &'a LoDocument) -> Option<&'a Object> {
        let mut current = doc.get_object(self.object).ok()?;
        for key in &self.path {
            current = current.as_dict().ok()?.get(key).ok()?;
        }
        Some(current)
    }

    pub fn get_mut<'a>(&self, doc: &'a mut LoDocument) -> Option<&'a mut Object> {
        let mut current = doc.get_object_mut(self.object).ok()?;
        for key in &self.path {
            current = current.as_dict_mut().ok()?.get_mut(key).ok()?;
        }
        Some(current)
    }

    pub fn dict<'a>(&self, doc: &'a LoDocument) -> Option<&'a Dictionary> {
        self.get(doc)?.as_dict().ok()
    }

    pub fn dict_mut<'a>(&self, doc: &'a mut LoDocument) -> Option<&'a mut Dictionary> {
        self.get_mut(doc)?.as_dict_mut().ok()
    }

    /// Address of `key` inside this dictionary. A reference value moves to
    /// the referenced object; anything else stays inline. `None` when the
    /// key is absent.
    pub fn follow(&self, doc: &LoDocument, key: &[u8]) -> Option<Slot> {
        match self.dict(doc)?.get(key).ok()? {
            Object::Reference(id) => Some(Slot::object(*id)),
            _ => Some(self.child(key)),
        }
    }

    /// Items of the array at this slot; empty when it is missing or not an
    /// array
    pub fn read_array(&self, doc: &LoDocument) -> Vec<Object> {
        match self.get(doc) {
            Some(Object::Array(items)) => items.clone(),
            _ => Vec::new(),
        }
    }

    pub fn write_array(&self, doc: &mut LoDocument, items: Vec<Object>) -> Result<()> {
        let target = self.get_mut(doc).ok_or_else(|| {
            PdfError::InvalidStructure("optional content array vanished".to_string())
        })?;
        *target = Object::Array(items);
        Ok(())
    }
}

/// Where the optional-content structures of one document live
#[derive(Debug, Clone)]
pub struct OcLocation {
    pub properties: Slot,
    pub ocgs: Option<Slot>,
    /// Default configuration first, then any alternates from `/Configs`
    pub configs: Vec<Slot>,
}

impl OcLocation {
    pub fn default_config(&self) -> Option<&Slot> {
        self.configs.first()
    }
}

pub fn locate(doc: &LoDocument) -> Result<Option<OcLocation>> {
    let catalog = Slot::object(objects::catalog_id(doc)?);
    let Some(properties) = catalog.follow(doc, b"OCProperties") else {
        return Ok(None);
    };
    if properties.dict(doc).is_none() {
        return Ok(None);
    }

    let ocgs = properties.follow(doc, b"OCGs");
    let mut configs = Vec::new();
    if let Some(d) = properties.follow(doc, b"D") {
        if d.dict(doc).is_some() {
            configs.push(d);
        }
    }
    if let Some(alternates) = properties.follow(doc, b"Configs") {
        for item in alternates.read_array(doc) {
            if let Object::Reference(id) = item {
                let slot = Slot::object(id);
                if slot.dict(doc).is_some() {
                    configs.push(slot);
                }
            }
        }
    }

    Ok(Some(OcLocation {
        properties,
        ocgs,
        configs,
    }))
}

/// Locate the optional-content structures, creating an empty
/// `/OCProperties` with `/OCGs` and a default configuration when missing
pub fn ensure(doc: &mut LoDocument) -> Result<OcLocation> {
    if locate(doc)?.is_none() {
        let mut d = Dictionary::new();
        d.set("Order", Object::Array(Vec::new()));
        let mut properties = Dictionary::new();
        properties.set("OCGs", Object::Array(Vec::new()));
        properties.set("D", Object::Dictionary(d));
        objects::catalog_mut(doc)?.set("OCProperties", Object::Dictionary(properties));
    }

    let mut location = locate(doc)?.ok_or_else(|| {
        PdfError::InvalidStructure("unable to create /OCProperties".to_string())
    })?;

    if location.ocgs.is_none() {
        location
            .properties
            .dict_mut(doc)
            .ok_or_else(|| PdfError::InvalidStructure("/OCProperties".to_string()))?
            .set("OCGs", Object::Array(Vec::new()));
        location.ocgs = location.properties.follow(doc, b"OCGs");
    }
    if location.configs.is_empty() {
        let mut d = Dictionary::new();
        d.set("Order", Object::Array(Vec::new()));
        location
            .properties
            .dict_mut(doc)
            .ok_or_else(|| PdfError::InvalidStructure("/OCProperties".to_string()))?
            .set("D", Object::Dictionary(d));
        if let Some(d) = location.properties.follow(doc, b"D") {
            location.configs.insert(0, d);
        }
    }
    Ok(location)
}

/// Array `key` of a configuration dictionary, if present
pub fn config_array(doc: &LoDocument, config: &Slot, key: &[u8]) -> Option<Slot> {
    config.follow(doc, key)
}

/// Array `key` of a configuration dictionary, inserted inline when absent
pub fn ensure_config_array(doc: &mut LoDocument, config: &Slot, key: &[u8]) -> Result<Slot> {
    if let Some(slot) = config.follow(doc, key) {
        return Ok(slot);
    }
    config
        .dict_mut(doc)
        .ok_or_else(|| PdfError::InvalidStructure("optional content configuration".to_string()))?
        .set(key.to_vec(), Object::Array(Vec::new()));
    config
        .follow(doc, key)
        .ok_or_else(|| PdfError::InvalidStructure("optional content configuration".to_string()))
}

/// Membership helpers on reference arrays
pub fn contains_ref(items: &[Object], id: ObjectId) -> bool {
    items
        .iter()
        .any(|item| matches!(item, Object::Reference(r) if *r == id))
}

pub fn strip_ref(items: &mut Vec<Object>, id: ObjectId) -> bool {
    let before = items.len();
    items.retain(|item| !matches!(item, Object::Reference(r) if *r == id));
    items.len() != before
}
