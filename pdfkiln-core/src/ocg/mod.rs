//! Optional content groups (layers) and their display hierarchy
//!
//! Layers are listed from `/OCProperties /OCGs`. Visibility and locking come
//! from the default configuration's `/ON`, `/OFF` and `/Locked` arrays, and
//! nesting from its `/Order` tree (see [`OrderTree`]).

mod order;
mod properties;

pub use order::{Node, NodeId, NodeKind, OrderTree, Position};
pub use properties::{locate, OcLocation, Slot};

use crate::error::{PdfError, Result};
use crate::objects;
use lopdf::{Dictionary, Document as LoDocument, Object, ObjectId};
use properties::{config_array, contains_ref, ensure, ensure_config_array, strip_ref};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

/// One optional content group as shown in a layer panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    /// Object number of the group dictionary
    pub xref: u32,
    pub name: String,
    pub on: bool,
    pub locked: bool,
    pub depth: usize,
    pub parent: Option<u32>,
    /// Depth-first rank in `/Order`; 0 for groups not listed there
    pub display_order: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddLayerOptions {
    /// Object number of the layer to nest under
    pub parent: Option<u32>,
    pub on: bool,
}

impl Default for AddLayerOptions {
    fn default() -> Self {
        Self {
            parent: None,
            on: true,
        }
    }
}

impl AddLayerOptions {
    pub fn under(parent: u32) -> Self {
        Self {
            parent: Some(parent),
            ..Default::default()
        }
    }

    pub fn hidden(mut self) -> Self {
        self.on = false;
        self
    }
}

/// Where an added layer ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Placement {
    Root,
    Nested { parent: u32 },
    /// The requested parent was not listed in `/Order`; the layer stayed at
    /// the root
    ParentNotFound { parent: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddedLayer {
    pub xref: u32,
    pub placement: Placement,
}

impl AddedLayer {
    pub fn is_nested(&self) -> bool {
        matches!(self.placement, Placement::Nested { .. })
    }
}

/// All layers sorted by display order. Layers missing from `/Order` come
/// first with depth 0.
pub fn list_layers(doc: &LoDocument) -> Result<Vec<Layer>> {
    let Some(location) = locate(doc)? else {
        return Ok(Vec::new());
    };
    let groups = group_ids(doc, &location);

    let (on, off, locked, base_on) = match location.default_config() {
        Some(config) => (
            read(doc, config, b"ON"),
            read(doc, config, b"OFF"),
            read(doc, config, b"Locked"),
            config
                .dict(doc)
                .and_then(|d| objects::dict_name(d, b"BaseState"))
                .map_or(true, |state| state != "OFF"),
        ),
        None => (Vec::new(), Vec::new(), Vec::new(), true),
    };

    let positions = match location.default_config() {
        Some(config) => {
            let order = read(doc, config, b"Order");
            let known: HashSet<ObjectId> = groups.iter().copied().collect();
            OrderTree::parse(doc, &order).positions_among(&known)
        }
        None => Default::default(),
    };

    let mut layers: Vec<Layer> = groups
        .iter()
        .map(|&id| {
            let name = doc
                .get_object(id)
                .ok()
                .and_then(|o| o.as_dict().ok())
                .and_then(|dict| objects::dict_text(doc, dict, b"Name"))
                .unwrap_or_default();
            let visible = if contains_ref(&on, id) {
                true
            } else if contains_ref(&off, id) {
                false
            } else {
                base_on
            };
            let position = positions.get(&id).copied().unwrap_or_default();
            Layer {
                xref: id.0,
                name,
                on: visible,
                locked: contains_ref(&locked, id),
                depth: position.depth,
                parent: position.parent.map(|p| p.0),
                display_order: position.display_order,
            }
        })
        .collect();

    layers.sort_by_key(|layer| layer.display_order);
    Ok(layers)
}

/// Create a layer, optionally nested under an existing one
pub fn add_layer(doc: &mut LoDocument, name: &str, options: &AddLayerOptions) -> Result<AddedLayer> {
    let location = ensure(doc)?;
    let config = location
        .default_config()
        .cloned()
        .ok_or_else(|| PdfError::InvalidStructure("no default configuration".to_string()))?;
    let ocgs = location
        .ocgs
        .clone()
        .ok_or_else(|| PdfError::InvalidStructure("no /OCGs array".to_string()))?;

    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"OCG".to_vec()));
    dict.set("Name", objects::text_string(name));
    let id = doc.add_object(Object::Dictionary(dict));

    let mut groups = ocgs.read_array(doc);
    groups.push(Object::Reference(id));
    ocgs.write_array(doc, groups)?;

    let order_slot = ensure_config_array(doc, &config, b"Order")?;
    let mut tree = OrderTree::parse(doc, &order_slot.read_array(doc));
    tree.push_root_layer(id);

    let visibility = if options.on { &b"ON"[..] } else { &b"OFF"[..] };
    let slot = ensure_config_array(doc, &config, visibility)?;
    let mut members = slot.read_array(doc);
    members.push(Object::Reference(id));
    slot.write_array(doc, members)?;

    let placement = match options.parent {
        None => Placement::Root,
        Some(parent) => {
            let parent_id = group_ids(doc, &location)
                .into_iter()
                .find(|g| g.0 == parent);
            match parent_id.and_then(|p| tree.find_first(p)) {
                Some(node) => {
                    tree.remove_from_root(id);
                    tree.attach_layer(node, id);
                    Placement::Nested { parent }
                }
                None => {
                    warn!(layer = id.0, parent, "parent layer not in /Order, kept at root");
                    Placement::ParentNotFound { parent }
                }
            }
        }
    };
    order_slot.write_array(doc, tree.to_objects())?;

    debug!(layer = id.0, name, ?placement, "added layer");
    Ok(AddedLayer {
        xref: id.0,
        placement,
    })
}

/// Turn a layer on or off in the default configuration
pub fn set_visibility(doc: &mut LoDocument, xref: u32, on: bool) -> Result<()> {
    let (location, id) = find_layer(doc, xref)?;
    let config = default_config(&location)?;

    let (add, strip) = if on {
        (&b"ON"[..], &b"OFF"[..])
    } else {
        (&b"OFF"[..], &b"ON"[..])
    };
    let target = ensure_config_array(doc, &config, add)?;
    let mut members = target.read_array(doc);
    if !contains_ref(&members, id) {
        members.push(Object::Reference(id));
        target.write_array(doc, members)?;
    }
    if let Some(other) = config_array(doc, &config, strip) {
        let mut members = other.read_array(doc);
        if strip_ref(&mut members, id) {
            other.write_array(doc, members)?;
        }
    }
    Ok(())
}

pub fn set_locked(doc: &mut LoDocument, xref: u32, locked: bool) -> Result<()> {
    let (location, id) = find_layer(doc, xref)?;
    let config = default_config(&location)?;

    if locked {
        let slot = ensure_config_array(doc, &config, b"Locked")?;
        let mut members = slot.read_array(doc);
        if !contains_ref(&members, id) {
            members.push(Object::Reference(id));
            slot.write_array(doc, members)?;
        }
    } else if let Some(slot) = config_array(doc, &config, b"Locked") {
        let mut members = slot.read_array(doc);
        if strip_ref(&mut members, id) {
            slot.write_array(doc, members)?;
        }
    }
    Ok(())
}

/// Remove a layer from every optional-content structure and delete its
/// dictionary. Children in `/Order` move up into the deleted layer's slot.
pub fn delete_layer(doc: &mut LoDocument, xref: u32) -> Result<()> {
    let (location, id) = find_layer(doc, xref)?;

    if let Some(ocgs) = &location.ocgs {
        let mut groups = ocgs.read_array(doc);
        strip_ref(&mut groups, id);
        ocgs.write_array(doc, groups)?;
    }

    for config in &location.configs {
        let membership: [&[u8]; 3] = [b"ON", b"OFF", b"Locked"];
        for key in membership {
            if let Some(slot) = config_array(doc, config, key) {
                let mut members = slot.read_array(doc);
                if strip_ref(&mut members, id) {
                    slot.write_array(doc, members)?;
                }
            }
        }
        if let Some(slot) = config_array(doc, config, b"Order") {
            let mut tree = OrderTree::parse(doc, &slot.read_array(doc));
            if tree.remove_layer(id) > 0 {
                slot.write_array(doc, tree.to_objects())?;
            }
        }
        if let Some(slot) = config_array(doc, config, b"RBGroups") {
            let groups: Vec<Object> = slot
                .read_array(doc)
                .into_iter()
                .filter_map(|group| match group {
                    Object::Array(mut members) => {
                        strip_ref(&mut members, id);
                        (!members.is_empty()).then_some(Object::Array(members))
                    }
                    other => Some(other),
                })
                .collect();
            slot.write_array(doc, groups)?;
        }
        if let Some(slot) = config_array(doc, config, b"AS") {
            let usages: Vec<Object> = slot
                .read_array(doc)
                .into_iter()
                .map(|usage| match usage {
                    Object::Dictionary(mut dict) => {
                        if let Ok(Object::Array(members)) = dict.get_mut(b"OCGs") {
                            strip_ref(members, id);
                        }
                        Object::Dictionary(dict)
                    }
                    other => other,
                })
                .collect();
            slot.write_array(doc, usages)?;
        }
    }

    doc.objects.remove(&id);
    debug!(layer = xref, "deleted layer");
    Ok(())
}

fn read(doc: &LoDocument, config: &Slot, key: &[u8]) -> Vec<Object> {
    config_array(doc, config, key)
        .map(|slot| slot.read_array(doc))
        .unwrap_or_default()
}

fn default_config(location: &OcLocation) -> Result<Slot> {
    location
        .default_config()
        .cloned()
        .ok_or_else(|| PdfError::InvalidStructure("no default configuration".to_string()))
}

/// Group references listed in `/OCGs`, deduplicated, in order
fn group_ids(doc: &LoDocument, location: &OcLocation) -> Vec<ObjectId> {
    let mut ids: Vec<ObjectId> = Vec::new();
    if let Some(ocgs) = &location.ocgs {
        for item in ocgs.read_array(doc) {
            if let Object::Reference(id) = item {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
    }
    ids
}

fn find_layer(doc: &LoDocument, xref: u32) -> Result<(OcLocation, ObjectId)> {
    let location = locate(doc)?.ok_or(PdfError::LayerNotFound(xref))?;
    let id = group_ids(doc, &location)
        .into_iter()
        .find(|id| id.0 == xref)
        .ok_or(PdfError::LayerNotFound(xref))?;
    Ok((location, id))
}

#[cfg(test)]
#[path = "ocg_tests.rs"]
mod tests;
