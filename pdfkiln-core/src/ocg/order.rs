//! The `/Order` array of an optional-content configuration as a tree
//!
//! `/Order` is a nested array. A reference is a layer; an array directly
//! after a reference holds that layer's children; any other array is a
//! labelled or unlabelled group whose members hang below no layer.
//!
//! ```text
//! [ 5 0 R [ 6 0 R 7 0 R ] (Extras) ... ]
//!   ^A      ^children of A
//! [ 5 0 R [ ] [ (Print) 8 0 R ] ]
//!           ^A has no children; group "Print" holds 8, no parent layer
//! ```
//!
//! Without the empty array, `[ (Print) 8 0 R ]` would be read as the
//! children of 5 and its label kept as a plain item.

use crate::objects;
use lopdf::{Document as LoDocument, Object, ObjectId};
use std::collections::{HashMap, HashSet};

pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Root,
    Layer(ObjectId),
    Group { label: Option<String> },
    /// Anything else found in the array, kept so writing back loses nothing
    Other(Object),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Where a layer sits in the display hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub depth: usize,
    /// Nearest enclosing layer; groups are not parents
    pub parent: Option<ObjectId>,
    /// Depth-first rank starting at 1
    pub display_order: usize,
}

/// Arena of `/Order` nodes. Detached nodes stay in the arena but are no
/// longer reachable from the root.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTree {
    nodes: Vec<Node>,
}

const ROOT: NodeId = 0;

/// Guards against cyclic indirect arrays
const MAX_NESTING: usize = 64;

impl Default for OrderTree {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// Build the tree from the items of an `/Order` array. References to
    /// arrays are followed; unknown items are kept as [`NodeKind::Other`].
    pub fn parse(doc: &LoDocument, items: &[Object]) -> Self {
        let mut tree = Self::new();
        tree.parse_into(doc, ROOT, items, 0);
        tree
    }

    fn parse_into(&mut self, doc: &LoDocument, container: NodeId, items: &[Object], nesting: usize) {
        if nesting > MAX_NESTING {
            return;
        }
        let mut previous_layer: Option<NodeId> = None;
        for item in items {
            match item {
                Object::Reference(id) => match doc.get_object(*id) {
                    Ok(Object::Array(nested)) => {
                        self.parse_array(doc, container, previous_layer.take(), nested, nesting);
                    }
                    _ => {
                        previous_layer = Some(self.push(container, NodeKind::Layer(*id)));
                    }
                },
                Object::Array(nested) => {
                    self.parse_array(doc, container, previous_layer.take(), nested, nesting);
                }
                other => {
                    self.push(container, NodeKind::Other(other.clone()));
                    previous_layer = None;
                }
            }
        }
    }

    fn parse_array(
        &mut self,
        doc: &LoDocument,
        container: NodeId,
        owner: Option<NodeId>,
        items: &[Object],
        nesting: usize,
    ) {
        match owner {
            Some(layer) => {
                self.parse_into(doc, layer, items, nesting + 1);
            }
            None => {
                let (label, members) = match items.first() {
                    Some(Object::String(bytes, _)) => {
                        (Some(objects::decode_text_string(bytes)), &items[1..])
                    }
                    _ => (None, items),
                };
                let group = self.push(container, NodeKind::Group { label });
                self.parse_into(doc, group, members, nesting + 1);
            }
        }
    }

    fn push(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(id);
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn root_children(&self) -> &[NodeId] {
        &self.nodes[ROOT].children
    }

    /// Serialize back into `/Order` items
    pub fn to_objects(&self) -> Vec<Object> {
        self.children_to_objects(ROOT)
    }

    fn children_to_objects(&self, node: NodeId) -> Vec<Object> {
        let children = &self.nodes[node].children;
        let mut out = Vec::new();
        for (slot, &child) in children.iter().enumerate() {
            match &self.nodes[child].kind {
                NodeKind::Root => {}
                NodeKind::Layer(id) => {
                    out.push(Object::Reference(*id));
                    // A group right after a bare reference would read back as
                    // that layer's children
                    let shields_group = children
                        .get(slot + 1)
                        .is_some_and(|&next| matches!(self.nodes[next].kind, NodeKind::Group { .. }));
                    if !self.nodes[child].children.is_empty() || shields_group {
                        out.push(Object::Array(self.children_to_objects(child)));
                    }
                }
                NodeKind::Group { label } => {
                    let mut items = Vec::new();
                    if let Some(label) = label {
                        items.push(objects::text_string(label));
                    }
                    items.extend(self.children_to_objects(child));
                    out.push(Object::Array(items));
                }
                NodeKind::Other(object) => out.push(object.clone()),
            }
        }
        out
    }

    /// Depth-first walk assigning depth, parent layer and display order.
    /// A layer listed more than once takes the values of its last
    /// occurrence.
    pub fn positions(&self) -> HashMap<ObjectId, Position> {
        let mut positions = HashMap::new();
        let mut counter = 0;
        self.walk(ROOT, 0, None, None, &mut counter, &mut positions);
        positions
    }

    /// Like [`positions`](Self::positions), but only references in `known`
    /// are ranked. Other references still parent the array after them.
    pub fn positions_among(&self, known: &HashSet<ObjectId>) -> HashMap<ObjectId, Position> {
        let mut positions = HashMap::new();
        let mut counter = 0;
        self.walk(ROOT, 0, None, Some(known), &mut counter, &mut positions);
        positions
    }

    fn walk(
        &self,
        node: NodeId,
        depth: usize,
        parent: Option<ObjectId>,
        known: Option<&HashSet<ObjectId>>,
        counter: &mut usize,
        positions: &mut HashMap<ObjectId, Position>,
    ) {
        for &child in &self.nodes[node].children {
            match &self.nodes[child].kind {
                NodeKind::Layer(id) => {
                    if known.map_or(true, |known| known.contains(id)) {
                        *counter += 1;
                        positions.insert(
                            *id,
                            Position {
                                depth,
                                parent,
                                display_order: *counter,
                            },
                        );
                    }
                    self.walk(child, depth + 1, Some(*id), known, counter, positions);
                }
                NodeKind::Group { .. } => {
                    self.walk(child, depth + 1, None, known, counter, positions);
                }
                NodeKind::Root | NodeKind::Other(_) => {}
            }
        }
    }

    /// First occurrence of `id` in depth-first order
    pub fn find_first(&self, id: ObjectId) -> Option<NodeId> {
        self.find_in(ROOT, id)
    }

    fn find_in(&self, node: NodeId, id: ObjectId) -> Option<NodeId> {
        for &child in &self.nodes[node].children {
            if self.nodes[child].kind == NodeKind::Layer(id) {
                return Some(child);
            }
            if let Some(found) = self.find_in(child, id) {
                return Some(found);
            }
        }
        None
    }

    /// Detach the first root-level occurrence of `id`. Returns whether one
    /// was found.
    pub fn remove_from_root(&mut self, id: ObjectId) -> bool {
        let found = self.nodes[ROOT]
            .children
            .iter()
            .copied()
            .find(|&child| self.nodes[child].kind == NodeKind::Layer(id));
        match found {
            Some(node) => {
                self.detach(node);
                true
            }
            None => false,
        }
    }

    /// Append a new layer node as the last child of `parent`
    pub fn attach_layer(&mut self, parent: NodeId, id: ObjectId) -> NodeId {
        self.push(parent, NodeKind::Layer(id))
    }

    /// Append a layer at the root level
    pub fn push_root_layer(&mut self, id: ObjectId) -> NodeId {
        self.push(ROOT, NodeKind::Layer(id))
    }

    /// Remove every occurrence of `id`. The children of each removed node
    /// take its place in its parent. Returns the number of nodes removed.
    pub fn remove_layer(&mut self, id: ObjectId) -> usize {
        let mut removed = 0;
        while let Some(node) = self.find_first(id) {
            self.detach(node);
            removed += 1;
        }
        removed
    }

    /// Unlink `node` and splice its children into its former slot
    fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.nodes[node].parent else {
            return;
        };
        let children = std::mem::take(&mut self.nodes[node].children);
        for &child in &children {
            self.nodes[child].parent = Some(parent);
        }
        let siblings = &mut self.nodes[parent].children;
        if let Some(slot) = siblings.iter().position(|&c| c == node) {
            siblings.splice(slot..=slot, children);
        }
        self.nodes[node].parent = None;
    }

    /// Layers reachable from the root, in depth-first order
    pub fn layer_ids(&self) -> Vec<ObjectId> {
        let mut out = Vec::new();
        let mut stack = vec![ROOT];
        while let Some(node) = stack.pop() {
            if let NodeKind::Layer(id) = self.nodes[node].kind {
                out.push(id);
            }
            stack.extend(self.nodes[node].children.iter().rev());
        }
        out
    }
}

#[cfg(test)]
#[path = "order_tests.rs"]
mod tests;
