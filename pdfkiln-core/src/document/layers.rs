use super::Document;
use crate::error::Result;
use crate::ocg::{self, AddLayerOptions, AddedLayer, Layer, Placement};
use tracing::debug;

impl Document {
    /// Optional content groups sorted by their position in the layer panel
    pub fn layers(&self) -> Result<Vec<Layer>> {
        ocg::list_layers(self.lo()?)
    }

    /// Create a layer, nesting it under `options.parent` when that layer is
    /// listed in the display order
    pub fn add_layer(&mut self, name: &str, options: &AddLayerOptions) -> Result<AddedLayer> {
        let id = self.id;
        let added = ocg::add_layer(self.lo_mut()?, name, options)?;
        if added.placement != Placement::Root {
            debug!(document = id, xref = added.xref, placement = ?added.placement, "added layer");
        }
        Ok(added)
    }

    pub fn set_layer_visibility(&mut self, xref: u32, on: bool) -> Result<()> {
        ocg::set_visibility(self.lo_mut()?, xref, on)
    }

    pub fn set_layer_locked(&mut self, xref: u32, locked: bool) -> Result<()> {
        ocg::set_locked(self.lo_mut()?, xref, locked)
    }

    /// Remove a layer everywhere it is referenced. Its children in the
    /// display order move up into its place.
    pub fn delete_layer(&mut self, xref: u32) -> Result<()> {
        ocg::delete_layer(self.lo_mut()?, xref)
    }
}
