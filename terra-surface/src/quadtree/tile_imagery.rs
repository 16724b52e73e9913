use bevy::math::DVec4;
use terra_jobs::JobQueue;
use terra_scene::{Rectangle, TileKey};

use super::{
    imagery_layer::{calculate_texture_translation_and_scale, ImageryLayer, ImageryLayerId},
    imagery_storage::ImageryState,
    render_context::RenderContext,
};

/// The imagery of one layer mapped onto one terrain tile.
#[derive(Debug, Clone, PartialEq)]
pub struct TileImagery {
    pub layer_id: ImageryLayerId,
    /// The imagery this tile wants to show. Cleared once it is ready.
    pub loading_imagery: Option<TileKey>,
    /// The imagery shown in the meantime, possibly an ancestor of `loading_imagery`.
    pub ready_imagery: Option<TileKey>,
    /// Stands in for the layer until its provider is ready.
    pub is_placeholder: bool,
    pub texture_coordinate_rectangle: DVec4,
    pub texture_translation_and_scale: Option<DVec4>,
}
impl TileImagery {
    pub fn new(
        layer_id: ImageryLayerId,
        imagery: TileKey,
        texture_coordinate_rectangle: DVec4,
    ) -> Self {
        Self {
            layer_id,
            loading_imagery: Some(imagery),
            ready_imagery: None,
            is_placeholder: false,
            texture_coordinate_rectangle,
            texture_translation_and_scale: None,
        }
    }
    pub fn placeholder(layer_id: ImageryLayerId) -> Self {
        Self {
            layer_id,
            loading_imagery: None,
            ready_imagery: None,
            is_placeholder: true,
            texture_coordinate_rectangle: DVec4::new(0.0, 0.0, 1.0, 1.0),
            texture_translation_and_scale: None,
        }
    }

    /// Releases the references this tile holds on the layer's imagery cache.
    pub fn free_resources(&mut self, layer: &mut ImageryLayer) {
        if let Some(key) = self.loading_imagery.take() {
            layer.release_imagery(&key);
        }
        if let Some(key) = self.ready_imagery.take() {
            layer.release_imagery(&key);
        }
    }

    /// Returns true when nothing better is coming for this tile: the wanted imagery is ready,
    /// or it failed and no ancestor is left to load.
    pub fn process_state_machine(
        &mut self,
        tile_rectangle: &Rectangle,
        layer: &mut ImageryLayer,
        render_context: &mut dyn RenderContext,
        jobs: &mut JobQueue,
    ) -> bool {
        if self.is_placeholder {
            return false;
        }
        let Some(loading_key) = self.loading_imagery else {
            return true;
        };

        layer.process_imagery_state_machine(&loading_key, render_context, jobs);
        let Some(loading) = layer.storage.get(&loading_key) else {
            bevy::log::warn!("imagery {} vanished while a tile was loading it", loading_key);
            self.loading_imagery = None;
            return true;
        };
        let loading_state = loading.state;

        if loading_state == ImageryState::Ready {
            let rectangle = loading.rectangle;
            if let Some(ready) = self.ready_imagery.take() {
                layer.release_imagery(&ready);
            }
            self.ready_imagery = Some(loading_key);
            self.loading_imagery = None;
            self.texture_translation_and_scale = Some(calculate_texture_translation_and_scale(
                tile_rectangle,
                &rectangle,
            ));
            return true;
        }

        // Show the nearest ready ancestor while waiting, and remember the closest ancestor
        // that could still load in case this one never does.
        let mut ancestor = loading.parent;
        let mut closest_ancestor_that_needs_loading = None;
        while let Some(key) = ancestor {
            let Some(imagery) = layer.storage.get(&key) else {
                ancestor = None;
                break;
            };
            if imagery.state == ImageryState::Ready {
                break;
            }
            if imagery.state != ImageryState::Failed && imagery.state != ImageryState::Invalid {
                closest_ancestor_that_needs_loading.get_or_insert(key);
            }
            ancestor = imagery.parent;
        }

        if self.ready_imagery != ancestor {
            if let Some(ready) = self.ready_imagery.take() {
                layer.release_imagery(&ready);
            }
            self.ready_imagery = ancestor;
            if let Some(key) = ancestor {
                if let Err(error) = layer.storage.add_reference(&key) {
                    bevy::log::warn!("{}", error);
                }
                if let Some(imagery) = layer.storage.get(&key) {
                    self.texture_translation_and_scale = Some(
                        calculate_texture_translation_and_scale(tile_rectangle, &imagery.rectangle),
                    );
                }
            }
        }

        if loading_state == ImageryState::Failed || loading_state == ImageryState::Invalid {
            return match closest_ancestor_that_needs_loading {
                Some(key) => {
                    layer.process_imagery_state_machine(&key, render_context, jobs);
                    false
                }
                None => true,
            };
        }
        false
    }
}
