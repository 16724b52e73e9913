use std::sync::Arc;

use bevy::math::{DVec3, DVec4};
use terra_jobs::JobQueue;
use terra_scene::{BoundingSphere, TerrainData, TerrainMesh, TileBoundingRegion, TileKey};

use super::{
    frame_state::FrameState,
    imagery_layer_collection::ImageryLayerCollection,
    imagery_storage::ImageryState,
    quadtree_tile::QuadtreeTileLoadState,
    quadtree_tile_storage::QuadtreeTileStorage,
    render_context::{RenderContext, VertexArray},
    terrain_provider::TerrainProvider,
    tile_imagery::TileImagery,
    tile_terrain::{TerrainState, TileTerrain, UpsampleDetails},
};

/// What a quadtree tile carries once it starts loading: its terrain pipelines, the published
/// mesh and the imagery draped over it.
#[derive(Debug)]
pub struct GlobeSurfaceTile {
    pub imagery: Vec<TileImagery>,
    /// The best terrain data received so far, loaded or upsampled.
    pub terrain_data: Option<Arc<dyn TerrainData>>,
    pub loaded_terrain: Option<TileTerrain>,
    pub upsampled_terrain: Option<TileTerrain>,

    pub center: DVec3,
    pub minimum_height: f64,
    pub maximum_height: f64,
    pub bounding_sphere_3d: BoundingSphere,
    pub occludee_point_in_scaled_space: Option<DVec3>,
    pub tile_bounding_region: Option<TileBoundingRegion>,
    pub mesh: Option<TerrainMesh>,
    pub vertex_array: Option<VertexArray>,

    /// The tile whose terrain data holds the water mask drawn on this tile.
    pub water_mask_source: Option<TileKey>,
    pub water_mask_translation_and_scale: DVec4,
}
impl Default for GlobeSurfaceTile {
    fn default() -> Self {
        Self::new()
    }
}
impl GlobeSurfaceTile {
    pub fn new() -> Self {
        Self {
            imagery: vec![],
            terrain_data: None,
            loaded_terrain: None,
            upsampled_terrain: None,
            center: DVec3::ZERO,
            minimum_height: 0.0,
            maximum_height: 0.0,
            bounding_sphere_3d: BoundingSphere::default(),
            occludee_point_in_scaled_space: None,
            tile_bounding_region: None,
            mesh: None,
            vertex_array: None,
            water_mask_source: None,
            water_mask_translation_and_scale: DVec4::new(0.0, 0.0, 1.0, 1.0),
        }
    }

    /// False while a terrain job is in flight or any imagery is still being fetched.
    pub fn eligible_for_unloading(&self, imagery_layers: &ImageryLayerCollection) -> bool {
        let transitioning = |terrain: &Option<TileTerrain>| {
            terrain.as_ref().map_or(false, |terrain| {
                terrain.state == TerrainState::Receiving
                    || terrain.state == TerrainState::Transforming
            })
        };
        if transitioning(&self.loaded_terrain) || transitioning(&self.upsampled_terrain) {
            return false;
        }
        self.imagery.iter().all(|tile_imagery| {
            let Some(key) = tile_imagery.loading_imagery else {
                return true;
            };
            imagery_layers
                .get_by_id(tile_imagery.layer_id)
                .and_then(|layer| layer.storage.get(&key))
                .map_or(true, |imagery| imagery.state != ImageryState::Loading)
        })
    }

    pub fn free_resources(
        &mut self,
        imagery_layers: &mut ImageryLayerCollection,
        vertex_arrays_to_destroy: &mut Vec<VertexArray>,
    ) {
        if let Some(mut terrain) = self.loaded_terrain.take() {
            terrain.free_resources(vertex_arrays_to_destroy);
        }
        if let Some(mut terrain) = self.upsampled_terrain.take() {
            terrain.free_resources(vertex_arrays_to_destroy);
        }
        self.terrain_data = None;
        for mut tile_imagery in self.imagery.drain(..) {
            if let Some(layer) = imagery_layers.get_by_id_mut(tile_imagery.layer_id) {
                tile_imagery.free_resources(layer);
            }
        }
        if let Some(vertex_array) = self.vertex_array.take() {
            vertex_arrays_to_destroy.push(vertex_array);
        }
        self.mesh = None;
        self.water_mask_source = None;
    }

    /// Advances the tile's terrain and imagery by one step and updates its load state.
    #[allow(clippy::too_many_arguments)]
    pub fn process_state_machine(
        storage: &mut QuadtreeTileStorage,
        key: TileKey,
        frame_state: &FrameState,
        terrain_provider: &dyn TerrainProvider,
        imagery_layers: &mut ImageryLayerCollection,
        render_context: &mut dyn RenderContext,
        jobs: &mut JobQueue,
    ) {
        let Some(tile) = storage.get_mut(&key) else {
            return;
        };
        if tile.data.is_none() {
            tile.data = Some(GlobeSurfaceTile::new());
        }
        if tile.state == QuadtreeTileLoadState::Start {
            prepare_new_tile(storage, key, terrain_provider, imagery_layers);
            if let Some(tile) = storage.get_mut(&key) {
                tile.state = QuadtreeTileLoadState::Loading;
            }
        }
        if storage.get(&key).map(|tile| tile.state) == Some(QuadtreeTileLoadState::Loading) {
            process_terrain_state_machine(
                storage,
                key,
                frame_state,
                terrain_provider,
                render_context,
                jobs,
            );
        }

        let Some(tile) = storage.get_mut(&key) else {
            return;
        };
        let rectangle = tile.rectangle;
        let Some(surface_tile) = tile.data.as_mut() else {
            return;
        };

        // Renderable as soon as there is a vertex array, done once both terrain pipelines
        // have finished.
        let mut is_renderable = surface_tile.vertex_array.is_some();
        let mut is_done_loading =
            surface_tile.loaded_terrain.is_none() && surface_tile.upsampled_terrain.is_none();
        let mut is_upsampled_only = surface_tile
            .terrain_data
            .as_ref()
            .map_or(false, |data| data.was_created_by_upsampling());

        let mut i = 0;
        while let Some(tile_imagery) = surface_tile.imagery.get(i) {
            let layer_id = tile_imagery.layer_id;
            let is_placeholder = tile_imagery.is_placeholder;
            let is_loading = tile_imagery.loading_imagery.is_some();
            let Some(layer) = imagery_layers.get_by_id_mut(layer_id) else {
                surface_tile.imagery.remove(i);
                continue;
            };

            if is_placeholder {
                if layer.imagery_provider.get_ready() {
                    // swap in the real skeletons at the same position and revisit it
                    surface_tile.imagery.remove(i);
                    layer.create_tile_imagery_skeletons(
                        &key,
                        &rectangle,
                        surface_tile,
                        terrain_provider,
                        Some(i),
                    );
                    continue;
                }
                is_upsampled_only = false;
            } else if !is_loading {
                is_upsampled_only = false;
                i += 1;
                continue;
            }

            let Some(tile_imagery) = surface_tile.imagery.get_mut(i) else {
                break;
            };
            let this_tile_done_loading =
                tile_imagery.process_state_machine(&rectangle, layer, render_context, jobs);
            is_done_loading = is_done_loading && this_tile_done_loading;
            is_renderable =
                is_renderable && (this_tile_done_loading || tile_imagery.ready_imagery.is_some());
            is_upsampled_only = is_upsampled_only
                && tile_imagery.loading_imagery.map_or(false, |loading| {
                    layer.storage.get(&loading).map_or(false, |imagery| {
                        imagery.state == ImageryState::Failed
                            || imagery.state == ImageryState::Invalid
                    })
                });
            i += 1;
        }

        let has_vertex_array = surface_tile.vertex_array.is_some();
        tile.upsampled_from_parent = is_upsampled_only;
        if is_renderable {
            tile.renderable = true;
        }
        if is_done_loading {
            tile.state = if has_vertex_array {
                QuadtreeTileLoadState::Done
            } else {
                QuadtreeTileLoadState::Failed
            };
        }
    }
}

fn prepare_new_tile(
    storage: &mut QuadtreeTileStorage,
    key: TileKey,
    terrain_provider: &dyn TerrainProvider,
    imagery_layers: &mut ImageryLayerCollection,
) {
    let upsample_details = get_upsample_tile_details(storage, key);
    let data_available = is_data_available(storage, key, terrain_provider);
    let Some(tile) = storage.get_mut(&key) else {
        return;
    };
    let rectangle = tile.rectangle;
    let Some(surface_tile) = tile.data.as_mut() else {
        return;
    };
    if upsample_details.is_some() {
        surface_tile.upsampled_terrain = Some(TileTerrain::new(upsample_details));
    }
    if data_available {
        surface_tile.loaded_terrain = Some(TileTerrain::new(None));
    }
    for layer in imagery_layers.iter_mut() {
        if layer.show() {
            layer.create_tile_imagery_skeletons(
                &key,
                &rectangle,
                surface_tile,
                terrain_provider,
                None,
            );
        }
    }
}

/// The nearest ancestor with terrain data to upsample from.
fn get_upsample_tile_details(storage: &QuadtreeTileStorage, key: TileKey) -> Option<UpsampleDetails> {
    let mut source = storage.get(&key)?.parent;
    while let Some(source_key) = source {
        let tile = storage.get(&source_key)?;
        let data = tile.data.as_ref()?;
        if let Some(terrain_data) = data.terrain_data.as_ref() {
            return Some(UpsampleDetails {
                data: terrain_data.clone(),
                x: source_key.x,
                y: source_key.y,
                level: source_key.level,
            });
        }
        source = tile.parent;
    }
    None
}

fn is_data_available(
    storage: &QuadtreeTileStorage,
    key: TileKey,
    terrain_provider: &dyn TerrainProvider,
) -> bool {
    if let Some(available) = terrain_provider.get_tile_data_available(key.x, key.y, key.level) {
        return available;
    }
    let Some(parent_key) = storage.get(&key).and_then(|tile| tile.parent) else {
        // root tiles are assumed to have data
        return true;
    };
    // until the parent has data, assume the child has none
    storage
        .get(&parent_key)
        .and_then(|parent| parent.data.as_ref())
        .and_then(|data| data.terrain_data.as_ref())
        .map_or(false, |data| {
            data.is_child_available(parent_key.x, parent_key.y, key.x, key.y)
        })
}

fn is_same_data(current: &Option<Arc<dyn TerrainData>>, data: &Arc<dyn TerrainData>) -> bool {
    current.as_ref().map_or(false, |current| {
        Arc::as_ptr(current) as *const () == Arc::as_ptr(data) as *const ()
    })
}

fn process_terrain_state_machine(
    storage: &mut QuadtreeTileStorage,
    key: TileKey,
    frame_state: &FrameState,
    terrain_provider: &dyn TerrainProvider,
    render_context: &mut dyn RenderContext,
    jobs: &mut JobQueue,
) {
    let tiling_scheme = terrain_provider.get_tiling_scheme();
    let ellipsoid = tiling_scheme.get_ellipsoid();
    let exaggeration = frame_state.terrain_exaggeration;
    let mut vertex_arrays_to_destroy = vec![];
    let mut new_loaded_data = None;
    let mut new_upsampled_data = None;

    let Some(tile) = storage.get_mut(&key) else {
        return;
    };
    let epoch = tile.epoch();
    let rectangle = tile.rectangle;
    let Some(surface_tile) = tile.data.as_mut() else {
        return;
    };

    let mut suspend_upsampling = false;
    if let Some(mut loaded) = surface_tile.loaded_terrain.take() {
        loaded.process_load_state_machine(
            key,
            epoch,
            terrain_provider,
            exaggeration,
            render_context,
            jobs,
        );

        // Publish the data as soon as it is here, children may need it for upsampling.
        if loaded.state >= TerrainState::Received {
            if let Some(data) = loaded.data.clone() {
                if !is_same_data(&surface_tile.terrain_data, &data) {
                    if data.water_mask().is_some() {
                        surface_tile.water_mask_source = Some(key);
                        surface_tile.water_mask_translation_and_scale =
                            DVec4::new(0.0, 0.0, 1.0, 1.0);
                    } else {
                        surface_tile.water_mask_source = None;
                    }
                    surface_tile.terrain_data = Some(data.clone());
                    new_loaded_data = Some(data);
                }
            }
            suspend_upsampling = true;
        }

        match loaded.state {
            TerrainState::Ready => {
                loaded.publish_to_tile(
                    surface_tile,
                    &rectangle,
                    &ellipsoid,
                    &mut vertex_arrays_to_destroy,
                );
                // nothing left to load or upsample
                if let Some(mut upsampled) = surface_tile.upsampled_terrain.take() {
                    upsampled.free_resources(&mut vertex_arrays_to_destroy);
                }
            }
            // not retried, upsampling may still cover the tile
            TerrainState::Failed => {}
            _ => surface_tile.loaded_terrain = Some(loaded),
        }
    }

    if !suspend_upsampling {
        if let Some(mut upsampled) = surface_tile.upsampled_terrain.take() {
            upsampled.process_upsample_state_machine(
                key,
                epoch,
                tiling_scheme.clone(),
                exaggeration,
                render_context,
                jobs,
            );

            // Loaded data never gets here, so overwriting terrain_data is safe.
            if upsampled.state >= TerrainState::Received {
                if let Some(data) = upsampled.data.clone() {
                    if !is_same_data(&surface_tile.terrain_data, &data) {
                        surface_tile.terrain_data = Some(data.clone());
                        new_upsampled_data = Some(data);
                    }
                }
            }

            match upsampled.state {
                TerrainState::Ready => {
                    upsampled.publish_to_tile(
                        surface_tile,
                        &rectangle,
                        &ellipsoid,
                        &mut vertex_arrays_to_destroy,
                    );
                }
                TerrainState::Failed => {}
                _ => surface_tile.upsampled_terrain = Some(upsampled),
            }
        }
    }

    storage
        .vertex_arrays_to_destroy
        .append(&mut vertex_arrays_to_destroy);
    if let Some(data) = new_loaded_data {
        propagate_new_loaded_data_to_children(storage, key, data);
    }
    if let Some(data) = new_upsampled_data {
        if terrain_provider.get_has_water_mask() {
            upsample_water_mask(storage, key);
        }
        propagate_new_upsampled_data_to_children(storage, key, data);
    }
}

/// Restarts the upsampling of children that have no data of their own yet, and starts
/// loading the ones the new data says are available.
fn propagate_new_loaded_data_to_children(
    storage: &mut QuadtreeTileStorage,
    key: TileKey,
    data: Arc<dyn TerrainData>,
) {
    let Some(children) = storage.get(&key).and_then(|tile| tile.children) else {
        return;
    };
    for child in children {
        let child_available = data.is_child_available(key.x, key.y, child.x, child.y);
        restart_child_upsampling(storage, key, child, &data, child_available);
    }
}

fn propagate_new_upsampled_data_to_children(
    storage: &mut QuadtreeTileStorage,
    key: TileKey,
    data: Arc<dyn TerrainData>,
) {
    let Some(children) = storage.get(&key).and_then(|tile| tile.children) else {
        return;
    };
    for child in children {
        restart_child_upsampling(storage, key, child, &data, false);
    }
}

fn restart_child_upsampling(
    storage: &mut QuadtreeTileStorage,
    key: TileKey,
    child: TileKey,
    data: &Arc<dyn TerrainData>,
    start_loading: bool,
) {
    let mut vertex_arrays_to_destroy = vec![];
    {
        let Some(child_tile) = storage.get_mut(&child) else {
            return;
        };
        if child_tile.state == QuadtreeTileLoadState::Start {
            return;
        }
        let Some(child_surface_tile) = child_tile.data.as_mut() else {
            return;
        };
        if child_surface_tile
            .terrain_data
            .as_ref()
            .map_or(false, |data| !data.was_created_by_upsampling())
        {
            // the child has loaded data of its own
            return;
        }
        // A new instance rather than a reset, a job may still be running for the old one.
        if let Some(mut upsampled) = child_surface_tile.upsampled_terrain.take() {
            upsampled.free_resources(&mut vertex_arrays_to_destroy);
        }
        child_surface_tile.upsampled_terrain = Some(TileTerrain::new(Some(UpsampleDetails {
            data: data.clone(),
            x: key.x,
            y: key.y,
            level: key.level,
        })));
        if start_loading && child_surface_tile.loaded_terrain.is_none() {
            child_surface_tile.loaded_terrain = Some(TileTerrain::new(None));
        }
        child_tile.state = QuadtreeTileLoadState::Loading;
    }
    storage
        .vertex_arrays_to_destroy
        .append(&mut vertex_arrays_to_destroy);
}

/// Points an upsampled tile at the water mask of its nearest ancestor with loaded data.
fn upsample_water_mask(storage: &mut QuadtreeTileStorage, key: TileKey) {
    let mut source = storage.get(&key).and_then(|tile| tile.parent);
    while let Some(source_key) = source {
        let Some(tile) = storage.get(&source_key) else {
            return;
        };
        let has_loaded_data = tile
            .data
            .as_ref()
            .and_then(|data| data.terrain_data.as_ref())
            .map_or(false, |data| !data.was_created_by_upsampling());
        if has_loaded_data {
            break;
        }
        source = tile.parent;
    }
    let Some(source_tile) = source.and_then(|source_key| storage.get(&source_key)) else {
        return;
    };
    let Some(water_mask_source) = source_tile
        .data
        .as_ref()
        .and_then(|data| data.water_mask_source)
    else {
        return;
    };
    let source_rectangle = source_tile.rectangle;

    let Some(tile) = storage.get_mut(&key) else {
        return;
    };
    let tile_rectangle = tile.rectangle;
    let Some(surface_tile) = tile.data.as_mut() else {
        return;
    };
    let tile_width = tile_rectangle.compute_width();
    let tile_height = tile_rectangle.compute_height();
    let scale_x = tile_width / source_rectangle.compute_width();
    let scale_y = tile_height / source_rectangle.compute_height();
    surface_tile.water_mask_source = Some(water_mask_source);
    surface_tile.water_mask_translation_and_scale = DVec4::new(
        scale_x * (tile_rectangle.west - source_rectangle.west) / tile_width,
        scale_y * (tile_rectangle.south - source_rectangle.south) / tile_height,
        scale_x,
        scale_y,
    );
}
