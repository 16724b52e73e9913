use std::{collections::BTreeMap, sync::Arc};

use terra_jobs::JobQueue;
use terra_scene::{BoundingSphere, Intersect, TileBoundingRegion, TileKey, TilingScheme};

use super::{
    create_terrain_mesh_job::CreateTerrainMeshJob,
    error::TileError,
    frame_state::{FrameState, SceneMode},
    globe_surface_tile::GlobeSurfaceTile,
    imagery_layer::{ImageryLayer, ImageryLayerId},
    imagery_layer_collection::{ImageryLayerCollection, ImageryLayerEvent},
    quadtree_occluders::QuadtreeOccluders,
    quadtree_tile::{QuadtreeTile, QuadtreeTileLoadState},
    quadtree_tile_storage::QuadtreeTileStorage,
    render_context::RenderContext,
    request_image_job::RequestImageJob,
    request_tile_geometry_job::RequestTileGeometryJob,
    terrain_provider::TerrainProvider,
    tile_draw_command::TileDrawCommand,
    upsample_job::UpsampleJob,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileVisibility {
    None,
    Partial,
    Full,
}

/// Applies every finished job to the tiles and layers it was started for. Returns the
/// failures, which are also logged.
pub(super) fn apply_job_outcomes(
    jobs: &mut JobQueue,
    storage: &mut QuadtreeTileStorage,
    imagery_layers: &mut ImageryLayerCollection,
) -> Vec<TileError> {
    jobs.poll();
    let mut errors = vec![];
    while let Some(outcome) = jobs.take_next::<RequestTileGeometryJob>() {
        errors.extend(outcome.apply(storage));
    }
    while let Some(outcome) = jobs.take_next::<CreateTerrainMeshJob>() {
        errors.extend(outcome.apply(storage));
    }
    while let Some(outcome) = jobs.take_next::<UpsampleJob>() {
        errors.extend(outcome.apply(storage));
    }
    while let Some(outcome) = jobs.take_next::<RequestImageJob>() {
        errors.extend(outcome.apply(imagery_layers));
    }
    for error in errors.iter() {
        bevy::log::error!("{}", error);
    }
    errors
}

/// Loads, culls and draws the tiles of a globe surface: terrain from a [`TerrainProvider`]
/// with the layers of an [`ImageryLayerCollection`] draped over it.
pub struct GlobeSurfaceTileProvider {
    pub terrain_provider: Box<dyn TerrainProvider>,
    pub imagery_layers: ImageryLayerCollection,
    pub render_context: Box<dyn RenderContext>,
    pub(super) jobs: JobQueue,
    errors: Vec<TileError>,
    layer_order_changed: bool,
    /// Commands of the tiles shown this frame, keyed by how many textures each tile has.
    tiles_to_render_by_texture_count: BTreeMap<usize, Vec<TileDrawCommand>>,
    draw_commands: Vec<TileDrawCommand>,
}
impl GlobeSurfaceTileProvider {
    pub fn new(
        terrain_provider: Box<dyn TerrainProvider>,
        imagery_layers: ImageryLayerCollection,
        render_context: Box<dyn RenderContext>,
    ) -> Self {
        Self {
            terrain_provider,
            imagery_layers,
            render_context,
            jobs: JobQueue::new(),
            errors: vec![],
            layer_order_changed: false,
            tiles_to_render_by_texture_count: BTreeMap::new(),
            draw_commands: vec![],
        }
    }

    pub fn get_tiling_scheme(&self) -> Arc<dyn TilingScheme> {
        self.terrain_provider.get_tiling_scheme()
    }

    /// Nothing can be drawn until the terrain and the base imagery are ready.
    pub fn ready(&self) -> bool {
        self.terrain_provider.get_ready()
            && self
                .imagery_layers
                .get(0)
                .map_or(true, |layer| layer.imagery_provider.get_ready())
    }

    pub fn in_progress_job_count(&self) -> usize {
        self.jobs.in_progress_count()
    }

    /// Draw commands built during the last update, fewest textures first.
    pub fn draw_commands(&self) -> &[TileDrawCommand] {
        &self.draw_commands
    }

    pub fn take_errors(&mut self) -> Vec<TileError> {
        std::mem::take(&mut self.errors)
    }

    /// Called at the start of every frame: applies finished jobs and destroys the GPU
    /// resources released since the last frame.
    pub fn initialize(&mut self, storage: &mut QuadtreeTileStorage) {
        let errors = apply_job_outcomes(&mut self.jobs, storage, &mut self.imagery_layers);
        self.errors.extend(errors);
        self.destroy_released_resources(storage);
    }

    fn destroy_released_resources(&mut self, storage: &mut QuadtreeTileStorage) {
        for vertex_array in storage.take_vertex_arrays_to_destroy() {
            self.render_context.destroy_vertex_array(vertex_array);
        }
        for layer in self.imagery_layers.iter_mut() {
            for texture in layer.storage.take_textures_to_destroy() {
                self.render_context.destroy_texture(texture);
            }
        }
    }

    /// Called before tiles are selected: reacts to changes of the layer stack.
    pub fn begin_update(&mut self, storage: &mut QuadtreeTileStorage) {
        self.imagery_layers.update();
        for event in self.imagery_layers.take_events() {
            bevy::log::debug!("imagery layer event {:?}", event);
            match event {
                ImageryLayerEvent::Added { id, .. } => self.on_layer_added(storage, id),
                ImageryLayerEvent::Removed(mut layer) => {
                    strip_layer_from_tiles(storage, &mut layer);
                    layer.storage.clear();
                    for texture in layer.storage.take_textures_to_destroy() {
                        self.render_context.destroy_texture(texture);
                    }
                }
                ImageryLayerEvent::Moved { .. } => self.layer_order_changed = true,
                ImageryLayerEvent::ShownOrHidden { id, show, .. } => {
                    if show {
                        self.on_layer_added(storage, id);
                    } else if let Some(layer) = self.imagery_layers.get_by_id_mut(id) {
                        strip_layer_from_tiles(storage, layer);
                    }
                }
            }
        }

        if self.layer_order_changed {
            self.layer_order_changed = false;
            let imagery_layers = &self.imagery_layers;
            let layer_index = |id: ImageryLayerId| {
                imagery_layers
                    .get_by_id(id)
                    .map_or(usize::MAX, |layer| layer.layer_index())
            };
            for key in loaded_tiles(storage) {
                if let Some(data) = storage.get_mut(&key).and_then(|tile| tile.data.as_mut()) {
                    data.imagery
                        .sort_by_key(|tile_imagery| layer_index(tile_imagery.layer_id));
                }
            }
        }

        self.tiles_to_render_by_texture_count.clear();
        self.draw_commands.clear();
    }

    /// Gives every loaded tile the skeletons of a new or re-shown layer. Tiles that got some go
    /// back to loading so the imagery is fetched.
    fn on_layer_added(&mut self, storage: &mut QuadtreeTileStorage, id: ImageryLayerId) {
        let Some(layer) = self.imagery_layers.get_by_id_mut(id) else {
            return;
        };
        if !layer.show() {
            return;
        }
        for key in loaded_tiles(storage) {
            let Some(tile) = storage.get_mut(&key) else {
                continue;
            };
            let rectangle = tile.rectangle;
            let Some(data) = tile.data.as_mut() else {
                continue;
            };
            if data.imagery.iter().any(|x| x.layer_id == id) {
                continue;
            }
            if layer.create_tile_imagery_skeletons(
                &key,
                &rectangle,
                data,
                self.terrain_provider.as_ref(),
                None,
            ) {
                tile.state = QuadtreeTileLoadState::Loading;
            }
        }
        self.layer_order_changed = true;
    }

    /// Called after all tiles of the frame were shown: orders the commands by texture count.
    pub fn end_update(&mut self) {
        for commands in std::mem::take(&mut self.tiles_to_render_by_texture_count).into_values() {
            self.draw_commands.extend(commands);
        }
    }

    pub fn get_level_maximum_geometric_error(&self, level: u32) -> f64 {
        self.terrain_provider.get_level_maximum_geometric_error(level)
    }

    /// Loads, or continues loading, a tile.
    pub fn load_tile(
        &mut self,
        storage: &mut QuadtreeTileStorage,
        key: TileKey,
        frame_state: &FrameState,
    ) {
        GlobeSurfaceTile::process_state_machine(
            storage,
            key,
            frame_state,
            self.terrain_provider.as_ref(),
            &mut self.imagery_layers,
            self.render_context.as_mut(),
            &mut self.jobs,
        );
    }

    /// Whether the tile is inside the view frustum and, in 3D, above the horizon. Tiles
    /// without a mesh have no bounds yet and count as partially visible.
    pub fn compute_tile_visibility(
        &self,
        tile: &QuadtreeTile,
        frame_state: &FrameState,
        occluders: &QuadtreeOccluders,
    ) -> TileVisibility {
        let Some(surface_tile) = tile.data.as_ref().filter(|data| data.mesh.is_some()) else {
            return TileVisibility::Partial;
        };
        let bounding_sphere_2d = || {
            BoundingSphere::from_rectangle_with_heights_2d(
                &tile.rectangle,
                frame_state.map_projection.as_ref(),
                surface_tile.minimum_height,
                surface_tile.maximum_height,
            )
        };
        let bounding_volume = match frame_state.mode {
            SceneMode::Scene3D => surface_tile.bounding_sphere_3d,
            SceneMode::Morphing => {
                BoundingSphere::union(&surface_tile.bounding_sphere_3d, &bounding_sphere_2d())
            }
            SceneMode::Scene2D | SceneMode::ColumbusView => bounding_sphere_2d(),
        };

        let visibility = match frame_state.culling_volume.compute_visibility(&bounding_volume) {
            Intersect::Outside => return TileVisibility::None,
            Intersect::Intersecting => TileVisibility::Partial,
            Intersect::Inside => TileVisibility::Full,
        };
        if frame_state.mode == SceneMode::Scene3D
            && !occluders.is_occludee_visible(surface_tile.occludee_point_in_scaled_space)
        {
            return TileVisibility::None;
        }
        visibility
    }

    /// Distance from the camera to the closest point of the tile, also stored on the tile.
    pub fn compute_distance_to_tile(&self, tile: &mut QuadtreeTile, frame_state: &FrameState) -> f64 {
        let region = match tile.data.as_ref().and_then(|data| data.tile_bounding_region) {
            Some(region) => region,
            None => TileBoundingRegion::new(
                &tile.rectangle,
                0.0,
                0.0,
                &self.get_tiling_scheme().get_ellipsoid(),
            ),
        };
        let projection = match frame_state.mode {
            SceneMode::Scene3D => None,
            _ => Some(frame_state.map_projection.as_ref()),
        };
        let distance = region.distance_to_camera(
            frame_state.camera.position_wc,
            &frame_state.camera.position_cartographic,
            projection,
        );
        tile.distance = distance;
        distance
    }

    /// Whether the tile's children can have terrain of their own, loaded or upsampled.
    pub fn can_refine(&self, tile: &QuadtreeTile) -> bool {
        if tile
            .data
            .as_ref()
            .map_or(false, |data| data.terrain_data.is_some())
        {
            return true;
        }
        let key = tile.key;
        self.terrain_provider
            .get_tile_data_available(key.x * 2, key.y * 2, key.level + 1)
            == Some(true)
    }

    /// Records the draw commands of a tile selected for rendering.
    pub fn show_tile_this_frame(&mut self, tile: &QuadtreeTile) {
        let day_textures = TileDrawCommand::collect_day_textures(tile, &self.imagery_layers);
        let texture_count = day_textures.len();
        let commands = TileDrawCommand::for_tile(
            tile,
            day_textures,
            self.render_context.maximum_texture_units(),
        );
        self.tiles_to_render_by_texture_count
            .entry(texture_count)
            .or_default()
            .extend(commands);
    }
}

/// Tiles with a payload, in no particular order.
fn loaded_tiles(storage: &QuadtreeTileStorage) -> Vec<TileKey> {
    storage
        .iter()
        .filter(|tile| tile.data.is_some())
        .map(|tile| tile.key)
        .collect()
}

/// Drops the layer's imagery from every tile, releasing the references it held.
fn strip_layer_from_tiles(storage: &mut QuadtreeTileStorage, layer: &mut ImageryLayer) {
    let id = layer.id();
    for key in loaded_tiles(storage) {
        let Some(data) = storage.get_mut(&key).and_then(|tile| tile.data.as_mut()) else {
            continue;
        };
        let mut index = 0;
        while index < data.imagery.len() {
            if data.imagery.get(index).map(|x| x.layer_id) == Some(id) {
                let mut tile_imagery = data.imagery.remove(index);
                tile_imagery.free_resources(layer);
            } else {
                index += 1;
            }
        }
    }
}
