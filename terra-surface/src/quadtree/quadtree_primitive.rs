use std::collections::VecDeque;

use bevy::{math::DVec3, prelude::Resource};
use serde::{Deserialize, Serialize};
use terra_scene::{Cartographic, Rectangle, TerrainData, TileKey};

use super::{
    ellipsoid_terrain_provider::EllipsoidTerrainProvider,
    error::TileError,
    frame_state::{FrameState, SceneMode},
    globe_surface_tile_provider::{GlobeSurfaceTileProvider, TileVisibility},
    imagery_layer_collection::ImageryLayerCollection,
    quadtree_occluders::QuadtreeOccluders,
    quadtree_primitive_debug::QuadtreePrimitiveDebug,
    quadtree_tile::QuadtreeTile,
    quadtree_tile_storage::QuadtreeTileStorage,
    render_context::HeadlessRenderContext,
    terrain_provider::TerrainProvider,
    tile_replacement_queue::TileReplacementQueue,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuadtreePrimitiveOptions {
    /// Tiles are refined until their error in pixels drops to this value.
    pub maximum_screen_space_error: f64,
    /// Tiles beyond this count that were not used in the last frame are evicted.
    pub tile_cache_size: usize,
    /// How long a frame may spend loading tiles.
    pub load_queue_time_slice_ms: u64,
    /// How long a frame may spend reporting heights to height callbacks.
    pub update_heights_time_slice_ms: u64,
    pub debug: QuadtreePrimitiveDebug,
}
impl Default for QuadtreePrimitiveOptions {
    fn default() -> Self {
        Self {
            maximum_screen_space_error: 2.0,
            tile_cache_size: 100,
            load_queue_time_slice_ms: 5,
            update_heights_time_slice_ms: 2,
            debug: QuadtreePrimitiveDebug::new(),
        }
    }
}
impl QuadtreePrimitiveOptions {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Receives the position on the surface below a tracked point.
pub type HeightCallback = Box<dyn FnMut(DVec3) + Send + Sync>;

/// Identifies a callback registered with [`QuadtreePrimitive::update_height`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeightCallbackHandle(u64);

struct HeightUpdate {
    handle: HeightCallbackHandle,
    position: Cartographic,
    /// Level of the tile that last reported a height.
    level: Option<u32>,
    callback: HeightCallback,
}

/// Renders a globe surface as a quadtree of tiles: picks the tiles worth drawing each frame,
/// loads the ones that are missing and evicts those no longer used.
#[derive(Resource)]
pub struct QuadtreePrimitive {
    pub tile_provider: GlobeSurfaceTileProvider,
    pub storage: QuadtreeTileStorage,
    pub maximum_screen_space_error: f64,
    pub tile_cache_size: usize,
    pub load_queue_time_slice_ms: u64,
    pub update_heights_time_slice_ms: u64,
    pub debug: QuadtreePrimitiveDebug,
    tile_replacement_queue: TileReplacementQueue,
    occluders: QuadtreeOccluders,
    tiles_to_render: Vec<TileKey>,
    traversal_queue: VecDeque<TileKey>,
    tile_load_queue: Vec<TileKey>,
    last_tile_load_queue_length: Option<usize>,
    tile_load_progress: Vec<usize>,
    debug_display: Option<String>,
    next_height_callback: u64,
    add_height_callbacks: Vec<HeightUpdate>,
    remove_height_callbacks: Vec<HeightCallbackHandle>,
    height_updates: Vec<HeightUpdate>,
    tiles_to_update_heights: Vec<TileKey>,
    /// Tile and callback index where the last time slice ran out.
    last_tile_updated: Option<(TileKey, usize)>,
}
impl Default for QuadtreePrimitive {
    fn default() -> Self {
        Self::new(
            GlobeSurfaceTileProvider::new(
                Box::new(EllipsoidTerrainProvider::default()),
                ImageryLayerCollection::new(),
                Box::new(HeadlessRenderContext::default()),
            ),
            QuadtreePrimitiveOptions::default(),
        )
    }
}
impl QuadtreePrimitive {
    pub fn new(tile_provider: GlobeSurfaceTileProvider, options: QuadtreePrimitiveOptions) -> Self {
        let tiling_scheme = tile_provider.get_tiling_scheme();
        let occluders = QuadtreeOccluders::new(tiling_scheme.get_ellipsoid());
        Self {
            storage: QuadtreeTileStorage::new(tiling_scheme),
            tile_provider,
            maximum_screen_space_error: options.maximum_screen_space_error,
            tile_cache_size: options.tile_cache_size,
            load_queue_time_slice_ms: options.load_queue_time_slice_ms,
            update_heights_time_slice_ms: options.update_heights_time_slice_ms,
            debug: options.debug,
            tile_replacement_queue: TileReplacementQueue::new(),
            occluders,
            tiles_to_render: vec![],
            traversal_queue: VecDeque::new(),
            tile_load_queue: vec![],
            last_tile_load_queue_length: None,
            tile_load_progress: vec![],
            debug_display: None,
            next_height_callback: 0,
            add_height_callbacks: vec![],
            remove_height_callbacks: vec![],
            height_updates: vec![],
            tiles_to_update_heights: vec![],
            last_tile_updated: None,
        }
    }

    /// Tiles selected in the last update, near to far.
    pub fn tiles_to_render(&self) -> &[TileKey] {
        &self.tiles_to_render
    }

    /// The last summary of the traversal counters.
    pub fn debug_display_string(&self) -> Option<&str> {
        self.debug_display.as_deref()
    }

    pub fn take_errors(&mut self) -> Vec<TileError> {
        self.tile_provider.take_errors()
    }

    /// Pending load counts reported since the last call, oldest first.
    pub fn take_tile_load_progress(&mut self) -> Vec<usize> {
        std::mem::take(&mut self.tile_load_progress)
    }

    /// Frees every tile. The level zero tiles are recreated on the next update.
    pub fn invalidate_all_tiles(&mut self) {
        self.tile_replacement_queue.clear();
        self.storage.clear(&mut self.tile_provider.imagery_layers);
        self.clear_tile_load_queue();
        self.tiles_to_render.clear();
        self.traversal_queue.clear();
        self.last_tile_load_queue_length = None;
        self.tiles_to_update_heights.clear();
        self.last_tile_updated = None;
        for update in self.height_updates.iter_mut() {
            update.level = None;
        }
    }

    /// Swaps the terrain source, throwing away every tile built from the old one.
    pub fn set_terrain_provider(&mut self, terrain_provider: Box<dyn TerrainProvider>) {
        self.invalidate_all_tiles();
        for vertex_array in self.storage.take_vertex_arrays_to_destroy() {
            self.tile_provider
                .render_context
                .destroy_vertex_array(vertex_array);
        }
        self.tile_provider.terrain_provider = terrain_provider;
        let tiling_scheme = self.tile_provider.get_tiling_scheme();
        self.occluders = QuadtreeOccluders::new(tiling_scheme.get_ellipsoid());
        self.storage = QuadtreeTileStorage::new(tiling_scheme);
    }

    /// Calls `callback` with the surface position below `position` whenever a tile containing
    /// it is rendered at a finer level than the last one reported. Takes effect at the end of
    /// the frame.
    pub fn update_height(
        &mut self,
        position: Cartographic,
        callback: HeightCallback,
    ) -> HeightCallbackHandle {
        let handle = HeightCallbackHandle(self.next_height_callback);
        self.next_height_callback += 1;
        self.add_height_callbacks.push(HeightUpdate {
            handle,
            position,
            level: None,
            callback,
        });
        handle
    }

    pub fn remove_height_callback(&mut self, handle: HeightCallbackHandle) {
        self.remove_height_callbacks.push(handle);
    }

    /// Calls `f` for every tile holding data, most recently used first.
    pub fn for_each_loaded_tile(&self, mut f: impl FnMut(&QuadtreeTile)) {
        for key in self.tile_replacement_queue.iter() {
            if let Some(tile) = self.storage.get(&key).filter(|tile| tile.data.is_some()) {
                f(tile);
            }
        }
    }

    pub fn for_each_rendered_tile(&self, mut f: impl FnMut(&QuadtreeTile)) {
        for key in self.tiles_to_render.iter() {
            if let Some(tile) = self.storage.get(key) {
                f(tile);
            }
        }
    }

    fn clear_tile_load_queue(&mut self) {
        self.tile_load_queue.clear();
        self.debug.reset();
    }

    pub fn begin_frame(&mut self, frame_state: &FrameState) {
        if !frame_state.passes.render {
            return;
        }
        self.tile_provider.initialize(&mut self.storage);
        self.clear_tile_load_queue();
        if self.debug.suspend_lod_update {
            return;
        }
        self.tile_replacement_queue.mark_start_of_render_frame();
    }

    pub fn update(&mut self, frame_state: &FrameState) {
        if !frame_state.passes.render {
            return;
        }
        self.tile_provider.begin_update(&mut self.storage);
        self.select_tiles_for_rendering(frame_state);
        self.create_render_commands_for_selected_tiles(frame_state);
        self.tile_provider.end_update();
    }

    pub fn end_frame(&mut self, frame_state: &FrameState) {
        if !frame_state.passes.render {
            return;
        }
        self.process_tile_load_queue(frame_state);
        self.update_heights(frame_state);
        self.update_tile_load_progress();
        if let Some(display_text) = self.debug.update_display() {
            bevy::log::info!("{}", display_text);
            self.debug_display = Some(display_text);
        }
    }

    /// Walks the quadtree breadth first from the level zero tiles, refining every visible tile
    /// whose screen space error is too large and whose children can all be drawn.
    pub fn select_tiles_for_rendering(&mut self, frame_state: &FrameState) {
        if self.debug.suspend_lod_update {
            return;
        }
        self.tiles_to_render.clear();
        self.traversal_queue.clear();

        if self.storage.root().is_empty() {
            if !self.tile_provider.ready() {
                return;
            }
            self.storage.create_level_zero_tiles();
        }
        self.occluders
            .set_camera_position(frame_state.camera.position_wc);

        for key in self.storage.root().to_vec() {
            self.tile_replacement_queue.mark_tile_rendered(key);
            let Some(tile) = self.storage.get(&key) else {
                continue;
            };
            if tile.needs_loading() {
                self.tile_load_queue.push(key);
            }
            if tile.renderable
                && self
                    .tile_provider
                    .compute_tile_visibility(tile, frame_state, &self.occluders)
                    != TileVisibility::None
            {
                self.traversal_queue.push_back(key);
            } else {
                self.debug.tiles_culled += 1;
                if !tile.renderable {
                    self.debug.tiles_waiting_for_children += 1;
                }
            }
        }

        while let Some(key) = self.traversal_queue.pop_front() {
            self.debug.tiles_visited += 1;
            self.tile_replacement_queue.mark_tile_rendered(key);
            self.debug.max_depth = self.debug.max_depth.max(key.level);

            let Some(tile) = self.storage.get_mut(&key) else {
                continue;
            };
            self.tile_provider.compute_distance_to_tile(tile, frame_state);
            let tile = &*tile;
            if screen_space_error(&self.tile_provider, tile, frame_state)
                <= self.maximum_screen_space_error
            {
                self.tiles_to_render.push(key);
                continue;
            }
            if !self.tile_provider.can_refine(tile) {
                self.tiles_to_render.push(key);
                continue;
            }
            let Some(children) = self.queue_children_load_and_determine_if_all_renderable(key)
            else {
                self.tiles_to_render.push(key);
                continue;
            };
            for child in children {
                let Some(child_tile) = self.storage.get(&child) else {
                    continue;
                };
                if self.tile_provider.compute_tile_visibility(
                    child_tile,
                    frame_state,
                    &self.occluders,
                ) != TileVisibility::None
                {
                    self.traversal_queue.push_back(child);
                } else {
                    self.debug.tiles_culled += 1;
                }
            }
        }
    }

    /// Marks the children used, queues the ones needing a load, and returns them when all four
    /// can be drawn and at least one has more than upsampled data.
    fn queue_children_load_and_determine_if_all_renderable(
        &mut self,
        key: TileKey,
    ) -> Option<[TileKey; 4]> {
        let children = self.storage.children(&key)?;
        let mut all_renderable = true;
        let mut all_upsampled_only = true;
        for child in children {
            self.tile_replacement_queue.mark_tile_rendered(child);
            let Some(child_tile) = self.storage.get(&child) else {
                all_renderable = false;
                continue;
            };
            all_upsampled_only = all_upsampled_only && child_tile.upsampled_from_parent;
            all_renderable = all_renderable && child_tile.renderable;
            if child_tile.needs_loading() {
                self.tile_load_queue.push(child);
            }
        }
        if !all_renderable {
            self.debug.tiles_waiting_for_children += 1;
        }
        (all_renderable && !all_upsampled_only).then_some(children)
    }

    /// Hands the selected tiles to the provider near to far.
    pub fn create_render_commands_for_selected_tiles(&mut self, frame_state: &FrameState) {
        let storage = &self.storage;
        self.tiles_to_render.sort_by(|a, b| {
            let distance = |key: &TileKey| storage.get(key).map_or(f64::MAX, |tile| tile.distance);
            distance(a).total_cmp(&distance(b))
        });
        for key in self.tiles_to_render.iter() {
            let Some(tile) = self.storage.get_mut(key) else {
                continue;
            };
            if tile.frame_rendered != frame_state.frame_number.checked_sub(1) {
                self.tiles_to_update_heights.push(*key);
            }
            tile.frame_rendered = Some(frame_state.frame_number);
            self.tile_provider.show_tile_this_frame(tile);
        }
        self.debug.tiles_rendered = self.tiles_to_render.len() as u32;
    }

    /// Evicts unused tiles over the cache size, then advances queued loads until the frame's
    /// time slice runs out. The last queued tiles go first.
    pub fn process_tile_load_queue(&mut self, frame_state: &FrameState) {
        if self.tile_load_queue.is_empty() {
            return;
        }
        self.tile_replacement_queue.trim_tiles(
            &mut self.storage,
            &mut self.tile_provider.imagery_layers,
            self.tile_cache_size,
        );

        let end_time = instant::Instant::now()
            + std::time::Duration::from_millis(self.load_queue_time_slice_ms);
        for key in self.tile_load_queue.clone().into_iter().rev() {
            if self.storage.get(&key).is_none() {
                continue;
            }
            self.tile_replacement_queue.mark_tile_rendered(key);
            self.tile_provider
                .load_tile(&mut self.storage, key, frame_state);
            if instant::Instant::now() > end_time {
                break;
            }
        }
    }

    /// Applies queued callback changes, then reports heights from tiles that were not rendered
    /// in the previous frame, farthest first, until the time slice runs out. The next call
    /// resumes where this one stopped.
    pub fn update_heights(&mut self, frame_state: &FrameState) {
        self.height_updates.append(&mut self.add_height_callbacks);
        let removed = std::mem::take(&mut self.remove_height_callbacks);
        if !removed.is_empty() {
            self.height_updates
                .retain(|update| !removed.contains(&update.handle));
            self.last_tile_updated = None;
        }

        let end_time = instant::Instant::now()
            + std::time::Duration::from_millis(self.update_heights_time_slice_ms);
        while let Some(&key) = self.tiles_to_update_heights.last() {
            let start = match self.last_tile_updated {
                Some((last, index)) if last == key => index,
                _ => 0,
            };
            let mut resume_at = None;
            if let Some(tile) = self.storage.get(&key) {
                let terrain_data = tile
                    .data
                    .as_ref()
                    .and_then(|data| data.terrain_data.as_deref());
                for (index, update) in self.height_updates.iter_mut().enumerate().skip(start) {
                    if update.level.map_or(true, |level| key.level > level) {
                        let position = terrain_data.and_then(|data| {
                            surface_position(data, &tile.rectangle, &update.position, frame_state)
                        });
                        if let Some(position) = position {
                            (update.callback)(position);
                            update.level = Some(key.level);
                        }
                    }
                    if instant::Instant::now() >= end_time {
                        resume_at = Some(index + 1);
                        break;
                    }
                }
            }
            if let Some(index) = resume_at.filter(|index| *index < self.height_updates.len()) {
                self.last_tile_updated = Some((key, index));
                return;
            }
            self.tiles_to_update_heights.pop();
            self.last_tile_updated = None;
            if resume_at.is_some() {
                return;
            }
        }
    }

    fn update_tile_load_progress(&mut self) {
        let pending = self.tile_load_queue.len();
        if self.last_tile_load_queue_length != Some(pending) {
            self.last_tile_load_queue_length = Some(pending);
            bevy::log::debug!("{} tiles waiting to load", pending);
            self.tile_load_progress.push(pending);
        }
    }
}

/// The terrain surface below `position` in the coordinates of the scene mode, or `None` when
/// the tile does not contain it.
fn surface_position(
    terrain_data: &dyn TerrainData,
    rectangle: &Rectangle,
    position: &Cartographic,
    frame_state: &FrameState,
) -> Option<DVec3> {
    let height = terrain_data.interpolate_height(rectangle, position.longitude, position.latitude)?;
    let surface = Cartographic::new(
        position.longitude,
        position.latitude,
        height * frame_state.terrain_exaggeration,
    );
    if frame_state.mode == SceneMode::Scene3D {
        return Some(frame_state.ellipsoid().cartographic_to_cartesian(&surface));
    }
    let projected = frame_state.map_projection.project(&surface);
    Some(DVec3::new(projected.z, projected.x, projected.y))
}

/// How many pixels the tile's geometric error covers on screen.
fn screen_space_error(
    tile_provider: &GlobeSurfaceTileProvider,
    tile: &QuadtreeTile,
    frame_state: &FrameState,
) -> f64 {
    let max_geometric_error = tile_provider.get_level_maximum_geometric_error(tile.key.level);
    let viewport = frame_state.viewport.as_dvec2();
    if frame_state.mode == SceneMode::Scene2D {
        let frustum = frame_state.camera.frustum_2d;
        let pixel_size = (frustum.x / viewport.x).max(frustum.y / viewport.y);
        return max_geometric_error / pixel_size;
    }
    let sse_denominator = 2.0 * (frame_state.camera.frustum.fovy() * 0.5).tan();
    max_geometric_error * viewport.y / (tile.distance * sse_denominator)
}
