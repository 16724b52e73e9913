use std::sync::atomic::{AtomicU64, Ordering};

use terra_scene::{Rectangle, TileKey};

use super::{
    globe_surface_tile::GlobeSurfaceTile, imagery_layer_collection::ImageryLayerCollection,
    render_context::VertexArray,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum QuadtreeTileLoadState {
    Start,
    Loading,
    Done,
    Failed,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Quadrant {
    Northwest,
    Northeast,
    Southwest,
    Southeast,
    Root(usize),
}
impl Quadrant {
    /// In the order of [`TileKey::children`].
    pub const CHILDREN: [Quadrant; 4] = [
        Quadrant::Northwest,
        Quadrant::Northeast,
        Quadrant::Southwest,
        Quadrant::Southeast,
    ];
}

static NEXT_EPOCH: AtomicU64 = AtomicU64::new(1);

fn next_epoch() -> u64 {
    NEXT_EPOCH.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug)]
pub struct QuadtreeTile {
    pub key: TileKey,
    pub location: Quadrant,
    pub parent: Option<TileKey>,
    /// Created all at once on first access, see [`QuadtreeTileStorage::children`].
    ///
    /// [`QuadtreeTileStorage::children`]: super::quadtree_tile_storage::QuadtreeTileStorage::children
    pub children: Option<[TileKey; 4]>,
    pub rectangle: Rectangle,
    pub state: QuadtreeTileLoadState,
    pub renderable: bool,
    pub upsampled_from_parent: bool,
    pub distance: f64,
    pub frame_rendered: Option<u32>,
    pub data: Option<GlobeSurfaceTile>,
    epoch: u64,
}
impl QuadtreeTile {
    pub fn new(
        key: TileKey,
        location: Quadrant,
        parent: Option<TileKey>,
        rectangle: Rectangle,
    ) -> Self {
        Self {
            key,
            location,
            parent,
            children: None,
            rectangle,
            state: QuadtreeTileLoadState::Start,
            renderable: false,
            upsampled_from_parent: false,
            distance: 0.0,
            frame_rendered: None,
            data: None,
            epoch: next_epoch(),
        }
    }
    /// Changes whenever the tile's resources are freed, so work started for the old
    /// resources can be told apart.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
    pub fn needs_loading(&self) -> bool {
        self.state < QuadtreeTileLoadState::Done
    }
    pub fn eligible_for_unloading(&self, imagery_layers: &ImageryLayerCollection) -> bool {
        self.data
            .as_ref()
            .map_or(true, |data| data.eligible_for_unloading(imagery_layers))
    }

    /// Frees this tile's own payload. Children are handled by the storage.
    pub fn free_resources(
        &mut self,
        imagery_layers: &mut ImageryLayerCollection,
        vertex_arrays_to_destroy: &mut Vec<VertexArray>,
    ) {
        self.state = QuadtreeTileLoadState::Start;
        self.renderable = false;
        self.upsampled_from_parent = false;
        if let Some(mut data) = self.data.take() {
            data.free_resources(imagery_layers, vertex_arrays_to_destroy);
        }
        self.epoch = next_epoch();
    }
}
impl PartialEq for QuadtreeTile {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}
