use std::sync::Arc;

use bevy::utils::HashMap;
use terra_scene::{TileKey, TilingScheme};

use super::{
    imagery_layer_collection::ImageryLayerCollection,
    quadtree_tile::{Quadrant, QuadtreeTile},
    render_context::VertexArray,
    tile_terrain::{TerrainSlot, TerrainTicket, TileTerrain},
};

/// Arena of every tile currently in memory, keyed by [`TileKey`].
pub struct QuadtreeTileStorage {
    map: HashMap<TileKey, QuadtreeTile>,
    root: Vec<TileKey>,
    tiling_scheme: Arc<dyn TilingScheme>,
    pub(super) vertex_arrays_to_destroy: Vec<VertexArray>,
}
impl QuadtreeTileStorage {
    pub fn new(tiling_scheme: Arc<dyn TilingScheme>) -> Self {
        Self {
            map: HashMap::new(),
            root: vec![],
            tiling_scheme,
            vertex_arrays_to_destroy: vec![],
        }
    }
    pub fn get_tiling_scheme(&self) -> &Arc<dyn TilingScheme> {
        &self.tiling_scheme
    }
    pub fn len(&self) -> usize {
        self.map.len()
    }
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
    pub fn root(&self) -> &[TileKey] {
        &self.root
    }
    #[inline]
    pub fn get(&self, key: &TileKey) -> Option<&QuadtreeTile> {
        self.map.get(key)
    }
    #[inline]
    pub fn get_mut(&mut self, key: &TileKey) -> Option<&mut QuadtreeTile> {
        self.map.get_mut(key)
    }
    pub fn iter(&self) -> impl Iterator<Item = &QuadtreeTile> {
        self.map.values()
    }

    pub fn create_level_zero_tiles(&mut self) {
        let number_of_level_zero_tiles_x = self.tiling_scheme.get_number_of_x_tiles_at_level(0);
        let number_of_level_zero_tiles_y = self.tiling_scheme.get_number_of_y_tiles_at_level(0);
        for y in 0..number_of_level_zero_tiles_y {
            for x in 0..number_of_level_zero_tiles_x {
                let key = TileKey::new(x, y, 0);
                let rectangle = self.tiling_scheme.tile_x_y_to_rectangle(x, y, 0);
                let tile = QuadtreeTile::new(key, Quadrant::Root(self.root.len()), None, rectangle);
                self.map.insert(key, tile);
                self.root.push(key);
            }
        }
    }

    /// The four children of `key`, created on first access.
    pub fn children(&mut self, key: &TileKey) -> Option<[TileKey; 4]> {
        let tile = self.map.get(key)?;
        if let Some(children) = tile.children {
            return Some(children);
        }
        let children = key.children();
        for (child, location) in children.iter().zip(Quadrant::CHILDREN) {
            let rectangle = self
                .tiling_scheme
                .tile_x_y_to_rectangle(child.x, child.y, child.level);
            self.map
                .insert(*child, QuadtreeTile::new(*child, location, Some(*key), rectangle));
        }
        self.map.get_mut(key)?.children = Some(children);
        Some(children)
    }

    /// Frees the tile's payload and discards its descendants. Returns the keys of the
    /// discarded descendants.
    pub fn free_resources(
        &mut self,
        key: &TileKey,
        imagery_layers: &mut ImageryLayerCollection,
    ) -> Vec<TileKey> {
        let mut removed = vec![];
        let Some(tile) = self.map.get_mut(key) else {
            return removed;
        };
        tile.free_resources(imagery_layers, &mut self.vertex_arrays_to_destroy);
        if let Some(children) = tile.children.take() {
            for child in children {
                removed.extend(self.free_resources(&child, imagery_layers));
                self.map.remove(&child);
                removed.push(child);
            }
        }
        removed
    }

    /// Frees every tile and forgets the roots.
    pub fn clear(&mut self, imagery_layers: &mut ImageryLayerCollection) {
        let root = std::mem::take(&mut self.root);
        for key in root.iter() {
            self.free_resources(key, imagery_layers);
        }
        self.map.clear();
    }

    /// The terrain a job was started for, if it is still installed on a live tile.
    pub fn find_terrain_mut(&mut self, ticket: &TerrainTicket) -> Option<&mut TileTerrain> {
        let tile = self.map.get_mut(&ticket.key)?;
        if tile.epoch() != ticket.epoch {
            return None;
        }
        let data = tile.data.as_mut()?;
        let terrain = match ticket.slot {
            TerrainSlot::Loaded => data.loaded_terrain.as_mut()?,
            TerrainSlot::Upsampled => data.upsampled_terrain.as_mut()?,
        };
        (terrain.generation() == ticket.generation).then_some(terrain)
    }

    pub fn take_vertex_arrays_to_destroy(&mut self) -> Vec<VertexArray> {
        std::mem::take(&mut self.vertex_arrays_to_destroy)
    }
}
