use std::{fmt::Debug, sync::Arc};

use crate::{
    error::TerrainError, height_map_terrain::TerrainMesh, rectangle::Rectangle,
    tiling_scheme::TilingScheme,
};

/// Raw terrain for a single tile as delivered by a terrain provider.
pub trait TerrainData: Debug + Send + Sync {
    /// Builds the renderable mesh for the tile at `(x, y, level)`.
    fn create_mesh(
        &self,
        tiling_scheme: &dyn TilingScheme,
        x: u32,
        y: u32,
        level: u32,
        exaggeration: f64,
    ) -> Result<TerrainMesh, TerrainError>;

    /// Derives terrain for a descendant tile from this tile's data.
    fn upsample(
        &self,
        tiling_scheme: &dyn TilingScheme,
        this_x: u32,
        this_y: u32,
        this_level: u32,
        descendant_x: u32,
        descendant_y: u32,
        descendant_level: u32,
    ) -> Result<Arc<dyn TerrainData>, TerrainError>;

    /// Height in meters at a position inside `rectangle`, the extent of the tile this data
    /// belongs to. `None` outside the rectangle.
    fn interpolate_height(&self, rectangle: &Rectangle, longitude: f64, latitude: f64)
        -> Option<f64>;

    fn is_child_available(&self, this_x: u32, this_y: u32, child_x: u32, child_y: u32) -> bool;

    fn was_created_by_upsampling(&self) -> bool;

    fn water_mask(&self) -> Option<&[u8]> {
        None
    }
}
