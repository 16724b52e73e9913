use std::sync::Arc;

use terra_scene::{
    get_estimated_level_zero_geometric_error_for_a_heightmap, GeographicTilingScheme,
    HeightmapTerrainData, TerrainData, TilingScheme,
};

use super::{
    error::ProviderError,
    terrain_provider::{TerrainProvider, TerrainRequest},
};

const HEIGHTMAP_SIZE: u32 = 64;

/// Serves a flat heightmap at height zero for every tile, so the globe is the bare ellipsoid.
pub struct EllipsoidTerrainProvider {
    tiling_scheme: Arc<dyn TilingScheme>,
    level_zero_maximum_geometric_error: f64,
}
impl Default for EllipsoidTerrainProvider {
    fn default() -> Self {
        Self::new(Arc::new(GeographicTilingScheme::default()))
    }
}
impl EllipsoidTerrainProvider {
    pub fn new(tiling_scheme: Arc<dyn TilingScheme>) -> Self {
        let level_zero_maximum_geometric_error =
            get_estimated_level_zero_geometric_error_for_a_heightmap(
                &tiling_scheme.get_ellipsoid(),
                HEIGHTMAP_SIZE,
                tiling_scheme.get_number_of_x_tiles_at_level(0),
            );
        Self {
            tiling_scheme,
            level_zero_maximum_geometric_error,
        }
    }
}
impl TerrainProvider for EllipsoidTerrainProvider {
    fn get_tiling_scheme(&self) -> Arc<dyn TilingScheme> {
        self.tiling_scheme.clone()
    }
    fn get_ready(&self) -> bool {
        true
    }
    fn get_has_water_mask(&self) -> bool {
        false
    }
    fn get_has_vertex_normals(&self) -> bool {
        false
    }
    fn get_level_maximum_geometric_error(&self, level: u32) -> f64 {
        self.level_zero_maximum_geometric_error / (1u64 << level.min(63)) as f64
    }
    fn get_tile_data_available(&self, _x: u32, _y: u32, _level: u32) -> Option<bool> {
        None
    }
    fn request_tile_geometry(&self, _x: u32, _y: u32, _level: u32) -> Option<TerrainRequest> {
        Some(Box::pin(async move {
            let size = HEIGHTMAP_SIZE;
            let data = HeightmapTerrainData::new(vec![0.0; (size * size) as usize], size, size)?;
            Ok::<Arc<dyn TerrainData>, ProviderError>(Arc::new(data))
        }))
    }
}
