use std::sync::Arc;

use terra_jobs::AsyncReturn;
use terra_scene::{TerrainData, TilingScheme};

use super::error::ProviderError;

pub type TerrainRequest = AsyncReturn<Result<Arc<dyn TerrainData>, ProviderError>>;

pub trait TerrainProvider: Send + Sync {
    fn get_tiling_scheme(&self) -> Arc<dyn TilingScheme>;
    fn get_ready(&self) -> bool;
    fn get_has_water_mask(&self) -> bool;
    fn get_has_vertex_normals(&self) -> bool;
    /// Geometric error, in meters, of the coarsest tiles at `level`.
    fn get_level_maximum_geometric_error(&self, level: u32) -> f64;
    /// `None` when the provider cannot tell without fetching.
    fn get_tile_data_available(&self, x: u32, y: u32, level: u32) -> Option<bool>;
    /// Starts fetching the terrain for a tile. `None` means the request was throttled and
    /// should be retried on a later frame.
    fn request_tile_geometry(&self, x: u32, y: u32, level: u32) -> Option<TerrainRequest>;
}
