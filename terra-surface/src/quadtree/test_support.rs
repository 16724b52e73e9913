use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use terra_jobs::JobQueue;
use terra_scene::{GeographicTilingScheme, Rectangle, TilingScheme};

use super::{
    ellipsoid_terrain_provider::EllipsoidTerrainProvider,
    error::ProviderError,
    imagery_provider::{
        DiscardMissingTileImagePolicy, ImageryImage, ImageryProvider, ImageryRequest,
        TileDiscardPolicy,
    },
    terrain_provider::{TerrainProvider, TerrainRequest},
};

/// Polls until every spawned job has handed back its outcome.
pub fn wait_for_jobs(jobs: &mut JobQueue) {
    for _ in 0..2500 {
        jobs.poll();
        if jobs.in_progress_count() == 0 {
            return;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    panic!("{} jobs did not finish in time", jobs.in_progress_count());
}

/// Geographic imagery answering every request with a one pixel image.
pub struct TestImageryProvider {
    tiling_scheme: GeographicTilingScheme,
    tile_size: u32,
    ready: Arc<AtomicBool>,
    throttled: AtomicBool,
    discard_policy: Option<Arc<DiscardMissingTileImagePolicy>>,
}
impl TestImageryProvider {
    pub fn with_tile_size(tile_size: u32) -> Self {
        Self {
            tiling_scheme: GeographicTilingScheme::default(),
            tile_size,
            ready: Arc::new(AtomicBool::new(true)),
            throttled: AtomicBool::new(false),
            discard_policy: None,
        }
    }
    pub fn with_discard_policy(mut self, policy: Arc<DiscardMissingTileImagePolicy>) -> Self {
        self.discard_policy = Some(policy);
        self
    }
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Relaxed);
    }
    /// While throttled every request is refused.
    pub fn set_throttled(&self, throttled: bool) {
        self.throttled.store(throttled, Ordering::Relaxed);
    }
    /// Lets a test flip readiness after the provider was moved into a layer.
    pub fn ready_flag(&self) -> Arc<AtomicBool> {
        self.ready.clone()
    }
}
impl ImageryProvider for TestImageryProvider {
    fn get_tiling_scheme(&self) -> &dyn TilingScheme {
        &self.tiling_scheme
    }
    fn get_rectangle(&self) -> Rectangle {
        self.tiling_scheme.get_rectangle()
    }
    fn get_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }
    fn get_tile_width(&self) -> u32 {
        self.tile_size
    }
    fn get_tile_height(&self) -> u32 {
        self.tile_size
    }
    fn get_minimum_level(&self) -> u32 {
        0
    }
    fn get_maximum_level(&self) -> u32 {
        20
    }
    fn request_image(&self, _x: u32, _y: u32, _level: u32) -> Option<ImageryRequest> {
        if self.throttled.load(Ordering::Relaxed) {
            return None;
        }
        Some(Box::pin(async move {
            Ok(Some(ImageryImage::new(1, 1, vec![255; 4])))
        }))
    }
    fn get_tile_discard_policy(&self) -> Option<&dyn TileDiscardPolicy> {
        self.discard_policy
            .as_deref()
            .map(|policy| policy as &dyn TileDiscardPolicy)
    }
}

/// Ellipsoid terrain whose requests all fail.
#[derive(Default)]
pub struct OfflineTerrainProvider {
    inner: EllipsoidTerrainProvider,
}
impl TerrainProvider for OfflineTerrainProvider {
    fn get_tiling_scheme(&self) -> Arc<dyn TilingScheme> {
        self.inner.get_tiling_scheme()
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
        self.inner.get_level_maximum_geometric_error(level)
    }
    fn get_tile_data_available(&self, x: u32, y: u32, level: u32) -> Option<bool> {
        self.inner.get_tile_data_available(x, y, level)
    }
    fn request_tile_geometry(&self, _x: u32, _y: u32, _level: u32) -> Option<TerrainRequest> {
        Some(Box::pin(async move {
            Err(ProviderError::RequestFailed("offline".into()))
        }))
    }
}
