use std::sync::OnceLock;

use terra_jobs::AsyncReturn;
use terra_scene::{Rectangle, TilingScheme};

use super::error::ProviderError;

/// A decoded RGBA8 image, rows from north to south.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageryImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}
impl ImageryImage {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }
}

/// `Ok(None)` means the provider has no image for the tile and never will.
pub type ImageryRequest = AsyncReturn<Result<Option<ImageryImage>, ProviderError>>;

/// Picks out received images that stand in for tiles the server does not have.
pub trait TileDiscardPolicy: Send + Sync {
    /// Received images wait until this returns true.
    fn is_ready(&self) -> bool;
    fn should_discard_image(&self, image: &ImageryImage) -> bool;
}

/// Discards images identical to the one the server returns for missing tiles. Ready once that
/// image is known.
#[derive(Debug, Default)]
pub struct DiscardMissingTileImagePolicy {
    missing_image: OnceLock<ImageryImage>,
}
impl DiscardMissingTileImagePolicy {
    pub fn new(missing_image: ImageryImage) -> Self {
        Self {
            missing_image: OnceLock::from(missing_image),
        }
    }
    /// Returns false if the missing image was already set.
    pub fn set_missing_image(&self, missing_image: ImageryImage) -> bool {
        self.missing_image.set(missing_image).is_ok()
    }
}
impl TileDiscardPolicy for DiscardMissingTileImagePolicy {
    fn is_ready(&self) -> bool {
        self.missing_image.get().is_some()
    }
    fn should_discard_image(&self, image: &ImageryImage) -> bool {
        self.missing_image.get() == Some(image)
    }
}

pub trait ImageryProvider: Send + Sync {
    fn get_tiling_scheme(&self) -> &dyn TilingScheme;
    fn get_rectangle(&self) -> Rectangle;
    fn get_ready(&self) -> bool;
    fn get_tile_width(&self) -> u32;
    fn get_tile_height(&self) -> u32;
    fn get_minimum_level(&self) -> u32;
    fn get_maximum_level(&self) -> u32;
    /// Starts fetching the image for a tile. `None` means the request was throttled and should
    /// be retried on a later frame.
    fn request_image(&self, x: u32, y: u32, level: u32) -> Option<ImageryRequest>;
    fn get_tile_discard_policy(&self) -> Option<&dyn TileDiscardPolicy> {
        None
    }
}
