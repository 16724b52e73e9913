use terra_scene::{GeographicTilingScheme, Rectangle, TilingScheme};

use super::imagery_provider::{ImageryImage, ImageryProvider, ImageryRequest};

/// Draws an outline around every tile of its tiling scheme. Handy for checking which imagery
/// tiles end up on which terrain tiles.
pub struct TileCoordinatesImageryProvider {
    pub tiling_scheme: Box<dyn TilingScheme>,
    pub color: [u8; 4],
    pub tile_width: u32,
    pub tile_height: u32,
    pub maximum_level: u32,
}
impl Default for TileCoordinatesImageryProvider {
    fn default() -> Self {
        Self::new(Box::new(GeographicTilingScheme::default()))
    }
}
impl TileCoordinatesImageryProvider {
    pub fn new(tiling_scheme: Box<dyn TilingScheme>) -> Self {
        Self {
            tiling_scheme,
            color: [255, 255, 0, 255],
            tile_width: 256,
            tile_height: 256,
            maximum_level: 30,
        }
    }

    fn draw_outline(&self) -> ImageryImage {
        let width = self.tile_width;
        let height = self.tile_height;
        let mut data = vec![0u8; (width * height * 4) as usize];
        for (index, pixel) in data.chunks_exact_mut(4).enumerate() {
            let column = index as u32 % width;
            let row = index as u32 / width;
            let on_edge = column < 2 || row < 2 || column + 2 >= width || row + 2 >= height;
            if on_edge {
                pixel.copy_from_slice(&self.color);
            }
        }
        ImageryImage::new(width, height, data)
    }
}
impl ImageryProvider for TileCoordinatesImageryProvider {
    fn get_tiling_scheme(&self) -> &dyn TilingScheme {
        self.tiling_scheme.as_ref()
    }
    fn get_rectangle(&self) -> Rectangle {
        self.tiling_scheme.get_rectangle()
    }
    fn get_ready(&self) -> bool {
        true
    }
    fn get_tile_width(&self) -> u32 {
        self.tile_width
    }
    fn get_tile_height(&self) -> u32 {
        self.tile_height
    }
    fn get_minimum_level(&self) -> u32 {
        0
    }
    fn get_maximum_level(&self) -> u32 {
        self.maximum_level
    }
    fn request_image(&self, _x: u32, _y: u32, _level: u32) -> Option<ImageryRequest> {
        let image = self.draw_outline();
        Some(Box::pin(async move { Ok(Some(image)) }))
    }
}
