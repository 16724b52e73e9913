use std::fmt::Debug;

use bevy::math::UVec2;

use crate::{ellipsoid::Ellipsoid, math::Cartographic, projection::Projection, rectangle::Rectangle};

/// Addresses tiles by `(x, y, level)` with `(0, 0)` in the north-west corner and maps them to
/// geographic or native (projected) rectangles.
pub trait TilingScheme: Debug + Send + Sync {
    fn get_name(&self) -> &'static str;
    fn get_ellipsoid(&self) -> Ellipsoid;
    fn get_rectangle(&self) -> Rectangle;
    fn get_projection(&self) -> &dyn Projection;
    fn get_number_of_x_tiles_at_level(&self, level: u32) -> u32;
    fn get_number_of_y_tiles_at_level(&self, level: u32) -> u32;
    fn get_number_of_tiles_at_level(&self, level: u32) -> u32 {
        self.get_number_of_x_tiles_at_level(level) * self.get_number_of_y_tiles_at_level(level)
    }
    fn rectangle_to_native_rectangle(&self, rectangle: &Rectangle) -> Rectangle;
    fn tile_x_y_to_native_rectangle(&self, x: u32, y: u32, level: u32) -> Rectangle;
    fn tile_x_y_to_rectangle(&self, x: u32, y: u32, level: u32) -> Rectangle;
    /// Returns `None` when the position lies outside the scheme's rectangle.
    fn position_to_tile_x_y(&self, position: &Cartographic, level: u32) -> Option<UVec2>;
}
