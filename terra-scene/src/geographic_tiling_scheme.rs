use bevy::math::UVec2;

use crate::{
    ellipsoid::Ellipsoid, geographic_projection::GeographicProjection, math::Cartographic,
    projection::Projection, rectangle::Rectangle, tiling_scheme::TilingScheme,
};

/// Equal-angle tiling, two root tiles side by side by default.
#[derive(Debug, Clone)]
pub struct GeographicTilingScheme {
    pub ellipsoid: Ellipsoid,
    pub rectangle: Rectangle,
    pub projection: GeographicProjection,
    pub number_of_level_zero_tiles_x: u32,
    pub number_of_level_zero_tiles_y: u32,
}
pub struct GeographicTilingSchemeOptions {
    pub ellipsoid: Ellipsoid,
    pub rectangle: Rectangle,
    pub number_of_level_zero_tiles_x: u32,
    pub number_of_level_zero_tiles_y: u32,
}
impl Default for GeographicTilingSchemeOptions {
    fn default() -> Self {
        Self {
            ellipsoid: Ellipsoid::wgs84(),
            rectangle: Rectangle::MAX_VALUE,
            number_of_level_zero_tiles_x: 2,
            number_of_level_zero_tiles_y: 1,
        }
    }
}
impl Default for GeographicTilingScheme {
    fn default() -> Self {
        Self::new(GeographicTilingSchemeOptions::default())
    }
}
impl GeographicTilingScheme {
    pub fn new(options: GeographicTilingSchemeOptions) -> Self {
        Self {
            ellipsoid: options.ellipsoid,
            rectangle: options.rectangle,
            projection: GeographicProjection::from_ellipsoid(&options.ellipsoid),
            number_of_level_zero_tiles_x: options.number_of_level_zero_tiles_x,
            number_of_level_zero_tiles_y: options.number_of_level_zero_tiles_y,
        }
    }
}
impl TilingScheme for GeographicTilingScheme {
    fn get_name(&self) -> &'static str {
        "GeographicTilingScheme"
    }
    fn get_ellipsoid(&self) -> Ellipsoid {
        self.ellipsoid
    }
    fn get_rectangle(&self) -> Rectangle {
        self.rectangle
    }
    fn get_projection(&self) -> &dyn Projection {
        &self.projection
    }
    fn get_number_of_x_tiles_at_level(&self, level: u32) -> u32 {
        self.number_of_level_zero_tiles_x << level
    }
    fn get_number_of_y_tiles_at_level(&self, level: u32) -> u32 {
        self.number_of_level_zero_tiles_y << level
    }
    fn rectangle_to_native_rectangle(&self, rectangle: &Rectangle) -> Rectangle {
        Rectangle::new(
            rectangle.west.to_degrees(),
            rectangle.south.to_degrees(),
            rectangle.east.to_degrees(),
            rectangle.north.to_degrees(),
        )
    }
    fn tile_x_y_to_native_rectangle(&self, x: u32, y: u32, level: u32) -> Rectangle {
        self.rectangle_to_native_rectangle(&self.tile_x_y_to_rectangle(x, y, level))
    }
    fn tile_x_y_to_rectangle(&self, x: u32, y: u32, level: u32) -> Rectangle {
        let rectangle = self.rectangle;

        let x_tiles = self.get_number_of_x_tiles_at_level(level);
        let y_tiles = self.get_number_of_y_tiles_at_level(level);

        let x_tile_width = rectangle.compute_width() / x_tiles as f64;
        let west = x as f64 * x_tile_width + rectangle.west;
        let east = (x + 1) as f64 * x_tile_width + rectangle.west;

        let y_tile_height = rectangle.compute_height() / y_tiles as f64;
        let north = rectangle.north - y as f64 * y_tile_height;
        let south = rectangle.north - (y + 1) as f64 * y_tile_height;
        Rectangle::new(west, south, east, north)
    }
    fn position_to_tile_x_y(&self, position: &Cartographic, level: u32) -> Option<UVec2> {
        let rectangle = self.rectangle;
        if !rectangle.contains(position) {
            return None;
        }
        let x_tiles = self.get_number_of_x_tiles_at_level(level);
        let y_tiles = self.get_number_of_y_tiles_at_level(level);

        let x_tile_width = rectangle.compute_width() / x_tiles as f64;
        let y_tile_height = rectangle.compute_height() / y_tiles as f64;

        let mut longitude = position.longitude;
        if rectangle.east < rectangle.west {
            longitude += std::f64::consts::TAU;
        }

        let x_tile_coordinate =
            (((longitude - rectangle.west) / x_tile_width).floor().max(0.0) as u32).min(x_tiles - 1);
        let y_tile_coordinate = (((rectangle.north - position.latitude) / y_tile_height)
            .floor()
            .max(0.0) as u32)
            .min(y_tiles - 1);
        Some(UVec2::new(x_tile_coordinate, y_tile_coordinate))
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::{FRAC_PI_2, PI};

    use super::*;
    use crate::math::{equals_epsilon, EPSILON10, EPSILON15};

    fn two_by_two() -> GeographicTilingScheme {
        GeographicTilingScheme::new(GeographicTilingSchemeOptions {
            number_of_level_zero_tiles_x: 2,
            number_of_level_zero_tiles_y: 2,
            ..Default::default()
        })
    }

    #[test]
    fn return_full_rectangle_for_single_root_tile() {
        let tiling_scheme = GeographicTilingScheme::new(GeographicTilingSchemeOptions {
            number_of_level_zero_tiles_x: 1,
            number_of_level_zero_tiles_y: 1,
            ..Default::default()
        });
        let rectangle = tiling_scheme.tile_x_y_to_rectangle(0, 0, 0);
        assert!(rectangle.equals_epsilon(&tiling_scheme.rectangle, EPSILON10));
    }

    #[test]
    fn tiles_are_numbered_from_the_northwest_corner() {
        let tiling_scheme = two_by_two();
        let northwest = tiling_scheme.tile_x_y_to_rectangle(0, 0, 1);
        let northeast = tiling_scheme.tile_x_y_to_rectangle(1, 0, 1);
        let southeast = tiling_scheme.tile_x_y_to_rectangle(1, 1, 1);
        let southwest = tiling_scheme.tile_x_y_to_rectangle(0, 1, 1);

        assert_eq!(northeast.north, northwest.north);
        assert_eq!(southeast.south, southwest.south);
        assert_eq!(northwest.west, southwest.west);
        assert_eq!(northeast.east, southeast.east);

        assert!(northeast.north > southeast.north);
        assert!(northwest.south > southwest.south);
        assert!(northeast.east > northwest.east);
        assert!(southeast.west > southwest.west);
    }

    #[test]
    fn adjacent_tiles_have_overlapping_coordinates() {
        let tiling_scheme = two_by_two();
        let northwest = tiling_scheme.tile_x_y_to_rectangle(0, 0, 1);
        let northeast = tiling_scheme.tile_x_y_to_rectangle(1, 0, 1);
        let southeast = tiling_scheme.tile_x_y_to_rectangle(1, 1, 1);
        let southwest = tiling_scheme.tile_x_y_to_rectangle(0, 1, 1);
        assert!(equals_epsilon(
            northeast.south,
            southeast.north,
            Some(EPSILON15),
            None
        ));
        assert!(equals_epsilon(
            northwest.south,
            southwest.north,
            Some(EPSILON15),
            None
        ));
        assert!(equals_epsilon(
            northeast.west,
            northwest.east,
            Some(EPSILON15),
            None
        ));
    }

    #[test]
    fn tile_011() {
        let tiling_scheme = GeographicTilingScheme::default();
        let rectangle = tiling_scheme.tile_x_y_to_rectangle(0, 1, 1);
        assert!(equals_epsilon(rectangle.east, -FRAC_PI_2, Some(EPSILON15), None));
        assert!(equals_epsilon(rectangle.west, -PI, Some(EPSILON15), None));
        assert!(equals_epsilon(rectangle.north, 0.0, Some(EPSILON15), None));
        assert!(equals_epsilon(rectangle.south, -FRAC_PI_2, Some(EPSILON15), None));
    }

    #[test]
    fn position_to_tile_x_y_finds_containing_tile() {
        let tiling_scheme = GeographicTilingScheme::default();
        let position = Cartographic::from_degrees(100.0, -30.0, 0.0);
        assert_eq!(
            tiling_scheme.position_to_tile_x_y(&position, 0),
            Some(UVec2::new(1, 0))
        );
        assert_eq!(
            tiling_scheme.position_to_tile_x_y(&position, 1),
            Some(UVec2::new(3, 1))
        );
        let outside = Cartographic::new(0.0, 2.0, 0.0);
        assert_eq!(tiling_scheme.position_to_tile_x_y(&outside, 0), None);
    }

    #[test]
    fn level_zero_tile_counts() {
        let tiling_scheme = GeographicTilingScheme::default();
        assert_eq!(tiling_scheme.get_number_of_x_tiles_at_level(0), 2);
        assert_eq!(tiling_scheme.get_number_of_y_tiles_at_level(0), 1);
        assert_eq!(tiling_scheme.get_number_of_tiles_at_level(2), 32);
    }
}
