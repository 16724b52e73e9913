use std::f64::consts::PI;

use bevy::math::{DVec2, DVec3, UVec2};

use crate::{
    ellipsoid::Ellipsoid, math::Cartographic, projection::Projection, rectangle::Rectangle,
    tiling_scheme::TilingScheme, web_mercator_projection::WebMercatorProjection,
};

/// Square tiling in web mercator meters, one root tile by default.
#[derive(Debug, Clone)]
pub struct WebMercatorTilingScheme {
    pub ellipsoid: Ellipsoid,
    pub rectangle: Rectangle,
    pub projection: WebMercatorProjection,
    pub number_of_level_zero_tiles_x: u32,
    pub number_of_level_zero_tiles_y: u32,
    rectangle_southwest_in_meters: DVec2,
    rectangle_northeast_in_meters: DVec2,
}
pub struct WebMercatorTilingSchemeOptions {
    pub ellipsoid: Ellipsoid,
    pub number_of_level_zero_tiles_x: u32,
    pub number_of_level_zero_tiles_y: u32,
    pub rectangle_southwest_in_meters: Option<DVec2>,
    pub rectangle_northeast_in_meters: Option<DVec2>,
}
impl Default for WebMercatorTilingSchemeOptions {
    fn default() -> Self {
        Self {
            ellipsoid: Ellipsoid::wgs84(),
            number_of_level_zero_tiles_x: 1,
            number_of_level_zero_tiles_y: 1,
            rectangle_southwest_in_meters: None,
            rectangle_northeast_in_meters: None,
        }
    }
}
impl Default for WebMercatorTilingScheme {
    fn default() -> Self {
        Self::new(WebMercatorTilingSchemeOptions::default())
    }
}
impl WebMercatorTilingScheme {
    pub fn new(options: WebMercatorTilingSchemeOptions) -> Self {
        let projection = WebMercatorProjection::from_ellipsoid(&options.ellipsoid);
        let (southwest_in_meters, northeast_in_meters) = match (
            options.rectangle_southwest_in_meters,
            options.rectangle_northeast_in_meters,
        ) {
            (Some(southwest), Some(northeast)) => (southwest, northeast),
            _ => {
                let semimajor_axis_times_pi = options.ellipsoid.maximum_radius * PI;
                (
                    DVec2::new(-semimajor_axis_times_pi, -semimajor_axis_times_pi),
                    DVec2::new(semimajor_axis_times_pi, semimajor_axis_times_pi),
                )
            }
        };
        let southwest = projection.un_project(&southwest_in_meters.extend(0.0));
        let northeast = projection.un_project(&northeast_in_meters.extend(0.0));
        Self {
            ellipsoid: options.ellipsoid,
            rectangle: Rectangle::new(
                southwest.longitude,
                southwest.latitude,
                northeast.longitude,
                northeast.latitude,
            ),
            projection,
            number_of_level_zero_tiles_x: options.number_of_level_zero_tiles_x,
            number_of_level_zero_tiles_y: options.number_of_level_zero_tiles_y,
            rectangle_southwest_in_meters: southwest_in_meters,
            rectangle_northeast_in_meters: northeast_in_meters,
        }
    }
}
impl TilingScheme for WebMercatorTilingScheme {
    fn get_name(&self) -> &'static str {
        "WebMercatorTilingScheme"
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
        let southwest = self.projection.project(&rectangle.south_west());
        let northeast = self.projection.project(&rectangle.north_east());
        Rectangle::new(southwest.x, southwest.y, northeast.x, northeast.y)
    }
    fn tile_x_y_to_native_rectangle(&self, x: u32, y: u32, level: u32) -> Rectangle {
        let x_tiles = self.get_number_of_x_tiles_at_level(level);
        let y_tiles = self.get_number_of_y_tiles_at_level(level);
        let southwest = self.rectangle_southwest_in_meters;
        let northeast = self.rectangle_northeast_in_meters;

        let x_tile_width = (northeast.x - southwest.x) / x_tiles as f64;
        let west = x as f64 * x_tile_width + southwest.x;
        let east = (x + 1) as f64 * x_tile_width + southwest.x;

        let y_tile_height = (northeast.y - southwest.y) / y_tiles as f64;
        let north = northeast.y - y as f64 * y_tile_height;
        let south = northeast.y - (y + 1) as f64 * y_tile_height;
        Rectangle::new(west, south, east, north)
    }
    fn tile_x_y_to_rectangle(&self, x: u32, y: u32, level: u32) -> Rectangle {
        let native = self.tile_x_y_to_native_rectangle(x, y, level);
        let southwest = self
            .projection
            .un_project(&DVec3::new(native.west, native.south, 0.0));
        let northeast = self
            .projection
            .un_project(&DVec3::new(native.east, native.north, 0.0));
        Rectangle::new(
            southwest.longitude,
            southwest.latitude,
            northeast.longitude,
            northeast.latitude,
        )
    }
    fn position_to_tile_x_y(&self, position: &Cartographic, level: u32) -> Option<UVec2> {
        if !self.rectangle.contains(position) {
            return None;
        }
        let x_tiles = self.get_number_of_x_tiles_at_level(level);
        let y_tiles = self.get_number_of_y_tiles_at_level(level);
        let southwest = self.rectangle_southwest_in_meters;
        let northeast = self.rectangle_northeast_in_meters;

        let x_tile_width = (northeast.x - southwest.x) / x_tiles as f64;
        let y_tile_height = (northeast.y - southwest.y) / y_tiles as f64;

        let web_mercator_position = self.projection.project(position);
        let distance_from_west = web_mercator_position.x - southwest.x;
        let distance_from_north = northeast.y - web_mercator_position.y;

        let x_tile_coordinate =
            ((distance_from_west / x_tile_width).floor().max(0.0) as u32).min(x_tiles - 1);
        let y_tile_coordinate =
            ((distance_from_north / y_tile_height).floor().max(0.0) as u32).min(y_tiles - 1);
        Some(UVec2::new(x_tile_coordinate, y_tile_coordinate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{equals_epsilon, EPSILON10};

    #[test]
    fn root_tile_covers_the_scheme_rectangle() {
        let tiling_scheme = WebMercatorTilingScheme::default();
        let rectangle = tiling_scheme.tile_x_y_to_rectangle(0, 0, 0);
        assert!(rectangle.equals_epsilon(&tiling_scheme.rectangle, EPSILON10));
        assert!(equals_epsilon(
            tiling_scheme.rectangle.north,
            WebMercatorProjection::MAXIMUM_LATITUDE,
            Some(EPSILON10),
            None
        ));
    }

    #[test]
    fn native_rectangle_is_square_in_meters() {
        let tiling_scheme = WebMercatorTilingScheme::default();
        let native = tiling_scheme.tile_x_y_to_native_rectangle(0, 0, 0);
        assert!(equals_epsilon(
            native.compute_width(),
            native.compute_height(),
            Some(EPSILON10),
            None
        ));
    }

    #[test]
    fn position_to_tile_x_y_at_level_one() {
        let tiling_scheme = WebMercatorTilingScheme::default();
        let position = Cartographic::from_degrees(-45.0, 45.0, 0.0);
        assert_eq!(
            tiling_scheme.position_to_tile_x_y(&position, 1),
            Some(UVec2::new(0, 0))
        );
        let position = Cartographic::from_degrees(45.0, -45.0, 0.0);
        assert_eq!(
            tiling_scheme.position_to_tile_x_y(&position, 1),
            Some(UVec2::new(1, 1))
        );
    }
}
