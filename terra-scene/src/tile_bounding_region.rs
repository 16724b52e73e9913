use bevy::math::DVec3;

use crate::{
    ellipsoid::Ellipsoid,
    math::{Cartographic, EPSILON15},
    plane::Plane,
    projection::Projection,
    rectangle::Rectangle,
};

/// The volume between two heights above a geographic rectangle, bounded on the sides by the
/// planes through the tile's edges. Used to find the distance from the camera to a tile.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TileBoundingRegion {
    pub rectangle: Rectangle,
    pub minimum_height: f64,
    pub maximum_height: f64,
    pub southwest_corner_cartesian: DVec3,
    pub northeast_corner_cartesian: DVec3,
    pub west_normal: DVec3,
    pub south_normal: DVec3,
    pub east_normal: DVec3,
    pub north_normal: DVec3,
}
impl TileBoundingRegion {
    pub fn new(
        rectangle: &Rectangle,
        minimum_height: f64,
        maximum_height: f64,
        ellipsoid: &Ellipsoid,
    ) -> Self {
        let mut region = Self {
            rectangle: *rectangle,
            minimum_height,
            maximum_height,
            ..Default::default()
        };
        region.compute_box(ellipsoid);
        region
    }

    fn compute_box(&mut self, ellipsoid: &Ellipsoid) {
        let rectangle = self.rectangle;
        self.southwest_corner_cartesian =
            ellipsoid.cartographic_to_cartesian(&rectangle.south_west());
        self.northeast_corner_cartesian =
            ellipsoid.cartographic_to_cartesian(&rectangle.north_east());

        let middle_latitude = (rectangle.south + rectangle.north) * 0.5;
        let western_midpoint = ellipsoid.cartographic_to_cartesian(&Cartographic::new(
            rectangle.west,
            middle_latitude,
            0.0,
        ));
        self.west_normal = western_midpoint.cross(DVec3::Z).normalize();

        let eastern_midpoint = ellipsoid.cartographic_to_cartesian(&Cartographic::new(
            rectangle.east,
            middle_latitude,
            0.0,
        ));
        self.east_normal = DVec3::Z.cross(eastern_midpoint).normalize();

        let west_vector = western_midpoint - eastern_midpoint;
        let east_west_normal = west_vector.normalize();
        let middle_longitude = (rectangle.west + rectangle.east) * 0.5;

        let south_surface_normal = if rectangle.south > 0.0 {
            // keep the southern plane from cutting through the tile
            let south_center = ellipsoid.cartographic_to_cartesian(&Cartographic::new(
                middle_longitude,
                rectangle.south,
                0.0,
            ));
            let west_plane =
                Plane::from_point_normal(self.southwest_corner_cartesian, self.west_normal);
            if let Some(corner) = ray_plane(south_center, east_west_normal, &west_plane) {
                self.southwest_corner_cartesian = corner;
            }
            ellipsoid.geodetic_surface_normal(south_center)
        } else {
            Some(ellipsoid.geodetic_surface_normal_cartographic(&rectangle.south_east()))
        };
        if let Some(normal) = south_surface_normal {
            self.south_normal = normal.cross(west_vector).normalize();
        }

        let north_surface_normal = if rectangle.north < 0.0 {
            let north_center = ellipsoid.cartographic_to_cartesian(&Cartographic::new(
                middle_longitude,
                rectangle.north,
                0.0,
            ));
            let east_plane =
                Plane::from_point_normal(self.northeast_corner_cartesian, self.east_normal);
            if let Some(corner) = ray_plane(north_center, -east_west_normal, &east_plane) {
                self.northeast_corner_cartesian = corner;
            }
            ellipsoid.geodetic_surface_normal(north_center)
        } else {
            Some(ellipsoid.geodetic_surface_normal_cartographic(&rectangle.north_west()))
        };
        if let Some(normal) = north_surface_normal {
            self.north_normal = west_vector.cross(normal).normalize();
        }
    }

    /// Distance from the camera to the closest point of the region, zero when inside.
    /// With a projection the region is measured in the planar `(height, x, y)` layout of the
    /// 2D and Columbus view modes instead of on the ellipsoid.
    pub fn distance_to_camera(
        &self,
        position_wc: DVec3,
        position_cartographic: &Cartographic,
        projection: Option<&dyn Projection>,
    ) -> f64 {
        let mut result = 0.0;
        if !self.rectangle.contains(position_cartographic) {
            let (southwest, northeast, west_normal, south_normal, east_normal, north_normal) =
                match projection {
                    Some(projection) => {
                        let southwest = projection.project(&self.rectangle.south_west());
                        let northeast = projection.project(&self.rectangle.north_east());
                        (
                            DVec3::new(0.0, southwest.x, southwest.y),
                            DVec3::new(0.0, northeast.x, northeast.y),
                            DVec3::NEG_Y,
                            DVec3::NEG_Z,
                            DVec3::Y,
                            DVec3::Z,
                        )
                    }
                    None => (
                        self.southwest_corner_cartesian,
                        self.northeast_corner_cartesian,
                        self.west_normal,
                        self.south_normal,
                        self.east_normal,
                        self.north_normal,
                    ),
                };

            let from_southwest = position_wc - southwest;
            let distance_to_west_plane = from_southwest.dot(west_normal);
            let distance_to_south_plane = from_southwest.dot(south_normal);

            let from_northeast = position_wc - northeast;
            let distance_to_east_plane = from_northeast.dot(east_normal);
            let distance_to_north_plane = from_northeast.dot(north_normal);

            if distance_to_west_plane > 0.0 {
                result += distance_to_west_plane * distance_to_west_plane;
            } else if distance_to_east_plane > 0.0 {
                result += distance_to_east_plane * distance_to_east_plane;
            }
            if distance_to_south_plane > 0.0 {
                result += distance_to_south_plane * distance_to_south_plane;
            } else if distance_to_north_plane > 0.0 {
                result += distance_to_north_plane * distance_to_north_plane;
            }
        }

        let (camera_height, minimum_height, maximum_height) = match projection {
            Some(_) => (position_wc.x, 0.0, 0.0),
            None => (
                position_cartographic.height,
                self.minimum_height,
                self.maximum_height,
            ),
        };
        if camera_height > maximum_height {
            let distance_above_top = camera_height - maximum_height;
            result += distance_above_top * distance_above_top;
        } else if camera_height < minimum_height {
            let distance_below_bottom = minimum_height - camera_height;
            result += distance_below_bottom * distance_below_bottom;
        }
        result.sqrt()
    }
}

fn ray_plane(origin: DVec3, direction: DVec3, plane: &Plane) -> Option<DVec3> {
    let denominator = plane.normal.dot(direction);
    if denominator.abs() < EPSILON15 {
        return None;
    }
    let t = (-plane.distance - plane.normal.dot(origin)) / denominator;
    if t < 0.0 {
        return None;
    }
    Some(origin + direction * t)
}
