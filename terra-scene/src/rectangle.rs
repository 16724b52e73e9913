use std::f64::consts::{FRAC_PI_2, PI, TAU};

use bevy::math::DVec3;
use serde::{Deserialize, Serialize};

use crate::{
    ellipsoid::Ellipsoid,
    math::{equals_epsilon, negative_pi_to_pi, Cartographic, EPSILON14},
};

/// A geographic extent in radians. `east < west` means the rectangle crosses the
/// anti-meridian.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rectangle {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}
impl Rectangle {
    pub const MAX_VALUE: Rectangle = Rectangle {
        west: -PI,
        south: -FRAC_PI_2,
        east: PI,
        north: FRAC_PI_2,
    };
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }
    pub fn from_degrees(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self::new(
            west.to_radians(),
            south.to_radians(),
            east.to_radians(),
            north.to_radians(),
        )
    }
    pub fn compute_width(&self) -> f64 {
        let mut east = self.east;
        if east < self.west {
            east += TAU;
        }
        east - self.west
    }
    pub fn compute_height(&self) -> f64 {
        self.north - self.south
    }
    pub fn equals_epsilon(&self, right: &Rectangle, absolute_epsilon: f64) -> bool {
        (self.west - right.west).abs() <= absolute_epsilon
            && (self.south - right.south).abs() <= absolute_epsilon
            && (self.east - right.east).abs() <= absolute_epsilon
            && (self.north - right.north).abs() <= absolute_epsilon
    }
    pub fn south_west(&self) -> Cartographic {
        Cartographic::new(self.west, self.south, 0.0)
    }
    pub fn north_west(&self) -> Cartographic {
        Cartographic::new(self.west, self.north, 0.0)
    }
    pub fn south_east(&self) -> Cartographic {
        Cartographic::new(self.east, self.south, 0.0)
    }
    pub fn north_east(&self) -> Cartographic {
        Cartographic::new(self.east, self.north, 0.0)
    }
    pub fn center(&self) -> Cartographic {
        let mut east = self.east;
        if east < self.west {
            east += TAU;
        }
        Cartographic::new(
            negative_pi_to_pi((self.west + east) * 0.5),
            (self.south + self.north) * 0.5,
            0.0,
        )
    }
    pub fn contains(&self, cartographic: &Cartographic) -> bool {
        let mut longitude = cartographic.longitude;
        let latitude = cartographic.latitude;
        let west = self.west;
        let mut east = self.east;
        if east < west {
            east += TAU;
            if longitude < 0.0 {
                longitude += TAU;
            }
        }
        (longitude > west || equals_epsilon(longitude, west, Some(EPSILON14), None))
            && (longitude < east || equals_epsilon(longitude, east, Some(EPSILON14), None))
            && latitude >= self.south
            && latitude <= self.north
    }

    /// Intersection that understands rectangles crossing the anti-meridian.
    pub fn intersection(&self, other: &Rectangle) -> Option<Rectangle> {
        let mut rectangle_east = self.east;
        let mut rectangle_west = self.west;
        let mut other_east = other.east;
        let mut other_west = other.west;

        if rectangle_east < rectangle_west && other_east > 0.0 {
            rectangle_east += TAU;
        } else if other_east < other_west && rectangle_east > 0.0 {
            other_east += TAU;
        }
        if rectangle_east < rectangle_west && other_west < 0.0 {
            other_west += TAU;
        } else if other_east < other_west && rectangle_west < 0.0 {
            rectangle_west += TAU;
        }

        let west = negative_pi_to_pi(rectangle_west.max(other_west));
        let east = negative_pi_to_pi(rectangle_east.min(other_east));
        if (self.west < self.east || other.west < other.east) && east <= west {
            return None;
        }
        let south = self.south.max(other.south);
        let north = self.north.min(other.north);
        if south >= north {
            return None;
        }
        Some(Rectangle::new(west, south, east, north))
    }
    /// Intersection without anti-meridian handling, usable on projected rectangles.
    pub fn simple_intersection(&self, other: &Rectangle) -> Option<Rectangle> {
        let west = self.west.max(other.west);
        let south = self.south.max(other.south);
        let east = self.east.min(other.east);
        let north = self.north.min(other.north);
        if south >= north || west >= east {
            return None;
        }
        Some(Rectangle::new(west, south, east, north))
    }

    /// Samples the rectangle's corners, edge extrema and equator crossings on the ellipsoid at
    /// the given height.
    pub fn subsample(&self, ellipsoid: &Ellipsoid, surface_height: f64) -> Vec<DVec3> {
        let mut positions = Vec::with_capacity(16);
        let mut lla = Cartographic::new(self.west, self.north, surface_height);
        positions.push(ellipsoid.cartographic_to_cartesian(&lla));
        lla.longitude = self.east;
        positions.push(ellipsoid.cartographic_to_cartesian(&lla));
        lla.latitude = self.south;
        positions.push(ellipsoid.cartographic_to_cartesian(&lla));
        lla.longitude = self.west;
        positions.push(ellipsoid.cartographic_to_cartesian(&lla));

        lla.latitude = if self.north < 0.0 {
            self.north
        } else if self.south > 0.0 {
            self.south
        } else {
            0.0
        };
        for i in 1..8 {
            lla.longitude = -PI + i as f64 * FRAC_PI_2;
            if self.contains(&lla) {
                positions.push(ellipsoid.cartographic_to_cartesian(&lla));
            }
        }
        if lla.latitude == 0.0 {
            lla.longitude = self.west;
            positions.push(ellipsoid.cartographic_to_cartesian(&lla));
            lla.longitude = self.east;
            positions.push(ellipsoid.cartographic_to_cartesian(&lla));
        }
        positions
    }
}
