use std::fmt;

use bevy::math::DVec3;
use serde::{Deserialize, Serialize};

use crate::ellipsoid::Ellipsoid;

/// A position on an ellipsoid in radians, with a height above the surface in meters.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cartographic {
    pub longitude: f64,
    pub latitude: f64,
    pub height: f64,
}
impl Cartographic {
    pub const ZERO: Cartographic = Cartographic {
        longitude: 0.0,
        latitude: 0.0,
        height: 0.0,
    };
    pub fn new(longitude: f64, latitude: f64, height: f64) -> Self {
        Self::from_radians(longitude, latitude, height)
    }
    pub fn from_radians(longitude: f64, latitude: f64, height: f64) -> Self {
        Cartographic {
            longitude,
            latitude,
            height,
        }
    }
    pub fn from_degrees(longitude: f64, latitude: f64, height: f64) -> Self {
        Cartographic {
            longitude: longitude.to_radians(),
            latitude: latitude.to_radians(),
            height,
        }
    }
    /// Returns `None` when the position is too close to the ellipsoid center to have a
    /// meaningful geodetic projection.
    pub fn from_cartesian(cartesian: DVec3, ellipsoid: &Ellipsoid) -> Option<Self> {
        ellipsoid.cartesian_to_cartographic(cartesian)
    }
    pub fn to_cartesian(&self, ellipsoid: &Ellipsoid) -> DVec3 {
        ellipsoid.cartographic_to_cartesian(self)
    }
    pub fn equals_epsilon(&self, right: &Cartographic, epsilon: f64) -> bool {
        (self.longitude - right.longitude).abs() <= epsilon
            && (self.latitude - right.latitude).abs() <= epsilon
            && (self.height - right.height).abs() <= epsilon
    }
}
impl fmt::Display for Cartographic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {})",
            self.longitude.to_degrees(),
            self.latitude.to_degrees(),
            self.height
        )
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use super::*;
    use crate::math::{equals_epsilon, EPSILON5, EPSILON7};

    const SURFACE_CARTOGRAPHIC: Cartographic = Cartographic {
        longitude: 25.0 * PI / 180.0,
        latitude: 45.0 * PI / 180.0,
        height: 0.0,
    };
    const SURFACE_CARTESIAN: DVec3 = DVec3 {
        x: 4094327.7921465295,
        y: 1909216.4044747739,
        z: 4487348.4088659193,
    };

    #[test]
    fn to_cartesian_on_surface() {
        let ellipsoid = Ellipsoid::wgs84();
        let result = SURFACE_CARTOGRAPHIC.to_cartesian(&ellipsoid);
        assert!(equals_epsilon(
            result.x,
            SURFACE_CARTESIAN.x,
            Some(EPSILON7),
            None
        ));
        assert!(equals_epsilon(
            result.y,
            SURFACE_CARTESIAN.y,
            Some(EPSILON7),
            None
        ));
        assert!(equals_epsilon(
            result.z,
            SURFACE_CARTESIAN.z,
            Some(EPSILON7),
            None
        ));
    }

    #[test]
    fn from_cartesian_round_trips_height() {
        let ellipsoid = Ellipsoid::wgs84();
        let position = Cartographic::from_degrees(150.0, -40.0, 100000.0);
        let cartesian = position.to_cartesian(&ellipsoid);
        let Some(result) = Cartographic::from_cartesian(cartesian, &ellipsoid) else {
            panic!("expected a cartographic position");
        };
        assert!(result.equals_epsilon(&position, EPSILON5));
    }

    #[test]
    fn from_cartesian_at_center_is_none() {
        let ellipsoid = Ellipsoid::wgs84();
        assert!(Cartographic::from_cartesian(DVec3::ZERO, &ellipsoid).is_none());
    }
}
