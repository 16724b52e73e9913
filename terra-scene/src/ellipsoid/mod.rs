use bevy::math::DVec3;

use crate::math::{Cartographic, EPSILON1, EPSILON12, EPSILON14};

/// A quadratic surface `(x / a)^2 + (y / b)^2 + (z / c)^2 = 1` used as the reference
/// surface of the globe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    pub radii: DVec3,
    pub radii_squared: DVec3,
    pub radii_to_the_fourth: DVec3,
    pub one_over_radii: DVec3,
    pub one_over_radii_squared: DVec3,
    pub minimum_radius: f64,
    pub maximum_radius: f64,
    pub center_tolerance_squared: f64,
}
impl Default for Ellipsoid {
    fn default() -> Self {
        Self::wgs84()
    }
}
impl Ellipsoid {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        let radii = DVec3::new(x, y, z);
        let radii_squared = radii * radii;
        Self {
            radii,
            radii_squared,
            radii_to_the_fourth: radii_squared * radii_squared,
            one_over_radii: DVec3::new(1.0 / x, 1.0 / y, 1.0 / z),
            one_over_radii_squared: DVec3::new(1.0 / (x * x), 1.0 / (y * y), 1.0 / (z * z)),
            minimum_radius: x.min(y).min(z),
            maximum_radius: x.max(y).max(z),
            center_tolerance_squared: EPSILON1,
        }
    }
    pub fn from_vec3(radii: DVec3) -> Self {
        Self::new(radii.x, radii.y, radii.z)
    }
    pub fn wgs84() -> Self {
        Self::new(6378137.0, 6378137.0, 6356752.3142451793)
    }
    pub fn unit_sphere() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }

    pub fn geocentric_surface_normal(&self, position: DVec3) -> DVec3 {
        position.normalize()
    }
    pub fn geodetic_surface_normal_cartographic(&self, cartographic: &Cartographic) -> DVec3 {
        let cos_latitude = cartographic.latitude.cos();
        DVec3::new(
            cos_latitude * cartographic.longitude.cos(),
            cos_latitude * cartographic.longitude.sin(),
            cartographic.latitude.sin(),
        )
        .normalize()
    }
    pub fn geodetic_surface_normal(&self, position: DVec3) -> Option<DVec3> {
        if position.abs_diff_eq(DVec3::ZERO, EPSILON14) {
            return None;
        }
        Some((position * self.one_over_radii_squared).normalize())
    }

    pub fn cartographic_to_cartesian(&self, cartographic: &Cartographic) -> DVec3 {
        let n = self.geodetic_surface_normal_cartographic(cartographic);
        let mut k = self.radii_squared * n;
        let gamma = n.dot(k).sqrt();
        k /= gamma;
        k + n * cartographic.height
    }
    pub fn cartesian_to_cartographic(&self, position: DVec3) -> Option<Cartographic> {
        let p = self.scale_to_geodetic_surface(position)?;
        let n = self.geodetic_surface_normal(p)?;
        let h = position - p;
        Some(Cartographic {
            longitude: n.y.atan2(n.x),
            latitude: n.z.asin(),
            height: h.dot(position).signum() * h.length(),
        })
    }

    /// Projects a position onto the surface along the geodetic normal using Newton's method.
    pub fn scale_to_geodetic_surface(&self, position: DVec3) -> Option<DVec3> {
        let one_over_radii = self.one_over_radii;
        let one_over_radii_squared = self.one_over_radii_squared;

        let x2 = position.x * position.x * one_over_radii.x * one_over_radii.x;
        let y2 = position.y * position.y * one_over_radii.y * one_over_radii.y;
        let z2 = position.z * position.z * one_over_radii.z * one_over_radii.z;

        let squared_norm = x2 + y2 + z2;
        let ratio = (1.0 / squared_norm).sqrt();
        let intersection = position * ratio;

        if squared_norm < self.center_tolerance_squared {
            return if ratio.is_finite() {
                Some(intersection)
            } else {
                None
            };
        }

        let gradient = intersection * one_over_radii_squared * 2.0;
        let mut lambda = ((1.0 - ratio) * position.length()) / (0.5 * gradient.length());
        let mut correction = 0.0;
        let mut multiplier;

        loop {
            lambda -= correction;
            multiplier = DVec3::new(
                1.0 / (1.0 + lambda * one_over_radii_squared.x),
                1.0 / (1.0 + lambda * one_over_radii_squared.y),
                1.0 / (1.0 + lambda * one_over_radii_squared.z),
            );
            let multiplier2 = multiplier * multiplier;
            let multiplier3 = multiplier2 * multiplier;

            let func = x2 * multiplier2.x + y2 * multiplier2.y + z2 * multiplier2.z - 1.0;
            let denominator = x2 * multiplier3.x * one_over_radii_squared.x
                + y2 * multiplier3.y * one_over_radii_squared.y
                + z2 * multiplier3.z * one_over_radii_squared.z;
            let derivative = -2.0 * denominator;
            correction = func / derivative;

            if func.abs() <= EPSILON12 {
                break;
            }
        }
        Some(position * multiplier)
    }

    pub fn transform_position_to_scaled_space(&self, position: DVec3) -> DVec3 {
        position * self.one_over_radii
    }
    pub fn transform_position_from_scaled_space(&self, position: DVec3) -> DVec3 {
        position * self.radii
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{equals_epsilon, EPSILON7};

    const SPACE_CARTESIAN: DVec3 = DVec3 {
        x: 4582719.8827300891,
        y: -4582719.8827300882,
        z: 1725510.4250797231,
    };

    fn space_cartographic() -> Cartographic {
        Cartographic::from_degrees(-45.0, 15.0, 330000.0)
    }

    #[test]
    fn derived_radii() {
        let ellipsoid = Ellipsoid::new(1.0, 2.0, 4.0);
        assert_eq!(ellipsoid.radii_squared, DVec3::new(1.0, 4.0, 16.0));
        assert_eq!(ellipsoid.one_over_radii, DVec3::new(1.0, 0.5, 0.25));
        assert_eq!(ellipsoid.minimum_radius, 1.0);
        assert_eq!(ellipsoid.maximum_radius, 4.0);
    }

    #[test]
    fn cartographic_to_cartesian_in_space() {
        let result = Ellipsoid::wgs84().cartographic_to_cartesian(&space_cartographic());
        assert!(result.abs_diff_eq(SPACE_CARTESIAN, 1e-6));
    }

    #[test]
    fn cartesian_to_cartographic_in_space() {
        let Some(result) = Ellipsoid::wgs84().cartesian_to_cartographic(SPACE_CARTESIAN) else {
            panic!("expected a cartographic position");
        };
        let expected = space_cartographic();
        assert!(equals_epsilon(
            result.longitude,
            expected.longitude,
            Some(EPSILON7),
            None
        ));
        assert!(equals_epsilon(
            result.latitude,
            expected.latitude,
            Some(EPSILON7),
            None
        ));
        assert!(equals_epsilon(
            result.height,
            expected.height,
            Some(EPSILON7),
            None
        ));
    }

    #[test]
    fn scale_to_geodetic_surface_lands_on_surface() {
        let ellipsoid = Ellipsoid::wgs84();
        let Some(surface) = ellipsoid.scale_to_geodetic_surface(SPACE_CARTESIAN) else {
            panic!("expected a surface point");
        };
        let scaled = ellipsoid.transform_position_to_scaled_space(surface);
        assert!(equals_epsilon(
            scaled.length_squared(),
            1.0,
            Some(EPSILON7),
            None
        ));
    }

    #[test]
    fn geodetic_surface_normal_of_origin_is_none() {
        assert!(Ellipsoid::unit_sphere()
            .geodetic_surface_normal(DVec3::ZERO)
            .is_none());
        assert_eq!(
            Ellipsoid::unit_sphere().geodetic_surface_normal(DVec3::new(0.0, 0.0, 5.0)),
            Some(DVec3::Z)
        );
    }
}
