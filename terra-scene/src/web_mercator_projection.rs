use std::f64::consts::FRAC_PI_2;

use bevy::math::DVec3;

use crate::{ellipsoid::Ellipsoid, math::Cartographic, projection::Projection};

/// Spherical mercator as used by most web map tile services.
#[derive(Debug, Clone, Copy)]
pub struct WebMercatorProjection {
    pub ellipsoid: Ellipsoid,
    pub semimajor_axis: f64,
    pub one_over_semimajor_axis: f64,
}
impl Default for WebMercatorProjection {
    fn default() -> Self {
        Self::from_ellipsoid(&Ellipsoid::wgs84())
    }
}
impl WebMercatorProjection {
    /// Latitude at which the projection becomes square, `atan(sinh(PI))`.
    pub const MAXIMUM_LATITUDE: f64 = 1.4844222297453322;

    pub fn from_ellipsoid(ellipsoid: &Ellipsoid) -> Self {
        let semimajor_axis = ellipsoid.maximum_radius;
        Self {
            ellipsoid: *ellipsoid,
            semimajor_axis,
            one_over_semimajor_axis: 1.0 / semimajor_axis,
        }
    }
    pub fn mercator_angle_to_geodetic_latitude(mercator_angle: f64) -> f64 {
        FRAC_PI_2 - 2.0 * (-mercator_angle).exp().atan()
    }
    pub fn geodetic_latitude_to_mercator_angle(latitude: f64) -> f64 {
        let latitude = latitude.clamp(-Self::MAXIMUM_LATITUDE, Self::MAXIMUM_LATITUDE);
        let sin_latitude = latitude.sin();
        0.5 * ((1.0 + sin_latitude) / (1.0 - sin_latitude)).ln()
    }
}
impl Projection for WebMercatorProjection {
    fn get_ellipsoid(&self) -> &Ellipsoid {
        &self.ellipsoid
    }
    fn project(&self, cartographic: &Cartographic) -> DVec3 {
        DVec3::new(
            cartographic.longitude * self.semimajor_axis,
            Self::geodetic_latitude_to_mercator_angle(cartographic.latitude) * self.semimajor_axis,
            cartographic.height,
        )
    }
    fn un_project(&self, cartesian: &DVec3) -> Cartographic {
        Cartographic::new(
            cartesian.x * self.one_over_semimajor_axis,
            Self::mercator_angle_to_geodetic_latitude(cartesian.y * self.one_over_semimajor_axis),
            cartesian.z,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use super::*;
    use crate::math::{equals_epsilon, EPSILON10};

    #[test]
    fn maximum_latitude_projects_to_a_square() {
        let projection = WebMercatorProjection::default();
        let corner = projection.project(&Cartographic::new(
            PI,
            WebMercatorProjection::MAXIMUM_LATITUDE,
            0.0,
        ));
        assert!(equals_epsilon(corner.x, corner.y, Some(EPSILON10), None));
    }

    #[test]
    fn latitudes_beyond_the_limit_are_clamped() {
        assert_eq!(
            WebMercatorProjection::geodetic_latitude_to_mercator_angle(PI / 2.0),
            WebMercatorProjection::geodetic_latitude_to_mercator_angle(
                WebMercatorProjection::MAXIMUM_LATITUDE
            )
        );
    }

    #[test]
    fn un_project_inverts_project() {
        let projection = WebMercatorProjection::default();
        let position = Cartographic::from_degrees(30.0, 45.0, 12.0);
        let back = projection.un_project(&projection.project(&position));
        assert!(back.equals_epsilon(&position, EPSILON10));
    }
}
