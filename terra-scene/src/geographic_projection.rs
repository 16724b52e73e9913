use bevy::math::DVec3;

use crate::{ellipsoid::Ellipsoid, math::Cartographic, projection::Projection};

/// Equirectangular projection: longitude and latitude scaled by the semimajor axis.
#[derive(Debug, Clone, Copy)]
pub struct GeographicProjection {
    pub ellipsoid: Ellipsoid,
    pub semimajor_axis: f64,
    pub one_over_semimajor_axis: f64,
}
impl Default for GeographicProjection {
    fn default() -> Self {
        Self::from_ellipsoid(&Ellipsoid::wgs84())
    }
}
impl GeographicProjection {
    pub fn from_ellipsoid(ellipsoid: &Ellipsoid) -> Self {
        let semimajor_axis = ellipsoid.maximum_radius;
        Self {
            ellipsoid: *ellipsoid,
            semimajor_axis,
            one_over_semimajor_axis: 1.0 / semimajor_axis,
        }
    }
}
impl Projection for GeographicProjection {
    fn get_ellipsoid(&self) -> &Ellipsoid {
        &self.ellipsoid
    }
    fn project(&self, cartographic: &Cartographic) -> DVec3 {
        DVec3::new(
            cartographic.longitude * self.semimajor_axis,
            cartographic.latitude * self.semimajor_axis,
            cartographic.height,
        )
    }
    fn un_project(&self, cartesian: &DVec3) -> Cartographic {
        Cartographic::new(
            cartesian.x * self.one_over_semimajor_axis,
            cartesian.y * self.one_over_semimajor_axis,
            cartesian.z,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use super::*;

    #[test]
    fn project_scales_by_semimajor_axis() {
        let projection = GeographicProjection::default();
        let projected = projection.project(&Cartographic::new(PI, PI / 2.0, 10.0));
        assert_eq!(projected.x, PI * 6378137.0);
        assert_eq!(projected.y, PI / 2.0 * 6378137.0);
        assert_eq!(projected.z, 10.0);
        let back = projection.un_project(&projected);
        assert!(back.equals_epsilon(&Cartographic::new(PI, PI / 2.0, 10.0), 1e-14));
    }
}
