use bevy::math::DVec3;
use terra_scene::{Ellipsoid, EllipsoidalOccluder};

/// Everything that can hide tiles from the camera. For now only the globe itself.
#[derive(Debug, Clone)]
pub struct QuadtreeOccluders {
    pub ellipsoid: EllipsoidalOccluder,
}
impl QuadtreeOccluders {
    pub fn new(ellipsoid: Ellipsoid) -> Self {
        Self {
            ellipsoid: EllipsoidalOccluder::new(ellipsoid),
        }
    }
    pub fn set_camera_position(&mut self, position: DVec3) {
        self.ellipsoid.set_camera_position(position);
    }
    /// Whether a tile with the given horizon culling point can be seen. Tiles without one are
    /// never culled here.
    pub fn is_occludee_visible(&self, occludee_point_in_scaled_space: Option<DVec3>) -> bool {
        occludee_point_in_scaled_space
            .map_or(true, |point| self.ellipsoid.is_scaled_space_point_visible(point))
    }
}
impl Default for QuadtreeOccluders {
    fn default() -> Self {
        Self::new(Ellipsoid::wgs84())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn far_side_of_the_globe_is_hidden() {
        let ellipsoid = Ellipsoid::wgs84();
        let mut occluders = QuadtreeOccluders::new(ellipsoid);
        occluders.set_camera_position(DVec3::new(ellipsoid.maximum_radius * 3.0, 0.0, 0.0));

        let near = ellipsoid.transform_position_to_scaled_space(DVec3::new(
            ellipsoid.maximum_radius,
            0.0,
            0.0,
        ));
        let far = ellipsoid.transform_position_to_scaled_space(DVec3::new(
            -ellipsoid.maximum_radius,
            0.0,
            0.0,
        ));
        assert!(occluders.is_occludee_visible(Some(near)));
        assert!(!occluders.is_occludee_visible(Some(far)));
        assert!(occluders.is_occludee_visible(None));
    }
}
