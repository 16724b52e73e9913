use bevy::math::DVec3;

use crate::{bounding_sphere::BoundingSphere, ellipsoid::Ellipsoid, rectangle::Rectangle};

/// Horizon culling against an ellipsoid. Points are tested in the ellipsoid's scaled space,
/// where the ellipsoid becomes a unit sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EllipsoidalOccluder {
    pub ellipsoid: Ellipsoid,
    camera_position: DVec3,
    camera_position_in_scaled_space: DVec3,
    distance_to_limb_in_scaled_space_squared: f64,
}
impl EllipsoidalOccluder {
    pub fn new(ellipsoid: Ellipsoid) -> Self {
        Self {
            ellipsoid,
            camera_position: DVec3::ZERO,
            camera_position_in_scaled_space: DVec3::ZERO,
            distance_to_limb_in_scaled_space_squared: 0.0,
        }
    }
    pub fn get_camera_position(&self) -> DVec3 {
        self.camera_position
    }
    pub fn set_camera_position(&mut self, camera_position: DVec3) {
        let cv = self
            .ellipsoid
            .transform_position_to_scaled_space(camera_position);
        self.camera_position = camera_position;
        self.camera_position_in_scaled_space = cv;
        self.distance_to_limb_in_scaled_space_squared = cv.length_squared() - 1.0;
    }

    pub fn is_point_visible(&self, occludee: DVec3) -> bool {
        let occludee_scaled_space_position = self.ellipsoid.transform_position_to_scaled_space(occludee);
        self.is_scaled_space_point_visible(occludee_scaled_space_position)
    }

    pub fn is_scaled_space_point_visible(&self, occludee_scaled_space_position: DVec3) -> bool {
        let cv = self.camera_position_in_scaled_space;
        let vh_magnitude_squared = self.distance_to_limb_in_scaled_space_squared;
        let vt = occludee_scaled_space_position - cv;
        let vt_dot_vc = -vt.dot(cv);
        // Below the surface the culling plane sits on the camera itself.
        let is_occluded = if vh_magnitude_squared < 0.0 {
            vt_dot_vc > 0.0
        } else {
            vt_dot_vc > vh_magnitude_squared
                && (vt_dot_vc * vt_dot_vc) / vt.length_squared() > vh_magnitude_squared
        };
        !is_occluded
    }

    /// Computes a point in scaled space which, when not visible, guarantees that every one of
    /// `positions` is hidden behind the horizon. `None` when no such point exists.
    pub fn compute_horizon_culling_point(
        &self,
        direction_to_point: DVec3,
        positions: &[DVec3],
    ) -> Option<DVec3> {
        compute_horizon_culling_point_from_positions(&self.ellipsoid, direction_to_point, positions)
    }

    /// Like [`Self::compute_horizon_culling_point`] but shrinks the ellipsoid by
    /// `minimum_height` when the geometry dips below the surface.
    pub fn compute_horizon_culling_point_possibly_under_ellipsoid(
        &self,
        direction_to_point: DVec3,
        positions: &[DVec3],
        minimum_height: f64,
    ) -> Option<DVec3> {
        let ellipsoid = possibly_shrunk_ellipsoid(&self.ellipsoid, minimum_height);
        compute_horizon_culling_point_from_positions(&ellipsoid, direction_to_point, positions)
    }

    pub fn compute_horizon_culling_point_from_rectangle(
        &self,
        rectangle: &Rectangle,
        ellipsoid: &Ellipsoid,
    ) -> Option<DVec3> {
        let positions = rectangle.subsample(ellipsoid, 0.0);
        let bounding_sphere = BoundingSphere::from_points(&positions);
        // Too close to the center for the direction to mean anything.
        if bounding_sphere.center.length() < 0.1 * ellipsoid.minimum_radius {
            return None;
        }
        self.compute_horizon_culling_point(bounding_sphere.center, &positions)
    }
}

fn possibly_shrunk_ellipsoid(ellipsoid: &Ellipsoid, minimum_height: f64) -> Ellipsoid {
    if minimum_height < 0.0 && ellipsoid.minimum_radius > -minimum_height {
        return Ellipsoid::from_vec3(ellipsoid.radii + DVec3::splat(minimum_height));
    }
    *ellipsoid
}

fn compute_horizon_culling_point_from_positions(
    ellipsoid: &Ellipsoid,
    direction_to_point: DVec3,
    positions: &[DVec3],
) -> Option<DVec3> {
    let scaled_space_direction_to_point =
        compute_scaled_space_direction_to_point(ellipsoid, direction_to_point);
    let mut result_magnitude: f64 = 0.0;
    for position in positions.iter() {
        let candidate_magnitude =
            compute_magnitude(ellipsoid, *position, scaled_space_direction_to_point);
        // every point must face the same way
        if candidate_magnitude < 0.0 {
            return None;
        }
        result_magnitude = result_magnitude.max(candidate_magnitude);
    }
    magnitude_to_point(scaled_space_direction_to_point, result_magnitude)
}

fn compute_scaled_space_direction_to_point(ellipsoid: &Ellipsoid, direction_to_point: DVec3) -> DVec3 {
    if direction_to_point == DVec3::ZERO {
        return direction_to_point;
    }
    ellipsoid
        .transform_position_to_scaled_space(direction_to_point)
        .normalize()
}

fn compute_magnitude(
    ellipsoid: &Ellipsoid,
    position: DVec3,
    scaled_space_direction_to_point: DVec3,
) -> f64 {
    let scaled_space_position = ellipsoid.transform_position_to_scaled_space(position);
    let mut magnitude_squared = scaled_space_position.length_squared();
    let mut magnitude = magnitude_squared.sqrt();
    let direction = scaled_space_position / magnitude;

    // Points below the surface count as on it.
    magnitude_squared = magnitude_squared.max(1.0);
    magnitude = magnitude.max(1.0);

    let cos_alpha = direction.dot(scaled_space_direction_to_point);
    let sin_alpha = direction.cross(scaled_space_direction_to_point).length();
    let cos_beta = 1.0 / magnitude;
    let sin_beta = (magnitude_squared - 1.0).sqrt() * cos_beta;

    1.0 / (cos_alpha * cos_beta - sin_alpha * sin_beta)
}

fn magnitude_to_point(scaled_space_direction_to_point: DVec3, result_magnitude: f64) -> Option<DVec3> {
    if result_magnitude <= 0.0 || !result_magnitude.is_finite() {
        return None;
    }
    Some(scaled_space_direction_to_point * result_magnitude)
}
