use bevy::math::{DVec3, DVec4};

use crate::culling_volume::CullingVolume;

/// Symmetric perspective frustum defined by a field of view and an aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveFrustum {
    pub fov: f64,
    pub aspect_ratio: f64,
    pub near: f64,
    pub far: f64,
}
impl Default for PerspectiveFrustum {
    fn default() -> Self {
        Self {
            fov: 60.0_f64.to_radians(),
            aspect_ratio: 1.0,
            near: 1.0,
            far: 500000000.0,
        }
    }
}
impl PerspectiveFrustum {
    /// Vertical field of view. `fov` applies to the larger of the two dimensions.
    pub fn fovy(&self) -> f64 {
        if self.aspect_ratio <= 1.0 {
            self.fov
        } else {
            ((self.fov * 0.5).tan() / self.aspect_ratio).atan() * 2.0
        }
    }
    pub fn off_center(&self) -> PerspectiveOffCenterFrustum {
        let top = self.near * (0.5 * self.fovy()).tan();
        let right = self.aspect_ratio * top;
        PerspectiveOffCenterFrustum {
            left: -right,
            right,
            top,
            bottom: -top,
            near: self.near,
            far: self.far,
        }
    }
    pub fn compute_culling_volume(
        &self,
        position: DVec3,
        direction: DVec3,
        up: DVec3,
    ) -> CullingVolume {
        self.off_center()
            .compute_culling_volume(position, direction, up)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveOffCenterFrustum {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
    pub near: f64,
    pub far: f64,
}
impl PerspectiveOffCenterFrustum {
    /// Planes in the order left, right, bottom, top, near, far.
    pub fn compute_culling_volume(
        &self,
        position: DVec3,
        direction: DVec3,
        up: DVec3,
    ) -> CullingVolume {
        let right = direction.cross(up);
        let near_center = position + direction * self.near;
        let far_center = position + direction * self.far;

        let left_normal = (near_center + right * self.left - position)
            .normalize()
            .cross(up)
            .normalize();
        let right_normal = up
            .cross(near_center + right * self.right - position)
            .normalize();
        let bottom_normal = right
            .cross(near_center + up * self.bottom - position)
            .normalize();
        let top_normal = (near_center + up * self.top - position)
            .cross(right)
            .normalize();
        let far_normal = -direction;

        CullingVolume::new(vec![
            left_normal.extend(-left_normal.dot(position)),
            right_normal.extend(-right_normal.dot(position)),
            bottom_normal.extend(-bottom_normal.dot(position)),
            top_normal.extend(-top_normal.dot(position)),
            DVec4::new(
                direction.x,
                direction.y,
                direction.z,
                -direction.dot(near_center),
            ),
            far_normal.extend(-far_normal.dot(far_center)),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bounding_sphere::BoundingSphere,
        math::{EPSILON15, EPSILON6},
        plane::Intersect,
    };

    fn create_frustum() -> PerspectiveOffCenterFrustum {
        PerspectiveOffCenterFrustum {
            left: -1.0,
            right: 1.0,
            top: 1.0,
            bottom: -1.0,
            near: 1.0,
            far: 2.0,
        }
    }
    fn get_planes(frustum: &PerspectiveOffCenterFrustum) -> Vec<DVec4> {
        frustum
            .compute_culling_volume(DVec3::ZERO, DVec3::NEG_Z, DVec3::Y)
            .planes
    }

    #[test]
    fn left_plane() {
        let planes = get_planes(&create_frustum());
        let x = 1.0 / 2.0_f64.sqrt();
        assert!(planes[0].abs_diff_eq(DVec4::new(x, 0.0, -x, 0.0), EPSILON15));
    }

    #[test]
    fn right_plane() {
        let planes = get_planes(&create_frustum());
        let x = 1.0 / 2.0_f64.sqrt();
        assert!(planes[1].abs_diff_eq(DVec4::new(-x, 0.0, -x, 0.0), EPSILON15));
    }

    #[test]
    fn bottom_plane() {
        let planes = get_planes(&create_frustum());
        let x = 1.0 / 2.0_f64.sqrt();
        assert!(planes[2].abs_diff_eq(DVec4::new(0.0, x, -x, 0.0), EPSILON15));
    }

    #[test]
    fn top_plane() {
        let planes = get_planes(&create_frustum());
        let x = 1.0 / 2.0_f64.sqrt();
        assert!(planes[3].abs_diff_eq(DVec4::new(0.0, -x, -x, 0.0), EPSILON15));
    }

    #[test]
    fn near_and_far_planes() {
        let planes = get_planes(&create_frustum());
        assert!(planes[4].abs_diff_eq(DVec4::new(0.0, 0.0, -1.0, -1.0), EPSILON15));
        assert!(planes[5].abs_diff_eq(DVec4::new(0.0, 0.0, 1.0, 2.0), EPSILON15));
    }

    #[test]
    fn fovy_for_wide_aspect() {
        let frustum = PerspectiveFrustum {
            fov: 1.0,
            aspect_ratio: 2.0,
            ..Default::default()
        };
        assert!(frustum.fovy() < 1.0);
        let tall = PerspectiveFrustum {
            fov: 1.0,
            aspect_ratio: 0.5,
            ..Default::default()
        };
        assert_eq!(tall.fovy(), 1.0);
    }

    #[test]
    fn culls_spheres_behind_the_camera() {
        let frustum = PerspectiveFrustum::default();
        let volume = frustum.compute_culling_volume(DVec3::ZERO, DVec3::NEG_Z, DVec3::Y);
        let ahead = BoundingSphere::new(DVec3::new(0.0, 0.0, -10.0), 1.0);
        let behind = BoundingSphere::new(DVec3::new(0.0, 0.0, 10.0), 1.0);
        assert_eq!(volume.compute_visibility(&ahead), Intersect::Inside);
        assert_eq!(volume.compute_visibility(&behind), Intersect::Outside);
        assert!(volume.planes[4].w.abs() > EPSILON6);
    }
}
