use bevy::math::DVec4;

use crate::{
    bounding_sphere::BoundingSphere,
    plane::{Intersect, Plane},
};

/// A set of inward-facing planes, usually the six sides of a view frustum. A volume with no
/// planes accepts everything.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CullingVolume {
    pub planes: Vec<DVec4>,
}
impl CullingVolume {
    pub fn new(planes: Vec<DVec4>) -> Self {
        Self { planes }
    }
    pub fn compute_visibility(&self, bounding_sphere: &BoundingSphere) -> Intersect {
        let mut intersecting = false;
        for plane in self.planes.iter() {
            match bounding_sphere.intersect_plane(&Plane::from_vec4(plane)) {
                Intersect::Outside => return Intersect::Outside,
                Intersect::Intersecting => intersecting = true,
                Intersect::Inside => {}
            }
        }
        if intersecting {
            Intersect::Intersecting
        } else {
            Intersect::Inside
        }
    }
}
