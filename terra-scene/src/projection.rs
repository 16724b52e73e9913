use std::fmt::Debug;

use bevy::math::DVec3;

use crate::{ellipsoid::Ellipsoid, math::Cartographic};

/// Maps geodetic coordinates onto a plane, used by the 2D and Columbus view scene modes.
pub trait Projection: Debug + Send + Sync {
    fn get_ellipsoid(&self) -> &Ellipsoid;
    fn project(&self, cartographic: &Cartographic) -> DVec3;
    fn un_project(&self, cartesian: &DVec3) -> Cartographic;
}
