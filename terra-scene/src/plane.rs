use bevy::math::{DVec3, DVec4};

/// Result of testing a volume against a plane or a set of planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intersect {
    Outside,
    Intersecting,
    Inside,
}

/// A plane in Hessian normal form, `normal · p + distance = 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: DVec3,
    pub distance: f64,
}
impl Plane {
    pub fn new(normal: DVec3, distance: f64) -> Self {
        Self { normal, distance }
    }
    pub fn from_point_normal(point: DVec3, normal: DVec3) -> Self {
        Self {
            normal,
            distance: -normal.dot(point),
        }
    }
    pub fn from_vec4(coefficients: &DVec4) -> Self {
        Self {
            normal: coefficients.truncate(),
            distance: coefficients.w,
        }
    }
    pub fn get_point_distance(&self, point: DVec3) -> f64 {
        self.normal.dot(point) + self.distance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_distance_is_signed() {
        let plane = Plane::from_point_normal(DVec3::new(0.0, 0.0, 2.0), DVec3::Z);
        assert_eq!(plane.distance, -2.0);
        assert_eq!(plane.get_point_distance(DVec3::new(5.0, 5.0, 3.0)), 1.0);
        assert_eq!(plane.get_point_distance(DVec3::ZERO), -2.0);
    }
}
