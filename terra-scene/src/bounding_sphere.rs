use bevy::math::DVec3;

use crate::{
    ellipsoid::Ellipsoid,
    plane::{Intersect, Plane},
    projection::Projection,
    rectangle::Rectangle,
};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingSphere {
    pub center: DVec3,
    pub radius: f64,
}
impl BoundingSphere {
    pub fn new(center: DVec3, radius: f64) -> Self {
        Self { center, radius }
    }

    /// Tight sphere around a point cloud: the smaller of Ritter's sphere and the sphere centered
    /// on the bounding box.
    pub fn from_points(positions: &[DVec3]) -> Self {
        let Some(first) = positions.first() else {
            return Self::default();
        };
        let mut x_min = *first;
        let mut y_min = *first;
        let mut z_min = *first;
        let mut x_max = *first;
        let mut y_max = *first;
        let mut z_max = *first;

        for current in positions.iter() {
            if current.x < x_min.x {
                x_min = *current;
            }
            if current.x > x_max.x {
                x_max = *current;
            }
            if current.y < y_min.y {
                y_min = *current;
            }
            if current.y > y_max.y {
                y_max = *current;
            }
            if current.z < z_min.z {
                z_min = *current;
            }
            if current.z > z_max.z {
                z_max = *current;
            }
        }

        let x_span = (x_max - x_min).length_squared();
        let y_span = (y_max - y_min).length_squared();
        let z_span = (z_max - z_min).length_squared();

        let (mut diameter1, mut diameter2, mut max_span) = (x_min, x_max, x_span);
        if y_span > max_span {
            max_span = y_span;
            diameter1 = y_min;
            diameter2 = y_max;
        }
        if z_span > max_span {
            diameter1 = z_min;
            diameter2 = z_max;
        }

        let mut ritter_center = (diameter1 + diameter2) * 0.5;
        let mut radius_squared = (diameter2 - ritter_center).length_squared();
        let mut ritter_radius = radius_squared.sqrt();

        let min_box_pt = DVec3::new(x_min.x, y_min.y, z_min.z);
        let max_box_pt = DVec3::new(x_max.x, y_max.y, z_max.z);
        let naive_center = (min_box_pt + max_box_pt) * 0.5;

        let mut naive_radius: f64 = 0.0;
        for current in positions.iter() {
            naive_radius = naive_radius.max((*current - naive_center).length());

            let old_center_to_point_squared = (*current - ritter_center).length_squared();
            if old_center_to_point_squared > radius_squared {
                let old_center_to_point = old_center_to_point_squared.sqrt();
                ritter_radius = (ritter_radius + old_center_to_point) * 0.5;
                radius_squared = ritter_radius * ritter_radius;
                let old_to_new = old_center_to_point - ritter_radius;
                ritter_center = (ritter_center * ritter_radius + *current * old_to_new)
                    / old_center_to_point;
            }
        }

        if ritter_radius < naive_radius {
            Self::new(ritter_center, ritter_radius)
        } else {
            Self::new(naive_center, naive_radius)
        }
    }

    pub fn from_rectangle_3d(
        rectangle: &Rectangle,
        ellipsoid: &Ellipsoid,
        surface_height: f64,
    ) -> Self {
        Self::from_points(&rectangle.subsample(ellipsoid, surface_height))
    }

    /// Sphere around the projected rectangle with its heights, in the `(height, x, y)` layout
    /// the 2D and Columbus view scene modes use.
    pub fn from_rectangle_with_heights_2d(
        rectangle: &Rectangle,
        projection: &dyn Projection,
        minimum_height: f64,
        maximum_height: f64,
    ) -> Self {
        let mut southwest = rectangle.south_west();
        southwest.height = minimum_height;
        let mut northeast = rectangle.north_east();
        northeast.height = maximum_height;

        let lower_left = projection.project(&southwest);
        let upper_right = projection.project(&northeast);

        let width = upper_right.x - lower_left.x;
        let height = upper_right.y - lower_left.y;
        let elevation = upper_right.z - lower_left.z;

        let radius = (width * width + height * height + elevation * elevation).sqrt() * 0.5;
        let center = DVec3::new(
            lower_left.z + elevation * 0.5,
            lower_left.x + width * 0.5,
            lower_left.y + height * 0.5,
        );
        Self::new(center, radius)
    }

    pub fn union(left: &BoundingSphere, right: &BoundingSphere) -> Self {
        let to_right_center = right.center - left.center;
        let center_separation = to_right_center.length();

        if left.radius >= center_separation + right.radius {
            return *left;
        }
        if right.radius >= center_separation + left.radius {
            return *right;
        }

        let half_distance_between_tangent_points =
            (left.radius + center_separation + right.radius) * 0.5;
        let center = left.center
            + to_right_center
                * ((-left.radius + half_distance_between_tangent_points) / center_separation);
        Self::new(center, half_distance_between_tangent_points)
    }

    pub fn intersect_plane(&self, plane: &Plane) -> Intersect {
        let distance_to_plane = plane.get_point_distance(self.center);
        if distance_to_plane < -self.radius {
            Intersect::Outside
        } else if distance_to_plane < self.radius {
            Intersect::Intersecting
        } else {
            Intersect::Inside
        }
    }

    pub fn distance_squared_to(&self, point: DVec3) -> f64 {
        let distance = (self.center - point).length() - self.radius;
        if distance <= 0.0 {
            return 0.0;
        }
        distance * distance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        geographic_projection::GeographicProjection,
        math::{equals_epsilon, EPSILON6},
    };

    #[test]
    fn from_points_contains_all_points() {
        let positions = vec![
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(-1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(0.0, -1.0, 0.0),
            DVec3::new(0.0, 0.0, 1.0),
            DVec3::new(0.0, 0.0, -1.0),
        ];
        let sphere = BoundingSphere::from_points(&positions);
        assert!(sphere.center.abs_diff_eq(DVec3::ZERO, EPSILON6));
        assert!(equals_epsilon(sphere.radius, 1.0, Some(EPSILON6), None));
        for position in positions {
            assert!((position - sphere.center).length() <= sphere.radius + EPSILON6);
        }
    }

    #[test]
    fn from_no_points_is_empty() {
        assert_eq!(BoundingSphere::from_points(&[]), BoundingSphere::default());
    }

    #[test]
    fn union_contains_both() {
        let left = BoundingSphere::new(DVec3::new(-2.0, 0.0, 0.0), 1.0);
        let right = BoundingSphere::new(DVec3::new(2.0, 0.0, 0.0), 1.0);
        let union = BoundingSphere::union(&left, &right);
        assert!(union.center.abs_diff_eq(DVec3::ZERO, EPSILON6));
        assert!(equals_epsilon(union.radius, 3.0, Some(EPSILON6), None));

        let inner = BoundingSphere::new(DVec3::new(-2.0, 0.0, 0.0), 0.5);
        assert_eq!(BoundingSphere::union(&left, &inner), left);
    }

    #[test]
    fn intersect_plane_classifies() {
        let sphere = BoundingSphere::new(DVec3::ZERO, 1.0);
        let plane = Plane::new(DVec3::X, 0.0);
        assert_eq!(sphere.intersect_plane(&plane), Intersect::Intersecting);
        let plane = Plane::new(DVec3::X, 2.0);
        assert_eq!(sphere.intersect_plane(&plane), Intersect::Inside);
        let plane = Plane::new(DVec3::X, -2.0);
        assert_eq!(sphere.intersect_plane(&plane), Intersect::Outside);
    }

    #[test]
    fn rectangle_with_heights_2d_is_swizzled() {
        let projection = GeographicProjection::default();
        let rectangle = Rectangle::new(0.0, 0.0, 0.1, 0.1);
        let sphere =
            BoundingSphere::from_rectangle_with_heights_2d(&rectangle, &projection, 0.0, 100.0);
        assert_eq!(sphere.center.x, 50.0);
        assert!(equals_epsilon(
            sphere.center.y,
            0.05 * projection.semimajor_axis,
            Some(EPSILON6),
            None
        ));
    }

    #[test]
    fn rectangle_3d_sphere_encloses_corners() {
        let ellipsoid = Ellipsoid::wgs84();
        let rectangle = Rectangle::new(0.0, 0.0, 0.5, 0.5);
        let sphere = BoundingSphere::from_rectangle_3d(&rectangle, &ellipsoid, 0.0);
        for corner in [
            rectangle.south_west(),
            rectangle.north_east(),
            rectangle.north_west(),
            rectangle.south_east(),
        ] {
            let position = ellipsoid.cartographic_to_cartesian(&corner);
            assert!((position - sphere.center).length() <= sphere.radius * (1.0 + EPSILON6));
        }
    }
}
