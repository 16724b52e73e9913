use bevy::math::DVec3;

use crate::bounding_sphere::BoundingSphere;

/// Vertices are interleaved as `x, y, z` relative to `center`, height, `u`, `v`.
pub const TERRAIN_MESH_VERTEX_STRIDE: usize = 6;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TerrainMesh {
    pub center: DVec3,
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
    pub minimum_height: f64,
    pub maximum_height: f64,
    pub bounding_sphere_3d: BoundingSphere,
    pub occludee_point_in_scaled_space: Option<DVec3>,
    pub vertex_stride: usize,
}
impl TerrainMesh {
    pub fn vertex_count(&self) -> usize {
        if self.vertex_stride == 0 {
            return 0;
        }
        self.vertices.len() / self.vertex_stride
    }
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Two triangles per grid cell, split from the upper right to the lower left corner.
pub fn get_regular_grid_indices(width: u32, height: u32) -> Vec<u32> {
    let mut indices = Vec::with_capacity(((width - 1) * (height - 1) * 6) as usize);
    for j in 0..height - 1 {
        for i in 0..width - 1 {
            let upper_left = j * width + i;
            let upper_right = upper_left + 1;
            let lower_left = upper_left + width;
            let lower_right = lower_left + 1;
            indices.extend_from_slice(&[
                upper_left,
                lower_left,
                upper_right,
                upper_right,
                lower_left,
                lower_right,
            ]);
        }
    }
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_indices_for_two_by_two() {
        assert_eq!(get_regular_grid_indices(2, 2), vec![0, 2, 1, 1, 2, 3]);
    }

    #[test]
    fn grid_index_count() {
        assert_eq!(get_regular_grid_indices(5, 3).len(), 4 * 2 * 6);
    }
}
