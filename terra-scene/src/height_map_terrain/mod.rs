use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::ellipsoid::Ellipsoid;

mod height_map_terrain_data;
mod terrain_mesh;

pub use height_map_terrain_data::*;
pub use terrain_mesh::*;

/// How the samples of a heightmap buffer map to heights in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeightmapTerrainStructure {
    pub height_scale: f64,
    pub height_offset: f64,
    pub lowest_encoded_height: f64,
    pub highest_encoded_height: f64,
}
impl Default for HeightmapTerrainStructure {
    fn default() -> Self {
        HeightmapTerrainStructure {
            height_scale: 1.0,
            height_offset: 0.0,
            lowest_encoded_height: f64::MIN,
            highest_encoded_height: f64::MAX,
        }
    }
}
impl HeightmapTerrainStructure {
    pub fn decode(&self, encoded: f32) -> f64 {
        encoded as f64 * self.height_scale + self.height_offset
    }
    pub fn clamp_encoded(&self, encoded: f64) -> f64 {
        encoded.max(self.lowest_encoded_height).min(self.highest_encoded_height)
    }
}

/// Geometric error of a level zero heightmap tile whose samples are `tile_image_width` apart
/// around a quarter of the equator.
pub fn get_estimated_level_zero_geometric_error_for_a_heightmap(
    ellipsoid: &Ellipsoid,
    tile_image_width: u32,
    number_of_tiles_at_level_zero: u32,
) -> f64 {
    ellipsoid.maximum_radius * TAU * 0.25
        / (tile_image_width as f64 * number_of_tiles_at_level_zero as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{equals_epsilon, EPSILON10};

    #[test]
    fn level_zero_error_for_wgs84() {
        let error =
            get_estimated_level_zero_geometric_error_for_a_heightmap(&Ellipsoid::wgs84(), 64, 2);
        let expected = 6378137.0 * TAU * 0.25 / 128.0;
        assert!(equals_epsilon(error, expected, Some(EPSILON10), None));
    }

    #[test]
    fn structure_decodes_and_clamps() {
        let structure = HeightmapTerrainStructure {
            height_scale: 0.5,
            height_offset: -10.0,
            lowest_encoded_height: 0.0,
            highest_encoded_height: 100.0,
        };
        assert_eq!(structure.decode(40.0), 10.0);
        assert_eq!(structure.clamp_encoded(-3.0), 0.0);
        assert_eq!(structure.clamp_encoded(300.0), 100.0);
    }
}
