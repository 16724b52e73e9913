use std::sync::Arc;

use bevy::math::DVec3;

use crate::{
    bounding_sphere::BoundingSphere,
    ellipsoidal_occluder::EllipsoidalOccluder,
    error::TerrainError,
    math::{lerp, Cartographic},
    rectangle::Rectangle,
    terrain_data::TerrainData,
    tile_key::TileKey,
    tiling_scheme::TilingScheme,
};

use super::{
    get_regular_grid_indices, HeightmapTerrainStructure, TerrainMesh, TERRAIN_MESH_VERTEX_STRIDE,
};

/// Terrain stored as a regular grid of encoded heights. Row 0 is the northern edge.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightmapTerrainData {
    /// Always `width * height` samples.
    buffer: Vec<f32>,
    width: u32,
    height: u32,
    child_tile_mask: u8,
    structure: HeightmapTerrainStructure,
    created_by_upsampling: bool,
    water_mask: Option<Vec<u8>>,
}

impl HeightmapTerrainData {
    pub fn new(buffer: Vec<f32>, width: u32, height: u32) -> Result<Self, TerrainError> {
        if width < 2 || height < 2 {
            return Err(TerrainError::InvalidDimensions { width, height });
        }
        let expected = (width * height) as usize;
        if buffer.len() != expected {
            return Err(TerrainError::BufferSizeMismatch {
                expected,
                actual: buffer.len(),
            });
        }
        Ok(Self {
            buffer,
            width,
            height,
            child_tile_mask: 15,
            structure: HeightmapTerrainStructure::default(),
            created_by_upsampling: false,
            water_mask: None,
        })
    }
    pub fn with_child_tile_mask(mut self, child_tile_mask: u8) -> Self {
        self.child_tile_mask = child_tile_mask;
        self
    }
    pub fn with_structure(mut self, structure: HeightmapTerrainStructure) -> Self {
        self.structure = structure;
        self
    }
    pub fn with_water_mask(mut self, water_mask: Vec<u8>) -> Self {
        self.water_mask = Some(water_mask);
        self
    }
    pub fn width(&self) -> u32 {
        self.width
    }
    pub fn height(&self) -> u32 {
        self.height
    }
    pub fn buffer(&self) -> &[f32] {
        &self.buffer
    }
    pub fn structure(&self) -> &HeightmapTerrainStructure {
        &self.structure
    }

    // Callers keep `column < width` and `row < height`, so the index is inside the buffer.
    fn sample_at(&self, column: u32, row: u32) -> f32 {
        self.buffer[(row * self.width + column) as usize]
    }

    fn encoded_at(&self, column: u32, row: u32) -> f64 {
        self.sample_at(column, row) as f64
    }

    /// Encoded height at a fractional grid position measured from the west and south edges.
    fn interpolate_encoded_height(&self, from_west: f64, from_south: f64) -> f64 {
        let width = self.width;
        let height = self.height;

        let mut west_integer = (from_west.floor().max(0.0) as u32).min(width - 1);
        let mut east_integer = west_integer + 1;
        if east_integer >= width {
            east_integer = width - 1;
            west_integer = width - 2;
        }
        let mut south_integer = (from_south.floor().max(0.0) as u32).min(height - 1);
        let mut north_integer = south_integer + 1;
        if north_integer >= height {
            north_integer = height - 1;
            south_integer = height - 2;
        }

        let dx = from_west - west_integer as f64;
        let dy = from_south - south_integer as f64;

        // rows are stored north to south
        let south_row = height - 1 - south_integer;
        let north_row = height - 1 - north_integer;

        let south_west_height = self.encoded_at(west_integer, south_row);
        let south_east_height = self.encoded_at(east_integer, south_row);
        let north_west_height = self.encoded_at(west_integer, north_row);
        let north_east_height = self.encoded_at(east_integer, north_row);

        triangle_interpolate_height(
            dx,
            dy,
            south_west_height,
            south_east_height,
            north_west_height,
            north_east_height,
        )
    }
}

impl TerrainData for HeightmapTerrainData {
    fn create_mesh(
        &self,
        tiling_scheme: &dyn TilingScheme,
        x: u32,
        y: u32,
        level: u32,
        exaggeration: f64,
    ) -> Result<TerrainMesh, TerrainError> {
        let ellipsoid = tiling_scheme.get_ellipsoid();
        let rectangle = tiling_scheme.tile_x_y_to_rectangle(x, y, level);
        let native_rectangle = tiling_scheme.tile_x_y_to_native_rectangle(x, y, level);
        let center = ellipsoid.cartographic_to_cartesian(&rectangle.center());

        let width = self.width;
        let height = self.height;
        let rectangle_width = rectangle.compute_width();

        let mut vertices = Vec::with_capacity((width * height) as usize * TERRAIN_MESH_VERTEX_STRIDE);
        let mut positions = Vec::with_capacity((width * height) as usize);
        let mut minimum_height = f64::MAX;
        let mut maximum_height = f64::MIN;

        for row in 0..height {
            let v = row as f64 / (height - 1) as f64;
            let latitude = row_latitude(tiling_scheme, &rectangle, &native_rectangle, v);
            for column in 0..width {
                let u = column as f64 / (width - 1) as f64;
                let longitude = rectangle.west + u * rectangle_width;
                let sample = self.structure.decode(self.sample_at(column, row));
                let surface_height = sample * exaggeration;
                minimum_height = minimum_height.min(surface_height);
                maximum_height = maximum_height.max(surface_height);

                let position = ellipsoid.cartographic_to_cartesian(&Cartographic::new(
                    longitude,
                    latitude,
                    surface_height,
                ));
                positions.push(position);
                let relative = position - center;
                vertices.extend_from_slice(&[
                    relative.x as f32,
                    relative.y as f32,
                    relative.z as f32,
                    surface_height as f32,
                    u as f32,
                    (1.0 - v) as f32,
                ]);
            }
        }

        let bounding_sphere_3d = BoundingSphere::from_points(&positions);
        let occluder = EllipsoidalOccluder::new(ellipsoid);
        let occludee_point_in_scaled_space = occluder
            .compute_horizon_culling_point_possibly_under_ellipsoid(
                center,
                &positions,
                minimum_height,
            );

        Ok(TerrainMesh {
            center,
            vertices,
            indices: get_regular_grid_indices(width, height),
            minimum_height,
            maximum_height,
            bounding_sphere_3d,
            occludee_point_in_scaled_space,
            vertex_stride: TERRAIN_MESH_VERTEX_STRIDE,
        })
    }

    fn upsample(
        &self,
        tiling_scheme: &dyn TilingScheme,
        this_x: u32,
        this_y: u32,
        this_level: u32,
        descendant_x: u32,
        descendant_y: u32,
        descendant_level: u32,
    ) -> Result<Arc<dyn TerrainData>, TerrainError> {
        let source_tile = TileKey::new(this_x, this_y, this_level);
        let descendant = TileKey::new(descendant_x, descendant_y, descendant_level);
        if !descendant.is_descendant_of(&source_tile) {
            return Err(TerrainError::NotADescendant {
                source_tile,
                descendant,
            });
        }

        let width = self.width;
        let height = self.height;
        // Native coordinates are linear in both tiling schemes.
        let source_rectangle = tiling_scheme.tile_x_y_to_native_rectangle(this_x, this_y, this_level);
        let destination_rectangle =
            tiling_scheme.tile_x_y_to_native_rectangle(descendant_x, descendant_y, descendant_level);

        let mut heights = Vec::with_capacity((width * height) as usize);
        for row in 0..height {
            let native_y = lerp(
                destination_rectangle.north,
                destination_rectangle.south,
                row as f64 / (height - 1) as f64,
            );
            let from_south = (native_y - source_rectangle.south) * (height - 1) as f64
                / (source_rectangle.north - source_rectangle.south);
            for column in 0..width {
                let native_x = lerp(
                    destination_rectangle.west,
                    destination_rectangle.east,
                    column as f64 / (width - 1) as f64,
                );
                let from_west = (native_x - source_rectangle.west) * (width - 1) as f64
                    / (source_rectangle.east - source_rectangle.west);
                let sample = self.interpolate_encoded_height(from_west, from_south);
                heights.push(self.structure.clamp_encoded(sample) as f32);
            }
        }

        Ok(Arc::new(HeightmapTerrainData {
            buffer: heights,
            width,
            height,
            child_tile_mask: 0,
            structure: self.structure,
            created_by_upsampling: true,
            water_mask: None,
        }))
    }

    fn interpolate_height(
        &self,
        rectangle: &Rectangle,
        longitude: f64,
        latitude: f64,
    ) -> Option<f64> {
        if !rectangle.contains(&Cartographic::new(longitude, latitude, 0.0)) {
            return None;
        }
        let from_west =
            (longitude - rectangle.west) * (self.width - 1) as f64 / rectangle.compute_width();
        let from_south =
            (latitude - rectangle.south) * (self.height - 1) as f64 / rectangle.compute_height();
        let encoded = self.interpolate_encoded_height(from_west, from_south);
        Some(self.structure.decode(encoded as f32))
    }

    fn is_child_available(&self, this_x: u32, this_y: u32, child_x: u32, child_y: u32) -> bool {
        // bits: southwest 0, southeast 1, northwest 2, northeast 3
        let mut bit_number = 2;
        if child_x != this_x * 2 {
            bit_number += 1;
        }
        if child_y != this_y * 2 {
            bit_number -= 2;
        }
        self.child_tile_mask & (1 << bit_number) != 0
    }

    fn was_created_by_upsampling(&self) -> bool {
        self.created_by_upsampling
    }

    fn water_mask(&self) -> Option<&[u8]> {
        self.water_mask.as_deref()
    }
}

fn row_latitude(
    tiling_scheme: &dyn TilingScheme,
    rectangle: &Rectangle,
    native_rectangle: &Rectangle,
    v: f64,
) -> f64 {
    if tiling_scheme.get_name() == "GeographicTilingScheme" {
        return lerp(rectangle.north, rectangle.south, v);
    }
    let native_y = lerp(native_rectangle.north, native_rectangle.south, v);
    tiling_scheme
        .get_projection()
        .un_project(&DVec3::new(native_rectangle.west, native_y, 0.0))
        .latitude
}

/// The grid cells are split along the southwest to northeast diagonal.
fn triangle_interpolate_height(
    dx: f64,
    dy: f64,
    south_west_height: f64,
    south_east_height: f64,
    north_west_height: f64,
    north_east_height: f64,
) -> f64 {
    if dy < dx {
        south_west_height
            + dx * (south_east_height - south_west_height)
            + dy * (north_east_height - south_east_height)
    } else {
        south_west_height
            + dx * (north_east_height - north_west_height)
            + dy * (north_west_height - south_west_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        geographic_tiling_scheme::GeographicTilingScheme,
        math::{equals_epsilon, EPSILON5, EPSILON7},
        web_mercator_tiling_scheme::WebMercatorTilingScheme,
    };

    fn ramp(width: u32, height: u32) -> HeightmapTerrainData {
        // heights rise from west to east
        let buffer = (0..height)
            .flat_map(|_| (0..width).map(|column| column as f32 * 10.0))
            .collect();
        match HeightmapTerrainData::new(buffer, width, height) {
            Ok(data) => data,
            Err(error) => panic!("{}", error),
        }
    }

    #[test]
    fn rejects_bad_dimensions() {
        assert_eq!(
            HeightmapTerrainData::new(vec![0.0], 1, 1),
            Err(TerrainError::InvalidDimensions {
                width: 1,
                height: 1
            })
        );
        assert_eq!(
            HeightmapTerrainData::new(vec![0.0; 3], 2, 2),
            Err(TerrainError::BufferSizeMismatch {
                expected: 4,
                actual: 3
            })
        );
    }

    #[test]
    fn create_mesh_places_vertices_on_the_tile() {
        let tiling_scheme = GeographicTilingScheme::default();
        let data = ramp(5, 5);
        let mesh = match data.create_mesh(&tiling_scheme, 0, 0, 1, 1.0) {
            Ok(mesh) => mesh,
            Err(error) => panic!("{}", error),
        };
        assert_eq!(mesh.vertex_count(), 25);
        assert_eq!(mesh.triangle_count(), 4 * 4 * 2);
        assert_eq!(mesh.minimum_height, 0.0);
        assert_eq!(mesh.maximum_height, 40.0);

        let rectangle = tiling_scheme.tile_x_y_to_rectangle(0, 0, 1);
        let ellipsoid = tiling_scheme.get_ellipsoid();
        let northwest = ellipsoid.cartographic_to_cartesian(&rectangle.north_west());
        let first = DVec3::new(
            mesh.vertices[0] as f64,
            mesh.vertices[1] as f64,
            mesh.vertices[2] as f64,
        ) + mesh.center;
        assert!(first.abs_diff_eq(northwest, 1.0));
        // uv of the first vertex is the upper left corner
        assert_eq!(mesh.vertices[4], 0.0);
        assert_eq!(mesh.vertices[5], 1.0);
        assert!(mesh.bounding_sphere_3d.radius > 0.0);
    }

    #[test]
    fn create_mesh_applies_exaggeration() {
        let tiling_scheme = GeographicTilingScheme::default();
        let mesh = match ramp(3, 3).create_mesh(&tiling_scheme, 1, 0, 1, 2.0) {
            Ok(mesh) => mesh,
            Err(error) => panic!("{}", error),
        };
        assert_eq!(mesh.maximum_height, 40.0);
    }

    #[test]
    fn create_mesh_in_web_mercator() {
        let tiling_scheme = WebMercatorTilingScheme::default();
        let mesh = match ramp(3, 3).create_mesh(&tiling_scheme, 0, 0, 0, 1.0) {
            Ok(mesh) => mesh,
            Err(error) => panic!("{}", error),
        };
        assert_eq!(mesh.vertex_count(), 9);
    }

    #[test]
    fn upsample_interpolates_a_ramp() {
        let tiling_scheme = GeographicTilingScheme::default();
        let data = ramp(5, 5);
        let child = match data.upsample(&tiling_scheme, 0, 0, 0, 1, 0, 1) {
            Ok(child) => child,
            Err(error) => panic!("{}", error),
        };
        assert!(child.was_created_by_upsampling());
        assert!(!child.is_child_available(1, 0, 2, 0));

        // the eastern half of the ramp spans 20..40
        let mesh = match child.create_mesh(&tiling_scheme, 1, 0, 1, 1.0) {
            Ok(mesh) => mesh,
            Err(error) => panic!("{}", error),
        };
        assert!(equals_epsilon(mesh.minimum_height, 20.0, Some(EPSILON5), None));
        assert!(equals_epsilon(mesh.maximum_height, 40.0, Some(EPSILON5), None));
        let second_height = mesh.vertices[TERRAIN_MESH_VERTEX_STRIDE + 3] as f64;
        assert!(equals_epsilon(second_height, 25.0, Some(EPSILON7), None));
    }

    #[test]
    fn upsample_to_deeper_descendants() {
        let tiling_scheme = GeographicTilingScheme::default();
        let data = ramp(5, 5);
        assert!(data.upsample(&tiling_scheme, 0, 0, 0, 3, 1, 2).is_ok());
        assert_eq!(
            data.upsample(&tiling_scheme, 0, 0, 0, 4, 1, 2).err(),
            Some(TerrainError::NotADescendant {
                source_tile: TileKey::new(0, 0, 0),
                descendant: TileKey::new(4, 1, 2),
            })
        );
    }

    #[test]
    fn child_availability_follows_mask() {
        let data = ramp(2, 2).with_child_tile_mask(0b0100);
        assert!(data.is_child_available(0, 0, 0, 0));
        assert!(!data.is_child_available(0, 0, 1, 0));
        assert!(!data.is_child_available(0, 0, 0, 1));
        assert!(!data.is_child_available(0, 0, 1, 1));
        assert!(data.water_mask().is_none());
        assert_eq!(ramp(2, 2).with_water_mask(vec![1]).water_mask(), Some(&[1u8][..]));
    }

    #[test]
    fn interpolated_height_follows_the_ramp() {
        let tiling_scheme = GeographicTilingScheme::default();
        let rectangle = tiling_scheme.tile_x_y_to_rectangle(0, 0, 1);
        let data = ramp(5, 5);
        let middle = rectangle.center();
        let Some(height) = data.interpolate_height(&rectangle, middle.longitude, middle.latitude)
        else {
            panic!("the center is inside the tile");
        };
        assert!(equals_epsilon(height, 20.0, Some(EPSILON7), None));
        let Some(east) = data.interpolate_height(&rectangle, rectangle.east, rectangle.south) else {
            panic!("the corner is inside the tile");
        };
        assert!(equals_epsilon(east, 40.0, Some(EPSILON7), None));
        assert_eq!(
            data.interpolate_height(&rectangle, rectangle.east + 0.5, middle.latitude),
            None
        );
    }
}
