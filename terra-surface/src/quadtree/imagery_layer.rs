use std::{
    fmt,
    sync::atomic::{AtomicU32, Ordering},
};

use bevy::math::DVec4;
use serde::{Deserialize, Serialize};
use terra_jobs::JobQueue;
use terra_scene::{Rectangle, TileKey};

use super::{
    globe_surface_tile::GlobeSurfaceTile,
    imagery_provider::ImageryProvider,
    imagery_storage::{ImageryKey, ImageryState, ImageryStorage},
    render_context::RenderContext,
    request_image_job::RequestImageJob,
    terrain_provider::TerrainProvider,
    tile_imagery::TileImagery,
};

static NEXT_LAYER_ID: AtomicU32 = AtomicU32::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageryLayerId(u32);
impl ImageryLayerId {
    pub fn new() -> Self {
        Self(NEXT_LAYER_ID.fetch_add(1, Ordering::Relaxed))
    }
}
impl Default for ImageryLayerId {
    fn default() -> Self {
        Self::new()
    }
}
impl fmt::Display for ImageryLayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer#{}", self.0)
    }
}

/// Per-layer display settings. Color adjustments are applied when the layer is drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageryLayerOptions {
    pub alpha: f64,
    pub brightness: f64,
    pub contrast: f64,
    /// Radians.
    pub hue: f64,
    pub saturation: f64,
    pub gamma: f64,
    pub show: bool,
    /// Imagery outside this rectangle is not shown.
    pub rectangle: Rectangle,
    pub minimum_terrain_level: Option<u32>,
    pub maximum_terrain_level: Option<u32>,
}
impl Default for ImageryLayerOptions {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            brightness: 1.0,
            contrast: 1.0,
            hue: 0.0,
            saturation: 1.0,
            gamma: 1.0,
            show: true,
            rectangle: Rectangle::MAX_VALUE,
            minimum_terrain_level: None,
            maximum_terrain_level: None,
        }
    }
}

pub struct ImageryLayer {
    id: ImageryLayerId,
    pub imagery_provider: Box<dyn ImageryProvider>,
    pub options: ImageryLayerOptions,
    pub storage: ImageryStorage,
    pub(super) is_base_layer: bool,
    pub(super) layer_index: usize,
    pub(super) shown: Option<bool>,
}
impl ImageryLayer {
    pub fn new(imagery_provider: Box<dyn ImageryProvider>) -> Self {
        Self::with_options(imagery_provider, ImageryLayerOptions::default())
    }
    pub fn with_options(
        imagery_provider: Box<dyn ImageryProvider>,
        options: ImageryLayerOptions,
    ) -> Self {
        Self {
            id: ImageryLayerId::new(),
            imagery_provider,
            options,
            storage: ImageryStorage::new(),
            is_base_layer: false,
            layer_index: 0,
            shown: None,
        }
    }
    pub fn id(&self) -> ImageryLayerId {
        self.id
    }
    pub fn is_base_layer(&self) -> bool {
        self.is_base_layer
    }
    pub fn layer_index(&self) -> usize {
        self.layer_index
    }
    pub fn show(&self) -> bool {
        self.options.show
    }
    pub fn set_show(&mut self, show: bool) {
        self.options.show = show;
    }

    fn get_level_with_maximum_texel_spacing(
        &self,
        texel_spacing: f64,
        latitude_closest_to_equator: f64,
    ) -> u32 {
        let tiling_scheme = self.imagery_provider.get_tiling_scheme();
        let ellipsoid = tiling_scheme.get_ellipsoid();
        let latitude_factor = if tiling_scheme.get_name() == "GeographicTilingScheme" {
            1.0
        } else {
            latitude_closest_to_equator.cos()
        };
        let level_zero_maximum_texel_spacing = ellipsoid.maximum_radius
            * tiling_scheme.get_rectangle().compute_width()
            * latitude_factor
            / (self.imagery_provider.get_tile_width()
                * tiling_scheme.get_number_of_x_tiles_at_level(0)) as f64;

        let two_to_the_level_power = level_zero_maximum_texel_spacing / texel_spacing;
        let level = two_to_the_level_power.log2().round();
        if level.is_nan() {
            return 0;
        }
        level.max(0.0) as u32
    }

    /// Adds the [`TileImagery`] entries mapping this layer's imagery onto a terrain tile,
    /// starting at `insertion_point` (the end of the list when `None`). Returns false when the
    /// layer has nothing to show on the tile.
    pub fn create_tile_imagery_skeletons(
        &mut self,
        tile_key: &TileKey,
        tile_rectangle: &Rectangle,
        surface_tile: &mut GlobeSurfaceTile,
        terrain_provider: &dyn TerrainProvider,
        insertion_point: Option<usize>,
    ) -> bool {
        if let Some(minimum) = self.options.minimum_terrain_level {
            if tile_key.level < minimum {
                return false;
            }
        }
        if let Some(maximum) = self.options.maximum_terrain_level {
            if tile_key.level > maximum {
                return false;
            }
        }
        let mut insertion_point = insertion_point
            .unwrap_or(surface_tile.imagery.len())
            .min(surface_tile.imagery.len());

        if !self.imagery_provider.get_ready() {
            // skeletons are created once the provider is ready
            surface_tile
                .imagery
                .insert(insertion_point, TileImagery::placeholder(self.id));
            return true;
        }

        let Some(imagery_bounds) = self
            .imagery_provider
            .get_rectangle()
            .intersection(&self.options.rectangle)
        else {
            return false;
        };
        let rectangle = match tile_rectangle.intersection(&imagery_bounds) {
            Some(rectangle) => rectangle,
            None => {
                // Only the base layer covers tiles it does not overlap, by stretching its edge
                // texels.
                if !self.is_base_layer {
                    return false;
                }
                stretch_to_bounds(tile_rectangle, &imagery_bounds)
            }
        };

        let mut latitude_closest_to_equator = 0.0;
        if rectangle.south > 0.0 {
            latitude_closest_to_equator = rectangle.south;
        } else if rectangle.north < 0.0 {
            latitude_closest_to_equator = rectangle.north;
        }

        let target_geometric_error =
            terrain_provider.get_level_maximum_geometric_error(tile_key.level);
        let imagery_level = self
            .get_level_with_maximum_texel_spacing(
                target_geometric_error,
                latitude_closest_to_equator,
            )
            .min(self.imagery_provider.get_maximum_level())
            .max(self.imagery_provider.get_minimum_level());

        let imagery_tiling_scheme = self.imagery_provider.get_tiling_scheme();
        let (Some(mut north_west), Some(mut south_east)) = (
            imagery_tiling_scheme.position_to_tile_x_y(&rectangle.north_west(), imagery_level),
            imagery_tiling_scheme.position_to_tile_x_y(&rectangle.south_east(), imagery_level),
        ) else {
            return false;
        };

        // Imagery tiles overlapping the terrain tile by less than 1/512 of its size are skipped.
        let very_close_x = tile_rectangle.compute_width() / 512.0;
        let very_close_y = tile_rectangle.compute_height() / 512.0;

        let north_west_tile_rectangle =
            imagery_tiling_scheme.tile_x_y_to_rectangle(north_west.x, north_west.y, imagery_level);
        if (north_west_tile_rectangle.south - tile_rectangle.north).abs() < very_close_y
            && north_west.y < south_east.y
        {
            north_west.y += 1;
        }
        if (north_west_tile_rectangle.east - tile_rectangle.west).abs() < very_close_x
            && north_west.x < south_east.x
        {
            north_west.x += 1;
        }

        let south_east_tile_rectangle =
            imagery_tiling_scheme.tile_x_y_to_rectangle(south_east.x, south_east.y, imagery_level);
        if (south_east_tile_rectangle.north - tile_rectangle.south).abs() < very_close_y
            && south_east.y > north_west.y
        {
            south_east.y -= 1;
        }
        if (south_east_tile_rectangle.west - tile_rectangle.east).abs() < very_close_x
            && south_east.x > north_west.x
        {
            south_east.x -= 1;
        }

        let terrain_rectangle = *tile_rectangle;
        let first_imagery_rectangle =
            imagery_tiling_scheme.tile_x_y_to_rectangle(north_west.x, north_west.y, imagery_level);
        let clipped = first_imagery_rectangle
            .intersection(&imagery_bounds)
            .unwrap_or(first_imagery_rectangle);

        let mut max_u = 0.0;
        let mut min_v = 1.0;

        // The north-western imagery tile may start inside the terrain tile.
        if !self.is_base_layer && (clipped.west - terrain_rectangle.west).abs() >= very_close_x {
            max_u = ((clipped.west - terrain_rectangle.west) / terrain_rectangle.compute_width())
                .min(1.0);
        }
        if !self.is_base_layer && (clipped.north - terrain_rectangle.north).abs() >= very_close_y
        {
            min_v = ((clipped.north - terrain_rectangle.south)
                / terrain_rectangle.compute_height())
            .max(0.0);
        }

        let initial_min_v = min_v;
        for i in north_west.x..=south_east.x {
            let min_u = max_u;

            let imagery_rectangle =
                imagery_tiling_scheme.tile_x_y_to_rectangle(i, north_west.y, imagery_level);
            let Some(clipped) = imagery_rectangle.simple_intersection(&imagery_bounds) else {
                continue;
            };
            max_u = ((clipped.east - terrain_rectangle.west) / terrain_rectangle.compute_width())
                .min(1.0);
            // the last column always reaches the eastern edge
            if i == south_east.x
                && (self.is_base_layer
                    || (clipped.east - terrain_rectangle.east).abs() < very_close_x)
            {
                max_u = 1.0;
            }

            min_v = initial_min_v;
            for j in north_west.y..=south_east.y {
                let max_v = min_v;

                let imagery_rectangle =
                    imagery_tiling_scheme.tile_x_y_to_rectangle(i, j, imagery_level);
                let Some(clipped) = imagery_rectangle.simple_intersection(&imagery_bounds) else {
                    continue;
                };
                min_v = ((clipped.south - terrain_rectangle.south)
                    / terrain_rectangle.compute_height())
                .max(0.0);
                if j == south_east.y
                    && (self.is_base_layer
                        || (clipped.south - terrain_rectangle.south).abs() < very_close_y)
                {
                    min_v = 0.0;
                }

                let texture_coordinate_rectangle = DVec4::new(min_u, min_v, max_u, max_v);
                let imagery_key = TileKey::new(i, j, imagery_level);
                self.storage
                    .get_imagery_from_cache(imagery_key, imagery_tiling_scheme);
                surface_tile.imagery.insert(
                    insertion_point,
                    TileImagery::new(self.id, imagery_key, texture_coordinate_rectangle),
                );
                insertion_point += 1;
            }
        }
        true
    }

    /// Advances one imagery node: requests its image, then turns the image into a texture
    /// unless the provider's discard policy rejects it.
    pub fn process_imagery_state_machine(
        &mut self,
        key: &TileKey,
        render_context: &mut dyn RenderContext,
        jobs: &mut JobQueue,
    ) {
        let Some(imagery) = self.storage.get_mut(key) else {
            return;
        };
        if imagery.state == ImageryState::Unloaded {
            if let Some(request) = self.imagery_provider.request_image(key.x, key.y, key.level) {
                imagery.state = ImageryState::Loading;
                jobs.spawn(RequestImageJob {
                    imagery_key: ImageryKey::new(*key, self.id),
                    generation: imagery.generation(),
                    request,
                });
            }
        }
        if imagery.state == ImageryState::Received {
            imagery.state = ImageryState::Transforming;
            match imagery.image.take() {
                Some(image) => match self.imagery_provider.get_tile_discard_policy() {
                    // retried next frame
                    Some(policy) if !policy.is_ready() => {
                        imagery.image = Some(image);
                        imagery.state = ImageryState::Received;
                    }
                    Some(policy) if policy.should_discard_image(&image) => {
                        imagery.state = ImageryState::Invalid;
                    }
                    _ => {
                        imagery.texture = Some(render_context.create_texture(&image));
                        imagery.state = ImageryState::Ready;
                    }
                },
                None => imagery.state = ImageryState::Failed,
            }
        }
    }

    /// Releases one reference on a cached imagery node, logging unbalanced releases.
    pub fn release_imagery(&mut self, key: &TileKey) {
        if let Err(error) = self.storage.release_reference(key) {
            bevy::log::warn!("{}: {}", self.id, error);
        }
    }
}

/// Maps the imagery rectangle onto the terrain tile's texture coordinates as
/// `(offset_x, offset_y, scale_x, scale_y)`.
pub fn calculate_texture_translation_and_scale(
    terrain_rectangle: &Rectangle,
    imagery_rectangle: &Rectangle,
) -> DVec4 {
    let terrain_width = terrain_rectangle.compute_width();
    let terrain_height = terrain_rectangle.compute_height();
    let scale_x = terrain_width / imagery_rectangle.compute_width();
    let scale_y = terrain_height / imagery_rectangle.compute_height();
    DVec4::new(
        scale_x * (terrain_rectangle.west - imagery_rectangle.west) / terrain_width,
        scale_y * (terrain_rectangle.south - imagery_rectangle.south) / terrain_height,
        scale_x,
        scale_y,
    )
}

/// The part of `bounds` closest to a terrain rectangle lying outside of it, collapsed onto
/// the nearest edge.
fn stretch_to_bounds(terrain: &Rectangle, bounds: &Rectangle) -> Rectangle {
    let mut rectangle = Rectangle::default();
    if terrain.south >= bounds.north {
        rectangle.north = bounds.north;
        rectangle.south = bounds.north;
    } else if terrain.north <= bounds.south {
        rectangle.north = bounds.south;
        rectangle.south = bounds.south;
    } else {
        rectangle.south = terrain.south.max(bounds.south);
        rectangle.north = terrain.north.min(bounds.north);
    }

    if terrain.west >= bounds.east {
        rectangle.west = bounds.east;
        rectangle.east = bounds.east;
    } else if terrain.east <= bounds.west {
        rectangle.west = bounds.west;
        rectangle.east = bounds.west;
    } else {
        rectangle.west = terrain.west.max(bounds.west);
        rectangle.east = terrain.east.min(bounds.east);
    }
    rectangle
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use terra_scene::{equals_epsilon, GeographicTilingScheme, TilingScheme, EPSILON14};

    use super::*;
    use crate::quadtree::{
        ellipsoid_terrain_provider::EllipsoidTerrainProvider,
        imagery_layer_collection::ImageryLayerCollection,
        imagery_provider::{DiscardMissingTileImagePolicy, ImageryImage},
        render_context::HeadlessRenderContext,
        test_support::{wait_for_jobs, TestImageryProvider},
    };

    fn tile_rectangle(key: &TileKey) -> Rectangle {
        GeographicTilingScheme::default().tile_x_y_to_rectangle(key.x, key.y, key.level)
    }

    #[test]
    fn translation_and_scale_of_a_parent_imagery_tile() {
        let terrain = Rectangle::new(0.5, 0.0, 1.0, 0.5);
        let imagery = Rectangle::new(0.0, 0.0, 1.0, 1.0);
        let result = calculate_texture_translation_and_scale(&terrain, &imagery);
        assert!(equals_epsilon(result.x, 0.5, Some(EPSILON14), None));
        assert!(equals_epsilon(result.y, 0.0, Some(EPSILON14), None));
        assert!(equals_epsilon(result.z, 0.5, Some(EPSILON14), None));
        assert!(equals_epsilon(result.w, 0.5, Some(EPSILON14), None));
    }

    #[test]
    fn matching_tiling_schemes_map_one_imagery_tile_per_terrain_tile() {
        let terrain_provider = EllipsoidTerrainProvider::default();
        // 256 texels per imagery tile land on the same level as the terrain
        let mut layer = ImageryLayer::new(Box::new(TestImageryProvider::with_tile_size(256)));
        let key = TileKey::new(1, 0, 1);
        let mut surface_tile = GlobeSurfaceTile::new();
        assert!(layer.create_tile_imagery_skeletons(
            &key,
            &tile_rectangle(&key),
            &mut surface_tile,
            &terrain_provider,
            None,
        ));
        assert_eq!(surface_tile.imagery.len(), 1);
        let tile_imagery = &surface_tile.imagery[0];
        assert_eq!(tile_imagery.loading_imagery, Some(key));
        assert_eq!(
            tile_imagery.texture_coordinate_rectangle,
            DVec4::new(0.0, 0.0, 1.0, 1.0)
        );
        assert_eq!(layer.storage.len(), 2);
    }

    #[test]
    fn finer_imagery_needs_several_tiles() {
        let terrain_provider = EllipsoidTerrainProvider::default();
        // half the texels per tile puts imagery one level deeper
        let mut layer = ImageryLayer::new(Box::new(TestImageryProvider::with_tile_size(128)));
        let key = TileKey::new(0, 0, 0);
        let mut surface_tile = GlobeSurfaceTile::new();
        layer.create_tile_imagery_skeletons(
            &key,
            &tile_rectangle(&key),
            &mut surface_tile,
            &terrain_provider,
            None,
        );
        let keys: Vec<_> = surface_tile
            .imagery
            .iter()
            .filter_map(|x| x.loading_imagery)
            .collect();
        assert_eq!(
            keys,
            vec![
                TileKey::new(0, 0, 1),
                TileKey::new(0, 1, 1),
                TileKey::new(1, 0, 1),
                TileKey::new(1, 1, 1),
            ]
        );
        let north_west = surface_tile.imagery[0].texture_coordinate_rectangle;
        assert!(equals_epsilon(north_west.y, 0.5, Some(EPSILON14), None));
        assert!(equals_epsilon(north_west.z, 0.5, Some(EPSILON14), None));
    }

    #[test]
    fn layer_rectangle_limits_skeletons() {
        let terrain_provider = EllipsoidTerrainProvider::default();
        let options = ImageryLayerOptions {
            rectangle: Rectangle::from_degrees(0.0, 0.0, 10.0, 10.0),
            ..Default::default()
        };
        let mut layer = ImageryLayer::with_options(
            Box::new(TestImageryProvider::with_tile_size(256)),
            options,
        );
        let west = TileKey::new(0, 0, 0);
        let mut surface_tile = GlobeSurfaceTile::new();
        assert!(!layer.create_tile_imagery_skeletons(
            &west,
            &tile_rectangle(&west),
            &mut surface_tile,
            &terrain_provider,
            None,
        ));
        assert!(surface_tile.imagery.is_empty());

        // the base layer stretches its edge over tiles it does not cover
        layer.is_base_layer = true;
        assert!(layer.create_tile_imagery_skeletons(
            &west,
            &tile_rectangle(&west),
            &mut surface_tile,
            &terrain_provider,
            None,
        ));
        assert_eq!(surface_tile.imagery.len(), 1);
    }

    #[test]
    fn terrain_level_limits() {
        let terrain_provider = EllipsoidTerrainProvider::default();
        let options = ImageryLayerOptions {
            minimum_terrain_level: Some(2),
            ..Default::default()
        };
        let mut layer = ImageryLayer::with_options(
            Box::new(TestImageryProvider::with_tile_size(256)),
            options,
        );
        let key = TileKey::new(0, 0, 1);
        let mut surface_tile = GlobeSurfaceTile::new();
        assert!(!layer.create_tile_imagery_skeletons(
            &key,
            &tile_rectangle(&key),
            &mut surface_tile,
            &terrain_provider,
            None,
        ));
    }

    #[test]
    fn provider_not_ready_gives_a_placeholder() {
        let terrain_provider = EllipsoidTerrainProvider::default();
        let provider = TestImageryProvider::with_tile_size(256);
        provider.set_ready(false);
        let mut layer = ImageryLayer::new(Box::new(provider));
        let key = TileKey::new(0, 0, 0);
        let mut surface_tile = GlobeSurfaceTile::new();
        assert!(layer.create_tile_imagery_skeletons(
            &key,
            &tile_rectangle(&key),
            &mut surface_tile,
            &terrain_provider,
            None,
        ));
        assert!(surface_tile.imagery[0].is_placeholder);
        assert!(layer.storage.is_empty());
    }

    #[test]
    fn imagery_becomes_a_texture() {
        let provider = TestImageryProvider::with_tile_size(256);
        let mut layer = ImageryLayer::new(Box::new(provider));
        let tiling_scheme = Arc::new(GeographicTilingScheme::default());
        let key = TileKey::new(0, 0, 0);
        layer
            .storage
            .get_imagery_from_cache(key, tiling_scheme.as_ref());

        let mut render_context = HeadlessRenderContext::default();
        let mut jobs = JobQueue::new();
        layer.process_imagery_state_machine(&key, &mut render_context, &mut jobs);
        assert_eq!(
            layer.storage.get(&key).map(|x| x.state),
            Some(ImageryState::Loading)
        );

        wait_for_jobs(&mut jobs);
        let mut layers = ImageryLayerCollection::new();
        let id = layers.add(layer);
        while let Some(outcome) = jobs.take_next::<RequestImageJob>() {
            assert!(outcome.apply(&mut layers).is_none());
        }
        let Some(layer) = layers.get_by_id_mut(id) else {
            panic!("layer was just added");
        };
        layer.process_imagery_state_machine(&key, &mut render_context, &mut jobs);
        let Some(imagery) = layer.storage.get(&key) else {
            panic!("imagery should still be cached");
        };
        assert_eq!(imagery.state, ImageryState::Ready);
        assert!(imagery.texture.is_some());
        assert!(imagery.image.is_none());
        assert_eq!(render_context.live_texture_count(), 1);
    }

    fn layer_with_received_image(
        provider: TestImageryProvider,
        key: TileKey,
    ) -> (ImageryLayerCollection, ImageryLayerId) {
        let mut layer = ImageryLayer::new(Box::new(provider));
        layer
            .storage
            .get_imagery_from_cache(key, &GeographicTilingScheme::default());
        let mut jobs = JobQueue::new();
        layer.process_imagery_state_machine(
            &key,
            &mut HeadlessRenderContext::default(),
            &mut jobs,
        );
        wait_for_jobs(&mut jobs);
        let mut layers = ImageryLayerCollection::new();
        let id = layers.add(layer);
        while let Some(outcome) = jobs.take_next::<RequestImageJob>() {
            assert!(outcome.apply(&mut layers).is_none());
        }
        (layers, id)
    }

    #[test]
    fn missing_tile_images_are_discarded() {
        let policy = Arc::new(DiscardMissingTileImagePolicy::default());
        let provider =
            TestImageryProvider::with_tile_size(256).with_discard_policy(policy.clone());
        let key = TileKey::new(0, 0, 0);
        let (mut layers, id) = layer_with_received_image(provider, key);
        let Some(layer) = layers.get_by_id_mut(id) else {
            panic!("layer was just added");
        };
        let mut render_context = HeadlessRenderContext::default();
        let mut jobs = JobQueue::new();

        // held back until the policy knows what a missing tile looks like
        layer.process_imagery_state_machine(&key, &mut render_context, &mut jobs);
        let Some(imagery) = layer.storage.get(&key) else {
            panic!("imagery should still be cached");
        };
        assert_eq!(imagery.state, ImageryState::Received);
        assert!(imagery.image.is_some());

        assert!(policy.set_missing_image(ImageryImage::new(1, 1, vec![255; 4])));
        assert!(!policy.set_missing_image(ImageryImage::new(1, 1, vec![0; 4])));
        layer.process_imagery_state_machine(&key, &mut render_context, &mut jobs);
        let Some(imagery) = layer.storage.get(&key) else {
            panic!("imagery should still be cached");
        };
        assert_eq!(imagery.state, ImageryState::Invalid);
        assert!(imagery.texture.is_none());
        assert_eq!(render_context.live_texture_count(), 0);
    }

    #[test]
    fn images_unlike_the_missing_tile_are_kept() {
        let policy = Arc::new(DiscardMissingTileImagePolicy::new(ImageryImage::new(
            1,
            1,
            vec![0; 4],
        )));
        let provider = TestImageryProvider::with_tile_size(256).with_discard_policy(policy);
        let key = TileKey::new(0, 0, 0);
        let (mut layers, id) = layer_with_received_image(provider, key);
        let Some(layer) = layers.get_by_id_mut(id) else {
            panic!("layer was just added");
        };
        let mut render_context = HeadlessRenderContext::default();
        layer.process_imagery_state_machine(&key, &mut render_context, &mut JobQueue::new());
        assert_eq!(
            layer.storage.get(&key).map(|x| x.state),
            Some(ImageryState::Ready)
        );
        assert_eq!(render_context.live_texture_count(), 1);
    }
}
