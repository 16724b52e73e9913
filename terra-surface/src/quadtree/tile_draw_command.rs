use bevy::math::{DVec3, DVec4};
use terra_scene::TileKey;

use super::{
    imagery_layer::ImageryLayerId,
    imagery_layer_collection::ImageryLayerCollection,
    quadtree_tile::QuadtreeTile,
    render_context::{Texture, VertexArray},
};

/// One imagery texture draped over a tile, with the layer's color adjustments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayTexture {
    pub layer_id: ImageryLayerId,
    pub texture: Texture,
    pub translation_and_scale: DVec4,
    pub texture_coordinate_rectangle: DVec4,
    pub alpha: f64,
    pub brightness: f64,
    pub contrast: f64,
    pub hue: f64,
    pub saturation: f64,
    pub gamma: f64,
}

/// Everything needed to draw one pass of a tile.
#[derive(Debug, Clone, PartialEq)]
pub struct TileDrawCommand {
    pub tile: TileKey,
    pub distance: f64,
    pub vertex_array: VertexArray,
    /// Vertex positions are relative to this point.
    pub center: DVec3,
    pub day_textures: Vec<DayTexture>,
    pub water_mask_source: Option<TileKey>,
    pub water_mask_translation_and_scale: DVec4,
    /// Set on every pass after the first, which draws over it with alpha blending.
    pub blend: bool,
}
impl TileDrawCommand {
    /// The textures a tile can show right now, bottom layer first. Hidden and fully
    /// transparent layers are skipped.
    pub fn collect_day_textures(
        tile: &QuadtreeTile,
        imagery_layers: &ImageryLayerCollection,
    ) -> Vec<DayTexture> {
        let Some(surface_tile) = tile.data.as_ref() else {
            return vec![];
        };
        surface_tile
            .imagery
            .iter()
            .filter_map(|tile_imagery| {
                let layer = imagery_layers.get_by_id(tile_imagery.layer_id)?;
                if !layer.show() || layer.options.alpha == 0.0 {
                    return None;
                }
                let imagery = layer.storage.get(&tile_imagery.ready_imagery?)?;
                let options = &layer.options;
                Some(DayTexture {
                    layer_id: layer.id(),
                    texture: imagery.texture?,
                    translation_and_scale: tile_imagery.texture_translation_and_scale?,
                    texture_coordinate_rectangle: tile_imagery.texture_coordinate_rectangle,
                    alpha: options.alpha,
                    brightness: options.brightness,
                    contrast: options.contrast,
                    hue: options.hue,
                    saturation: options.saturation,
                    gamma: options.gamma,
                })
            })
            .collect()
    }

    /// Splits the tile's textures into passes of at most `maximum_texture_units` each. A tile
    /// without textures still gets one pass. Tiles without a vertex array get none.
    pub fn for_tile(
        tile: &QuadtreeTile,
        day_textures: Vec<DayTexture>,
        maximum_texture_units: usize,
    ) -> Vec<TileDrawCommand> {
        let Some(surface_tile) = tile.data.as_ref() else {
            return vec![];
        };
        let Some(vertex_array) = surface_tile.vertex_array else {
            return vec![];
        };
        let command = |day_textures: Vec<DayTexture>, blend: bool| TileDrawCommand {
            tile: tile.key,
            distance: tile.distance,
            vertex_array,
            center: surface_tile.center,
            day_textures,
            water_mask_source: surface_tile.water_mask_source,
            water_mask_translation_and_scale: surface_tile.water_mask_translation_and_scale,
            blend,
        };
        if day_textures.is_empty() {
            return vec![command(vec![], false)];
        }
        day_textures
            .chunks(maximum_texture_units.max(1))
            .enumerate()
            .map(|(index, textures)| command(textures.to_vec(), index > 0))
            .collect()
    }
}
