use bevy::prelude::*;

use self::{error::TileError, frame_state::FrameState, quadtree_primitive::QuadtreePrimitive};

pub mod create_terrain_mesh_job;
pub mod ellipsoid_terrain_provider;
pub mod error;
pub mod frame_state;
pub mod globe_surface_tile;
pub mod globe_surface_tile_provider;
pub mod imagery_layer;
pub mod imagery_layer_collection;
pub mod imagery_provider;
pub mod imagery_storage;
pub mod quadtree_occluders;
pub mod quadtree_primitive;
pub mod quadtree_primitive_debug;
pub mod quadtree_tile;
pub mod quadtree_tile_storage;
pub mod render_context;
pub mod request_image_job;
pub mod request_tile_geometry_job;
pub mod terrain_provider;
#[cfg(test)]
mod test_support;
pub mod tile_coordinates_imagery_provider;
pub mod tile_draw_command;
pub mod tile_imagery;
pub mod tile_replacement_queue;
pub mod tile_terrain;
pub mod upsample_job;

/// A tile failed to load some of its data.
#[derive(Event, Debug, Clone)]
pub struct TileLoadError(pub TileError);

/// Sent whenever the number of tiles waiting to load changes.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileLoadProgress {
    pub pending: usize,
}

/// Steps a [`QuadtreePrimitive`] resource once per frame using the [`FrameState`] resource.
/// Both are created with their defaults unless the app inserted them first.
pub struct Plugin;
impl bevy::prelude::Plugin for Plugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<FrameState>();
        app.init_resource::<QuadtreePrimitive>();
        app.add_event::<TileLoadError>();
        app.add_event::<TileLoadProgress>();
        app.add_systems(Update, render_system);
    }
}

fn render_system(
    mut primitive: ResMut<QuadtreePrimitive>,
    mut frame_state: ResMut<FrameState>,
    mut tile_load_errors: EventWriter<TileLoadError>,
    mut tile_load_progress: EventWriter<TileLoadProgress>,
) {
    frame_state.advance();
    primitive.begin_frame(&frame_state);
    primitive.update(&frame_state);
    primitive.end_frame(&frame_state);

    for error in primitive.take_errors() {
        tile_load_errors.send(TileLoadError(error));
    }
    for pending in primitive.take_tile_load_progress() {
        tile_load_progress.send(TileLoadProgress { pending });
    }
}
