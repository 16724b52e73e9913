use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use terra_jobs::JobQueue;
use terra_scene::{
    Ellipsoid, Rectangle, TerrainData, TerrainMesh, TileBoundingRegion, TileKey, TilingScheme,
};

use super::{
    create_terrain_mesh_job::CreateTerrainMeshJob,
    globe_surface_tile::GlobeSurfaceTile,
    render_context::{RenderContext, VertexArray},
    request_tile_geometry_job::RequestTileGeometryJob,
    terrain_provider::TerrainProvider,
    upsample_job::UpsampleJob,
};

/// `Failed` sorts first so that `state >= Received` means "has data".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TerrainState {
    Failed,
    Unloaded,
    Receiving,
    Received,
    Transforming,
    Transformed,
    Buffering,
    Ready,
}

/// Where new terrain for a tile comes from when it is derived from an ancestor.
#[derive(Debug, Clone)]
pub struct UpsampleDetails {
    pub data: Arc<dyn TerrainData>,
    pub x: u32,
    pub y: u32,
    pub level: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerrainSlot {
    Loaded,
    Upsampled,
}

/// Identifies the exact [`TileTerrain`] an asynchronous outcome belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerrainTicket {
    pub key: TileKey,
    pub epoch: u64,
    pub generation: u64,
    pub slot: TerrainSlot,
}

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
pub struct TileTerrain {
    pub state: TerrainState,
    pub data: Option<Arc<dyn TerrainData>>,
    pub mesh: Option<TerrainMesh>,
    pub vertex_array: Option<VertexArray>,
    pub upsample_details: Option<UpsampleDetails>,
    generation: u64,
}
impl TileTerrain {
    pub fn new(upsample_details: Option<UpsampleDetails>) -> Self {
        Self {
            state: TerrainState::Unloaded,
            data: None,
            mesh: None,
            vertex_array: None,
            upsample_details,
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
        }
    }
    pub fn generation(&self) -> u64 {
        self.generation
    }
    pub fn ticket(&self, key: TileKey, epoch: u64, slot: TerrainSlot) -> TerrainTicket {
        TerrainTicket {
            key,
            epoch,
            generation: self.generation,
            slot,
        }
    }

    pub fn free_resources(&mut self, vertex_arrays_to_destroy: &mut Vec<VertexArray>) {
        self.state = TerrainState::Unloaded;
        self.data = None;
        self.mesh = None;
        if let Some(vertex_array) = self.vertex_array.take() {
            vertex_arrays_to_destroy.push(vertex_array);
        }
    }

    /// Moves the mesh bounds and the vertex array into the tile. The tile's previous vertex
    /// array is queued for destruction.
    pub fn publish_to_tile(
        &mut self,
        surface_tile: &mut GlobeSurfaceTile,
        rectangle: &Rectangle,
        ellipsoid: &Ellipsoid,
        vertex_arrays_to_destroy: &mut Vec<VertexArray>,
    ) {
        let Some(mesh) = self.mesh.take() else {
            return;
        };
        surface_tile.center = mesh.center;
        surface_tile.minimum_height = mesh.minimum_height;
        surface_tile.maximum_height = mesh.maximum_height;
        surface_tile.bounding_sphere_3d = mesh.bounding_sphere_3d;
        surface_tile.occludee_point_in_scaled_space = mesh.occludee_point_in_scaled_space;
        surface_tile.tile_bounding_region = Some(TileBoundingRegion::new(
            rectangle,
            mesh.minimum_height,
            mesh.maximum_height,
            ellipsoid,
        ));

        if let Some(vertex_array) = surface_tile.vertex_array.take() {
            vertex_arrays_to_destroy.push(vertex_array);
        }
        surface_tile.vertex_array = self.vertex_array.take();
        surface_tile.mesh = Some(mesh);
    }

    pub fn process_load_state_machine(
        &mut self,
        key: TileKey,
        epoch: u64,
        terrain_provider: &dyn TerrainProvider,
        exaggeration: f64,
        render_context: &mut dyn RenderContext,
        jobs: &mut JobQueue,
    ) {
        let ticket = self.ticket(key, epoch, TerrainSlot::Loaded);
        if self.state == TerrainState::Unloaded {
            self.request_tile_geometry(ticket, terrain_provider, jobs);
        }
        let tiling_scheme = terrain_provider.get_tiling_scheme();
        if self.state == TerrainState::Received {
            self.transform(ticket, tiling_scheme, exaggeration, jobs);
        }
        if self.state == TerrainState::Transformed {
            self.create_resources(render_context);
        }
    }

    pub fn process_upsample_state_machine(
        &mut self,
        key: TileKey,
        epoch: u64,
        tiling_scheme: Arc<dyn TilingScheme>,
        exaggeration: f64,
        render_context: &mut dyn RenderContext,
        jobs: &mut JobQueue,
    ) {
        let ticket = self.ticket(key, epoch, TerrainSlot::Upsampled);
        if self.state == TerrainState::Unloaded {
            let Some(details) = self.upsample_details.clone() else {
                bevy::log::warn!("tile {} has nothing to upsample from", key);
                self.state = TerrainState::Failed;
                return;
            };
            self.state = TerrainState::Receiving;
            jobs.spawn(UpsampleJob {
                ticket,
                details,
                tiling_scheme: tiling_scheme.clone(),
            });
        }
        if self.state == TerrainState::Received {
            self.transform(ticket, tiling_scheme, exaggeration, jobs);
        }
        if self.state == TerrainState::Transformed {
            self.create_resources(render_context);
        }
    }

    fn request_tile_geometry(
        &mut self,
        ticket: TerrainTicket,
        terrain_provider: &dyn TerrainProvider,
        jobs: &mut JobQueue,
    ) {
        let key = ticket.key;
        let Some(request) = terrain_provider.request_tile_geometry(key.x, key.y, key.level) else {
            // throttled, try again next frame
            return;
        };
        self.state = TerrainState::Receiving;
        jobs.spawn(RequestTileGeometryJob { ticket, request });
    }

    fn transform(
        &mut self,
        ticket: TerrainTicket,
        tiling_scheme: Arc<dyn TilingScheme>,
        exaggeration: f64,
        jobs: &mut JobQueue,
    ) {
        let Some(data) = self.data.clone() else {
            self.state = TerrainState::Failed;
            return;
        };
        self.state = TerrainState::Transforming;
        jobs.spawn(CreateTerrainMeshJob {
            ticket,
            data,
            tiling_scheme,
            exaggeration,
        });
    }

    fn create_resources(&mut self, render_context: &mut dyn RenderContext) {
        self.state = TerrainState::Buffering;
        let Some(mesh) = self.mesh.as_ref() else {
            self.state = TerrainState::Failed;
            return;
        };
        self.vertex_array = Some(render_context.create_vertex_array(&mesh.vertices, &mesh.indices));
        self.state = TerrainState::Ready;
    }
}
