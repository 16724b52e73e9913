use std::sync::Arc;

use terra_jobs::{AsyncReturn, Context, Job};
use terra_scene::{TerrainData, TerrainError, TerrainMesh, TilingScheme};

use super::{
    error::TileError,
    quadtree_tile_storage::QuadtreeTileStorage,
    tile_terrain::{TerrainState, TerrainTicket},
};

pub struct CreateTerrainMeshJob {
    pub ticket: TerrainTicket,
    pub data: Arc<dyn TerrainData>,
    pub tiling_scheme: Arc<dyn TilingScheme>,
    pub exaggeration: f64,
}
pub struct CreateTerrainMeshJobOutcome {
    pub ticket: TerrainTicket,
    pub result: Result<TerrainMesh, TerrainError>,
}
impl Job for CreateTerrainMeshJob {
    type Outcome = CreateTerrainMeshJobOutcome;
    fn name(&self) -> String {
        format!("create terrain mesh {}", self.ticket.key)
    }
    fn perform(self, _context: Context) -> AsyncReturn<Self::Outcome> {
        Box::pin(async move {
            let key = self.ticket.key;
            let result = self.data.create_mesh(
                self.tiling_scheme.as_ref(),
                key.x,
                key.y,
                key.level,
                self.exaggeration,
            );
            CreateTerrainMeshJobOutcome {
                ticket: self.ticket,
                result,
            }
        })
    }
}
impl CreateTerrainMeshJobOutcome {
    pub fn apply(self, storage: &mut QuadtreeTileStorage) -> Option<TileError> {
        let key = self.ticket.key;
        let terrain = storage.find_terrain_mut(&self.ticket)?;
        if terrain.state != TerrainState::Transforming {
            return None;
        }
        match self.result {
            Ok(mesh) => {
                terrain.mesh = Some(mesh);
                terrain.state = TerrainState::Transformed;
                None
            }
            Err(error) => {
                terrain.state = TerrainState::Failed;
                Some(TileError::TerrainTransform {
                    key,
                    reason: error.to_string(),
                })
            }
        }
    }
}
