use std::sync::Arc;

use terra_jobs::{AsyncReturn, Context, Job};
use terra_scene::TerrainData;

use super::{
    error::{ProviderError, TileError},
    quadtree_tile_storage::QuadtreeTileStorage,
    terrain_provider::TerrainRequest,
    tile_terrain::{TerrainState, TerrainTicket},
};

pub struct RequestTileGeometryJob {
    pub ticket: TerrainTicket,
    pub request: TerrainRequest,
}
pub struct RequestTileGeometryJobOutcome {
    pub ticket: TerrainTicket,
    pub result: Result<Arc<dyn TerrainData>, ProviderError>,
}
impl Job for RequestTileGeometryJob {
    type Outcome = RequestTileGeometryJobOutcome;
    fn name(&self) -> String {
        format!("request tile geometry {}", self.ticket.key)
    }
    fn perform(self, _context: Context) -> AsyncReturn<Self::Outcome> {
        Box::pin(async move {
            let result = self.request.await;
            RequestTileGeometryJobOutcome {
                ticket: self.ticket,
                result,
            }
        })
    }
}
impl RequestTileGeometryJobOutcome {
    /// Stores the received terrain. Outcomes for terrain that has since been replaced or freed
    /// are dropped.
    pub fn apply(self, storage: &mut QuadtreeTileStorage) -> Option<TileError> {
        let key = self.ticket.key;
        let terrain = storage.find_terrain_mut(&self.ticket)?;
        if terrain.state != TerrainState::Receiving {
            return None;
        }
        match self.result {
            Ok(data) => {
                terrain.data = Some(data);
                terrain.state = TerrainState::Received;
                None
            }
            Err(error) => {
                terrain.state = TerrainState::Failed;
                Some(TileError::TerrainRequest {
                    key,
                    reason: error.to_string(),
                })
            }
        }
    }
}
