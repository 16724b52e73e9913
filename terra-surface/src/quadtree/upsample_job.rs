use std::sync::Arc;

use terra_jobs::{AsyncReturn, Context, Job};
use terra_scene::{TerrainData, TerrainError, TilingScheme};

use super::{
    error::TileError,
    quadtree_tile_storage::QuadtreeTileStorage,
    tile_terrain::{TerrainState, TerrainTicket, UpsampleDetails},
};

pub struct UpsampleJob {
    pub ticket: TerrainTicket,
    pub details: UpsampleDetails,
    pub tiling_scheme: Arc<dyn TilingScheme>,
}
pub struct UpsampleJobOutcome {
    pub ticket: TerrainTicket,
    pub result: Result<Arc<dyn TerrainData>, TerrainError>,
}
impl Job for UpsampleJob {
    type Outcome = UpsampleJobOutcome;
    fn name(&self) -> String {
        format!(
            "upsample {} from {}/{}/{}",
            self.ticket.key, self.details.level, self.details.x, self.details.y
        )
    }
    fn perform(self, _context: Context) -> AsyncReturn<Self::Outcome> {
        Box::pin(async move {
            let key = self.ticket.key;
            let details = &self.details;
            let result = details.data.upsample(
                self.tiling_scheme.as_ref(),
                details.x,
                details.y,
                details.level,
                key.x,
                key.y,
                key.level,
            );
            UpsampleJobOutcome {
                ticket: self.ticket,
                result,
            }
        })
    }
}
impl UpsampleJobOutcome {
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
                Some(TileError::TerrainUpsample {
                    key,
                    reason: error.to_string(),
                })
            }
        }
    }
}
