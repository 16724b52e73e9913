use terra_scene::{TerrainError, TileKey};
use thiserror::Error;

/// What terrain and imagery providers report when a request cannot be served.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("provider is not ready")]
    NotReady,
    #[error(transparent)]
    Terrain(#[from] TerrainError),
}

/// A terminal failure of one tile's load pipeline. Emitted once per failure, never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TileError {
    #[error("terrain request for tile {key} failed: {reason}")]
    TerrainRequest { key: TileKey, reason: String },
    #[error("terrain mesh creation for tile {key} failed: {reason}")]
    TerrainTransform { key: TileKey, reason: String },
    #[error("upsampling terrain for tile {key} failed: {reason}")]
    TerrainUpsample { key: TileKey, reason: String },
    #[error("imagery request for tile {key} failed: {reason}")]
    ImageryRequest { key: TileKey, reason: String },
}
impl TileError {
    pub fn key(&self) -> TileKey {
        match self {
            TileError::TerrainRequest { key, .. }
            | TileError::TerrainTransform { key, .. }
            | TileError::TerrainUpsample { key, .. }
            | TileError::ImageryRequest { key, .. } => *key,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ImageryError {
    #[error("imagery {0} released more often than referenced")]
    OverReleased(TileKey),
    #[error("imagery {0} is not in the cache")]
    UnknownImagery(TileKey),
}
