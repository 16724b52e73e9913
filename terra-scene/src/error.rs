use thiserror::Error;

use crate::tile_key::TileKey;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TerrainError {
    #[error("heightmap must be at least 2x2, got {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("heightmap buffer holds {actual} samples, expected {expected}")]
    BufferSizeMismatch { expected: usize, actual: usize },
    #[error("tile {descendant} is not a descendant of {source_tile}")]
    NotADescendant {
        source_tile: TileKey,
        descendant: TileKey,
    },
}
