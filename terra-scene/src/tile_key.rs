use std::fmt;

use serde::{Deserialize, Serialize};

/// Address of a tile in a tiling scheme. `y` counts from the north.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TileKey {
    pub x: u32,
    pub y: u32,
    pub level: u32,
}
impl TileKey {
    pub fn new(x: u32, y: u32, level: u32) -> Self {
        Self { x, y, level }
    }
    pub fn parent(&self) -> Option<TileKey> {
        if self.level == 0 {
            return None;
        }
        Some(TileKey::new(self.x / 2, self.y / 2, self.level - 1))
    }
    pub fn northwest(&self) -> TileKey {
        TileKey::new(self.x * 2, self.y * 2, self.level + 1)
    }
    pub fn northeast(&self) -> TileKey {
        TileKey::new(self.x * 2 + 1, self.y * 2, self.level + 1)
    }
    pub fn southwest(&self) -> TileKey {
        TileKey::new(self.x * 2, self.y * 2 + 1, self.level + 1)
    }
    pub fn southeast(&self) -> TileKey {
        TileKey::new(self.x * 2 + 1, self.y * 2 + 1, self.level + 1)
    }
    /// The four children in northwest, northeast, southwest, southeast order.
    pub fn children(&self) -> [TileKey; 4] {
        [
            self.northwest(),
            self.northeast(),
            self.southwest(),
            self.southeast(),
        ]
    }
    /// Whether `self` lies strictly below `ancestor` in the quadtree.
    pub fn is_descendant_of(&self, ancestor: &TileKey) -> bool {
        if self.level <= ancestor.level {
            return false;
        }
        let shift = self.level - ancestor.level;
        self.x >> shift == ancestor.x && self.y >> shift == ancestor.y
    }
}
impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.level, self.x, self.y)
    }
}
