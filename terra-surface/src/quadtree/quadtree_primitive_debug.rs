use serde::{Deserialize, Serialize};

/// Traversal counters of the current frame plus the flags controlling them. Only the flags are
/// part of the configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuadtreePrimitiveDebug {
    pub enable_debug_output: bool,
    /// Keeps the last selection while the camera moves.
    pub suspend_lod_update: bool,

    #[serde(skip)]
    pub max_depth: u32,
    #[serde(skip)]
    pub tiles_visited: u32,
    #[serde(skip)]
    pub tiles_culled: u32,
    #[serde(skip)]
    pub tiles_rendered: u32,
    #[serde(skip)]
    pub tiles_waiting_for_children: u32,

    #[serde(skip)]
    pub last_max_depth: u32,
    #[serde(skip)]
    pub last_tiles_visited: u32,
    #[serde(skip)]
    pub last_tiles_culled: u32,
    #[serde(skip)]
    pub last_tiles_rendered: u32,
    #[serde(skip)]
    pub last_tiles_waiting_for_children: u32,
}
impl Default for QuadtreePrimitiveDebug {
    fn default() -> Self {
        Self::new()
    }
}
impl QuadtreePrimitiveDebug {
    pub fn new() -> Self {
        Self {
            enable_debug_output: true,
            suspend_lod_update: false,
            max_depth: 0,
            tiles_visited: 0,
            tiles_culled: 0,
            tiles_rendered: 0,
            tiles_waiting_for_children: 0,
            last_max_depth: 0,
            last_tiles_visited: 0,
            last_tiles_culled: 0,
            last_tiles_rendered: 0,
            last_tiles_waiting_for_children: 0,
        }
    }
    pub fn reset(&mut self) {
        self.max_depth = 0;
        self.tiles_visited = 0;
        self.tiles_culled = 0;
        self.tiles_rendered = 0;
        self.tiles_waiting_for_children = 0;
    }

    /// Returns the summary line when any counter differs from the last reported frame.
    pub fn update_display(&mut self) -> Option<String> {
        if !self.enable_debug_output {
            return None;
        }
        let changed = self.tiles_visited != self.last_tiles_visited
            || self.tiles_rendered != self.last_tiles_rendered
            || self.tiles_culled != self.last_tiles_culled
            || self.max_depth != self.last_max_depth
            || self.tiles_waiting_for_children != self.last_tiles_waiting_for_children;
        if !changed {
            return None;
        }
        self.last_tiles_visited = self.tiles_visited;
        self.last_tiles_rendered = self.tiles_rendered;
        self.last_tiles_culled = self.tiles_culled;
        self.last_max_depth = self.max_depth;
        self.last_tiles_waiting_for_children = self.tiles_waiting_for_children;
        Some(format!(
            "Visited {}, Rendered: {}, Culled: {}, Max Depth: {}, Waiting for children: {}",
            self.tiles_visited,
            self.tiles_rendered,
            self.tiles_culled,
            self.max_depth,
            self.tiles_waiting_for_children
        ))
    }
}
