use std::sync::Arc;

use bevy::{
    math::{DVec2, DVec3, UVec2},
    prelude::Resource,
};
use serde::{Deserialize, Serialize};
use terra_scene::{
    Cartographic, CullingVolume, Ellipsoid, GeographicProjection, PerspectiveFrustum, Projection,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SceneMode {
    #[default]
    Scene3D,
    Scene2D,
    ColumbusView,
    Morphing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Passes {
    pub render: bool,
    pub pick: bool,
}
impl Default for Passes {
    fn default() -> Self {
        Self {
            render: true,
            pick: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameCamera {
    pub position_wc: DVec3,
    pub position_cartographic: Cartographic,
    pub direction_wc: DVec3,
    pub up_wc: DVec3,
    pub frustum: PerspectiveFrustum,
    /// Width and height of the orthographic frustum used in 2D, in projected meters.
    pub frustum_2d: DVec2,
}
impl Default for FrameCamera {
    fn default() -> Self {
        Self {
            position_wc: DVec3::new(0.0, 0.0, 0.0),
            position_cartographic: Cartographic::ZERO,
            direction_wc: DVec3::NEG_Z,
            up_wc: DVec3::Y,
            frustum: PerspectiveFrustum::default(),
            frustum_2d: DVec2::ONE,
        }
    }
}

/// Everything the quadtree needs to know about the frame being drawn.
#[derive(Resource, Debug, Clone)]
pub struct FrameState {
    pub frame_number: u32,
    pub mode: SceneMode,
    pub morph_time: f64,
    pub passes: Passes,
    pub camera: FrameCamera,
    pub culling_volume: CullingVolume,
    pub viewport: UVec2,
    pub terrain_exaggeration: f64,
    pub map_projection: Arc<dyn Projection>,
}
impl Default for FrameState {
    fn default() -> Self {
        Self::new(Arc::new(GeographicProjection::default()))
    }
}
impl FrameState {
    pub fn new(map_projection: Arc<dyn Projection>) -> Self {
        Self {
            frame_number: 0,
            mode: SceneMode::Scene3D,
            morph_time: 1.0,
            passes: Passes::default(),
            camera: FrameCamera::default(),
            culling_volume: CullingVolume::default(),
            viewport: UVec2::new(1024, 768),
            terrain_exaggeration: 1.0,
            map_projection,
        }
    }

    pub fn ellipsoid(&self) -> &Ellipsoid {
        self.map_projection.get_ellipsoid()
    }

    /// Places the camera at `position_wc` looking at `target`, refreshing the cartographic
    /// position and the culling volume.
    pub fn look_at(&mut self, position_wc: DVec3, target: DVec3) {
        let direction = (target - position_wc).normalize_or_zero();
        let hint = if direction.cross(DVec3::Z).length_squared() < 1e-12 {
            DVec3::X
        } else {
            DVec3::Z
        };
        let right = direction.cross(hint).normalize_or_zero();
        let up = right.cross(direction).normalize_or_zero();
        self.set_camera(position_wc, direction, up);
    }

    pub fn set_camera(&mut self, position_wc: DVec3, direction_wc: DVec3, up_wc: DVec3) {
        let ellipsoid = *self.ellipsoid();
        self.camera.position_wc = position_wc;
        self.camera.position_cartographic =
            Cartographic::from_cartesian(position_wc, &ellipsoid).unwrap_or_default();
        self.camera.direction_wc = direction_wc;
        self.camera.up_wc = up_wc;
        self.camera.frustum.aspect_ratio = self.viewport.x as f64 / self.viewport.y.max(1) as f64;
        self.culling_volume =
            self.camera
                .frustum
                .compute_culling_volume(position_wc, direction_wc, up_wc);
    }

    /// Moves on to the next frame.
    pub fn advance(&mut self) {
        self.frame_number = self.frame_number.wrapping_add(1);
    }
}
