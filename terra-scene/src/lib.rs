#![warn(clippy::unwrap_used, clippy::expect_used)]

pub mod bounding_sphere;
pub mod culling_volume;
pub mod ellipsoid;
pub mod ellipsoidal_occluder;
pub mod error;
pub mod geographic_projection;
pub mod geographic_tiling_scheme;
pub mod height_map_terrain;
pub mod math;
pub mod perspective_frustum;
pub mod plane;
pub mod projection;
pub mod rectangle;
pub mod terrain_data;
pub mod tile_bounding_region;
pub mod tile_key;
pub mod tiling_scheme;
pub mod web_mercator_projection;
pub mod web_mercator_tiling_scheme;

pub use bounding_sphere::*;
pub use culling_volume::*;
pub use ellipsoid::*;
pub use ellipsoidal_occluder::*;
pub use error::*;
pub use geographic_projection::*;
pub use geographic_tiling_scheme::*;
pub use height_map_terrain::*;
pub use math::*;
pub use perspective_frustum::*;
pub use plane::*;
pub use projection::*;
pub use rectangle::*;
pub use terrain_data::*;
pub use tile_bounding_region::*;
pub use tile_key::*;
pub use tiling_scheme::*;
pub use web_mercator_projection::*;
pub use web_mercator_tiling_scheme::*;
