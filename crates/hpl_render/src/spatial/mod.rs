//! Spatial primitives: bounding volumes, shadow volumes and frusta

pub mod bounding_volume;
pub mod frustum;
pub mod shadow_volume;

pub use bounding_volume::{BoundingVolume, WorldExtents};
pub use frustum::{Frustum, FrustumCollision, FrustumPlaneType};
pub use shadow_volume::ShadowVolumeBv;
