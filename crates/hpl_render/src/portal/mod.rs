//! Portal/sector visibility
//!
//! Sectors are convex rooms joined by portals. A visibility query walks from
//! the sector(s) holding the viewer through every portal it can see,
//! narrowing the visible region with each portal's shadow volume.

pub mod container;
#[allow(clippy::module_inception)]
pub mod portal;
pub mod sector;
pub mod visibility;

#[cfg(test)]
mod tests;

pub use container::PortalContainer;
pub use portal::{Portal, PortalKey};
pub use sector::Sector;
pub use visibility::{
    PortalVisibility, PortalVisibilitySet, SectorVisibility, SectorVisibilityContainer, VisibilityQuery,
    PORTAL_SHADOW_RANGE,
};
