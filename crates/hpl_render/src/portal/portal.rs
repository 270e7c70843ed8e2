//! Portals connecting sectors
//!
//! A portal is a convex opening owned by one sector that looks into a target
//! sector. Its plane faces back into the owning sector: a viewer can look
//! through the portal only from the positive side.

use std::cell::OnceCell;

use crate::foundation::collections::SectorId;
use crate::foundation::math::{Plane, Vec3};
use crate::spatial::bounding_volume::BoundingVolume;

/// Address of a portal inside the container: owning sector plus index
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PortalKey {
    /// Owning sector
    pub sector: SectorId,
    /// Index in the sector's portal list
    pub index: usize,
}

/// Opening from one sector into another
#[derive(Debug, Clone)]
pub struct Portal {
    id: i32,
    sector: SectorId,
    target_name: String,
    target: OnceCell<Option<SectorId>>,
    normal: Vec3,
    points: Vec<Vec3>,
    plane: Plane,
    bounding_volume: BoundingVolume,
    active: bool,
    reachable_ids: Vec<i32>,
    reachable: Vec<PortalKey>,
    compiled: bool,
}

impl Portal {
    /// Create a portal looking into `target_name`.
    ///
    /// `normal` points back into the owning sector.
    pub fn new(id: i32, target_name: impl Into<String>, normal: Vec3) -> Self {
        Self {
            id,
            sector: SectorId::default(),
            target_name: target_name.into(),
            target: OnceCell::new(),
            normal: normal.try_normalize(f32::EPSILON).unwrap_or_else(Vec3::zeros),
            points: Vec::new(),
            plane: Plane::from_normal_point(&normal, &Vec3::zeros()),
            bounding_volume: BoundingVolume::new(),
            active: true,
            reachable_ids: Vec::new(),
            reachable: Vec::new(),
            compiled: false,
        }
    }

    /// Add the corner points of the opening
    #[must_use]
    pub fn with_points(mut self, points: &[Vec3]) -> Self {
        for point in points {
            self.add_point(*point);
        }
        self
    }

    /// Add a corner point, growing the bounding volume and moving the plane
    /// through its centre
    pub fn add_point(&mut self, point: Vec3) {
        if self.points.is_empty() {
            self.bounding_volume.set_local_min_max(point, point);
        } else {
            self.bounding_volume.add_box(&point, &point);
        }
        self.points.push(point);
        self.plane = Plane::from_normal_point(&self.normal, &self.bounding_volume.center());
    }

    /// List a portal of the target sector as visible through this one
    pub fn add_reachable_portal_id(&mut self, id: i32) {
        if !self.reachable_ids.contains(&id) {
            self.reachable_ids.push(id);
        }
    }

    /// Portal id, unique within the owning sector
    pub const fn id(&self) -> i32 {
        self.id
    }

    /// Owning sector
    pub const fn sector(&self) -> SectorId {
        self.sector
    }

    pub(crate) fn set_sector(&mut self, sector: SectorId) {
        self.sector = sector;
    }

    /// Name of the sector seen through the portal
    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    /// Memoised resolution of the target name
    pub(crate) const fn target_cache(&self) -> &OnceCell<Option<SectorId>> {
        &self.target
    }

    /// Facing normal
    pub const fn normal(&self) -> Vec3 {
        self.normal
    }

    /// Plane through the opening
    pub const fn plane(&self) -> &Plane {
        &self.plane
    }

    /// Corner points
    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    /// Bounds of the opening
    pub const fn bounding_volume(&self) -> &BoundingVolume {
        &self.bounding_volume
    }

    /// True if the portal can be looked through
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Open or close the portal
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// True if `point` is on the side the portal can be looked through from
    pub fn is_facing(&self, point: &Vec3) -> bool {
        self.plane.distance_to_point(point) >= 0.0
    }

    /// Explicitly listed reachable portal ids
    pub fn reachable_portal_ids(&self) -> &[i32] {
        &self.reachable_ids
    }

    /// Portals of the target sector visible through this one, valid after compile
    pub fn reachable(&self) -> &[PortalKey] {
        &self.reachable
    }

    /// True once the container compiled this portal
    pub const fn is_compiled(&self) -> bool {
        self.compiled
    }

    pub(crate) fn reset_compilation(&mut self) {
        self.target = OnceCell::new();
        self.reachable.clear();
        self.compiled = false;
    }

    pub(crate) fn set_reachable(&mut self, reachable: Vec<PortalKey>) {
        self.reachable = reachable;
        self.compiled = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_points_define_bounds_and_plane() {
        let portal = Portal::new(1, "hall", Vec3::new(-1.0, 0.0, 0.0)).with_points(&[
            Vec3::new(10.0, 0.0, -1.0),
            Vec3::new(10.0, 0.0, 1.0),
            Vec3::new(10.0, 2.0, 1.0),
            Vec3::new(10.0, 2.0, -1.0),
        ]);
        assert_relative_eq!(portal.bounding_volume().center(), Vec3::new(10.0, 1.0, 0.0));
        assert!(portal.is_facing(&Vec3::new(5.0, 1.0, 0.0)));
        assert!(!portal.is_facing(&Vec3::new(15.0, 1.0, 0.0)));
        assert!(!portal.is_compiled());
    }

    #[test]
    fn test_reachable_ids_are_unique() {
        let mut portal = Portal::new(1, "hall", Vec3::x());
        portal.add_reachable_portal_id(3);
        portal.add_reachable_portal_id(3);
        portal.add_reachable_portal_id(4);
        assert_eq!(portal.reachable_portal_ids(), &[3, 4]);
    }
}
