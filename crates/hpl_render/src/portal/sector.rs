//! Sectors: convex-ish rooms holding content and portals

use std::collections::BTreeSet;

use crate::foundation::collections::{EntityId, SectorId};
use crate::foundation::math::Vec3;
use crate::portal::portal::{Portal, PortalKey};
use crate::scene::entity::ContainerClass;
use crate::spatial::bounding_volume::BoundingVolume;

/// Region of the world with its own object sets and outgoing portals
#[derive(Debug, Clone)]
pub struct Sector {
    name: String,
    bounding_volume: BoundingVolume,
    has_bounds: bool,
    static_objects: BTreeSet<EntityId>,
    dynamic_objects: BTreeSet<EntityId>,
    entities: BTreeSet<EntityId>,
    portals: Vec<Portal>,
}

impl Sector {
    /// Create an empty sector
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bounding_volume: BoundingVolume::new(),
            has_bounds: false,
            static_objects: BTreeSet::new(),
            dynamic_objects: BTreeSet::new(),
            entities: BTreeSet::new(),
            portals: Vec::new(),
        }
    }

    /// Sector name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Union of all static content and portals
    pub const fn bounding_volume(&self) -> &BoundingVolume {
        &self.bounding_volume
    }

    /// Grow the bounds to enclose `[min, max]`
    pub fn add_bounds(&mut self, min: &Vec3, max: &Vec3) {
        if self.has_bounds {
            self.bounding_volume.add_box(min, max);
        } else {
            self.bounding_volume.set_local_min_max(*min, *max);
            self.has_bounds = true;
        }
    }

    /// Static objects
    pub const fn static_objects(&self) -> &BTreeSet<EntityId> {
        &self.static_objects
    }

    /// Dynamic objects
    pub const fn dynamic_objects(&self) -> &BTreeSet<EntityId> {
        &self.dynamic_objects
    }

    /// Non-renderable entities
    pub const fn entities(&self) -> &BTreeSet<EntityId> {
        &self.entities
    }

    /// True if the object is filed here in any set
    pub fn contains_object(&self, id: EntityId) -> bool {
        self.static_objects.contains(&id) || self.dynamic_objects.contains(&id) || self.entities.contains(&id)
    }

    /// Outgoing portals
    pub fn portals(&self) -> &[Portal] {
        &self.portals
    }

    /// Portal by index
    pub fn portal(&self, index: usize) -> Option<&Portal> {
        self.portals.get(index)
    }

    pub(crate) fn portal_mut(&mut self, index: usize) -> Option<&mut Portal> {
        self.portals.get_mut(index)
    }

    pub(crate) fn portals_mut(&mut self) -> &mut [Portal] {
        &mut self.portals
    }

    /// Index of the portal with a given id
    pub fn portal_index_by_id(&self, id: i32) -> Option<usize> {
        self.portals.iter().position(|p| p.id() == id)
    }

    /// Keys of every outgoing portal, given this sector's id
    pub fn portal_keys(&self, sector: SectorId) -> Vec<PortalKey> {
        (0..self.portals.len()).map(|index| PortalKey { sector, index }).collect()
    }

    pub(crate) fn push_portal(&mut self, portal: Portal) -> usize {
        let (min, max) = (portal.bounding_volume().min(), portal.bounding_volume().max());
        self.add_bounds(&min, &max);
        self.portals.push(portal);
        self.portals.len() - 1
    }

    pub(crate) fn insert(&mut self, class: ContainerClass, id: EntityId) {
        match class {
            ContainerClass::Static => {
                self.static_objects.insert(id);
            }
            ContainerClass::Dynamic => {
                self.dynamic_objects.insert(id);
            }
            ContainerClass::Entity => {
                self.entities.insert(id);
            }
            ContainerClass::None => {}
        }
    }

    pub(crate) fn remove(&mut self, id: EntityId) -> bool {
        let removed_static = self.static_objects.remove(&id);
        let removed_dynamic = self.dynamic_objects.remove(&id);
        let removed_entity = self.entities.remove(&id);
        removed_static || removed_dynamic || removed_entity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_bounds_grow_with_portals() {
        let mut sector = Sector::new("room");
        sector.add_bounds(&Vec3::zeros(), &Vec3::repeat(10.0));
        let portal = Portal::new(0, "hall", -Vec3::x())
            .with_points(&[Vec3::new(10.0, 0.0, 0.0), Vec3::new(12.0, 2.0, 2.0)]);
        assert_eq!(sector.push_portal(portal), 0);
        assert_relative_eq!(sector.bounding_volume().max().x, 12.0);
        assert_eq!(sector.portal_index_by_id(0), Some(0));
    }

    #[test]
    fn test_first_bounds_replace_empty_box() {
        let mut sector = Sector::new("room");
        sector.add_bounds(&Vec3::repeat(5.0), &Vec3::repeat(6.0));
        assert_relative_eq!(sector.bounding_volume().min(), Vec3::repeat(5.0));
    }
}
