//! Portal container: sectors, object filing and visibility queries
//!
//! Every renderable is filed into each sector whose bounds it overlaps, or
//! into a global list when it overlaps none. Visibility for the camera and
//! for each light is computed with a [`SectorVisibilityContainer`] walk.

use std::collections::{BTreeMap, BTreeSet};

use crate::foundation::collections::{EntityId, SectorId, SlotMap};
use crate::foundation::logging::{debug, error, info, warn};
use crate::foundation::math::Vec3;
use crate::portal::portal::{Portal, PortalKey};
use crate::portal::sector::Sector;
use crate::portal::visibility::SectorVisibilityContainer;
use crate::render::light::Light3D;
use crate::render::render_list::RenderList;
use crate::scene::entity::{ContainerClass, ContainerData, EntityStore};
use crate::scene::error::{SceneError, SceneResult};
use crate::spatial::bounding_volume::BoundingVolume;
use crate::spatial::frustum::{Frustum, FrustumCollision};

/// Sector graph and object registry
#[derive(Debug, Default)]
pub struct PortalContainer {
    sectors: SlotMap<SectorId, Sector>,
    names: BTreeMap<String, SectorId>,
    global_static: BTreeSet<EntityId>,
    global_dynamic: BTreeSet<EntityId>,
    global_entities: BTreeSet<EntityId>,
    visible_sectors: Vec<SectorId>,
    compiled: bool,
}

impl PortalContainer {
    /// Empty container
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sector, returning the existing one if the name is taken
    pub fn add_sector(&mut self, name: &str) -> SectorId {
        if let Some(&id) = self.names.get(name) {
            debug!("Sector '{}' already exists", name);
            return id;
        }
        let id = self.sectors.insert(Sector::new(name));
        self.names.insert(name.to_owned(), id);
        self.compiled = false;
        id
    }

    /// Grow a sector's bounds by a box
    pub fn add_sector_bounds(&mut self, name: &str, min: &Vec3, max: &Vec3) -> SceneResult<()> {
        let id = self.sector_id(name)?;
        if let Some(sector) = self.sectors.get_mut(id) {
            sector.add_bounds(min, max);
        }
        Ok(())
    }

    /// Add a portal to the named sector
    pub fn add_portal(&mut self, mut portal: Portal, sector_name: &str) -> SceneResult<PortalKey> {
        let id = self.sector_id(sector_name)?;
        let Some(sector) = self.sectors.get_mut(id) else {
            return Err(SceneError::UnknownSector(sector_name.to_owned()));
        };
        if sector.portal_index_by_id(portal.id()).is_some() {
            return Err(SceneError::DuplicatePortal {
                sector: sector_name.to_owned(),
                id: portal.id(),
            });
        }
        portal.set_sector(id);
        let index = sector.push_portal(portal);
        self.compiled = false;
        Ok(PortalKey { sector: id, index })
    }

    /// File static level content into the named sector and grow its bounds
    pub fn add_to_sector(&mut self, store: &mut EntityStore, id: EntityId, sector_name: &str) -> SceneResult<()> {
        let sector_id = self.sector_id(sector_name)?;
        let Some(entity) = store.get_mut(id) else {
            return Err(SceneError::UnknownEntity(id));
        };
        let (min, max) = (entity.bounding_volume().min(), entity.bounding_volume().max());
        let Some(sector) = self.sectors.get_mut(sector_id) else {
            return Err(SceneError::UnknownSector(sector_name.to_owned()));
        };
        sector.add_bounds(&min, &max);
        sector.insert(ContainerClass::Static, id);

        let data = entity.container_mut();
        data.class = ContainerClass::Static;
        if !data.sectors.contains(&sector_id) {
            data.sectors.push(sector_id);
        }
        if data.current_sector.is_none() {
            data.current_sector = Some(sector_id);
        }
        Ok(())
    }

    /// File a renderable by its bounds. Returns false for unknown entities.
    pub fn add(&mut self, store: &mut EntityStore, id: EntityId, is_static: bool) -> bool {
        let class = if is_static { ContainerClass::Static } else { ContainerClass::Dynamic };
        self.file(store, id, class)
    }

    /// Unfile a renderable. Returns false if it was not filed.
    pub fn remove(&mut self, store: &mut EntityStore, id: EntityId) -> bool {
        self.unfile(store, id)
    }

    /// File a non-renderable entity, such as a light
    pub fn add_entity(&mut self, store: &mut EntityStore, id: EntityId) -> bool {
        self.file(store, id, ContainerClass::Entity)
    }

    /// Unfile a non-renderable entity
    pub fn remove_entity(&mut self, store: &mut EntityStore, id: EntityId) -> bool {
        self.unfile(store, id)
    }

    /// Refile a moved dynamic object or entity. Static content is ignored.
    pub fn on_transform_update(&mut self, store: &mut EntityStore, id: EntityId) {
        let class = store.get(id).map_or(ContainerClass::None, |e| e.container().class);
        if matches!(class, ContainerClass::Dynamic | ContainerClass::Entity) {
            self.file(store, id, class);
        }
    }

    /// Resolve every portal target and cache the portals reachable through
    /// each portal
    pub fn compile(&mut self) {
        for sector in self.sectors.values_mut() {
            for portal in sector.portals_mut() {
                portal.reset_compilation();
            }
        }

        let mut reachable = Vec::new();
        let mut portal_count = 0;
        for (id, sector) in &self.sectors {
            for (index, portal) in sector.portals().iter().enumerate() {
                reachable.push((PortalKey { sector: id, index }, self.default_through_portals(portal)));
                portal_count += 1;
            }
        }
        for (key, list) in reachable {
            if let Some(portal) = self.portal_mut(key) {
                portal.set_reachable(list);
            }
        }
        self.compiled = true;
        info!("Compiled portal container: {} sectors, {} portals", self.sectors.len(), portal_count);
    }

    /// True after [`compile`](Self::compile) with no structural change since
    pub const fn is_compiled(&self) -> bool {
        self.compiled
    }

    /// Add every visible object to the render list.
    ///
    /// Objects in sectors reached through portals must also be visible
    /// through one of the portal chains leading into their sector. Global
    /// objects are only frustum-tested.
    pub fn get_visible(&mut self, store: &EntityStore, frustum: &Frustum, render_list: &mut RenderList) {
        let mut visibility = SectorVisibilityContainer::from_frustum(frustum);
        visibility.compute(self);
        self.visible_sectors = visibility.visible_sector_ids();

        for sector_visibility in visibility.sectors() {
            let Some(sector) = self.sectors.get(sector_visibility.sector()) else {
                continue;
            };
            for &id in sector.static_objects().iter().chain(sector.dynamic_objects()) {
                let Some(entity) = store.get(id) else {
                    continue;
                };
                if !entity.is_visible() {
                    continue;
                }
                let bv = entity.bounding_volume();
                if frustum.collide_bounding_volume(bv) == FrustumCollision::Outside {
                    continue;
                }
                if sector_visibility.is_start() || visibility.intersection_bv(sector_visibility, bv) {
                    render_list.add(store, id);
                }
            }
        }

        for &id in self.global_static.iter().chain(&self.global_dynamic) {
            let Some(entity) = store.get(id) else {
                continue;
            };
            if entity.is_visible() && frustum.collide_bounding_volume(entity.bounding_volume()) != FrustumCollision::Outside
            {
                render_list.add(store, id);
            }
        }
    }

    /// Sectors reached by the last [`get_visible`](Self::get_visible)
    pub fn visible_sectors_list(&self) -> &[SectorId] {
        &self.visible_sectors
    }

    /// Collect the light's shadow casters.
    ///
    /// Dynamic casters are gathered every call. Static casters are gathered
    /// once and again only after the light moves.
    pub fn add_light_shadow_casters(&self, store: &EntityStore, light: &mut Light3D, frustum: &Frustum) {
        light.clear_dynamic_casters();
        if !light.casts_shadows() {
            return;
        }
        let light_entity = light.entity();
        let Some(entity) = store.get(light_entity) else {
            warn!("Light entity {:?} missing from the store", light_entity);
            return;
        };
        let transform_count = entity.transform_count();
        let refresh_static = light.static_casters_stale(transform_count);
        if refresh_static {
            light.clear_static_casters();
        }

        let mut visibility = SectorVisibilityContainer::from_bounding_volume(entity.bounding_volume());
        visibility.compute(self);

        for &id in &self.global_dynamic {
            light.add_shadow_caster(store, id, Some(frustum), false);
        }
        if refresh_static {
            for &id in &self.global_static {
                light.add_shadow_caster(store, id, None, true);
            }
        }

        for &sector_id in &entity.container().sectors {
            let (Some(sector), Some(sector_visibility)) =
                (self.sectors.get(sector_id), visibility.sector_visibility(sector_id))
            else {
                continue;
            };
            let passes = |bv: &BoundingVolume| {
                sector_visibility.is_start() || visibility.intersection_bv(sector_visibility, bv)
            };
            for &id in sector.dynamic_objects() {
                if store.get(id).is_some_and(|e| passes(e.bounding_volume())) {
                    light.add_shadow_caster(store, id, Some(frustum), false);
                }
            }
            if refresh_static {
                for &id in sector.static_objects() {
                    if store.get(id).is_some_and(|e| passes(e.bounding_volume())) {
                        light.add_shadow_caster(store, id, None, true);
                    }
                }
            }
        }

        if refresh_static {
            light.mark_static_casters(transform_count);
        }
        light.set_sector_visibility(visibility);
    }

    /// Sector by id
    pub fn sector(&self, id: SectorId) -> Option<&Sector> {
        self.sectors.get(id)
    }

    /// Sector id by name
    pub fn sector_by_name(&self, name: &str) -> Option<SectorId> {
        self.names.get(name).copied()
    }

    /// Sectors in ascending name order
    pub fn sectors(&self) -> impl Iterator<Item = (SectorId, &Sector)> {
        self.names.values().filter_map(|&id| self.sectors.get(id).map(|s| (id, s)))
    }

    /// Number of sectors
    pub fn sector_count(&self) -> usize {
        self.sectors.len()
    }

    /// Portal by key
    pub fn portal(&self, key: PortalKey) -> Option<&Portal> {
        self.sectors.get(key.sector).and_then(|s| s.portal(key.index))
    }

    /// Mutable portal by key
    pub fn portal_mut(&mut self, key: PortalKey) -> Option<&mut Portal> {
        self.sectors.get_mut(key.sector).and_then(|s| s.portal_mut(key.index))
    }

    /// Open or close a portal
    pub fn set_portal_active(&mut self, key: PortalKey, active: bool) -> bool {
        match self.portal_mut(key) {
            Some(portal) => {
                portal.set_active(active);
                true
            }
            None => false,
        }
    }

    /// Target sector of a portal, resolved once per compile
    pub fn resolve_target(&self, portal: &Portal) -> Option<SectorId> {
        *portal.target_cache().get_or_init(|| match self.names.get(portal.target_name()) {
            Some(&id) => Some(id),
            None => {
                error!("Portal {} references unknown sector '{}'", portal.id(), portal.target_name());
                None
            }
        })
    }

    /// Portals of the target sector that can be seen through `portal`
    pub fn through_portals(&self, portal: &Portal) -> Vec<PortalKey> {
        if portal.is_compiled() {
            portal.reachable().to_vec()
        } else {
            self.default_through_portals(portal)
        }
    }

    fn default_through_portals(&self, portal: &Portal) -> Vec<PortalKey> {
        let Some(target) = self.resolve_target(portal) else {
            return Vec::new();
        };
        let Some(sector) = self.sectors.get(target) else {
            return Vec::new();
        };
        if portal.reachable_portal_ids().is_empty() {
            return sector
                .portals()
                .iter()
                .enumerate()
                .filter(|(_, p)| self.resolve_target(p) != Some(portal.sector()))
                .map(|(index, _)| PortalKey { sector: target, index })
                .collect();
        }
        portal
            .reachable_portal_ids()
            .iter()
            .filter_map(|&id| {
                let index = sector.portal_index_by_id(id);
                if index.is_none() {
                    warn!("Portal {} lists unknown portal {} in sector '{}'", portal.id(), id, sector.name());
                }
                index.map(|index| PortalKey { sector: target, index })
            })
            .collect()
    }

    /// Static objects overlapping no sector
    pub const fn global_static_objects(&self) -> &BTreeSet<EntityId> {
        &self.global_static
    }

    /// Dynamic objects overlapping no sector
    pub const fn global_dynamic_objects(&self) -> &BTreeSet<EntityId> {
        &self.global_dynamic
    }

    /// Entities overlapping no sector
    pub const fn global_entities(&self) -> &BTreeSet<EntityId> {
        &self.global_entities
    }

    fn sector_id(&self, name: &str) -> SceneResult<SectorId> {
        self.names.get(name).copied().ok_or_else(|| {
            warn!("Unknown sector '{}'", name);
            SceneError::UnknownSector(name.to_owned())
        })
    }

    fn file(&mut self, store: &mut EntityStore, id: EntityId, class: ContainerClass) -> bool {
        let Some(previous) = store.get(id).map(|e| e.container().class) else {
            warn!("Cannot file unknown entity {:?}", id);
            return false;
        };
        if previous != ContainerClass::None {
            self.unfile(store, id);
        }
        let Some(entity) = store.get(id) else {
            return false;
        };
        let bv = entity.bounding_volume();
        let center = bv.center();

        let mut sectors = Vec::new();
        let mut current = None;
        for &sector_id in self.names.values() {
            let Some(sector) = self.sectors.get_mut(sector_id) else {
                continue;
            };
            if !sector.bounding_volume().intersects(bv) {
                continue;
            }
            sector.insert(class, id);
            sectors.push(sector_id);
            if current.is_none() && sector.bounding_volume().contains_point(&center) {
                current = Some(sector_id);
            }
        }
        let current = current.or_else(|| sectors.first().copied());
        let in_global = sectors.is_empty();
        if in_global {
            match class {
                ContainerClass::Static => self.global_static.insert(id),
                ContainerClass::Dynamic => self.global_dynamic.insert(id),
                ContainerClass::Entity => self.global_entities.insert(id),
                ContainerClass::None => false,
            };
        }

        if let Some(entity) = store.get_mut(id) {
            *entity.container_mut() = ContainerData {
                class,
                sectors,
                current_sector: current,
                in_global,
            };
        }
        true
    }

    fn unfile(&mut self, store: &mut EntityStore, id: EntityId) -> bool {
        let Some(entity) = store.get_mut(id) else {
            warn!("Cannot remove unknown entity {:?}", id);
            return false;
        };
        let data = std::mem::take(entity.container_mut());
        if data.class == ContainerClass::None {
            return false;
        }
        for sector_id in &data.sectors {
            if let Some(sector) = self.sectors.get_mut(*sector_id) {
                sector.remove(id);
            }
        }
        self.global_static.remove(&id);
        self.global_dynamic.remove(&id);
        self.global_entities.remove(&id);
        true
    }
}
