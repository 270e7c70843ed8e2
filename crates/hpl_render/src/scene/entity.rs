//! Scene-graph entities
//!
//! Entities live in an [`EntityStore`] arena and reference their parent and
//! children by [`EntityId`]. Changing a transform marks the entity and all of
//! its descendants dirty, reprojects their bounding volumes and bumps their
//! transform counters. World matrices are recomputed lazily from the parent
//! chain.
//!
//! Mutators that move entities return the ids they touched and are crate
//! private: outside callers move objects through
//! [`World3D`](crate::scene::World3D), which refiles them in the portal
//! container.

use std::cell::Cell;
use std::fmt;

use crate::foundation::collections::{EntityId, SectorId, SlotMap};
use crate::foundation::logging::warn;
use crate::foundation::math::{Mat4, Mat4Ext, Vec3};
use crate::scene::renderable::Renderable;
use crate::spatial::bounding_volume::BoundingVolume;

/// How an object is filed in the portal container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContainerClass {
    /// Not registered
    #[default]
    None,
    /// Static content, filed once
    Static,
    /// Dynamic renderable, refiled when it moves
    Dynamic,
    /// Non-renderable entity, refiled when it moves
    Entity,
}

/// Sectors an object is currently filed in
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerData {
    /// How the object is registered
    pub class: ContainerClass,
    /// Every sector whose bounds the object overlaps
    pub sectors: Vec<SectorId>,
    /// Sector containing the object's centre
    pub current_sector: Option<SectorId>,
    /// Filed in the global list because no sector overlaps it
    pub in_global: bool,
}

/// Node of the scene graph
pub struct Entity3D {
    name: String,
    local_matrix: Mat4,
    world_matrix: Cell<Option<Mat4>>,
    bounding_volume: BoundingVolume,
    parent: Option<EntityId>,
    children: Vec<EntityId>,
    transform_count: u32,
    renderable: Option<Renderable>,
    container: ContainerData,
}

impl fmt::Debug for Entity3D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity3D")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("transform_count", &self.transform_count)
            .field("renderable", &self.renderable.as_ref().map(Renderable::kind))
            .field("container", &self.container)
            .finish_non_exhaustive()
    }
}

impl Entity3D {
    /// Create an entity with an identity transform and an empty bounding volume
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            local_matrix: Mat4::identity(),
            world_matrix: Cell::new(None),
            bounding_volume: BoundingVolume::new(),
            parent: None,
            children: Vec::new(),
            transform_count: 0,
            renderable: None,
            container: ContainerData::default(),
        }
    }

    /// Attach a renderable
    #[must_use]
    pub fn with_renderable(mut self, renderable: Renderable) -> Self {
        self.renderable = Some(renderable);
        self
    }

    /// Set the local bounding box
    #[must_use]
    pub fn with_bounds(mut self, min: Vec3, max: Vec3) -> Self {
        self.bounding_volume.set_local_min_max(min, max);
        self
    }

    /// Set the local matrix
    #[must_use]
    pub fn with_matrix(mut self, matrix: Mat4) -> Self {
        self.local_matrix = matrix;
        self.bounding_volume.set_transform(matrix);
        self
    }

    /// Entity name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Local matrix (relative to the parent)
    pub const fn local_matrix(&self) -> &Mat4 {
        &self.local_matrix
    }

    /// World bounding volume
    pub const fn bounding_volume(&self) -> &BoundingVolume {
        &self.bounding_volume
    }

    /// Parent entity
    pub const fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    /// Child entities
    pub fn children(&self) -> &[EntityId] {
        &self.children
    }

    /// Number of transform updates applied so far
    pub const fn transform_count(&self) -> u32 {
        self.transform_count
    }

    /// Renderable payload
    pub const fn renderable(&self) -> Option<&Renderable> {
        self.renderable.as_ref()
    }

    /// Mutable renderable payload
    pub fn renderable_mut(&mut self) -> Option<&mut Renderable> {
        self.renderable.as_mut()
    }

    /// Portal container filing data
    pub const fn container(&self) -> &ContainerData {
        &self.container
    }

    pub(crate) fn container_mut(&mut self) -> &mut ContainerData {
        &mut self.container
    }

    /// True if the entity has a renderable that is visible
    pub fn is_visible(&self) -> bool {
        self.renderable.as_ref().is_some_and(Renderable::is_visible)
    }
}

/// Arena owning every entity of a world
#[derive(Debug, Default)]
pub struct EntityStore {
    entities: SlotMap<EntityId, Entity3D>,
}

impl EntityStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entity
    pub fn insert(&mut self, entity: Entity3D) -> EntityId {
        let id = self.entities.insert(entity);
        self.refresh_bounds(id);
        id
    }

    /// Number of entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// True if the store is empty
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// True if the handle still resolves
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(id)
    }

    /// Look up an entity
    pub fn get(&self, id: EntityId) -> Option<&Entity3D> {
        self.entities.get(id)
    }

    /// Look up an entity mutably
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity3D> {
        self.entities.get_mut(id)
    }

    /// Iterate over all entities
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity3D)> {
        self.entities.iter()
    }

    /// Remove an entity, detaching it from its parent and orphaning its children.
    /// Also returns the descendants whose placement changed.
    pub(crate) fn remove(&mut self, id: EntityId) -> Option<(Entity3D, Vec<EntityId>)> {
        let entity = self.entities.remove(id)?;
        if let Some(parent) = entity.parent.and_then(|p| self.entities.get_mut(p)) {
            parent.children.retain(|c| *c != id);
        }
        let mut moved = Vec::new();
        for child in &entity.children {
            if let Some(child_entity) = self.entities.get_mut(*child) {
                child_entity.parent = None;
            }
            moved.extend(self.set_transform_updated(*child));
        }
        Some((entity, moved))
    }

    /// Attach `child` under `parent`, detaching it from any previous parent
    pub(crate) fn add_child(&mut self, parent: EntityId, child: EntityId) -> bool {
        if parent == child || !self.contains(parent) || !self.contains(child) {
            warn!("Cannot attach entity {:?} to {:?}", child, parent);
            return false;
        }
        if self.is_ancestor(child, parent) {
            warn!("Attaching {:?} to {:?} would create a cycle", child, parent);
            return false;
        }
        self.detach(child);
        if let Some(parent_entity) = self.entities.get_mut(parent) {
            parent_entity.children.push(child);
        }
        if let Some(child_entity) = self.entities.get_mut(child) {
            child_entity.parent = Some(parent);
        }
        self.set_transform_updated(child);
        true
    }

    /// Detach `child` from its parent
    pub(crate) fn remove_child(&mut self, parent: EntityId, child: EntityId) -> bool {
        if self.get(child).and_then(Entity3D::parent) != Some(parent) {
            return false;
        }
        self.detach(child);
        self.set_transform_updated(child);
        true
    }

    fn detach(&mut self, child: EntityId) {
        let Some(old_parent) = self.get(child).and_then(Entity3D::parent) else {
            return;
        };
        if let Some(parent_entity) = self.entities.get_mut(old_parent) {
            parent_entity.children.retain(|c| *c != child);
        }
        if let Some(child_entity) = self.entities.get_mut(child) {
            child_entity.parent = None;
        }
    }

    fn is_ancestor(&self, ancestor: EntityId, mut id: EntityId) -> bool {
        while let Some(parent) = self.get(id).and_then(Entity3D::parent) {
            if parent == ancestor {
                return true;
            }
            id = parent;
        }
        false
    }

    /// Set the local matrix. Returns the entities whose transform changed.
    pub(crate) fn set_matrix(&mut self, id: EntityId, matrix: Mat4) -> Vec<EntityId> {
        match self.entities.get_mut(id) {
            Some(entity) => entity.local_matrix = matrix,
            None => {
                warn!("set_matrix on unknown entity {:?}", id);
                return Vec::new();
            }
        }
        self.set_transform_updated(id)
    }

    /// Set the local translation, keeping rotation and scale
    pub(crate) fn set_position(&mut self, id: EntityId, position: Vec3) -> Vec<EntityId> {
        let Some(mut matrix) = self.get(id).map(|e| e.local_matrix) else {
            warn!("set_position on unknown entity {:?}", id);
            return Vec::new();
        };
        matrix.m14 = position.x;
        matrix.m24 = position.y;
        matrix.m34 = position.z;
        self.set_matrix(id, matrix)
    }

    /// Set the local bounding box
    pub(crate) fn set_local_bounds(&mut self, id: EntityId, min: Vec3, max: Vec3) -> Vec<EntityId> {
        match self.entities.get_mut(id) {
            Some(entity) => entity.bounding_volume.set_local_min_max(min, max),
            None => return Vec::new(),
        }
        self.set_transform_updated(id)
    }

    /// World matrix, composed from the parent chain on demand
    pub fn world_matrix(&self, id: EntityId) -> Mat4 {
        let Some(entity) = self.get(id) else {
            return Mat4::identity();
        };
        if let Some(world) = entity.world_matrix.get() {
            return world;
        }
        let world = match entity.parent {
            Some(parent) => self.world_matrix(parent) * entity.local_matrix,
            None => entity.local_matrix,
        };
        entity.world_matrix.set(Some(world));
        world
    }

    /// World position
    pub fn world_position(&self, id: EntityId) -> Vec3 {
        self.world_matrix(id).translation_part()
    }

    /// Transform counter of an entity, 0 for unknown handles
    pub fn transform_count(&self, id: EntityId) -> u32 {
        self.get(id).map_or(0, Entity3D::transform_count)
    }

    /// Mark an entity and its descendants as moved.
    ///
    /// Returns every entity that was updated, parents before children.
    pub(crate) fn set_transform_updated(&mut self, id: EntityId) -> Vec<EntityId> {
        let mut moved = Vec::new();
        self.update_recursive(id, &mut moved);
        moved
    }

    fn update_recursive(&mut self, id: EntityId, moved: &mut Vec<EntityId>) {
        let Some(entity) = self.entities.get_mut(id) else {
            return;
        };
        entity.world_matrix.set(None);
        entity.transform_count = entity.transform_count.wrapping_add(1);
        moved.push(id);
        self.refresh_bounds(id);

        let children = self.get(id).map(|e| e.children.clone()).unwrap_or_default();
        for child in children {
            self.update_recursive(child, moved);
        }
    }

    fn refresh_bounds(&mut self, id: EntityId) {
        let world = self.world_matrix(id);
        if let Some(entity) = self.entities.get_mut(id) {
            entity.bounding_volume.set_transform(world);
        }
    }
}
