//! # World
//!
//! Owner of everything one frame renders: the entity arena, the lights and
//! the portal container. Transform edits go through the world so moved
//! objects are refiled into their sectors.
//!
//! Levels are described with [`LevelDescription`], which loads from RON or
//! TOML through the [`Config`] trait.

use crate::config::{Config, Deserialize, Serialize};
use crate::foundation::collections::{EntityId, LightId};
use crate::foundation::logging::{debug, info, warn};
use crate::foundation::math::{Color, Mat4, Vec3};
use crate::portal::container::PortalContainer;
use crate::portal::portal::Portal;
use crate::render::light::{Light3D, LightMap};
use crate::scene::entity::{Entity3D, EntityStore};
use crate::scene::error::{SceneError, SceneResult};
use crate::scene::renderable::Renderable;

/// Sector entry of a level file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorDescription {
    /// Unique sector name
    pub name: String,
    /// Minimum corner of the sector box
    pub min: [f32; 3],
    /// Maximum corner of the sector box
    pub max: [f32; 3],
}

/// Portal entry of a level file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalDescription {
    /// Id, unique within the owning sector
    pub id: i32,
    /// Owning sector
    pub sector: String,
    /// Sector seen through the portal
    pub target: String,
    /// Normal pointing back into the owning sector
    pub normal: [f32; 3],
    /// Corners of the opening
    pub points: Vec<[f32; 3]>,
    /// Portals of the target sector visible through this one
    #[serde(default)]
    pub reachable: Vec<i32>,
    /// Open state
    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

/// Sector and portal layout of a level
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelDescription {
    /// Sectors
    #[serde(default)]
    pub sectors: Vec<SectorDescription>,
    /// Portals
    #[serde(default)]
    pub portals: Vec<PortalDescription>,
}

impl Config for LevelDescription {}

/// Entities, lights and sectors of a scene.
///
/// Moves go through the world so filed objects follow their transform; the
/// entity store alone cannot move anything:
///
/// ```compile_fail
/// let mut world = hpl_render::scene::World3D::new();
/// let id = world.create_entity(hpl_render::scene::Entity3D::new("crate"));
/// world.entities.set_position(id, Default::default());
/// ```
#[derive(Debug, Default)]
pub struct World3D {
    /// Entity arena
    pub entities: EntityStore,
    /// Lights, each following one entity
    pub lights: LightMap,
    /// Sector graph and object filing
    pub portals: PortalContainer,
}

impl World3D {
    /// Empty world
    pub fn new() -> Self {
        Self::default()
    }

    /// Register sectors and portals of a level, then compile the container
    pub fn load_level(&mut self, level: &LevelDescription) -> SceneResult<()> {
        for sector in &level.sectors {
            self.portals.add_sector(&sector.name);
            self.portals
                .add_sector_bounds(&sector.name, &Vec3::from(sector.min), &Vec3::from(sector.max))?;
        }

        for desc in &level.portals {
            if desc.points.is_empty() {
                return Err(SceneError::InvalidLevel(format!(
                    "portal {} of sector '{}' has no points",
                    desc.id, desc.sector
                )));
            }
            let points: Vec<Vec3> = desc.points.iter().map(|&p| Vec3::from(p)).collect();
            let mut portal = Portal::new(desc.id, desc.target.as_str(), Vec3::from(desc.normal)).with_points(&points);
            for &reachable in &desc.reachable {
                portal.add_reachable_portal_id(reachable);
            }
            portal.set_active(desc.active);
            self.portals.add_portal(portal, &desc.sector)?;
        }

        self.portals.compile();
        info!("Loaded level: {} sectors, {} portals", level.sectors.len(), level.portals.len());
        Ok(())
    }

    /// Insert an entity without filing it in the container
    pub fn create_entity(&mut self, entity: Entity3D) -> EntityId {
        self.entities.insert(entity)
    }

    /// Insert a renderable entity and file it by its bounds
    pub fn create_renderable(&mut self, entity: Entity3D, is_static: bool) -> EntityId {
        let id = self.entities.insert(entity);
        self.portals.add(&mut self.entities, id, is_static);
        id
    }

    /// Insert a mesh made of sub-mesh entities and file the mesh.
    ///
    /// The parts become children of the mesh entity. The mesh bounds enclose
    /// every part.
    pub fn create_mesh_entity(&mut self, name: &str, parts: Vec<Entity3D>, matrix: Mat4, is_static: bool) -> EntityId {
        let sub_meshes: Vec<EntityId> = parts.into_iter().map(|part| self.entities.insert(part)).collect();

        let mut min = Vec3::repeat(f32::MAX);
        let mut max = Vec3::repeat(f32::MIN);
        for &part in &sub_meshes {
            if let Some(entity) = self.entities.get(part) {
                min = min.inf(&entity.bounding_volume().min());
                max = max.sup(&entity.bounding_volume().max());
            }
        }
        if sub_meshes.is_empty() {
            min = Vec3::zeros();
            max = Vec3::zeros();
        }

        let mesh = Entity3D::new(name)
            .with_renderable(Renderable::mesh(sub_meshes.clone()))
            .with_bounds(min, max)
            .with_matrix(matrix);
        let id = self.entities.insert(mesh);
        for part in sub_meshes {
            self.entities.add_child(id, part);
        }
        self.portals.add(&mut self.entities, id, is_static);
        id
    }

    /// File an already inserted entity
    pub fn add_to_world(&mut self, id: EntityId, is_static: bool) -> SceneResult<()> {
        if self.portals.add(&mut self.entities, id, is_static) {
            Ok(())
        } else {
            Err(SceneError::UnknownEntity(id))
        }
    }

    /// Create a point light at `position`
    pub fn create_point_light(&mut self, name: &str, position: Vec3, color: Color, radius: f32) -> LightId {
        self.create_light(name, position, |entity| Light3D::point(entity, color, radius), radius)
    }

    /// Create a spot light with the given world matrix, shining down its -Z axis
    pub fn create_spot_light(
        &mut self,
        name: &str,
        matrix: Mat4,
        color: Color,
        radius: f32,
        fov: f32,
        aspect: f32,
        near_clip: f32,
    ) -> LightId {
        let light = self.create_light(
            name,
            Vec3::zeros(),
            |entity| Light3D::spot(entity, color, radius, fov, aspect, near_clip),
            radius,
        );
        if let Some(entity) = self.lights.get(light).map(Light3D::entity) {
            self.set_matrix(entity, matrix);
        }
        light
    }

    fn create_light(
        &mut self,
        name: &str,
        position: Vec3,
        make: impl FnOnce(EntityId) -> Light3D,
        radius: f32,
    ) -> LightId {
        let entities = &mut self.entities;
        let light = self.lights.insert_with_key(|key| {
            let entity = Entity3D::new(name)
                .with_renderable(Renderable::light(key))
                .with_bounds(Vec3::repeat(-radius), Vec3::repeat(radius))
                .with_matrix(Mat4::new_translation(&position));
            make(entities.insert(entity))
        });
        if let Some(entity) = self.lights.get(light).map(Light3D::entity) {
            self.portals.add(&mut self.entities, entity, false);
        }
        debug!("Created light '{}' ({:?}) with radius {}", name, light, radius);
        light
    }

    /// Change a light's range, resizing its bounds
    pub fn set_light_far_attenuation(&mut self, light: LightId, range: f32) -> SceneResult<()> {
        let Some(light3d) = self.lights.get_mut(light) else {
            return Err(SceneError::UnknownLight(light));
        };
        light3d.set_far_attenuation(range);
        let entity = light3d.entity();
        let moved = self
            .entities
            .set_local_bounds(entity, Vec3::repeat(-range), Vec3::repeat(range));
        self.refile(&moved);
        Ok(())
    }

    /// Set an entity's local matrix and refile everything that moved
    pub fn set_matrix(&mut self, id: EntityId, matrix: Mat4) {
        let moved = self.entities.set_matrix(id, matrix);
        self.refile(&moved);
    }

    /// Set an entity's local translation and refile everything that moved
    pub fn set_position(&mut self, id: EntityId, position: Vec3) {
        let moved = self.entities.set_position(id, position);
        self.refile(&moved);
    }

    /// Attach `child` under `parent` and refile the child's subtree
    pub fn add_child(&mut self, parent: EntityId, child: EntityId) -> SceneResult<()> {
        if !self.entities.contains(parent) {
            return Err(SceneError::UnknownEntity(parent));
        }
        if !self.entities.add_child(parent, child) {
            return Err(SceneError::InvalidHierarchy { parent, child });
        }
        let moved = self.subtree(child);
        self.refile(&moved);
        Ok(())
    }

    /// Detach `child` from `parent` and refile the child's subtree
    pub fn remove_child(&mut self, parent: EntityId, child: EntityId) -> SceneResult<()> {
        if !self.entities.remove_child(parent, child) {
            return Err(SceneError::InvalidHierarchy { parent, child });
        }
        let moved = self.subtree(child);
        self.refile(&moved);
        Ok(())
    }

    /// Set an entity's local bounding box and refile it
    pub fn set_local_bounds(&mut self, id: EntityId, min: Vec3, max: Vec3) -> SceneResult<()> {
        if !self.entities.contains(id) {
            return Err(SceneError::UnknownEntity(id));
        }
        let moved = self.entities.set_local_bounds(id, min, max);
        self.refile(&moved);
        Ok(())
    }

    fn subtree(&self, id: EntityId) -> Vec<EntityId> {
        let mut ids = vec![id];
        let mut next = 0;
        while let Some(&current) = ids.get(next) {
            if let Some(entity) = self.entities.get(current) {
                ids.extend_from_slice(entity.children());
            }
            next += 1;
        }
        ids
    }

    fn refile(&mut self, moved: &[EntityId]) {
        for &id in moved {
            self.portals.on_transform_update(&mut self.entities, id);
        }
    }

    /// Unfile and remove an entity. A light entity takes its light with it.
    pub fn remove_entity(&mut self, id: EntityId) -> SceneResult<Entity3D> {
        if !self.entities.contains(id) {
            return Err(SceneError::UnknownEntity(id));
        }
        self.portals.remove(&mut self.entities, id);
        let (entity, orphans) = self.entities.remove(id).ok_or(SceneError::UnknownEntity(id))?;
        self.refile(&orphans);
        if let Some(light) = entity.renderable().and_then(Renderable::light_id) {
            self.lights.remove(light);
        }
        Ok(entity)
    }

    /// Remove a light and its entity
    pub fn remove_light(&mut self, light: LightId) -> SceneResult<Light3D> {
        let Some(entity) = self.lights.get(light).map(Light3D::entity) else {
            warn!("remove_light on unknown light {:?}", light);
            return Err(SceneError::UnknownLight(light));
        };
        self.portals.remove(&mut self.entities, entity);
        self.entities.remove(entity);
        self.lights.remove(light).ok_or(SceneError::UnknownLight(light))
    }

    /// Recompile the portal container after structural edits
    pub fn compile(&mut self) {
        self.portals.compile();
    }
}
