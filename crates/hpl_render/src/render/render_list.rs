//! # Render List
//!
//! Collects the objects and lights found visible this frame and compiles
//! them into state trees: one for the depth pre-pass, one per light, one for
//! the diffuse pass and one for transparent objects. Every object path runs
//! root → sector → pass → depth test → alpha → blend → programs → textures →
//! vertex buffer → matrix → draw; transparent paths drop the sector level and
//! insert the view depth after the depth test so they draw back to front.
//!
//! Objects are stamped with the list's render count when added, so an object
//! reached from several sectors is only added once per frame.

use crate::foundation::collections::{EntityId, LightId, RenderNodeId};
use crate::foundation::logging::{trace, warn};
use crate::foundation::math::{Mat4, Mat4Ext};
use crate::render::light::LightMap;
use crate::render::material::MaterialRenderType;
use crate::render::render_node::RenderArena;
use crate::render::render_state::{ProgramBinding, RenderContext, RenderState};
use crate::scene::entity::EntityStore;
use crate::scene::renderable::RenderableType;
use crate::spatial::frustum::Frustum;

/// Lights kept per frame
pub const MAX_NUM_OF_LIGHTS: usize = 30;

/// Visible objects and lights of one frame
#[derive(Debug)]
pub struct RenderList {
    render_count: u32,
    motion_blur: bool,
    view: Mat4,
    objects: Vec<EntityId>,
    transparent: Vec<EntityId>,
    lights: Vec<LightId>,
    objects_per_light: Vec<Vec<EntityId>>,
    occlusion_objects: Vec<EntityId>,
    arena: RenderArena,
    z_root: Option<RenderNodeId>,
    light_roots: Vec<RenderNodeId>,
    diffuse_root: Option<RenderNodeId>,
    trans_root: Option<RenderNodeId>,
}

impl Default for RenderList {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderList {
    /// Empty list
    pub fn new() -> Self {
        Self {
            render_count: 1,
            motion_blur: false,
            view: Mat4::identity(),
            objects: Vec::new(),
            transparent: Vec::new(),
            lights: Vec::new(),
            objects_per_light: Vec::new(),
            occlusion_objects: Vec::new(),
            arena: RenderArena::new(),
            z_root: None,
            light_roots: Vec::new(),
            diffuse_root: None,
            trans_root: None,
        }
    }

    /// Start a new frame: bump the render count and drop all contents,
    /// keeping allocations
    pub fn clear(&mut self) {
        self.render_count = self.render_count.wrapping_add(1).max(1);
        self.objects.clear();
        self.transparent.clear();
        self.lights.clear();
        self.objects_per_light.clear();
        self.occlusion_objects.clear();
        self.arena.reset();
        self.z_root = None;
        self.light_roots.clear();
        self.diffuse_root = None;
        self.trans_root = None;
    }

    /// Camera used for transparent depth
    pub fn set_frustum(&mut self, frustum: &Frustum) {
        self.view = *frustum.view_matrix();
    }

    /// Track previous matrices of added objects
    pub fn set_motion_blur(&mut self, enabled: bool) {
        self.motion_blur = enabled;
    }

    /// Current render count
    pub const fn render_count(&self) -> u32 {
        self.render_count
    }

    /// Add an object. Lights go to the light list, meshes add their
    /// sub-meshes. Returns false if the object was already added this frame
    /// or cannot be drawn.
    pub fn add(&mut self, store: &EntityStore, id: EntityId) -> bool {
        let Some(entity) = store.get(id) else {
            return false;
        };
        let Some(renderable) = entity.renderable() else {
            return false;
        };
        if renderable.render_count() == self.render_count {
            return false;
        }
        renderable.set_render_count(self.render_count);

        match renderable.kind() {
            RenderableType::Light => {
                let Some(light) = renderable.light_id() else {
                    return false;
                };
                if self.lights.len() >= MAX_NUM_OF_LIGHTS {
                    warn!("Light limit of {} reached, dropping {:?}", MAX_NUM_OF_LIGHTS, light);
                    return false;
                }
                self.lights.push(light);
                return true;
            }
            RenderableType::Mesh => {
                let mut added = false;
                for &sub_mesh in renderable.sub_meshes() {
                    added |= self.add(store, sub_mesh);
                }
                return added;
            }
            RenderableType::Dummy => return false,
            RenderableType::Normal | RenderableType::ParticleSystem => {}
        }

        if self.motion_blur {
            if renderable.prev_render_count() != self.render_count.wrapping_sub(1) {
                renderable.set_prev_matrix(store.world_matrix(id));
            }
            renderable.set_prev_render_count(self.render_count);
        }

        if renderable.is_transparent() {
            let z = self.view.transform_position(&entity.bounding_volume().center()).z;
            renderable.set_z(z);
            self.transparent.push(id);
        } else {
            self.objects.push(id);
        }
        if renderable.uses_occlusion_query() {
            self.occlusion_objects.push(id);
        }
        true
    }

    /// Build the state trees. Only the first `max_lights` lights get a pass.
    pub fn compile(&mut self, store: &EntityStore, lights: &LightMap, max_lights: usize) {
        self.arena.reset();
        self.lights.truncate(max_lights.min(MAX_NUM_OF_LIGHTS));
        self.objects_per_light = self
            .lights
            .iter()
            .map(|&light_id| match lights.get(light_id) {
                Some(light) => self
                    .objects
                    .iter()
                    .copied()
                    .filter(|&id| light.check_object_intersection(store, id))
                    .collect(),
                None => Vec::new(),
            })
            .collect();

        let z_root = self.arena.create_root();
        let diffuse_root = self.arena.create_root();
        let trans_root = self.arena.create_root();

        let objects = std::mem::take(&mut self.objects);
        for &id in &objects {
            self.add_to_tree(store, id, MaterialRenderType::Z, z_root, None, false);
            self.add_to_tree(store, id, MaterialRenderType::Diffuse, diffuse_root, None, false);
        }
        self.objects = objects;

        let per_light = std::mem::take(&mut self.objects_per_light);
        self.light_roots.clear();
        for (index, lit) in per_light.iter().enumerate() {
            let root = self.arena.create_root();
            let light = Some(self.lights[index]);
            for &id in lit {
                self.add_to_tree(store, id, MaterialRenderType::Light, root, light, false);
            }
            self.light_roots.push(root);
        }
        self.objects_per_light = per_light;

        let mut transparent = std::mem::take(&mut self.transparent);
        transparent.sort_by(|a, b| {
            let z = |id: &EntityId| store.get(*id).and_then(|e| e.renderable()).map_or(0.0, |r| r.z());
            z(a).total_cmp(&z(b))
        });
        for &id in &transparent {
            self.add_to_tree(store, id, MaterialRenderType::Diffuse, trans_root, None, true);
        }
        self.transparent = transparent;

        self.z_root = Some(z_root);
        self.diffuse_root = Some(diffuse_root);
        self.trans_root = Some(trans_root);
        trace!(
            "Render list compiled: {} objects, {} transparent, {} lights, {} nodes",
            self.objects.len(),
            self.transparent.len(),
            self.lights.len(),
            self.arena.node_count()
        );
    }

    fn add_to_tree(
        &mut self,
        store: &EntityStore,
        id: EntityId,
        ty: MaterialRenderType,
        root: RenderNodeId,
        light: Option<LightId>,
        sort_by_depth: bool,
    ) {
        let Some(entity) = store.get(id) else {
            return;
        };
        let Some(renderable) = entity.renderable() else {
            return;
        };
        let Some(material) = renderable.material() else {
            return;
        };
        if !material.uses_type(ty) {
            return;
        }
        let sector = entity.container().current_sector;
        let vertex_buffer = renderable.vertex_buffer().map(|vb| vb.id());

        let mut chain = Vec::with_capacity(11);
        for pass in 0..material.num_passes(ty, light) {
            chain.clear();
            if !sort_by_depth {
                chain.push(RenderState::Sector(sector));
            }
            chain.push(RenderState::Pass(pass));
            chain.push(RenderState::DepthTest(material.uses_depth_test()));
            if sort_by_depth {
                chain.push(RenderState::Depth(renderable.z()));
            }
            chain.push(RenderState::Alpha(material.alpha_mode(ty, pass, light)));
            chain.push(RenderState::Blend {
                mode: material.blend_mode(ty, pass, light),
                channel: material.channel_mode(ty, pass, light),
            });
            chain.push(RenderState::GpuProgram(ProgramBinding {
                vertex: material.vertex_program(ty, pass, light),
                fragment: material.fragment_program(ty, pass, light),
                uses_light: material.vertex_program_uses_light(ty, pass, light),
                uses_eye: material.vertex_program_uses_eye(ty, pass, light),
                light,
            }));
            chain.push(RenderState::Texture(material.textures(ty, pass, light)));
            chain.push(RenderState::VertexBuffer(vertex_buffer));
            chain.push(RenderState::Matrix(Some(id)));
            chain.push(RenderState::Render(id));
            self.arena.insert_chain(root, &chain);
        }
    }

    /// Opaque objects
    pub fn objects(&self) -> &[EntityId] {
        &self.objects
    }

    /// Transparent objects, back to front after compile
    pub fn transparent_objects(&self) -> &[EntityId] {
        &self.transparent
    }

    /// Number of objects of both kinds
    pub fn object_count(&self) -> usize {
        self.objects.len() + self.transparent.len()
    }

    /// Visible lights
    pub fn lights(&self) -> &[LightId] {
        &self.lights
    }

    /// Number of visible lights
    pub fn light_count(&self) -> usize {
        self.lights.len()
    }

    /// Objects lit by the light at `index`, valid after compile
    pub fn objects_for_light(&self, index: usize) -> &[EntityId] {
        self.objects_per_light.get(index).map_or(&[], Vec::as_slice)
    }

    /// Objects requesting occlusion queries
    pub fn occlusion_objects(&self) -> &[EntityId] {
        &self.occlusion_objects
    }

    /// Render tree arena
    pub const fn arena(&self) -> &RenderArena {
        &self.arena
    }

    /// Root of the depth pre-pass tree
    pub const fn z_root(&self) -> Option<RenderNodeId> {
        self.z_root
    }

    /// Root of the diffuse tree
    pub const fn diffuse_root(&self) -> Option<RenderNodeId> {
        self.diffuse_root
    }

    /// Root of the transparent tree
    pub const fn trans_root(&self) -> Option<RenderNodeId> {
        self.trans_root
    }

    /// Root of a light's tree
    pub fn light_root(&self, index: usize) -> Option<RenderNodeId> {
        self.light_roots.get(index).copied()
    }

    /// Walk the depth pre-pass tree
    pub fn render_z(&self, ctx: &mut RenderContext<'_>) {
        self.render_root(self.z_root, ctx);
    }

    /// Walk the tree of the light at `index`
    pub fn render_light(&self, index: usize, ctx: &mut RenderContext<'_>) {
        self.render_root(self.light_root(index), ctx);
    }

    /// Walk the diffuse tree
    pub fn render_diffuse(&self, ctx: &mut RenderContext<'_>) {
        self.render_root(self.diffuse_root, ctx);
    }

    /// Walk the transparent tree
    pub fn render_trans(&self, ctx: &mut RenderContext<'_>) {
        self.render_root(self.trans_root, ctx);
    }

    fn render_root(&self, root: Option<RenderNodeId>, ctx: &mut RenderContext<'_>) {
        if let Some(root) = root {
            self.arena.render(root, ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::foundation::math::{Color, Vec3};
    use crate::render::graphics::VertexBufferId;
    use crate::render::light::Light3D;
    use crate::render::material::{BlendMode, StandardMaterial};
    use crate::render::recording::{GraphicsCommand, RecordingGraphics};
    use crate::render::render_settings::RenderSettings;
    use crate::render::vertex_buffer::MeshBuffer;
    use crate::scene::entity::Entity3D;
    use crate::scene::renderable::Renderable;

    fn object(store: &mut EntityStore, name: &str, material: StandardMaterial, buffer: u32, position: Vec3) -> EntityId {
        let renderable = Renderable::normal(
            Arc::new(material),
            Arc::new(MeshBuffer::cuboid(VertexBufferId(buffer), Vec3::repeat(0.5))),
        );
        store.insert(
            Entity3D::new(name)
                .with_renderable(renderable)
                .with_bounds(Vec3::repeat(-0.5), Vec3::repeat(0.5))
                .with_matrix(Mat4::new_translation(&position)),
        )
    }

    fn camera() -> Frustum {
        Frustum::from_look_at(Vec3::zeros(), -Vec3::z(), Vec3::y(), 1.2, 1.0, 0.1, 100.0)
    }

    #[test]
    fn test_object_added_once_per_frame() {
        let mut store = EntityStore::new();
        let id = object(&mut store, "a", StandardMaterial::solid("a"), 1, Vec3::new(0.0, 0.0, -5.0));
        let mut list = RenderList::new();
        list.clear();
        assert!(list.add(&store, id));
        assert!(!list.add(&store, id));
        list.clear();
        assert!(list.add(&store, id));
        assert_eq!(list.objects(), &[id]);
    }

    #[test]
    fn test_mesh_and_light_routing() {
        let mut store = EntityStore::new();
        let part = object(&mut store, "part", StandardMaterial::solid("p"), 1, Vec3::new(0.0, 0.0, -5.0));
        let mesh = store.insert(Entity3D::new("mesh").with_renderable(Renderable::mesh(vec![part])));
        let mut lights = LightMap::with_key();
        let light_entity = store.insert(Entity3D::new("lamp"));
        let light_id = lights.insert(Light3D::point(light_entity, Color::WHITE, 5.0));
        if let Some(entity) = store.get_mut(light_entity) {
            *entity = Entity3D::new("lamp").with_renderable(Renderable::light(light_id));
        }

        let mut list = RenderList::new();
        let sparks = store.insert(
            Entity3D::new("sparks").with_renderable(Renderable::particle_system(
                Arc::new(StandardMaterial::solid("spark")),
                Arc::new(MeshBuffer::cuboid(VertexBufferId(2), Vec3::repeat(0.1))),
            )),
        );

        list.clear();
        assert!(list.add(&store, mesh));
        assert!(list.add(&store, light_entity));
        assert!(list.add(&store, sparks));
        assert_eq!(list.objects(), &[part, sparks]);
        assert_eq!(list.lights(), &[light_id]);
        assert_eq!(list.light_count(), 1);
    }

    #[test]
    fn test_transparent_sorted_back_to_front() {
        let mut store = EntityStore::new();
        let near = object(&mut store, "near", StandardMaterial::transparent("n", BlendMode::Alpha), 1, Vec3::new(0.0, 0.0, -2.0));
        let far = object(&mut store, "far", StandardMaterial::transparent("f", BlendMode::Alpha), 2, Vec3::new(0.0, 0.0, -9.0));
        let mid = object(&mut store, "mid", StandardMaterial::transparent("m", BlendMode::Alpha), 3, Vec3::new(0.0, 0.0, -5.0));

        let mut list = RenderList::new();
        list.clear();
        list.set_frustum(&camera());
        for id in [near, far, mid] {
            list.add(&store, id);
        }
        list.compile(&store, &LightMap::with_key(), MAX_NUM_OF_LIGHTS);
        assert_eq!(list.transparent_objects(), &[far, mid, near]);

        let frustum = camera();
        let lights = LightMap::with_key();
        let mut gfx = RecordingGraphics::new();
        let mut settings = RenderSettings::default();
        let mut ctx = RenderContext {
            gfx: &mut gfx,
            settings: &mut settings,
            store: &store,
            lights: &lights,
            frustum: &frustum,
        };
        list.render_trans(&mut ctx);
        let draws: Vec<_> = gfx
            .commands()
            .iter()
            .filter_map(|c| match c {
                GraphicsCommand::DrawVertexBuffer(id, _) => Some(id.0),
                _ => None,
            })
            .collect();
        assert_eq!(draws, vec![2, 3, 1]);
    }

    #[test]
    fn test_shared_material_binds_once() {
        let mut store = EntityStore::new();
        let ids: Vec<_> = (0..3)
            .map(|i| object(&mut store, "box", StandardMaterial::solid("stone"), 7, Vec3::new(i as f32, 0.0, -5.0)))
            .collect();

        let mut list = RenderList::new();
        list.clear();
        list.set_frustum(&camera());
        for &id in &ids {
            list.add(&store, id);
        }
        list.compile(&store, &LightMap::with_key(), MAX_NUM_OF_LIGHTS);

        let frustum = camera();
        let lights = LightMap::with_key();
        let mut gfx = RecordingGraphics::new();
        let mut settings = RenderSettings::default();
        let mut ctx = RenderContext {
            gfx: &mut gfx,
            settings: &mut settings,
            store: &store,
            lights: &lights,
            frustum: &frustum,
        };
        list.render_diffuse(&mut ctx);

        assert_eq!(gfx.count(|c| matches!(c, GraphicsCommand::BindVertexBuffer(_))), 1);
        assert_eq!(gfx.count(|c| matches!(c, GraphicsCommand::BlendFunc(..))), 1);
        assert_eq!(gfx.count(|c| matches!(c, GraphicsCommand::SetMatrix(..))), 3);
        assert_eq!(gfx.count(|c| matches!(c, GraphicsCommand::DrawVertexBuffer(..))), 3);
        assert_eq!(settings.stats.draw_calls, 3);
    }

    #[test]
    fn test_light_tree_only_holds_lit_objects() {
        let mut store = EntityStore::new();
        let lit = object(&mut store, "lit", StandardMaterial::solid("s"), 1, Vec3::new(0.0, 0.0, -5.0));
        let dark = object(&mut store, "dark", StandardMaterial::solid("s"), 1, Vec3::new(0.0, 0.0, -40.0));
        let lamp = store.insert(Entity3D::new("lamp").with_matrix(Mat4::new_translation(&Vec3::new(0.0, 2.0, -5.0))));
        let mut lights = LightMap::with_key();
        let light_id = lights.insert(Light3D::point(lamp, Color::WHITE, 6.0));

        let mut list = RenderList::new();
        list.clear();
        list.add(&store, lit);
        list.add(&store, dark);
        list.lights.push(light_id);
        list.compile(&store, &lights, MAX_NUM_OF_LIGHTS);

        assert_eq!(list.objects_for_light(0), &[lit]);
        assert!(list.light_root(0).is_some());
        assert!(list.objects_for_light(1).is_empty());
    }

    #[test]
    fn test_same_objects_build_the_same_trees() {
        let mut store = EntityStore::new();
        let ids = [
            object(&mut store, "stone", StandardMaterial::solid("stone"), 1, Vec3::new(-1.0, 0.0, -5.0)),
            object(&mut store, "wood", StandardMaterial::solid("wood"), 2, Vec3::new(1.0, 0.0, -6.0)),
            object(&mut store, "stone2", StandardMaterial::solid("stone"), 1, Vec3::new(0.0, 1.0, -4.0)),
            object(&mut store, "glass", StandardMaterial::transparent("glass", BlendMode::Alpha), 3, Vec3::new(0.0, 0.0, -3.0)),
            object(&mut store, "smoke", StandardMaterial::transparent("smoke", BlendMode::Add), 4, Vec3::new(0.5, 0.0, -7.0)),
        ];
        let lamp = store.insert(Entity3D::new("lamp").with_matrix(Mat4::new_translation(&Vec3::new(0.0, 2.0, -5.0))));
        let mut lights = LightMap::with_key();
        let light_id = lights.insert(Light3D::point(lamp, Color::WHITE, 6.0));

        let mut list = RenderList::new();
        let mut build = |order: &[EntityId]| {
            list.clear();
            list.set_frustum(&camera());
            for &id in order {
                list.add(&store, id);
            }
            list.lights.push(light_id);
            list.compile(&store, &lights, MAX_NUM_OF_LIGHTS);
            [list.z_root(), list.diffuse_root(), list.trans_root(), list.light_root(0)]
                .map(|root| list.arena.flatten(root.unwrap()))
        };

        let first = build(&ids);
        let again = build(&ids);
        let mut reversed = ids;
        reversed.reverse();
        let shuffled = build(&reversed);

        assert!(first.iter().all(|tree| tree.len() > 1));
        assert_eq!(first, again);
        assert_eq!(first, shuffled);
    }

    #[test]
    fn test_motion_blur_snapshots_first_frame() {
        let mut store = EntityStore::new();
        let id = object(&mut store, "a", StandardMaterial::solid("a"), 1, Vec3::new(1.0, 0.0, -5.0));
        let mut list = RenderList::new();
        list.set_motion_blur(true);
        list.clear();
        list.add(&store, id);
        let renderable = store.get(id).and_then(|e| e.renderable()).unwrap();
        assert_eq!(renderable.prev_matrix(), Some(Mat4::new_translation(&Vec3::new(1.0, 0.0, -5.0))));
        assert_eq!(renderable.prev_render_count(), list.render_count());
    }
}
