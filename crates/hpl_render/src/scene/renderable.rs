//! Renderable payload attached to an entity
//!
//! Per-frame bookkeeping (render count, view depth, previous matrix) lives in
//! cells so the render list can stamp objects while only borrowing the scene
//! immutably.

use std::cell::Cell;
use std::sync::Arc;

use crate::foundation::collections::{EntityId, LightId};
use crate::foundation::math::Mat4;
use crate::render::material::Material;
use crate::render::shadow_mesh::ShadowMesh;
use crate::render::vertex_buffer::VertexBuffer;

/// Kind of renderable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderableType {
    /// Plain drawable geometry
    Normal,
    /// Container of sub-mesh entities; never drawn itself
    Mesh,
    /// Particle system, drawn like normal geometry
    ParticleSystem,
    /// Light source
    Light,
    /// Invisible placeholder
    Dummy,
}

/// Drawable state of an entity
#[derive(Debug, Clone)]
pub struct Renderable {
    kind: RenderableType,
    material: Option<Arc<dyn Material>>,
    vertex_buffer: Option<Arc<dyn VertexBuffer>>,
    shadow_mesh: Option<Arc<ShadowMesh>>,
    sub_meshes: Vec<EntityId>,
    light: Option<LightId>,
    visible: bool,
    casts_shadows: bool,
    uses_occlusion_query: bool,
    render_count: Cell<u32>,
    prev_render_count: Cell<u32>,
    z: Cell<f32>,
    prev_matrix: Cell<Option<Mat4>>,
}

impl Renderable {
    fn with_kind(kind: RenderableType) -> Self {
        Self {
            kind,
            material: None,
            vertex_buffer: None,
            shadow_mesh: None,
            sub_meshes: Vec::new(),
            light: None,
            visible: true,
            casts_shadows: false,
            uses_occlusion_query: false,
            render_count: Cell::new(0),
            prev_render_count: Cell::new(0),
            z: Cell::new(0.0),
            prev_matrix: Cell::new(None),
        }
    }

    /// Drawable geometry with a material
    pub fn normal(material: Arc<dyn Material>, vertex_buffer: Arc<dyn VertexBuffer>) -> Self {
        Self {
            material: Some(material),
            vertex_buffer: Some(vertex_buffer),
            ..Self::with_kind(RenderableType::Normal)
        }
    }

    /// Particle system geometry
    pub fn particle_system(material: Arc<dyn Material>, vertex_buffer: Arc<dyn VertexBuffer>) -> Self {
        Self {
            kind: RenderableType::ParticleSystem,
            ..Self::normal(material, vertex_buffer)
        }
    }

    /// Mesh made of sub-mesh entities
    pub fn mesh(sub_meshes: Vec<EntityId>) -> Self {
        Self {
            sub_meshes,
            ..Self::with_kind(RenderableType::Mesh)
        }
    }

    /// Renderable standing for a light
    pub fn light(light: LightId) -> Self {
        Self {
            light: Some(light),
            ..Self::with_kind(RenderableType::Light)
        }
    }

    /// Invisible placeholder
    pub fn dummy() -> Self {
        Self {
            visible: false,
            ..Self::with_kind(RenderableType::Dummy)
        }
    }

    /// Attach silhouette topology and enable shadow casting
    #[must_use]
    pub fn with_shadow_mesh(mut self, mesh: Arc<ShadowMesh>) -> Self {
        self.shadow_mesh = Some(mesh);
        self.casts_shadows = true;
        self
    }

    /// Request an occlusion query every frame
    #[must_use]
    pub const fn with_occlusion_query(mut self) -> Self {
        self.uses_occlusion_query = true;
        self
    }

    /// Renderable kind
    pub const fn kind(&self) -> RenderableType {
        self.kind
    }

    /// Material
    pub fn material(&self) -> Option<&Arc<dyn Material>> {
        self.material.as_ref()
    }

    /// Vertex buffer
    pub fn vertex_buffer(&self) -> Option<&Arc<dyn VertexBuffer>> {
        self.vertex_buffer.as_ref()
    }

    /// Silhouette topology
    pub fn shadow_mesh(&self) -> Option<&Arc<ShadowMesh>> {
        self.shadow_mesh.as_ref()
    }

    /// Sub-mesh entities of a mesh
    pub fn sub_meshes(&self) -> &[EntityId] {
        &self.sub_meshes
    }

    /// Light this renderable stands for
    pub const fn light_id(&self) -> Option<LightId> {
        self.light
    }

    /// Visibility flag
    pub const fn is_visible(&self) -> bool {
        self.visible
    }

    /// Set visibility
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Shadow casting flag
    pub const fn casts_shadows(&self) -> bool {
        self.casts_shadows
    }

    /// Set the shadow casting flag
    pub fn set_casts_shadows(&mut self, casts: bool) {
        self.casts_shadows = casts;
    }

    /// True if an occlusion query is issued for this object
    pub const fn uses_occlusion_query(&self) -> bool {
        self.uses_occlusion_query
    }

    /// Render count of the last frame this object was added
    pub fn render_count(&self) -> u32 {
        self.render_count.get()
    }

    pub(crate) fn set_render_count(&self, count: u32) {
        self.render_count.set(count);
    }

    /// Render count of the last frame the previous matrix was tracked
    pub fn prev_render_count(&self) -> u32 {
        self.prev_render_count.get()
    }

    pub(crate) fn set_prev_render_count(&self, count: u32) {
        self.prev_render_count.set(count);
    }

    /// View-space depth computed when added as transparent
    pub fn z(&self) -> f32 {
        self.z.get()
    }

    pub(crate) fn set_z(&self, z: f32) {
        self.z.set(z);
    }

    /// Previous-frame world matrix
    pub fn prev_matrix(&self) -> Option<Mat4> {
        self.prev_matrix.get()
    }

    pub(crate) fn set_prev_matrix(&self, matrix: Mat4) {
        self.prev_matrix.set(Some(matrix));
    }

    /// True if the object goes through the transparent path
    pub fn is_transparent(&self) -> bool {
        self.material.as_ref().is_some_and(|m| m.is_transparent())
    }
}
