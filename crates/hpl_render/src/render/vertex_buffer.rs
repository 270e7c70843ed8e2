//! Vertex buffers
//!
//! [`VertexBuffer`] is the draw handle a renderable carries. [`MeshBuffer`]
//! keeps CPU-side positions and indices as well, so the same geometry can
//! feed both the backend and the shadow-volume builder.

use std::fmt;

use crate::foundation::math::Vec3;
use crate::render::graphics::{LowLevelGraphics, VertexBufferId};
use crate::render::shadow_mesh::{MeshError, ShadowMesh};

/// GPU geometry handle
pub trait VertexBuffer: fmt::Debug + Send + Sync {
    /// Backend id
    fn id(&self) -> VertexBufferId;

    /// Vertices in the buffer
    fn vertex_count(&self) -> usize;

    /// Indices drawn per draw call
    fn index_count(&self) -> usize;

    /// Bind the buffer
    fn bind(&self, gfx: &mut dyn LowLevelGraphics) {
        gfx.bind_vertex_buffer(Some(self.id()));
    }

    /// Draw all indices
    fn draw(&self, gfx: &mut dyn LowLevelGraphics) {
        gfx.draw_vertex_buffer(self.id(), self.index_count());
    }
}

/// Indexed triangle mesh with CPU-side positions
#[derive(Debug, Clone, PartialEq)]
pub struct MeshBuffer {
    id: VertexBufferId,
    positions: Vec<Vec3>,
    indices: Vec<u32>,
}

impl MeshBuffer {
    /// Create a buffer from raw geometry
    pub fn new(id: VertexBufferId, positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        Self { id, positions, indices }
    }

    /// Closed box centred on the origin, outward counter-clockwise winding
    pub fn cuboid(id: VertexBufferId, half: Vec3) -> Self {
        let positions = vec![
            Vec3::new(-half.x, -half.y, -half.z),
            Vec3::new(half.x, -half.y, -half.z),
            Vec3::new(half.x, half.y, -half.z),
            Vec3::new(-half.x, half.y, -half.z),
            Vec3::new(-half.x, -half.y, half.z),
            Vec3::new(half.x, -half.y, half.z),
            Vec3::new(half.x, half.y, half.z),
            Vec3::new(-half.x, half.y, half.z),
        ];
        let indices = vec![
            4, 5, 6, 4, 6, 7, // +z
            1, 0, 3, 1, 3, 2, // -z
            5, 1, 2, 5, 2, 6, // +x
            0, 4, 7, 0, 7, 3, // -x
            7, 6, 2, 7, 2, 3, // +y
            0, 1, 5, 0, 5, 4, // -y
        ];
        Self::new(id, positions, indices)
    }

    /// Single-sided quad in the xy plane facing +z
    pub fn quad(id: VertexBufferId, half_width: f32, half_height: f32) -> Self {
        let positions = vec![
            Vec3::new(-half_width, -half_height, 0.0),
            Vec3::new(half_width, -half_height, 0.0),
            Vec3::new(half_width, half_height, 0.0),
            Vec3::new(-half_width, half_height, 0.0),
        ];
        Self::new(id, positions, vec![0, 1, 2, 0, 2, 3])
    }

    /// Vertex positions
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// Triangle indices
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Local bounding box
    pub fn bounds(&self) -> (Vec3, Vec3) {
        let mut min = Vec3::repeat(f32::MAX);
        let mut max = Vec3::repeat(f32::MIN);
        for position in &self.positions {
            min = min.inf(position);
            max = max.sup(position);
        }
        if self.positions.is_empty() {
            (Vec3::zeros(), Vec3::zeros())
        } else {
            (min, max)
        }
    }

    /// Build the silhouette topology used for stencil shadows
    pub fn shadow_mesh(&self) -> Result<ShadowMesh, MeshError> {
        ShadowMesh::new(self.positions.clone(), self.indices.clone())
    }
}

impl VertexBuffer for MeshBuffer {
    fn id(&self) -> VertexBufferId {
        self.id
    }

    fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    fn index_count(&self) -> usize {
        self.indices.len()
    }
}
