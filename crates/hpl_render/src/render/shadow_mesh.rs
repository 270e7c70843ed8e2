//! Silhouette topology and stencil shadow-volume geometry
//!
//! [`ShadowMesh`] precomputes one face normal per triangle and an edge list in
//! which every edge knows the one or two triangles sharing it. Given a light
//! position in the mesh's local space it produces the side quads (and caps
//! for the depth-fail method) of the shadow volume.

use std::collections::HashMap;

use crate::foundation::math::Vec3;

/// Errors raised while building mesh topology
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MeshError {
    /// Index list length is not a multiple of three
    #[error("index count {0} is not a multiple of 3")]
    IndexCount(usize),

    /// An index points past the vertex list
    #[error("index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        /// Offending index
        index: u32,
        /// Number of vertices
        vertex_count: usize,
    },
}

/// Edge shared by one or two triangles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriEdge {
    /// First vertex, in the winding order of `tri1`
    pub point1: u32,
    /// Second vertex, in the winding order of `tri1`
    pub point2: u32,
    /// First triangle
    pub tri1: usize,
    /// Second triangle, `None` for an open boundary edge
    pub tri2: Option<usize>,
}

impl TriEdge {
    /// True for an open boundary edge
    pub const fn is_one_sided(&self) -> bool {
        self.tri2.is_none()
    }
}

/// Shadow geometry ready for a single indexed draw.
///
/// The first half of `vertices` are the mesh positions, the second half the
/// same positions pushed away from the light.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShadowVolumeGeometry {
    /// xyzw positions
    pub vertices: Vec<[f32; 4]>,
    /// Triangle list
    pub indices: Vec<u32>,
    /// Triangles facing the light
    pub facing_triangles: usize,
    /// Silhouette quads emitted
    pub silhouette_quads: usize,
    /// Front cap triangles emitted
    pub front_cap_triangles: usize,
    /// Back cap triangles emitted
    pub back_cap_triangles: usize,
    /// Caps were generated for the depth-fail method
    pub z_fail: bool,
}

impl ShadowVolumeGeometry {
    /// True if nothing needs drawing
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Vertices as a flat float slice with a stride of four
    pub fn vertex_floats(&self) -> &[f32] {
        bytemuck::cast_slice(&self.vertices)
    }
}

/// Triangle mesh with the adjacency needed for silhouette extraction
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowMesh {
    positions: Vec<Vec3>,
    indices: Vec<u32>,
    normals: Vec<Vec3>,
    edges: Vec<TriEdge>,
    double_sided: bool,
}

impl ShadowMesh {
    /// Build topology for an indexed triangle list
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> Result<Self, MeshError> {
        if indices.len() % 3 != 0 {
            return Err(MeshError::IndexCount(indices.len()));
        }
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= positions.len()) {
            return Err(MeshError::IndexOutOfRange {
                index,
                vertex_count: positions.len(),
            });
        }

        let normals = create_triangle_normals(&positions, &indices);
        let (edges, double_sided) = create_edges(&positions, &indices);
        Ok(Self {
            positions,
            indices,
            normals,
            edges,
            double_sided,
        })
    }

    /// Vertex positions
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// Number of triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Per-triangle face normals (not normalized)
    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    /// Edge list
    pub fn edges(&self) -> &[TriEdge] {
        &self.edges
    }

    /// True if the mesh has open boundary edges
    pub const fn is_double_sided(&self) -> bool {
        self.double_sided
    }

    fn triangle(&self, tri: usize) -> [u32; 3] {
        [self.indices[tri * 3], self.indices[tri * 3 + 1], self.indices[tri * 3 + 2]]
    }

    /// Which triangles face a light given in mesh-local space
    pub fn facing(&self, light: &Vec3) -> Vec<bool> {
        (0..self.triangle_count())
            .map(|tri| {
                let v0 = self.positions[self.indices[tri * 3] as usize];
                self.normals[tri].dot(&(v0 - light)) < 0.0
            })
            .collect()
    }

    /// Shadow volume for a light in mesh-local space.
    ///
    /// Side quads are emitted for every edge between a facing and a
    /// non-facing triangle; an open edge is paired with a virtual twin of
    /// the opposite facing, so it is always emitted. With `z_fail` the light
    /// facing triangles are added as the front cap and again, extruded with
    /// reversed winding, as the back cap.
    pub fn build_shadow_volume(&self, light: &Vec3, push: f32, z_fail: bool) -> ShadowVolumeGeometry {
        let facing = self.facing(light);
        let count = self.positions.len() as u32;

        let mut vertices = Vec::with_capacity(self.positions.len() * 2);
        vertices.extend(self.positions.iter().map(|p| [p.x, p.y, p.z, 1.0]));
        vertices.extend(self.positions.iter().map(|p| {
            let direction = (p - light).try_normalize(f32::EPSILON).unwrap_or_else(Vec3::zeros);
            let extruded = p + direction * push;
            [extruded.x, extruded.y, extruded.z, 1.0]
        }));

        let mut indices = Vec::new();
        let mut silhouette_quads = 0;
        for edge in &self.edges {
            let first = facing[edge.tri1];
            let second = edge.tri2.map_or(!first, |tri| facing[tri]);
            if first == second {
                continue;
            }
            // winding of the edge inside the facing triangle
            let (a, b) = if first { (edge.point1, edge.point2) } else { (edge.point2, edge.point1) };
            indices.extend_from_slice(&[b, a, a + count, b, a + count, b + count]);
            silhouette_quads += 1;
        }

        let facing_triangles = facing.iter().filter(|f| **f).count();
        let (mut front_cap_triangles, mut back_cap_triangles) = (0, 0);
        if z_fail {
            for tri in (0..self.triangle_count()).filter(|t| facing[*t]) {
                let [i0, i1, i2] = self.triangle(tri);
                indices.extend_from_slice(&[i0, i1, i2]);
                indices.extend_from_slice(&[i0 + count, i2 + count, i1 + count]);
                front_cap_triangles += 1;
                back_cap_triangles += 1;
            }
        }

        ShadowVolumeGeometry {
            vertices,
            indices,
            facing_triangles,
            silhouette_quads,
            front_cap_triangles,
            back_cap_triangles,
            z_fail,
        }
    }
}

fn create_triangle_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    indices
        .chunks_exact(3)
        .map(|tri| {
            let v0 = positions[tri[0] as usize];
            let edge1 = positions[tri[1] as usize] - v0;
            let edge2 = positions[tri[2] as usize] - v0;
            edge1.cross(&edge2)
        })
        .collect()
}

/// Edges keyed on welded positions, so seams with duplicated vertices still
/// connect their triangles.
fn create_edges(positions: &[Vec3], indices: &[u32]) -> (Vec<TriEdge>, bool) {
    let mut welded: HashMap<[u32; 3], u32> = HashMap::new();
    let canonical: Vec<u32> = positions
        .iter()
        .enumerate()
        .map(|(i, p)| *welded.entry([p.x.to_bits(), p.y.to_bits(), p.z.to_bits()]).or_insert(i as u32))
        .collect();

    let mut edges: Vec<TriEdge> = Vec::new();
    let mut lookup: HashMap<(u32, u32), usize> = HashMap::new();
    for (tri, corners) in indices.chunks_exact(3).enumerate() {
        for i in 0..3 {
            let (p1, p2) = (corners[i], corners[(i + 1) % 3]);
            let (c1, c2) = (canonical[p1 as usize], canonical[p2 as usize]);
            if c1 == c2 {
                continue;
            }
            let key = (c1.min(c2), c1.max(c2));
            match lookup.get(&key) {
                Some(&existing) => {
                    let edge = &mut edges[existing];
                    if edge.tri2.is_none() && edge.tri1 != tri {
                        edge.tri2 = Some(tri);
                    }
                }
                None => {
                    lookup.insert(key, edges.len());
                    edges.push(TriEdge {
                        point1: p1,
                        point2: p2,
                        tri1: tri,
                        tri2: None,
                    });
                }
            }
        }
    }

    let double_sided = edges.iter().any(TriEdge::is_one_sided);
    (edges, double_sided)
}
