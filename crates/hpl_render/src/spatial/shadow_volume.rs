//! Convex volume shadowed by an axis-aligned box lit from a point
//!
//! The volume is bounded by the box faces that face the light, one side plane
//! per silhouette edge (through the edge and the light) and a far cap. The
//! silhouette edges are also kept as quads extruded away from the light so a
//! frustum can be tested against the volume's side walls.

use std::f32::consts::SQRT_2;

use crate::foundation::math::{utils, Plane, Vec3};
use crate::spatial::bounding_volume::BoundingVolume;

/// Box face normals with a corner index lying on each face
const FACES: [([f32; 3], usize); 6] = [
    ([1.0, 0.0, 0.0], 0),
    ([-1.0, 0.0, 0.0], 4),
    ([0.0, 1.0, 0.0], 0),
    ([0.0, -1.0, 0.0], 2),
    ([0.0, 0.0, 1.0], 0),
    ([0.0, 0.0, -1.0], 1),
];

/// Box edges as (corner a, corner b, face 1, face 2)
const EDGES: [(usize, usize, usize, usize); 12] = [
    // along z
    (0, 1, 0, 2),
    (2, 3, 0, 3),
    (4, 5, 1, 2),
    (6, 7, 1, 3),
    // along y
    (0, 2, 0, 4),
    (1, 3, 0, 5),
    (4, 6, 1, 4),
    (5, 7, 1, 5),
    // along x
    (0, 4, 2, 4),
    (1, 5, 2, 5),
    (2, 6, 3, 4),
    (3, 7, 3, 5),
];

/// Shadow volume of a box as seen from a point light
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowVolumeBv {
    planes: Vec<Plane>,
    cap_plane_count: usize,
    points: Vec<Vec3>,
}

impl ShadowVolumeBv {
    /// Build the volume cast by `[min, max]` from `light`.
    ///
    /// Returns `None` if the light is inside the box. Silhouette quads are
    /// extruded `range * sqrt(2)` away from the light.
    pub fn from_box(min: &Vec3, max: &Vec3, light: &Vec3, range: f32) -> Option<Self> {
        if utils::point_in_box(light, min, max) {
            return None;
        }

        let corners = utils::box_corners(min, max);
        let center = (min + max) * 0.5;
        let push = range * SQRT_2;

        let mut facing = [false; 6];
        let mut planes = Vec::with_capacity(12);
        for (i, (normal, corner)) in FACES.iter().enumerate() {
            let normal = Vec3::from(*normal);
            if normal.dot(&(corners[*corner] - light)) < 0.0 {
                facing[i] = true;
                planes.push(Plane::from_normal_point(&-normal, &corners[*corner]));
            }
        }
        let cap_plane_count = planes.len();

        let mut points = Vec::with_capacity(24);
        for &(a, b, face1, face2) in &EDGES {
            if facing[face1] == facing[face2] {
                continue;
            }
            let (p1, p2) = (corners[a], corners[b]);
            let normal = (p2 - p1).cross(&(p1 - light));
            if normal.norm_squared() <= f32::EPSILON {
                continue;
            }
            let mut plane = Plane::from_normal_point(&normal, &p1);
            if plane.distance_to_point(&center) < 0.0 {
                plane = plane.flipped();
            }
            planes.push(plane);

            let extrude = |p: &Vec3| p + (p - light).try_normalize(f32::EPSILON).unwrap_or_else(Vec3::zeros) * push;
            points.extend_from_slice(&[p1, p2, extrude(&p2), extrude(&p1)]);
        }

        let direction = (center - light).try_normalize(f32::EPSILON)?;
        planes.push(Plane::from_normal_point(&-direction, &(light + direction * push)));

        Some(Self {
            planes,
            cap_plane_count,
            points,
        })
    }

    /// All bounding planes (inside is positive)
    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    /// Number of bounding planes
    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }

    /// Number of planes taken from light-facing box faces
    pub const fn cap_plane_count(&self) -> usize {
        self.cap_plane_count
    }

    /// Silhouette quads, four points each: edge start, edge end and their extrusions
    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    /// True if the point is inside every plane
    pub fn collide_point(&self, point: &Vec3) -> bool {
        self.planes.iter().all(|plane| plane.distance_to_point(point) >= 0.0)
    }

    /// Conservative sphere test
    pub fn collide_sphere(&self, center: &Vec3, radius: f32) -> bool {
        utils::check_sphere_in_planes(center, radius, &self.planes)
    }

    /// Conservative box test: sphere rejection first, then positive vertices
    pub fn collide_bounding_volume(&self, bv: &BoundingVolume) -> bool {
        let extents = bv.world();
        if !self.collide_sphere(&extents.center, extents.radius) {
            return false;
        }
        utils::check_box_in_planes(&extents.min, &extents.max, &self.planes)
    }
}
