//! View frustum for visibility culling
//!
//! Planes are extracted from the combined projection * view matrix with the
//! Gribb-Hartmann method and stored in opposing pairs: near/far, left/right,
//! top/bottom. Inside is the positive side of every plane.

use crate::foundation::math::{Mat4, Mat4Ext, Plane, Point3, Vec3, Vec4};
use crate::spatial::bounding_volume::BoundingVolume;
use crate::spatial::shadow_volume::ShadowVolumeBv;

/// Index of a frustum plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrustumPlaneType {
    /// Near clip plane
    Near = 0,
    /// Far clip plane
    Far = 1,
    /// Left side
    Left = 2,
    /// Right side
    Right = 3,
    /// Top side
    Top = 4,
    /// Bottom side
    Bottom = 5,
}

/// Result of a frustum collision test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrustumCollision {
    /// Completely outside
    Outside,
    /// Partially inside
    Intersect,
    /// Completely inside
    Inside,
}

/// Camera frustum with cached planes, corners and bounding boxes
#[derive(Debug, Clone)]
pub struct Frustum {
    planes: [Plane; 6],
    origin: Vec3,
    forward: Vec3,
    near: f32,
    far: f32,
    fov: f32,
    aspect: f32,
    view: Mat4,
    projection: Mat4,
    corners: [Vec3; 8],
    bounding_volume: BoundingVolume,
    origin_bv: BoundingVolume,
}

impl Frustum {
    /// Build a frustum from a perspective projection and a view matrix.
    ///
    /// `fov` is the vertical field of view in radians.
    pub fn new(projection: Mat4, view: Mat4, near: f32, far: f32, fov: f32, aspect: f32) -> Self {
        let clip = projection * view;
        let row = |i: usize| clip.row(i).into_owned();
        let plane = |v: nalgebra::RowVector4<f32>| Plane::new(v[0], v[1], v[2], v[3]);

        let planes = [
            plane(row(3) + row(2)),
            plane(row(3) - row(2)),
            plane(row(3) + row(0)),
            plane(row(3) - row(0)),
            plane(row(3) - row(1)),
            plane(row(3) + row(1)),
        ];

        let inverse_view = view.try_inverse().unwrap_or_else(Mat4::identity);
        let origin = inverse_view.translation_part();
        let forward = inverse_view.forward_axis().try_normalize(f32::EPSILON).unwrap_or_else(|| -Vec3::z());

        // near corners first, then far corners
        let inverse_clip = clip.try_inverse().unwrap_or_else(Mat4::identity);
        let mut corners = [Vec3::zeros(); 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            let ndc = Vec4::new(
                if i & 1 == 0 { -1.0 } else { 1.0 },
                if i & 2 == 0 { -1.0 } else { 1.0 },
                if i < 4 { -1.0 } else { 1.0 },
                1.0,
            );
            let world = inverse_clip * ndc;
            *corner = if world.w.abs() > f32::EPSILON { world.xyz() / world.w } else { origin };
        }

        let (mut near_min, mut near_max) = (origin, origin);
        for corner in &corners[..4] {
            near_min = near_min.inf(corner);
            near_max = near_max.sup(corner);
        }
        let (mut all_min, mut all_max) = (near_min, near_max);
        for corner in &corners[4..] {
            all_min = all_min.inf(corner);
            all_max = all_max.sup(corner);
        }
        let bounding_volume = BoundingVolume::from_min_max(all_min, all_max);
        let origin_bv = BoundingVolume::from_min_max(near_min, near_max);

        Self {
            planes,
            origin,
            forward,
            near,
            far,
            fov,
            aspect,
            view,
            projection,
            corners,
            bounding_volume,
            origin_bv,
        }
    }

    /// Build a right-handed perspective frustum looking from `eye` at `target`
    pub fn from_look_at(eye: Vec3, target: Vec3, up: Vec3, fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        let view = Mat4::look_at_rh(&Point3::from(eye), &Point3::from(target), &up);
        let projection = Mat4::new_perspective(aspect, fov, near, far);
        Self::new(projection, view, near, far, fov, aspect)
    }

    /// Same frustum with a different far distance
    #[must_use]
    pub fn with_far_plane(&self, far: f32) -> Self {
        let projection = Mat4::new_perspective(self.aspect, self.fov, self.near, far);
        Self::new(projection, self.view, self.near, far, self.fov, self.aspect)
    }

    /// All six planes in pair order
    pub const fn planes(&self) -> &[Plane; 6] {
        &self.planes
    }

    /// A single plane
    pub const fn plane(&self, plane: FrustumPlaneType) -> &Plane {
        &self.planes[plane as usize]
    }

    /// Eye position
    pub const fn origin(&self) -> Vec3 {
        self.origin
    }

    /// Viewing direction
    pub const fn forward(&self) -> Vec3 {
        self.forward
    }

    /// Near distance
    pub const fn near(&self) -> f32 {
        self.near
    }

    /// Far distance
    pub const fn far(&self) -> f32 {
        self.far
    }

    /// Vertical field of view in radians
    pub const fn fov(&self) -> f32 {
        self.fov
    }

    /// Aspect ratio
    pub const fn aspect(&self) -> f32 {
        self.aspect
    }

    /// View matrix
    pub const fn view_matrix(&self) -> &Mat4 {
        &self.view
    }

    /// Projection matrix
    pub const fn projection_matrix(&self) -> &Mat4 {
        &self.projection
    }

    /// Corner points: the four near corners followed by the four far corners
    pub const fn corners(&self) -> &[Vec3; 8] {
        &self.corners
    }

    /// Box enclosing the whole frustum
    pub const fn bounding_volume(&self) -> &BoundingVolume {
        &self.bounding_volume
    }

    /// Small box enclosing the eye and the near plane
    pub const fn origin_bv(&self) -> &BoundingVolume {
        &self.origin_bv
    }

    /// Point test
    pub fn collide_point(&self, point: &Vec3) -> bool {
        self.planes.iter().all(|plane| plane.distance_to_point(point) >= 0.0)
    }

    /// Sphere test
    pub fn collide_sphere(&self, center: &Vec3, radius: f32) -> FrustumCollision {
        let mut result = FrustumCollision::Inside;
        for plane in &self.planes {
            let distance = plane.distance_to_point(center);
            if distance < -radius {
                return FrustumCollision::Outside;
            }
            if distance < radius {
                result = FrustumCollision::Intersect;
            }
        }
        result
    }

    /// Box test, rejecting on the enclosing sphere first
    pub fn collide_bounding_volume(&self, bv: &BoundingVolume) -> FrustumCollision {
        let extents = bv.world();
        if self.collide_sphere(&extents.center, extents.radius) == FrustumCollision::Outside {
            return FrustumCollision::Outside;
        }

        let corners = bv.corners();
        let mut planes_fully_inside = 0;
        for plane in &self.planes {
            let inside = corners.iter().filter(|c| plane.distance_to_point(c) >= 0.0).count();
            if inside == 0 {
                return FrustumCollision::Outside;
            }
            if inside == corners.len() {
                planes_fully_inside += 1;
            }
        }

        if planes_fully_inside == self.planes.len() {
            FrustumCollision::Inside
        } else {
            FrustumCollision::Intersect
        }
    }

    /// True if any part of the segment lies inside the frustum
    pub fn check_line_intersection(&self, start: &Vec3, end: &Vec3) -> bool {
        let (mut t_enter, mut t_exit) = (0.0_f32, 1.0_f32);
        for pair in self.planes.chunks(2) {
            for plane in pair {
                let d0 = plane.distance_to_point(start);
                let d1 = plane.distance_to_point(end);
                if d0 < 0.0 && d1 < 0.0 {
                    return false;
                }
                if d0 < 0.0 {
                    t_enter = t_enter.max(d0 / (d0 - d1));
                } else if d1 < 0.0 {
                    t_exit = t_exit.min(d0 / (d0 - d1));
                }
                if t_enter > t_exit {
                    return false;
                }
            }
        }
        true
    }

    /// True if an edge of any quad (four points each) touches the frustum
    pub fn check_quad_mesh_intersection(&self, points: &[Vec3]) -> bool {
        points.chunks_exact(4).any(|quad| {
            (0..4).any(|i| self.check_line_intersection(&quad[i], &quad[(i + 1) % 4]))
        })
    }

    /// Conservative test of a shadow volume against the frustum
    pub fn check_volume_intersection(&self, volume: &ShadowVolumeBv) -> bool {
        volume.collide_point(&self.origin)
            || self.check_quad_mesh_intersection(volume.points())
            || self.corners.iter().any(|corner| volume.collide_point(corner))
    }
}
