//! Math utilities and types
//!
//! Provides the nalgebra aliases used by the renderer together with the small
//! geometric primitives (planes, screen rectangles, colours) that the
//! visibility and shadow code is written against.
//!
//! Conventions follow OpenGL: right-handed world, the camera looks down -Z in
//! view space and projected depth lies in [-1, 1].

pub use nalgebra::{Matrix4, Vector3, Vector4};
use serde::{Deserialize, Serialize};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Extension helpers for 4x4 matrices
pub trait Mat4Ext {
    /// Transform a position (w = 1) and return the xyz part
    fn transform_position(&self, position: &Vec3) -> Vec3;

    /// Translation column of an affine matrix
    fn translation_part(&self) -> Vec3;

    /// Forward direction (-Z axis) of an affine matrix
    fn forward_axis(&self) -> Vec3;
}

impl Mat4Ext for Mat4 {
    fn transform_position(&self, position: &Vec3) -> Vec3 {
        self.transform_point(&Point3::from(*position)).coords
    }

    fn translation_part(&self) -> Vec3 {
        Vec3::new(self.m14, self.m24, self.m34)
    }

    fn forward_axis(&self) -> Vec3 {
        -Vec3::new(self.m13, self.m23, self.m33)
    }
}

/// Plane stored as a unit normal and offset: `normal · p + d = 0`
///
/// Points with a non-negative signed distance are on the inside.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    /// Unit normal
    pub normal: Vec3,
    /// Offset along the normal
    pub d: f32,
}

impl Plane {
    /// Create a plane from raw coefficients, normalizing them
    pub fn new(a: f32, b: f32, c: f32, d: f32) -> Self {
        let length = (a * a + b * b + c * c).sqrt();
        if length <= f32::EPSILON {
            return Self { normal: Vec3::zeros(), d: 0.0 };
        }
        Self {
            normal: Vec3::new(a, b, c) / length,
            d: d / length,
        }
    }

    /// Create a plane with the given normal passing through `point`
    pub fn from_normal_point(normal: &Vec3, point: &Vec3) -> Self {
        let n = normal.try_normalize(f32::EPSILON).unwrap_or_else(Vec3::zeros);
        Self { normal: n, d: -n.dot(point) }
    }

    /// Signed distance from the plane to a point
    pub fn distance_to_point(&self, point: &Vec3) -> f32 {
        self.normal.dot(point) + self.d
    }

    /// Plane facing the opposite direction
    #[must_use]
    pub fn flipped(&self) -> Self {
        Self { normal: -self.normal, d: -self.d }
    }

    /// True if the normal has collapsed (degenerate construction)
    pub fn is_degenerate(&self) -> bool {
        self.normal.norm_squared() <= f32::EPSILON
    }
}

/// Integer screen rectangle (origin top-left)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect2l {
    /// Left edge in pixels
    pub x: i32,
    /// Top edge in pixels
    pub y: i32,
    /// Width in pixels
    pub w: i32,
    /// Height in pixels
    pub h: i32,
}

impl Rect2l {
    /// Create a rectangle
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// True if the rectangle covers no pixels
    pub const fn is_empty(&self) -> bool {
        self.w <= 0 || self.h <= 0
    }
}

/// Linear RGBA colour
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    /// Red
    pub r: f32,
    /// Green
    pub g: f32,
    /// Blue
    pub b: f32,
    /// Alpha
    pub a: f32,
}

impl Color {
    /// Opaque white
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);

    /// Create a colour
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Create an opaque colour
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::new(r, g, b, 1.0)
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Math utility functions
pub mod utils {
    use super::{Mat4, Mat4Ext, Plane, Rect2l, Vec3, Vec4};

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees.to_radians()
    }

    /// The eight corners of a box, max-first.
    ///
    /// Index bit 2 selects min x, bit 1 min y and bit 0 min z, so corner 0 is
    /// `max` and corner 7 is `min`.
    pub fn box_corners(min: &Vec3, max: &Vec3) -> [Vec3; 8] {
        let mut corners = [Vec3::zeros(); 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            *corner = Vec3::new(
                if i & 4 == 0 { max.x } else { min.x },
                if i & 2 == 0 { max.y } else { min.y },
                if i & 1 == 0 { max.z } else { min.z },
            );
        }
        corners
    }

    /// Inclusive point-in-box test
    pub fn point_in_box(point: &Vec3, min: &Vec3, max: &Vec3) -> bool {
        point.x >= min.x && point.x <= max.x &&
        point.y >= min.y && point.y <= max.y &&
        point.z >= min.z && point.z <= max.z
    }

    /// Inclusive box overlap test
    pub fn boxes_overlap(min_a: &Vec3, max_a: &Vec3, min_b: &Vec3, max_b: &Vec3) -> bool {
        min_a.x <= max_b.x && max_a.x >= min_b.x &&
        min_a.y <= max_b.y && max_a.y >= min_b.y &&
        min_a.z <= max_b.z && max_a.z >= min_b.z
    }

    /// A sphere is rejected as soon as it lies fully behind one plane
    pub fn check_sphere_in_planes(center: &Vec3, radius: f32, planes: &[Plane]) -> bool {
        planes.iter().all(|plane| plane.distance_to_point(center) >= -radius)
    }

    /// Positive-vertex box test: false if the box is fully behind any plane
    pub fn check_box_in_planes(min: &Vec3, max: &Vec3, planes: &[Plane]) -> bool {
        planes.iter().all(|plane| {
            let positive = Vec3::new(
                if plane.normal.x >= 0.0 { max.x } else { min.x },
                if plane.normal.y >= 0.0 { max.y } else { min.y },
                if plane.normal.z >= 0.0 { max.z } else { min.z },
            );
            plane.distance_to_point(&positive) >= 0.0
        })
    }

    /// Screen-space rectangle covered by a world box.
    ///
    /// Returns `None` when any corner is in front of the near plane, which
    /// means the camera is inside or touching the box and no useful clip
    /// rectangle exists.
    pub fn clip_rect_from_bv(
        min: &Vec3,
        max: &Vec3,
        view: &Mat4,
        projection: &Mat4,
        near_plane: f32,
        screen_size: (i32, i32),
    ) -> Option<Rect2l> {
        let max_z = -near_plane;
        let mut ndc_min = (f32::MAX, f32::MAX);
        let mut ndc_max = (f32::MIN, f32::MIN);

        for corner in box_corners(min, max) {
            let view_pos = view.transform_position(&corner);
            if view_pos.z > max_z {
                return None;
            }
            let clip = projection * Vec4::new(view_pos.x, view_pos.y, view_pos.z, 1.0);
            if clip.w.abs() <= f32::EPSILON {
                return None;
            }
            let x = (clip.x / clip.w).clamp(-1.0, 1.0);
            let y = (clip.y / clip.w).clamp(-1.0, 1.0);
            ndc_min = (ndc_min.0.min(x), ndc_min.1.min(y));
            ndc_max = (ndc_max.0.max(x), ndc_max.1.max(y));
        }

        let (width, height) = (screen_size.0 as f32, screen_size.1 as f32);
        let left = ((ndc_min.0 + 1.0) * 0.5 * width).floor() as i32;
        let right = ((ndc_max.0 + 1.0) * 0.5 * width).ceil() as i32;
        // Screen y grows downwards
        let top = ((1.0 - ndc_max.1) * 0.5 * height).floor() as i32;
        let bottom = ((1.0 - ndc_min.1) * 0.5 * height).ceil() as i32;

        let x = left.clamp(0, screen_size.0);
        let y = top.clamp(0, screen_size.1);
        let w = right.clamp(0, screen_size.0) - x;
        let h = bottom.clamp(0, screen_size.1) - y;
        Some(Rect2l::new(x, y, w, h))
    }
}
