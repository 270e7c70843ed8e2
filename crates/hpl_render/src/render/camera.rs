//! # 3D Camera
//!
//! Perspective look-at camera producing the view and projection matrices and
//! the culling frustum used by [`Renderer3D`](crate::render::Renderer3D).
//!
//! # Coordinate System
//! Right-handed, Y-up. The camera looks down its local -Z axis, matching the
//! OpenGL-style device behind [`LowLevelGraphics`](crate::render::LowLevelGraphics).

use crate::foundation::math::{utils, Mat4, Point3, Vec3};
use crate::spatial::frustum::Frustum;

/// Perspective camera
#[derive(Debug, Clone)]
pub struct Camera3D {
    /// Camera position in world space
    pub position: Vec3,

    /// Point the camera is looking at in world space
    pub target: Vec3,

    /// Up vector for camera orientation
    pub up: Vec3,

    /// Vertical field of view in radians
    pub fov: f32,

    /// Aspect ratio (width / height)
    pub aspect: f32,

    /// Distance to the near clipping plane
    pub near: f32,

    /// Distance to the far clipping plane
    pub far: f32,
}

impl Camera3D {
    /// Create a perspective camera looking at the origin
    ///
    /// # Arguments
    /// * `position` - Camera position in world space
    /// * `fov_degrees` - Vertical field of view in degrees
    /// * `aspect` - Aspect ratio (width / height)
    /// * `near` - Distance to the near plane (must be > 0)
    /// * `far` - Distance to the far plane (must be > near)
    pub fn perspective(position: Vec3, fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            position,
            target: Vec3::zeros(),
            up: Vec3::y(),
            fov: utils::deg_to_rad(fov_degrees),
            aspect,
            near,
            far,
        }
    }

    /// Move the camera, keeping its target
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        log::trace!("Camera position updated to: {:?}", position);
    }

    /// Look at a point with a custom up vector
    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        self.target = target;
        self.up = up;
        log::trace!("Camera look_at updated - target: {:?}, up: {:?}", target, up);
    }

    /// Update the aspect ratio after a viewport change
    pub fn set_aspect_ratio(&mut self, aspect: f32) {
        if (self.aspect - aspect).abs() > 0.01 {
            log::info!("Camera aspect ratio changed: {:.3} -> {:.3}", self.aspect, aspect);
        }
        self.aspect = aspect;
    }

    /// World-to-camera matrix
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(&Point3::from(self.position), &Point3::from(self.target), &self.up)
    }

    /// Perspective projection matrix
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::new_perspective(self.aspect, self.fov, self.near, self.far)
    }

    /// Culling frustum of the camera
    pub fn frustum(&self) -> Frustum {
        Frustum::new(self.projection_matrix(), self.view_matrix(), self.near, self.far, self.fov, self.aspect)
    }
}

impl Default for Camera3D {
    /// Camera above and behind the origin looking at it, 45 degree field of
    /// view, 16:9, near 0.1, far 1000
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 3.0, 3.0),
            target: Vec3::zeros(),
            up: Vec3::y(),
            fov: std::f32::consts::FRAC_PI_4,
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_frustum_matches_camera() {
        let mut camera = Camera3D::perspective(Vec3::new(0.0, 1.0, 5.0), 60.0, 1.5, 0.1, 50.0);
        camera.look_at(Vec3::new(0.0, 1.0, 0.0), Vec3::y());
        let frustum = camera.frustum();
        assert_relative_eq!(frustum.origin(), Vec3::new(0.0, 1.0, 5.0), epsilon = 1e-4);
        assert!(frustum.collide_point(&Vec3::new(0.0, 1.0, 0.0)));
        assert!(!frustum.collide_point(&Vec3::new(0.0, 1.0, 10.0)));
        assert_relative_eq!(frustum.far(), 50.0);
    }

    #[test]
    fn test_default_fov_is_45_degrees() {
        let camera = Camera3D::default();
        assert_relative_eq!(camera.fov, utils::deg_to_rad(45.0));
    }

    #[test]
    fn test_wider_aspect_widens_frustum() {
        let mut camera = Camera3D::perspective(Vec3::zeros(), 60.0, 1.0, 0.1, 50.0);
        camera.look_at(Vec3::new(0.0, 0.0, -1.0), Vec3::y());
        let side = Vec3::new(8.0, 0.0, -10.0);
        assert!(!camera.frustum().collide_point(&side));

        camera.set_aspect_ratio(2.0);
        assert!(camera.frustum().collide_point(&side));
    }
}
