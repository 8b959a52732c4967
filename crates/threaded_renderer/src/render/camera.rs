//! # Camera
//!
//! Eye/look-at camera producing right-handed view matrices and perspective
//! projections with a `[0, 1]` depth range. The same type is used for the
//! scene camera and for each light's shadow camera.

use crate::config::Viewport;
use crate::foundation::math::{utils, Mat4, Point3, Vec3};

/// Distance to the near clipping plane
pub const NEAR_PLANE: f32 = 0.01;

/// Distance to the far clipping plane
pub const FAR_PLANE: f32 = 125.0;

/// Eye/look-at camera
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Camera position in world space
    pub eye: Vec3,
    /// Point the camera is looking at in world space
    pub look_at: Vec3,
    /// Up vector for camera orientation
    pub up: Vec3,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

impl Camera {
    /// Create a camera at the default scene viewpoint
    pub fn new() -> Self {
        Self {
            eye: Vec3::new(0.0, 15.0, -30.0),
            look_at: Vec3::new(0.0, 8.0, 0.0),
            up: Vec3::y(),
        }
    }

    /// Restore the default viewpoint
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Replace eye, target and up vectors
    pub fn set(&mut self, eye: Vec3, look_at: Vec3, up: Vec3) {
        self.eye = eye;
        self.look_at = look_at;
        self.up = up;
    }

    /// Orbit the eye around the up axis
    pub fn rotate_yaw(&mut self, radians: f32) {
        self.eye = utils::rotate_about_axis(&self.eye, &self.up, radians);
    }

    /// Orbit the eye around the camera's right axis
    pub fn rotate_pitch(&mut self, radians: f32) {
        let right = self.eye.cross(&self.up);
        if right.norm_squared() <= f32::EPSILON {
            return;
        }
        self.eye = utils::rotate_about_axis(&self.eye, &right, radians);
    }

    /// Right-handed view matrix
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(
            &Point3::from(self.eye),
            &Point3::from(self.look_at),
            &self.up,
        )
    }

    /// View and perspective projection matrices for a viewport
    ///
    /// For portrait viewports (aspect < 1) the vertical field of view is widened
    /// so the horizontal extent stays at `fov_degrees`.
    pub fn view_projection(&self, fov_degrees: f32, viewport: Viewport) -> (Mat4, Mat4) {
        let aspect = viewport.aspect_ratio();
        let mut fov_y = utils::deg_to_rad(fov_degrees);
        if aspect < 1.0 {
            fov_y /= aspect;
        }

        (self.view_matrix(), perspective_rh(fov_y, aspect, NEAR_PLANE, FAR_PLANE))
    }

    /// View and orthographic projection matrices covering `width` x `height` world units
    pub fn view_orthographic(&self, width: f32, height: f32) -> (Mat4, Mat4) {
        (self.view_matrix(), orthographic_rh(width, height, NEAR_PLANE, FAR_PLANE))
    }
}

/// Right-handed perspective projection mapping depth to `[0, 1]`
pub fn perspective_rh(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    let h = 1.0 / (fov_y * 0.5).tan();
    let w = h / aspect;
    let range = far / (near - far);

    Mat4::new(
        w, 0.0, 0.0, 0.0,
        0.0, h, 0.0, 0.0,
        0.0, 0.0, range, range * near,
        0.0, 0.0, -1.0, 0.0,
    )
}

/// Right-handed orthographic projection mapping depth to `[0, 1]`
pub fn orthographic_rh(width: f32, height: f32, near: f32, far: f32) -> Mat4 {
    let range = 1.0 / (near - far);

    Mat4::new(
        2.0 / width, 0.0, 0.0, 0.0,
        0.0, 2.0 / height, 0.0, 0.0,
        0.0, 0.0, range, range * near,
        0.0, 0.0, 0.0, 1.0,
    )
}
