//! Math utilities and types
//!
//! Provides the math types used for camera, light and constant-buffer data.

pub use nalgebra::{Matrix4, Rotation3, Unit, Vector3, Vector4};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Column-major 4x4 matrix in the layout expected by shader constant blocks
pub type RawMat4 = [[f32; 4]; 4];

/// Math utility functions
pub mod utils {
    use super::{Mat4, RawMat4, Rotation3, Unit, Vec3, Vec4};

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees.to_radians()
    }

    /// Flatten a matrix into column-major arrays
    pub fn to_raw(matrix: &Mat4) -> RawMat4 {
        (*matrix).into()
    }

    /// Flatten a vector into an array
    pub fn vec4_to_raw(vector: &Vec4) -> [f32; 4] {
        [vector.x, vector.y, vector.z, vector.w]
    }

    /// Rotate a point about an axis through the origin
    pub fn rotate_about_axis(point: &Vec3, axis: &Vec3, angle: f32) -> Vec3 {
        Rotation3::from_axis_angle(&Unit::new_normalize(*axis), angle) * point
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_to_raw_is_column_major() {
        let matrix = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0));
        let raw = utils::to_raw(&matrix);
        assert_relative_eq!(raw[3][0], 1.0);
        assert_relative_eq!(raw[3][1], 2.0);
        assert_relative_eq!(raw[3][2], 3.0);
        assert_relative_eq!(raw[3][3], 1.0);
    }

    #[test]
    fn test_rotate_about_y() {
        let rotated = utils::rotate_about_axis(
            &Vec3::new(1.0, 0.0, 0.0),
            &Vec3::y(),
            std::f32::consts::FRAC_PI_2,
        );
        assert_relative_eq!(rotated, Vec3::new(0.0, 0.0, -1.0), epsilon = 1e-6);
    }
}
