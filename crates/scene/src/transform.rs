//! Position / rotation / scale transforms.
//!
//! Render items store plain matrices; [`Transform`] is the convenient way
//! to build them, both for world matrices and for texture-coordinate
//! transforms (where only the scale and translation are meaningful).
//!
//! # Example
//!
//! ```
//! use renderer_scene::Transform;
//! use glam::Vec3;
//!
//! let world = Transform::new()
//!     .with_position(Vec3::new(3.0, 2.0, -9.0))
//!     .with_scale(Vec3::splat(8.0))
//!     .matrix();
//!
//! let corner = world.transform_point3(Vec3::splat(0.5));
//! assert!((corner - Vec3::new(7.0, 6.0, -5.0)).length() < 1e-5);
//! ```

use glam::{Mat4, Quat, Vec3};

/// A transform made of position, rotation and scale, applied scale first.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Create a new transform at the origin.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Texture-coordinate tiling: scales U and V.
    pub fn tiling(u: f32, v: f32) -> Self {
        Self::new().with_scale(Vec3::new(u, v, 1.0))
    }

    /// Get the transformation matrix.
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

impl From<Transform> for Mat4 {
    fn from(transform: Transform) -> Self {
        transform.matrix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    fn approx_eq_vec3(a: Vec3, b: Vec3) -> bool {
        (a - b).abs().max_element() < EPSILON
    }

    #[test]
    fn test_transform_default() {
        let t = Transform::default();
        assert_eq!(t.position, Vec3::ZERO);
        assert_eq!(t.rotation, Quat::IDENTITY);
        assert_eq!(t.scale, Vec3::ONE);
        assert_eq!(t.matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn test_transform_builder() {
        let t = Transform::new()
            .with_position(Vec3::new(1.0, 2.0, 3.0))
            .with_scale(Vec3::splat(2.0));

        assert_eq!(t.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(t.scale, Vec3::splat(2.0));
    }

    #[test]
    fn test_scale_applies_before_translation() {
        let m = Transform::new()
            .with_position(Vec3::new(10.0, 0.0, 0.0))
            .with_scale(Vec3::splat(2.0))
            .matrix();
        assert!(approx_eq_vec3(
            m.transform_point3(Vec3::ONE),
            Vec3::new(12.0, 2.0, 2.0)
        ));
    }

    #[test]
    fn test_rotation() {
        let m = Transform::new()
            .with_rotation(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2))
            .matrix();
        assert!(approx_eq_vec3(m.transform_vector3(Vec3::X), Vec3::NEG_Z));
    }

    #[test]
    fn test_tiling() {
        let m: Mat4 = Transform::tiling(5.0, 5.0).into();
        assert!(approx_eq_vec3(
            m.transform_point3(Vec3::new(0.5, 0.2, 0.0)),
            Vec3::new(2.5, 1.0, 0.0)
        ));
    }
}
