//! Orbit camera.
//!
//! The camera sits on a sphere around a target point, parameterised by
//! spherical coordinates: `theta` around the Y axis, `phi` down from +Y and
//! `radius`. The eye position is
//!
//! ```text
//! x = radius * sin(phi) * cos(theta)
//! y = radius * cos(phi)
//! z = radius * sin(phi) * sin(theta)
//! ```
//!
//! relative to the target.

use std::f32::consts::PI;

use glam::{Mat4, Vec3};

/// Smallest polar angle; keeps the camera off the poles.
pub const MIN_PHI: f32 = 0.1;
/// Largest polar angle.
pub const MAX_PHI: f32 = PI - 0.1;
/// Closest orbit distance.
pub const MIN_RADIUS: f32 = 5.0;
/// Farthest orbit distance.
pub const MAX_RADIUS: f32 = 150.0;

/// Perspective projection settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Perspective {
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Perspective {
    fn default() -> Self {
        Self {
            fov_y: PI / 4.0,
            aspect: 16.0 / 9.0,
            near: 1.0,
            far: 1000.0,
        }
    }
}

impl Perspective {
    /// Projection matrix with the Y axis flipped for Vulkan clip space.
    pub fn matrix(&self) -> Mat4 {
        let mut proj = Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far);
        proj.y_axis.y *= -1.0;
        proj
    }
}

/// Camera orbiting a target point.
#[derive(Clone, Debug)]
pub struct OrbitCamera {
    theta: f32,
    phi: f32,
    radius: f32,
    /// Point the camera looks at.
    pub target: Vec3,
    pub perspective: Perspective,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::new(1.5 * PI, 0.2 * PI, 60.0)
    }
}

impl OrbitCamera {
    /// Creates a camera looking at the origin. `phi` and `radius` are
    /// clamped to their valid ranges.
    pub fn new(theta: f32, phi: f32, radius: f32) -> Self {
        Self {
            theta,
            phi: phi.clamp(MIN_PHI, MAX_PHI),
            radius: radius.clamp(MIN_RADIUS, MAX_RADIUS),
            target: Vec3::ZERO,
            perspective: Perspective::default(),
        }
    }

    #[inline]
    pub fn theta(&self) -> f32 {
        self.theta
    }

    #[inline]
    pub fn phi(&self) -> f32 {
        self.phi
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Orbits the camera by the given angles in radians.
    pub fn rotate(&mut self, d_theta: f32, d_phi: f32) {
        self.theta += d_theta;
        self.phi = (self.phi + d_phi).clamp(MIN_PHI, MAX_PHI);
    }

    /// Moves the camera toward (negative) or away from (positive) the target.
    pub fn zoom(&mut self, delta: f32) {
        self.radius = (self.radius + delta).clamp(MIN_RADIUS, MAX_RADIUS);
    }

    /// Updates the aspect ratio from a viewport size.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.perspective.aspect = width.max(1) as f32 / height.max(1) as f32;
    }

    /// Eye position in world space.
    pub fn eye_position(&self) -> Vec3 {
        let (sin_phi, cos_phi) = self.phi.sin_cos();
        let (sin_theta, cos_theta) = self.theta.sin_cos();
        self.target
            + self.radius * Vec3::new(sin_phi * cos_theta, cos_phi, sin_phi * sin_theta)
    }

    /// View matrix (world to camera space).
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye_position(), self.target, Vec3::Y)
    }

    /// Projection matrix (camera to clip space, with Vulkan Y-flip).
    pub fn projection_matrix(&self) -> Mat4 {
        self.perspective.matrix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq_vec3(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn test_default_camera() {
        let camera = OrbitCamera::default();
        assert_eq!(camera.radius(), 60.0);
        assert_eq!(camera.perspective.near, 1.0);
        assert_eq!(camera.perspective.far, 1000.0);
        assert!((camera.eye_position().length() - 60.0).abs() < 1e-3);
    }

    #[test]
    fn test_eye_position_spherical() {
        // theta = 0, phi = pi/2 puts the eye on +X.
        let camera = OrbitCamera::new(0.0, PI / 2.0, 10.0);
        assert!(approx_eq_vec3(camera.eye_position(), Vec3::new(10.0, 0.0, 0.0)));

        let camera = OrbitCamera::new(PI / 2.0, PI / 2.0, 10.0);
        assert!(approx_eq_vec3(camera.eye_position(), Vec3::new(0.0, 0.0, 10.0)));
    }

    #[test]
    fn test_phi_is_clamped() {
        let mut camera = OrbitCamera::default();
        camera.rotate(0.0, -10.0);
        assert_eq!(camera.phi(), MIN_PHI);
        camera.rotate(0.0, 10.0);
        assert_eq!(camera.phi(), MAX_PHI);
    }

    #[test]
    fn test_radius_is_clamped() {
        let mut camera = OrbitCamera::default();
        camera.zoom(-1000.0);
        assert_eq!(camera.radius(), MIN_RADIUS);
        camera.zoom(1000.0);
        assert_eq!(camera.radius(), MAX_RADIUS);
    }

    #[test]
    fn test_view_matrix_maps_target_forward() {
        let camera = OrbitCamera::new(0.3, 1.0, 20.0);
        let target_in_view = camera.view_matrix().transform_point3(camera.target);
        // Right-handed view space looks down -Z.
        assert!(approx_eq_vec3(target_in_view, Vec3::new(0.0, 0.0, -20.0)));
    }

    #[test]
    fn test_projection_flips_y() {
        let camera = OrbitCamera::default();
        let unflipped = Mat4::perspective_rh(PI / 4.0, 16.0 / 9.0, 1.0, 1000.0);
        assert_eq!(camera.projection_matrix().y_axis.y, -unflipped.y_axis.y);
    }

    #[test]
    fn test_set_viewport_updates_aspect() {
        let mut camera = OrbitCamera::default();
        camera.set_viewport(800, 600);
        assert!((camera.perspective.aspect - 800.0 / 600.0).abs() < 1e-6);
    }
}
