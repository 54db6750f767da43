//! Constant records written into frame-resource upload buffers.
//!
//! All records use `#[repr(C)]` and derive `bytemuck::Pod` so they can be
//! copied into mapped memory byte for byte. Every record occupies one
//! 256-byte aligned slot in its buffer; the records themselves carry no
//! trailing padding.
//!
//! # Overview
//!
//! - [`ObjectConstants`]: per render item
//! - [`MaterialConstants`]: per material
//! - [`PassConstants`]: one per frame, holding camera, timing, fog and lights
//! - [`LightConstants`]: one entry of the light array
//!
//! # Example
//!
//! ```
//! use renderer_resources::constants::{ObjectConstants, PassConstants};
//! use glam::Mat4;
//!
//! let object = ObjectConstants::new(Mat4::from_translation(glam::Vec3::Y), Mat4::IDENTITY);
//! let bytes: &[u8] = bytemuck::bytes_of(&object);
//! assert_eq!(bytes.len(), 128);
//! assert_eq!(PassConstants::size(), 1248);
//! ```

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4};

/// Number of entries in the pass light array.
pub const MAX_LIGHTS: usize = 16;

/// Per-object constants.
///
/// # Memory Layout
///
/// | Offset | Size | Field |
/// |--------|------|-------|
/// | 0      | 64   | world |
/// | 64     | 64   | tex_transform |
///
/// Total size: 128 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ObjectConstants {
    /// Object space to world space.
    pub world: Mat4,
    /// Applied to texture coordinates before the material transform.
    pub tex_transform: Mat4,
}

impl ObjectConstants {
    #[inline]
    pub fn new(world: Mat4, tex_transform: Mat4) -> Self {
        Self {
            world,
            tex_transform,
        }
    }

    /// Returns the size of this structure in bytes.
    #[inline]
    pub const fn size() -> usize {
        size_of::<Self>()
    }
}

impl Default for ObjectConstants {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY)
    }
}

/// Per-material constants.
///
/// # Memory Layout
///
/// | Offset | Size | Field |
/// |--------|------|-------|
/// | 0      | 16   | diffuse_albedo |
/// | 16     | 12   | fresnel_r0 |
/// | 28     | 4    | roughness |
/// | 32     | 64   | mat_transform |
///
/// Total size: 96 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct MaterialConstants {
    pub diffuse_albedo: Vec4,
    /// Reflectance at normal incidence.
    pub fresnel_r0: Vec3,
    pub roughness: f32,
    /// Texture-coordinate transform, animated for scrolling surfaces.
    pub mat_transform: Mat4,
}

impl MaterialConstants {
    /// Returns the size of this structure in bytes.
    #[inline]
    pub const fn size() -> usize {
        size_of::<Self>()
    }
}

impl Default for MaterialConstants {
    fn default() -> Self {
        Self {
            diffuse_albedo: Vec4::ONE,
            fresnel_r0: Vec3::splat(0.01),
            roughness: 0.25,
            mat_transform: Mat4::IDENTITY,
        }
    }
}

/// One light of the pass light array.
///
/// Directional lights use `strength` and `direction`; point lights use
/// `strength`, `position` and the falloff range; spot lights use all fields.
///
/// # Memory Layout
///
/// | Offset | Size | Field |
/// |--------|------|-------|
/// | 0      | 12   | strength |
/// | 12     | 4    | falloff_start |
/// | 16     | 12   | direction |
/// | 28     | 4    | falloff_end |
/// | 32     | 12   | position |
/// | 44     | 4    | spot_power |
///
/// Total size: 48 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct LightConstants {
    pub strength: Vec3,
    pub falloff_start: f32,
    pub direction: Vec3,
    pub falloff_end: f32,
    pub position: Vec3,
    pub spot_power: f32,
}

impl Default for LightConstants {
    fn default() -> Self {
        Self {
            strength: Vec3::splat(0.5),
            falloff_start: 1.0,
            direction: Vec3::NEG_Y,
            falloff_end: 10.0,
            position: Vec3::ZERO,
            spot_power: 64.0,
        }
    }
}

/// Per-pass constants.
///
/// Matrices are stored column-major as glam produces them.
///
/// # Memory Layout
///
/// | Offset | Size | Field |
/// |--------|------|-------|
/// | 0      | 64   | view |
/// | 64     | 64   | inv_view |
/// | 128    | 64   | proj |
/// | 192    | 64   | inv_proj |
/// | 256    | 64   | view_proj |
/// | 320    | 64   | inv_view_proj |
/// | 384    | 12   | eye_position |
/// | 396    | 4    | _padding0 |
/// | 400    | 8    | render_target_size |
/// | 408    | 8    | inv_render_target_size |
/// | 416    | 4    | near_z |
/// | 420    | 4    | far_z |
/// | 424    | 4    | total_time |
/// | 428    | 4    | delta_time |
/// | 432    | 16   | ambient_light |
/// | 448    | 16   | fog_color |
/// | 464    | 4    | fog_start |
/// | 468    | 4    | fog_range |
/// | 472    | 8    | _padding1 |
/// | 480    | 768  | lights |
///
/// Total size: 1248 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct PassConstants {
    pub view: Mat4,
    pub inv_view: Mat4,
    pub proj: Mat4,
    pub inv_proj: Mat4,
    pub view_proj: Mat4,
    pub inv_view_proj: Mat4,
    pub eye_position: Vec3,
    pub _padding0: f32,
    pub render_target_size: Vec2,
    pub inv_render_target_size: Vec2,
    pub near_z: f32,
    pub far_z: f32,
    /// Seconds since the timer started, excluding paused time.
    pub total_time: f32,
    /// Seconds since the previous frame.
    pub delta_time: f32,
    pub ambient_light: Vec4,
    pub fog_color: Vec4,
    pub fog_start: f32,
    pub fog_range: f32,
    pub _padding1: Vec2,
    /// Directional lights first, then point lights, then spot lights.
    /// Unused entries are zeroed.
    pub lights: [LightConstants; MAX_LIGHTS],
}

impl PassConstants {
    /// Sets the view and projection matrices along with their inverses and
    /// the combined view-projection.
    pub fn set_camera(&mut self, view: Mat4, proj: Mat4) {
        let view_proj = proj * view;
        self.view = view;
        self.inv_view = view.inverse();
        self.proj = proj;
        self.inv_proj = proj.inverse();
        self.view_proj = view_proj;
        self.inv_view_proj = view_proj.inverse();
    }

    /// Sets the render target size and its reciprocal.
    pub fn set_render_target_size(&mut self, width: u32, height: u32) {
        let size = Vec2::new(width as f32, height as f32);
        self.render_target_size = size;
        self.inv_render_target_size = Vec2::ONE / size.max(Vec2::ONE);
    }

    /// Returns the size of this structure in bytes.
    #[inline]
    pub const fn size() -> usize {
        size_of::<Self>()
    }
}

impl Default for PassConstants {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            inv_view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
            inv_proj: Mat4::IDENTITY,
            view_proj: Mat4::IDENTITY,
            inv_view_proj: Mat4::IDENTITY,
            eye_position: Vec3::ZERO,
            _padding0: 0.0,
            render_target_size: Vec2::ZERO,
            inv_render_target_size: Vec2::ZERO,
            near_z: 0.0,
            far_z: 0.0,
            total_time: 0.0,
            delta_time: 0.0,
            ambient_light: Vec4::new(0.0, 0.0, 0.0, 1.0),
            fog_color: Vec4::new(0.7, 0.7, 0.7, 1.0),
            fog_start: 5.0,
            fog_range: 150.0,
            _padding1: Vec2::ZERO,
            lights: [LightConstants::zeroed(); MAX_LIGHTS],
        }
    }
}
