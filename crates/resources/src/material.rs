//! Materials.
//!
//! A [`Material`] owns the surface properties that become its
//! [`MaterialConstants`] record, the slot that record occupies in every
//! frame resource, and the dirty counter tracking which frame resources
//! still hold stale data. Every setter marks the material dirty.

use glam::{Mat4, Vec3, Vec4};
use renderer_rhi::TextureSlot;

use crate::constants::MaterialConstants;
use crate::dirty::DirtyCounter;

/// Properties of a material before it is added to a scene.
#[derive(Clone, Debug)]
pub struct MaterialDesc {
    pub name: String,
    pub diffuse_albedo: Vec4,
    pub fresnel_r0: Vec3,
    pub roughness: f32,
    pub mat_transform: Mat4,
    /// Shader-visible slot of the diffuse texture, if the material has one.
    pub diffuse_texture: Option<TextureSlot>,
}

impl MaterialDesc {
    /// Creates a description with default surface properties.
    pub fn new(name: impl Into<String>) -> Self {
        let defaults = MaterialConstants::default();
        Self {
            name: name.into(),
            diffuse_albedo: defaults.diffuse_albedo,
            fresnel_r0: defaults.fresnel_r0,
            roughness: defaults.roughness,
            mat_transform: defaults.mat_transform,
            diffuse_texture: None,
        }
    }

    pub fn with_albedo(mut self, diffuse_albedo: Vec4) -> Self {
        self.diffuse_albedo = diffuse_albedo;
        self
    }

    pub fn with_fresnel(mut self, fresnel_r0: Vec3) -> Self {
        self.fresnel_r0 = fresnel_r0;
        self
    }

    pub fn with_roughness(mut self, roughness: f32) -> Self {
        self.roughness = roughness;
        self
    }

    pub fn with_texture(mut self, slot: TextureSlot) -> Self {
        self.diffuse_texture = Some(slot);
        self
    }
}

/// Material registered in a scene.
#[derive(Clone, Debug)]
pub struct Material {
    name: String,
    constant_slot: usize,
    diffuse_texture: Option<TextureSlot>,
    diffuse_albedo: Vec4,
    fresnel_r0: Vec3,
    roughness: f32,
    mat_transform: Mat4,
    dirty: DirtyCounter,
}

impl Material {
    /// Creates a material occupying `constant_slot` in every frame
    /// resource's material buffer. The material starts dirty so each frame
    /// resource receives its constants once.
    ///
    /// # Arguments
    ///
    /// * `desc` - Surface properties
    /// * `constant_slot` - Record index in the material upload buffers
    /// * `frames_in_flight` - Number of frame resources
    pub fn new(desc: MaterialDesc, constant_slot: usize, frames_in_flight: usize) -> Self {
        Self {
            name: desc.name,
            constant_slot,
            diffuse_texture: desc.diffuse_texture,
            diffuse_albedo: desc.diffuse_albedo,
            fresnel_r0: desc.fresnel_r0,
            roughness: desc.roughness,
            mat_transform: desc.mat_transform,
            dirty: DirtyCounter::new(frames_in_flight),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record index in the material upload buffers. Never changes.
    #[inline]
    pub fn constant_slot(&self) -> usize {
        self.constant_slot
    }

    #[inline]
    pub fn diffuse_texture(&self) -> Option<TextureSlot> {
        self.diffuse_texture
    }

    #[inline]
    pub fn diffuse_albedo(&self) -> Vec4 {
        self.diffuse_albedo
    }

    #[inline]
    pub fn mat_transform(&self) -> Mat4 {
        self.mat_transform
    }

    pub fn set_diffuse_albedo(&mut self, diffuse_albedo: Vec4) {
        self.diffuse_albedo = diffuse_albedo;
        self.dirty.mark();
    }

    pub fn set_fresnel_r0(&mut self, fresnel_r0: Vec3) {
        self.fresnel_r0 = fresnel_r0;
        self.dirty.mark();
    }

    pub fn set_roughness(&mut self, roughness: f32) {
        self.roughness = roughness;
        self.dirty.mark();
    }

    pub fn set_mat_transform(&mut self, mat_transform: Mat4) {
        self.mat_transform = mat_transform;
        self.dirty.mark();
    }

    pub fn set_diffuse_texture(&mut self, slot: Option<TextureSlot>) {
        self.diffuse_texture = slot;
        self.dirty.mark();
    }

    #[inline]
    pub fn dirty(&self) -> &DirtyCounter {
        &self.dirty
    }

    #[inline]
    pub fn dirty_mut(&mut self) -> &mut DirtyCounter {
        &mut self.dirty
    }

    /// Builds the record written to the material upload buffers.
    pub fn to_constants(&self) -> MaterialConstants {
        MaterialConstants {
            diffuse_albedo: self.diffuse_albedo,
            fresnel_r0: self.fresnel_r0,
            roughness: self.roughness,
            mat_transform: self.mat_transform,
        }
    }
}
