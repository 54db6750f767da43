//! Lights and the light rig.
//!
//! A [`LightRig`] holds the ambient term and up to [`MAX_LIGHTS`] lights,
//! and packs them into the pass light array. Shaders loop over the array
//! by kind, so directional lights are packed first, then point lights,
//! then spot lights. Unused entries are zero.

use bytemuck::Zeroable;
use glam::{Vec3, Vec4};
use renderer_resources::{LightConstants, MAX_LIGHTS};

/// A light source.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Light {
    /// Infinitely distant light (sun-like).
    Directional { direction: Vec3, strength: Vec3 },
    /// Omnidirectional light with linear falloff.
    Point {
        position: Vec3,
        strength: Vec3,
        falloff_start: f32,
        falloff_end: f32,
    },
    /// Cone-shaped light.
    Spot {
        position: Vec3,
        direction: Vec3,
        strength: Vec3,
        falloff_start: f32,
        falloff_end: f32,
        spot_power: f32,
    },
}

impl Light {
    /// Directional light; `direction` is normalized.
    pub fn directional(direction: Vec3, strength: Vec3) -> Self {
        Light::Directional {
            direction: direction.normalize_or_zero(),
            strength,
        }
    }

    pub fn point(position: Vec3, strength: Vec3, falloff_start: f32, falloff_end: f32) -> Self {
        Light::Point {
            position,
            strength,
            falloff_start,
            falloff_end,
        }
    }

    fn pack_order(&self) -> u8 {
        match self {
            Light::Directional { .. } => 0,
            Light::Point { .. } => 1,
            Light::Spot { .. } => 2,
        }
    }

    /// Converts to the packed record.
    pub fn to_constants(&self) -> LightConstants {
        let mut constants = LightConstants::zeroed();
        match *self {
            Light::Directional {
                direction,
                strength,
            } => {
                constants.direction = direction;
                constants.strength = strength;
            }
            Light::Point {
                position,
                strength,
                falloff_start,
                falloff_end,
            } => {
                constants.position = position;
                constants.strength = strength;
                constants.falloff_start = falloff_start;
                constants.falloff_end = falloff_end;
            }
            Light::Spot {
                position,
                direction,
                strength,
                falloff_start,
                falloff_end,
                spot_power,
            } => {
                constants.position = position;
                constants.direction = direction.normalize_or_zero();
                constants.strength = strength;
                constants.falloff_start = falloff_start;
                constants.falloff_end = falloff_end;
                constants.spot_power = spot_power;
            }
        }
        constants
    }
}

/// Ambient light plus the lights of the main pass.
#[derive(Clone, Debug, PartialEq)]
pub struct LightRig {
    pub ambient: Vec4,
    lights: Vec<Light>,
}

impl Default for LightRig {
    fn default() -> Self {
        Self {
            ambient: Vec4::new(0.0, 0.0, 0.0, 1.0),
            lights: Vec::new(),
        }
    }
}

impl LightRig {
    pub fn new(ambient: Vec4) -> Self {
        Self {
            ambient,
            lights: Vec::new(),
        }
    }

    /// Three-point key / fill / back setup with two warm point lights.
    pub fn outdoor() -> Self {
        let mut rig = Self::new(Vec4::new(0.25, 0.25, 0.35, 1.0));
        rig.push(Light::directional(
            Vec3::new(0.57735, -0.57735, 0.57735),
            Vec3::splat(0.6),
        ));
        rig.push(Light::directional(
            Vec3::new(-0.57735, -0.57735, 0.57735),
            Vec3::splat(0.3),
        ));
        rig.push(Light::directional(
            Vec3::new(0.0, -0.707, -0.707),
            Vec3::splat(0.15),
        ));
        rig.push(Light::point(
            Vec3::new(-5.0, 13.5, -8.0),
            Vec3::new(0.9, 0.8, 0.6),
            1.0,
            25.0,
        ));
        rig.push(Light::point(
            Vec3::new(5.0, 14.5, -8.0),
            Vec3::new(0.9, 0.8, 0.6),
            1.0,
            25.0,
        ));
        rig
    }

    /// Adds a light.
    ///
    /// # Panics
    ///
    /// Panics if the rig already holds [`MAX_LIGHTS`] lights.
    pub fn push(&mut self, light: Light) {
        assert!(
            self.lights.len() < MAX_LIGHTS,
            "light rig holds at most {MAX_LIGHTS} lights"
        );
        self.lights.push(light);
    }

    #[inline]
    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    /// Packs the lights directional first, then point, then spot. Relative
    /// order within a kind is preserved.
    pub fn pack(&self) -> [LightConstants; MAX_LIGHTS] {
        let mut sorted: Vec<&Light> = self.lights.iter().collect();
        sorted.sort_by_key(|light| light.pack_order());

        let mut packed = [LightConstants::zeroed(); MAX_LIGHTS];
        for (slot, light) in packed.iter_mut().zip(sorted) {
            *slot = light.to_constants();
        }
        packed
    }
}
