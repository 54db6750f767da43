//! Analytic water surface.
//!
//! A circular sine wave travelling outward from the origin. Stands in for a
//! wave simulation: the renderer only needs fresh vertices every frame.

use std::f32::consts::TAU;

use glam::Vec3;
use renderer_core::FrameTime;
use renderer_renderer::DynamicGeometry;
use renderer_resources::Vertex;

use crate::shapes::MeshData;

/// Rippling copy of a flat grid.
#[derive(Clone, Debug)]
pub struct Ripple {
    rest: Vec<Vertex>,
    vertices: Vec<Vertex>,
    /// Wave height in world units.
    pub amplitude: f32,
    /// Distance between crests.
    pub wavelength: f32,
    /// Crest speed in world units per second.
    pub speed: f32,
}

impl Ripple {
    /// Ripples the vertices of `grid`, which is assumed to lie in the XZ plane.
    pub fn new(grid: &MeshData<Vertex>) -> Self {
        Self {
            rest: grid.vertices.clone(),
            vertices: grid.vertices.clone(),
            amplitude: 0.4,
            wavelength: 12.0,
            speed: 4.0,
        }
    }

    /// Surface height at `(x, z)` after `t` seconds.
    pub fn height(&self, x: f32, z: f32, t: f32) -> f32 {
        let k = TAU / self.wavelength;
        self.amplitude * (k * ((x * x + z * z).sqrt() - self.speed * t)).sin()
    }
}

impl DynamicGeometry for Ripple {
    fn vertex_count(&self) -> usize {
        self.rest.len()
    }

    fn update(&mut self, time: FrameTime) {
        let k = TAU / self.wavelength;
        let travelled = self.speed * time.total;
        let amplitude = self.amplitude;
        for (rest, vertex) in self.rest.iter().zip(&mut self.vertices) {
            let (x, z) = (rest.position.x, rest.position.z);
            let r = (x * x + z * z).sqrt();
            let phase = k * (r - travelled);

            vertex.position.y = amplitude * phase.sin();

            let slope = amplitude * k * phase.cos();
            vertex.normal = if r > f32::EPSILON {
                Vec3::new(-slope * x / r, 1.0, -slope * z / r).normalize()
            } else {
                Vec3::Y
            };
        }
    }

    fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }
}
