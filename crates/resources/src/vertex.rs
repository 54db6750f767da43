//! Vertex formats.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

/// Lit, textured vertex.
///
/// | Offset | Size | Field |
/// |--------|------|-------|
/// | 0      | 12   | position |
/// | 12     | 12   | normal |
/// | 24     | 8    | tex_coord |
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tex_coord: Vec2,
}

impl Vertex {
    #[inline]
    pub const fn new(position: Vec3, normal: Vec3, tex_coord: Vec2) -> Self {
        Self {
            position,
            normal,
            tex_coord,
        }
    }

    /// Size of one vertex in bytes.
    #[inline]
    pub const fn stride() -> u32 {
        size_of::<Self>() as u32
    }
}

/// Point-sprite vertex expanded to a camera-facing quad on the GPU.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct SpriteVertex {
    pub center: Vec3,
    pub size: Vec2,
}

impl SpriteVertex {
    /// Size of one vertex in bytes.
    #[inline]
    pub const fn stride() -> u32 {
        size_of::<Self>() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_size() {
        assert_eq!(Vertex::stride(), 32);
        assert_eq!(SpriteVertex::stride(), 20);
    }
}
