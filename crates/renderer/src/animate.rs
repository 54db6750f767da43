//! Material animation.
//!
//! Animations run once per frame after the frame resource is free and
//! before constants are propagated. Changing a material through its
//! setters marks it dirty, so every frame resource picks up the change.

use renderer_core::FrameTime;
use renderer_resources::Material;

use crate::registry::MaterialId;

/// Per-frame update of material properties.
pub trait MaterialAnimation {
    fn animate(&mut self, materials: &mut [Material], time: FrameTime);
}

/// Scrolls a material's texture coordinates, wrapping at 1.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UvScroll {
    material: MaterialId,
    /// U offset per second.
    pub du: f32,
    /// V offset per second.
    pub dv: f32,
}

impl UvScroll {
    pub fn new(material: MaterialId, du: f32, dv: f32) -> Self {
        Self { material, du, dv }
    }

    /// Slow drift used for water.
    pub fn water(material: MaterialId) -> Self {
        Self::new(material, 0.1, 0.02)
    }
}

impl MaterialAnimation for UvScroll {
    fn animate(&mut self, materials: &mut [Material], time: FrameTime) {
        let material = &mut materials[self.material.index()];
        let mut transform = material.mat_transform();

        let u = (transform.w_axis.x + self.du * time.delta).rem_euclid(1.0);
        let v = (transform.w_axis.y + self.dv * time.delta).rem_euclid(1.0);
        transform.w_axis.x = u;
        transform.w_axis.y = v;

        material.set_mat_transform(transform);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use renderer_resources::MaterialDesc;

    fn water() -> Vec<Material> {
        vec![Material::new(MaterialDesc::new("water"), 0, 3)]
    }

    #[test]
    fn test_scroll_offsets_translation() {
        let mut materials = water();
        let mut scroll = UvScroll::water(MaterialId(0));
        scroll.animate(&mut materials, FrameTime::new(1.0, 1.0));

        let t = materials[0].mat_transform();
        assert!((t.w_axis.x - 0.1).abs() < 1e-6);
        assert!((t.w_axis.y - 0.02).abs() < 1e-6);
    }

    #[test]
    fn test_scroll_wraps_at_one() {
        let mut materials = water();
        let mut scroll = UvScroll::new(MaterialId(0), 0.3, -0.3);
        for _ in 0..4 {
            scroll.animate(&mut materials, FrameTime::new(0.0, 1.0));
        }

        let t = materials[0].mat_transform();
        assert!((t.w_axis.x - 0.2).abs() < 1e-5);
        assert!((t.w_axis.y - 0.8).abs() < 1e-5);
    }

    #[test]
    fn test_scroll_marks_material_dirty() {
        let mut materials = water();
        for _ in 0..3 {
            materials[0].dirty_mut().consume();
        }
        UvScroll::water(MaterialId(0)).animate(&mut materials, FrameTime::new(0.0, 0.016));
        assert_eq!(materials[0].dirty().remaining(), 3);
    }
}
