//! Main pass constants.

use glam::Vec4;
use renderer_core::FrameTime;
use renderer_resources::PassConstants;
use renderer_scene::{LightRig, OrbitCamera};

/// Builds the main pass constants each frame from the camera, viewport,
/// frame time, fog and lights. Pass constants are not dirty-tracked; the
/// whole record is rewritten every frame.
#[derive(Clone, Debug)]
pub struct MainPassProvider {
    pub camera: OrbitCamera,
    pub lights: LightRig,
    pub fog_color: Vec4,
    pub fog_start: f32,
    pub fog_range: f32,
    width: u32,
    height: u32,
}

impl MainPassProvider {
    /// Creates a provider for a `width` x `height` render target.
    pub fn new(width: u32, height: u32) -> Self {
        let defaults = PassConstants::default();
        let mut camera = OrbitCamera::default();
        camera.set_viewport(width, height);
        Self {
            camera,
            lights: LightRig::default(),
            fog_color: defaults.fog_color,
            fog_start: defaults.fog_start,
            fog_range: defaults.fog_range,
            width,
            height,
        }
    }

    pub fn with_lights(mut self, lights: LightRig) -> Self {
        self.lights = lights;
        self
    }

    /// Updates the render-target size and the camera aspect ratio.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.camera.set_viewport(width, height);
    }

    /// Clear colour of the main pass; matches the fog so distant geometry
    /// fades into the background.
    #[inline]
    pub fn clear_color(&self) -> [f32; 4] {
        self.fog_color.to_array()
    }

    /// Builds this frame's pass constants.
    pub fn build(&self, time: FrameTime) -> PassConstants {
        let mut pass = PassConstants::default();
        pass.set_camera(self.camera.view_matrix(), self.camera.projection_matrix());
        pass.eye_position = self.camera.eye_position();
        pass.set_render_target_size(self.width, self.height);
        pass.near_z = self.camera.perspective.near;
        pass.far_z = self.camera.perspective.far;
        pass.total_time = time.total;
        pass.delta_time = time.delta;
        pass.ambient_light = self.lights.ambient;
        pass.fog_color = self.fog_color;
        pass.fog_start = self.fog_start;
        pass.fog_range = self.fog_range;
        pass.lights = self.lights.pack();
        pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    #[test]
    fn test_build_pass_constants() {
        let provider = MainPassProvider::new(1280, 720).with_lights(LightRig::outdoor());
        let pass = provider.build(FrameTime::new(2.5, 0.016));

        assert_eq!(pass.total_time, 2.5);
        assert_eq!(pass.delta_time, 0.016);
        assert_eq!(pass.near_z, 1.0);
        assert_eq!(pass.far_z, 1000.0);
        assert_eq!(pass.render_target_size, Vec2::new(1280.0, 720.0));
        assert_eq!(pass.eye_position, provider.camera.eye_position());
        assert_eq!(pass.ambient_light, Vec4::new(0.25, 0.25, 0.35, 1.0));
        assert_eq!(pass.lights[0].strength, glam::Vec3::splat(0.6));
        assert_eq!(pass.view_proj, pass.proj * pass.view);
    }

    #[test]
    fn test_clear_color_matches_fog() {
        let mut provider = MainPassProvider::new(800, 600);
        provider.fog_color = Vec4::new(0.1, 0.2, 0.3, 1.0);
        assert_eq!(provider.clear_color(), [0.1, 0.2, 0.3, 1.0]);
        assert_eq!(provider.build(FrameTime::default()).fog_color, provider.fog_color);
    }

    #[test]
    fn test_resize_updates_aspect() {
        let mut provider = MainPassProvider::new(800, 600);
        provider.resize(1000, 500);
        assert_eq!(provider.camera.perspective.aspect, 2.0);
        let pass = provider.build(FrameTime::default());
        assert_eq!(pass.render_target_size, Vec2::new(1000.0, 500.0));
    }
}
