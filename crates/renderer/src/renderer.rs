//! Top-level renderer.
//!
//! [`Renderer`] owns the scene, the frame scheduler and the per-frame
//! inputs, and runs one complete frame per [`render_frame`](Renderer::render_frame):
//!
//! 1. tick the timer
//! 2. advance to the next frame resource, waiting for the GPU if needed
//! 3. run material animations and the dynamic geometry source
//! 4. propagate dirty constants, write pass constants and dynamic vertices
//! 5. record the main pass
//! 6. submit, present and stamp the fence

use renderer_core::{FrameTime, RendererConfig, Timer};
use renderer_rhi::Backend;
use tracing::{debug, info};

use crate::animate::MaterialAnimation;
use crate::draw::LayerPipelines;
use crate::dynamic::DynamicGeometry;
use crate::error::{RenderResult, SceneError};
use crate::pass::MainPassProvider;
use crate::scene::Scene;
use crate::scheduler::{FrameScheduler, FrameStats};

/// Frame-resource renderer over a device backend.
pub struct Renderer<B: Backend> {
    // Dropped first: its drop flushes the GPU before scene buffers go away.
    scheduler: FrameScheduler<B>,
    scene: Scene<B::Buffer>,
    pass: MainPassProvider,
    pipelines: LayerPipelines,
    animations: Vec<Box<dyn MaterialAnimation>>,
    dynamic: Option<Box<dyn DynamicGeometry>>,
    timer: Timer,
}

impl<B: Backend> Renderer<B> {
    /// Creates a renderer drawing `scene` with `config.frames_in_flight`
    /// frame resources.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame resources cannot be allocated or a
    /// mesh of `scene` draws from per-frame vertices.
    pub fn new(backend: B, scene: Scene<B::Buffer>, config: &RendererConfig) -> RenderResult<Self> {
        Self::build(backend, scene, config, None)
    }

    /// Creates a renderer whose frame resources carry a vertex region for
    /// `geometry`, rewritten every frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame resources cannot be allocated.
    pub fn with_dynamic_geometry(
        backend: B,
        scene: Scene<B::Buffer>,
        config: &RendererConfig,
        geometry: Box<dyn DynamicGeometry>,
    ) -> RenderResult<Self> {
        Self::build(backend, scene, config, Some(geometry))
    }

    fn build(
        backend: B,
        scene: Scene<B::Buffer>,
        config: &RendererConfig,
        dynamic: Option<Box<dyn DynamicGeometry>>,
    ) -> RenderResult<Self> {
        if dynamic.is_none()
            && let Some(mesh) = scene.meshes().iter().find(|m| m.uses_frame_vertices())
        {
            return Err(SceneError::MissingFrameVertices(mesh.name().to_string()).into());
        }

        let dynamic_vertices = dynamic.as_ref().map_or(0, |g| g.vertex_count());
        let scheduler =
            FrameScheduler::new(backend, &scene, config.frames_in_flight, dynamic_vertices)?;

        info!(
            "Renderer created: {}x{}, {} render items",
            config.width,
            config.height,
            scene.registry().len()
        );

        Ok(Self {
            scheduler,
            scene,
            pass: MainPassProvider::new(config.width, config.height),
            pipelines: LayerPipelines::default(),
            animations: Vec::new(),
            dynamic,
            timer: Timer::new(),
        })
    }

    /// Sets the pipeline bound for each layer.
    pub fn set_pipelines(&mut self, pipelines: LayerPipelines) {
        self.pipelines = pipelines;
    }

    /// Adds an animation run every frame, in insertion order.
    pub fn add_animation(&mut self, animation: impl MaterialAnimation + 'static) {
        self.animations.push(Box::new(animation));
    }

    /// Updates the render-target size used for the pass constants.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            debug!("Ignoring resize to zero dimensions");
            return;
        }
        self.pass.resize(width, height);
    }

    /// Renders one frame timed by the renderer's timer.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting, recording, submission or presentation
    /// fails. Errors are fatal to the frame loop.
    pub fn render_frame(&mut self) -> RenderResult<FrameStats> {
        let time = self.timer.tick();
        self.render_frame_at(time)
    }

    /// Renders one frame with an explicit frame time.
    ///
    /// # Errors
    ///
    /// See [`render_frame`](Self::render_frame).
    pub fn render_frame_at(&mut self, time: FrameTime) -> RenderResult<FrameStats> {
        self.scheduler.begin_frame()?;

        for animation in &mut self.animations {
            animation.animate(self.scene.materials_mut(), time);
        }
        if let Some(geometry) = self.dynamic.as_mut() {
            geometry.update(time);
        }

        let pass = self.pass.build(time);
        self.scheduler
            .update_constants(&mut self.scene, &pass, self.dynamic.as_deref());
        self.scheduler
            .record(&self.scene, &self.pipelines, self.pass.clear_color())?;
        let stats = self.scheduler.submit_and_present()?;
        Ok(stats)
    }

    /// Waits until the GPU has finished every frame submitted so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait fails.
    pub fn flush(&self) -> RenderResult<()> {
        self.scheduler.flush()?;
        Ok(())
    }

    #[inline]
    pub fn scene(&self) -> &Scene<B::Buffer> {
        &self.scene
    }

    #[inline]
    pub fn scene_mut(&mut self) -> &mut Scene<B::Buffer> {
        &mut self.scene
    }

    #[inline]
    pub fn pass_provider(&self) -> &MainPassProvider {
        &self.pass
    }

    #[inline]
    pub fn pass_provider_mut(&mut self) -> &mut MainPassProvider {
        &mut self.pass
    }

    #[inline]
    pub fn timer_mut(&mut self) -> &mut Timer {
        &mut self.timer
    }

    #[inline]
    pub fn scheduler(&self) -> &FrameScheduler<B> {
        &self.scheduler
    }

    #[inline]
    pub fn backend(&self) -> &B {
        self.scheduler.backend()
    }
}
