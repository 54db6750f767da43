//! Frame-resource renderer demo.
//!
//! Builds the demo scene and renders a fixed number of frames on the
//! configured backend, keeping up to `frames_in_flight` frames queued on
//! the GPU while the CPU prepares the next one.

mod demo;
mod ripple;
mod shapes;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use glam::{Mat4, Vec3};
use tracing::{debug, info, warn};

use renderer_core::{BackendKind, RendererConfig};
use renderer_renderer::{LayerPipelines, Renderer, UvScroll};
use renderer_rhi::{Backend, Completion, HeadlessBackend, VulkanBackend};
use renderer_scene::LightRig;

/// Frames between progress log lines.
const REPORT_INTERVAL: u64 = 60;

/// Frames between crate moves.
const BOUNCE_INTERVAL: u64 = 120;

/// Loads defaults, then the file named on the command line or in
/// `RENDERER_CONFIG`, then environment overrides.
fn load_config() -> Result<RendererConfig> {
    let path = std::env::args_os()
        .nth(1)
        .or_else(|| std::env::var_os("RENDERER_CONFIG"))
        .map(PathBuf::from);

    let mut config = match path {
        Some(path) => RendererConfig::from_file(&path)
            .with_context(|| format!("failed to load configuration {}", path.display()))?,
        None => RendererConfig::default(),
    };
    config.apply_env()?;
    config.validate()?;
    Ok(config)
}

#[derive(Debug, Default)]
struct Totals {
    frames: u64,
    waits: u64,
    objects_uploaded: usize,
    materials_uploaded: usize,
    draw_calls: u64,
}

fn run<B: Backend>(backend: B, config: &RendererConfig, pipelines: LayerPipelines) -> Result<()> {
    let demo = demo::build(&backend, config.frames_in_flight)?;
    let crate_item = demo.crate_item;

    let mut renderer =
        Renderer::with_dynamic_geometry(backend, demo.scene, config, Box::new(demo.water))?;
    renderer.set_pipelines(pipelines);
    renderer.pass_provider_mut().lights = LightRig::outdoor();
    renderer.add_animation(UvScroll::water(demo.water_material));

    info!("Initialization complete, entering frame loop");

    let started = Instant::now();
    let mut totals = Totals::default();
    while config.frame_limit.is_none_or(|limit| totals.frames < limit) {
        let stats = renderer.render_frame()?;

        totals.frames += 1;
        totals.waits += u64::from(stats.waited);
        totals.objects_uploaded += stats.objects_uploaded;
        totals.materials_uploaded += stats.materials_uploaded;
        totals.draw_calls += u64::from(stats.draw_calls);

        debug!(
            "Frame {}: slot {}, fence {}, waited {}, {} objects, {} materials, {} draws",
            stats.frame_number,
            stats.slot,
            stats.fence_value,
            stats.waited,
            stats.objects_uploaded,
            stats.materials_uploaded,
            stats.draw_calls
        );
        if totals.frames % REPORT_INTERVAL == 0 {
            info!(
                "{} frames rendered, {} waited on the GPU",
                totals.frames, totals.waits
            );
        }

        let dt = renderer.timer_mut().delta_secs();
        renderer.pass_provider_mut().camera.rotate(0.1 * dt, 0.0);

        // Lift or drop the crate now and then; each move reaches every frame resource.
        if totals.frames % BOUNCE_INTERVAL == 0 {
            let lifted = (totals.frames / BOUNCE_INTERVAL) % 2 == 1;
            let height = if lifted { 4.0 } else { 0.0 };
            renderer
                .scene_mut()
                .registry_mut()
                .item_mut(crate_item)
                .set_world(Mat4::from_translation(demo::CRATE_POSITION + Vec3::Y * height));
        }
    }

    renderer.flush()?;

    let elapsed = started.elapsed().as_secs_f64();
    let fps = if elapsed > 0.0 {
        totals.frames as f64 / elapsed
    } else {
        0.0
    };
    info!(
        "Rendered {} frames in {:.2}s ({:.1} fps): {} waits, {} object and {} material uploads, {} draws",
        totals.frames,
        elapsed,
        fps,
        totals.waits,
        totals.objects_uploaded,
        totals.materials_uploaded,
        totals.draw_calls
    );
    Ok(())
}

fn main() -> Result<()> {
    let config = load_config()?;
    renderer_core::init_logging(&config.log_filter);
    info!(
        "Starting renderer: {:?} backend, {} frames in flight, {}x{}",
        config.backend, config.frames_in_flight, config.width, config.height
    );

    match config.backend {
        BackendKind::Headless => {
            let latency = Duration::from_millis(config.simulated_gpu_latency_ms);
            let completion = if latency.is_zero() {
                Completion::Immediate
            } else {
                Completion::Delayed(latency)
            };
            let backend = HeadlessBackend::new(completion)?;
            run(backend, &config, demo::placeholder_pipelines())
        }
        BackendKind::Vulkan => {
            let backend = VulkanBackend::new(config.enable_validation)?;
            warn!("No pipelines registered with the Vulkan backend; every layer is skipped");
            run(backend, &config, LayerPipelines::new())
        }
    }?;

    info!("Shutdown complete");
    Ok(())
}
