//! Frame-resource renderer.
//!
//! This crate keeps CPU-written per-frame data consistent with an
//! asynchronously executing GPU:
//! - A ring of N frame resources, each guarded by a fence value
//! - Typed upload regions of constant records
//! - Dirty-tracked propagation of object and material constants
//! - A render-item registry grouped by layer and the draw protocol over it
//! - The frame scheduler tying the stages of a frame together

pub mod animate;
pub mod draw;
pub mod dynamic;
pub mod error;
pub mod frame_resource;
pub mod pass;
pub mod propagate;
pub mod registry;
pub mod renderer;
pub mod scene;
pub mod scheduler;
pub mod upload_buffer;

pub use animate::{MaterialAnimation, UvScroll};
pub use draw::{LayerPipelines, draw_render_items, record_main_pass};
pub use dynamic::DynamicGeometry;
pub use error::{RenderError, RenderResult, SceneError};
pub use frame_resource::{FrameBindings, FrameResource, FrameResourceCounts, FrameResourceRing};
pub use pass::MainPassProvider;
pub use propagate::{DirtyConstants, propagate, update_material_constants, update_object_constants};
pub use registry::{MaterialId, MeshId, RenderItem, RenderItemId, RenderItemRegistry, RenderLayer};
pub use renderer::Renderer;
pub use scene::{RenderItemDesc, Scene, SceneBuilder};
pub use scheduler::{FrameScheduler, FrameStage, FrameStats};
pub use upload_buffer::{CONSTANT_RECORD_ALIGNMENT, UploadBuffer};
