//! Scene helpers.
//!
//! This crate provides the inputs of the per-frame pass constants:
//! - Orbit camera
//! - Lights and the light rig packed into the pass light array
//! - Position / rotation / scale transforms for render items

pub mod camera;
pub mod light;
pub mod transform;

pub use camera::{OrbitCamera, Perspective};
pub use light::{Light, LightRig};
pub use transform::Transform;
