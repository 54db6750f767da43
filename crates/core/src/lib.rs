//! Core utilities for the frame-resource renderer.
//!
//! This crate provides foundational types and utilities used across the renderer:
//! - Error types and result aliases
//! - Logging initialization
//! - Frame timing
//! - Configuration management

mod config;
mod error;
mod logging;
mod timer;

pub use config::{BackendKind, MAX_FRAMES_IN_FLIGHT, MIN_FRAMES_IN_FLIGHT, RendererConfig};
pub use error::{Error, Result};
pub use logging::{DEFAULT_LOG_FILTER, init_logging};
pub use timer::{FrameTime, Timer};
