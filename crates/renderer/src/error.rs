//! Renderer errors.

use renderer_rhi::RhiError;
use thiserror::Error;

/// Scene construction failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SceneError {
    #[error("Unknown mesh handle {0}")]
    UnknownMesh(usize),

    #[error("Mesh '{mesh}' has no submesh '{submesh}'")]
    UnknownSubmesh { mesh: String, submesh: String },

    #[error("Unknown material handle {0}")]
    UnknownMaterial(usize),

    #[error("Duplicate {kind} name '{name}'")]
    DuplicateName { kind: &'static str, name: String },

    #[error("Scene has no render items")]
    Empty,

    #[error("Mesh '{0}' draws from frame vertices but no dynamic geometry was given")]
    MissingFrameVertices(String),
}

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Device error: {0}")]
    Rhi(#[from] RhiError),

    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),

    #[error("Frames in flight must be in {min}..={max}, got {requested}")]
    FramesInFlight {
        requested: usize,
        min: usize,
        max: usize,
    },

    #[error("Scene was built for {scene} frames in flight but the ring holds {ring}")]
    FrameCountMismatch { scene: usize, ring: usize },
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RenderError>;
