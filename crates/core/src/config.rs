//! Renderer configuration.
//!
//! Configuration is layered: built-in defaults, then an optional JSON file,
//! then environment overrides. The result is validated once at startup.
//!
//! # Example
//!
//! ```
//! use renderer_core::{BackendKind, RendererConfig};
//!
//! let config: RendererConfig = serde_json::from_str(r#"{ "frames_in_flight": 2 }"#).unwrap();
//! assert_eq!(config.frames_in_flight, 2);
//! assert_eq!(config.backend, BackendKind::Headless);
//! config.validate().unwrap();
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::logging::DEFAULT_LOG_FILTER;

/// Smallest supported ring depth.
pub const MIN_FRAMES_IN_FLIGHT: usize = 2;

/// Largest supported ring depth.
pub const MAX_FRAMES_IN_FLIGHT: usize = 8;

/// Device backend selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Simulated GPU that completes submissions on a worker thread.
    #[default]
    Headless,
    /// Vulkan device without a presentation surface.
    Vulkan,
}

impl std::str::FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "headless" => Ok(Self::Headless),
            "vulkan" => Ok(Self::Vulkan),
            other => Err(Error::Config(format!("unknown backend '{other}'"))),
        }
    }
}

/// Startup configuration for the renderer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Number of frame resources in the ring.
    pub frames_in_flight: usize,
    /// Device backend.
    pub backend: BackendKind,
    /// Frames to render before exiting; `None` runs until interrupted.
    pub frame_limit: Option<u64>,
    /// Render target width in pixels.
    pub width: u32,
    /// Render target height in pixels.
    pub height: u32,
    /// Enable Vulkan validation layers.
    pub enable_validation: bool,
    /// Time the headless backend takes to complete one submission.
    pub simulated_gpu_latency_ms: u64,
    /// Default tracing filter.
    pub log_filter: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 3,
            backend: BackendKind::Headless,
            frame_limit: Some(240),
            width: 1280,
            height: 720,
            enable_validation: false,
            simulated_gpu_latency_ms: 4,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl RendererConfig {
    /// Reads a configuration file. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&text)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Applies `RENDERER_FRAMES_IN_FLIGHT`, `RENDERER_BACKEND` and
    /// `RENDERER_FRAME_LIMIT` from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable is set but cannot be parsed.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary key lookup.
    ///
    /// `RENDERER_FRAME_LIMIT=0` removes the limit.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(value) = lookup("RENDERER_FRAMES_IN_FLIGHT") {
            self.frames_in_flight = value.trim().parse().map_err(|_| {
                Error::Config(format!("RENDERER_FRAMES_IN_FLIGHT: invalid value '{value}'"))
            })?;
        }
        if let Some(value) = lookup("RENDERER_BACKEND") {
            self.backend = value.trim().parse()?;
        }
        if let Some(value) = lookup("RENDERER_FRAME_LIMIT") {
            let limit: u64 = value.trim().parse().map_err(|_| {
                Error::Config(format!("RENDERER_FRAME_LIMIT: invalid value '{value}'"))
            })?;
            self.frame_limit = (limit > 0).then_some(limit);
        }
        Ok(())
    }

    /// Checks that all values are in range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_FRAMES_IN_FLIGHT..=MAX_FRAMES_IN_FLIGHT).contains(&self.frames_in_flight) {
            return Err(Error::Config(format!(
                "frames_in_flight must be between {} and {}, got {}",
                MIN_FRAMES_IN_FLIGHT, MAX_FRAMES_IN_FLIGHT, self.frames_in_flight
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(Error::Config(format!(
                "render target size must be nonzero, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = RendererConfig::default();
        assert_eq!(config.frames_in_flight, 3);
        assert_eq!(config.backend, BackendKind::Headless);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_single_frame() {
        let config = RendererConfig {
            frames_in_flight: 1,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_deep_ring() {
        let config = RendererConfig {
            frames_in_flight: MAX_FRAMES_IN_FLIGHT + 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: RendererConfig =
            serde_json::from_str(r#"{ "backend": "vulkan", "frame_limit": null }"#).unwrap();
        assert_eq!(config.backend, BackendKind::Vulkan);
        assert_eq!(config.frame_limit, None);
        assert_eq!(config.frames_in_flight, 3);
        assert_eq!(config.width, 1280);
    }

    #[test]
    fn test_overrides_apply() {
        let vars: HashMap<&str, &str> = [
            ("RENDERER_FRAMES_IN_FLIGHT", "4"),
            ("RENDERER_BACKEND", "Vulkan"),
            ("RENDERER_FRAME_LIMIT", "0"),
        ]
        .into_iter()
        .collect();

        let mut config = RendererConfig::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.frames_in_flight, 4);
        assert_eq!(config.backend, BackendKind::Vulkan);
        assert_eq!(config.frame_limit, None);
    }

    #[test]
    fn test_bad_override_is_config_error() {
        let mut config = RendererConfig::default();
        let result = config.apply_overrides(|key| {
            (key == "RENDERER_FRAMES_IN_FLIGHT").then(|| "three".to_string())
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_unknown_backend() {
        assert!("metal".parse::<BackendKind>().is_err());
        assert_eq!("headless".parse::<BackendKind>().unwrap(), BackendKind::Headless);
    }
}
