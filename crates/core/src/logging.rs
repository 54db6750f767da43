//! Logging initialization and configuration.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Filter used when neither `RUST_LOG` nor the configuration provide one.
pub const DEFAULT_LOG_FILTER: &str = "info,renderer=debug";

/// Initialize the logging system with tracing.
///
/// This sets up tracing-subscriber with:
/// - Environment-based filtering (`RUST_LOG` takes precedence over `default_filter`)
/// - Target and thread id annotations on every line
///
/// # Example
/// ```
/// renderer_core::init_logging(renderer_core::DEFAULT_LOG_FILTER);
/// tracing::info!("Renderer initialized");
/// ```
pub fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // A subscriber may already be installed (tests, embedding applications).
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .try_init();
}
