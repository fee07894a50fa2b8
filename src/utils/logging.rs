//! Structured logging setup.
//!
//! Installs a `tracing-subscriber` registry driven by [`LoggingConfig`]. `RUST_LOG`
//! overrides the configured level when present.

use crate::config::LoggingConfig;
use crate::error::Result;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing::{debug, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber. A second call leaves the first one in place.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str().to_lowercase()));

    let mut layers: Vec<BoxedLayer> = Vec::new();

    if config.log_to_console {
        let console = fmt::layer().with_target(true);
        if config.json_format {
            layers.push(console.json().boxed());
        } else {
            layers.push(console.boxed());
        }
    }

    if config.log_to_file {
        if let Some(path) = &config.log_file_path {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let to_file = fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(true);
            if config.json_format {
                layers.push(to_file.json().boxed());
            } else {
                layers.push(to_file.boxed());
            }
        }
    }

    match tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
    {
        Ok(()) => {
            info!(app = %config.app_name, level = %config.log_level, "Logging initialised");
        }
        Err(e) => {
            debug!(error = %e, "Global subscriber already installed");
        }
    }

    Ok(())
}
