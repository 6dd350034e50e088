//! Tracing subscriber setup.
//!
//! Log output goes to stdout through a `tracing_subscriber` fmt layer, either human-readable or
//! one JSON object per line (`log_format: json`) for log shippers. The filter comes from
//! `RUST_LOG` when set, otherwise from the `log_level` config value.

use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{Config, LogFormat};

/// Initialize the global tracing subscriber.
pub fn init_telemetry(config: &Config) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_level))?;

    match config.log_format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
                .try_init()?;
        }
    }

    info!(format = ?config.log_format, "Telemetry initialized");
    Ok(())
}
