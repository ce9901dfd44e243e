//! Tracing subscriber setup

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use laneguard_core::{LaneguardError, LaneguardResult};

use crate::LogConfig;

/// Build the filter: `RUST_LOG` wins, otherwise the configured directives
pub fn log_filter(config: &LogConfig) -> LaneguardResult<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.filter).map_err(|e| {
        LaneguardError::Configuration(format!("log filter {:?}: {}", config.filter, e))
    })
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LogConfig) -> LaneguardResult<()> {
    let filter = log_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.json {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };
    result.map_err(|e| LaneguardError::Configuration(format!("logging already initialized: {}", e)))
}
