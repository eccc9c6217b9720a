//! Logging initialization
//!
//! Installs the global `tracing` subscriber. `RUST_LOG` wins over the
//! configured level when it is set.

use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Build the env filter from `RUST_LOG` or the configured level and targets
pub fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut directives = config.level.clone();
        for (target, level) in &config.targets {
            directives.push_str(&format!(",{target}={level}"));
        }
        EnvFilter::new(directives)
    })
}

/// Initialize the global subscriber
pub fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = build_env_filter(config);
    let registry = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => registry.with(fmt::layer().json().with_target(true)).try_init()?,
        "compact" => registry
            .with(fmt::layer().compact().with_target(false))
            .try_init()?,
        _ => registry.with(fmt::layer().with_target(false)).try_init()?,
    }

    info!(format = %config.format, "Logging initialized");
    Ok(())
}
