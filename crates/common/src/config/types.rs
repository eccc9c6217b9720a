//! # Configuration Types
//!
//! Configuration structures shared by every indexer component.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{ConfigurationError, IndexerError};

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    pub connect_timeout_secs: u64,

    /// Idle timeout for pooled connections in seconds
    pub idle_timeout_secs: Option<u64>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:./data/rpc-indexer.db?mode=rwc".to_string(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: Some(600),
        }
    }
}

impl DatabaseConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,

    /// Additional log targets and their levels
    #[serde(default)]
    pub targets: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            targets: HashMap::new(),
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether metrics collection is enabled
    pub enabled: bool,

    /// Prometheus exporter configuration
    pub prometheus: Option<PrometheusConfig>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            prometheus: Some(PrometheusConfig::default()),
        }
    }
}

/// Prometheus exporter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusConfig {
    /// Host to bind Prometheus exporter to
    pub host: String,

    /// Port for Prometheus exporter
    pub port: u16,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9091,
        }
    }
}

impl PrometheusConfig {
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Common configuration validation trait
pub trait ConfigValidation {
    type Error: IndexerError;

    /// Validate the configuration
    fn validate(&self) -> Result<(), Self::Error>;

    /// Get configuration warnings (non-fatal issues)
    fn warnings(&self) -> Vec<String> {
        Vec::new()
    }
}

impl ConfigValidation for DatabaseConfig {
    type Error = ConfigurationError;

    fn validate(&self) -> Result<(), Self::Error> {
        if self.url.is_empty() {
            return Err(ConfigurationError::invalid_value(
                "database.url",
                &self.url,
                "Database URL cannot be empty",
            ));
        }

        if self.max_connections == 0 {
            return Err(ConfigurationError::invalid_value(
                "database.max_connections",
                self.max_connections,
                "Max connections must be greater than 0",
            ));
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigurationError::invalid_value(
                "database.min_connections",
                self.min_connections,
                "Min connections cannot be greater than max connections",
            ));
        }

        Ok(())
    }
}

impl ConfigValidation for LoggingConfig {
    type Error = ConfigurationError;

    fn validate(&self) -> Result<(), Self::Error> {
        match self.format.as_str() {
            "json" | "pretty" | "compact" => Ok(()),
            other => Err(ConfigurationError::invalid_value(
                "logging.format",
                other,
                "Supported formats are json, pretty and compact",
            )),
        }
    }
}
