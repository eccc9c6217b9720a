//! Error handling for the RPC indexer
//!
//! Shared error types used across the indexer crates:
//! - `IndexerError` marker trait for consistent error handling
//! - Domain error enums for configuration, persistence and network boundaries
//!
//! Library code returns these `thiserror` types; the binary and CLI handlers
//! wrap them in `anyhow` with context.

use thiserror::Error;

/// Base trait for all indexer-specific errors
///
/// Every implementor is `Send + Sync + 'static` so it can cross task
/// boundaries and be boxed into `anyhow::Error`.
pub trait IndexerError: std::error::Error + Send + Sync + 'static {}

/// Network-related errors
///
/// Raised by HTTP metadata fetches and JSON-RPC calls when the failure is not
/// recovered locally.
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Connection failed to establish
    #[error("Failed to connect to {endpoint}: {source}")]
    ConnectionFailed {
        endpoint: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Request timed out
    #[error("Request to {endpoint} timed out after {timeout_ms} ms")]
    Timeout { endpoint: String, timeout_ms: u64 },

    /// HTTP specific error
    #[error("HTTP error {status_code}: {message}")]
    HttpError { status_code: u16, message: String },

    /// Invalid response format
    #[error("Invalid response format: {details}")]
    InvalidResponse { details: String },
}

impl IndexerError for NetworkError {}

/// Configuration-related errors
///
/// These errors occur during configuration loading, parsing, or validation.
/// All of them are fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    /// Configuration parsing failed
    #[error("Failed to parse configuration: {details}")]
    ParseError { details: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for {key}: {value} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// Missing required configuration
    #[error("Missing required configuration: {key}")]
    MissingRequired { key: String },

    /// Environment variable error
    #[error("Environment variable error for {var}: {details}")]
    EnvironmentError { var: String, details: String },
}

impl IndexerError for ConfigurationError {}

/// Database and persistence-related errors
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Database connection failed
    #[error("Database connection failed: {source}")]
    ConnectionFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Database query failed
    #[error("Database query failed ({operation}): {source}")]
    QueryFailed {
        operation: String,
        #[source]
        source: sqlx::Error,
    },

    /// Schema bootstrap failed
    #[error("Database migration failed: {details}")]
    MigrationFailed { details: String },

    /// Stored value could not be decoded
    #[error("Deserialization failed: {details}")]
    DeserializationFailed { details: String },
}

impl IndexerError for PersistenceError {}

impl PersistenceError {
    /// Wrap a sqlx error with the name of the operation that produced it
    pub fn query(operation: impl Into<String>, source: sqlx::Error) -> Self {
        Self::QueryFailed {
            operation: operation.into(),
            source,
        }
    }
}

impl NetworkError {
    /// Create a connection failed error from any error type
    pub fn connection_failed(
        endpoint: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ConnectionFailed {
            endpoint: endpoint.into(),
            source: Box::new(source),
        }
    }
}

impl ConfigurationError {
    /// Create an invalid value error
    pub fn invalid_value(
        key: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            key: key.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_error_display() {
        let network_err = NetworkError::ConnectionFailed {
            endpoint: "localhost:8545".to_string(),
            source: Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "Connection refused",
            )),
        };

        let display = format!("{network_err}");
        assert!(display.contains("localhost:8545"));
        assert!(display.contains("Failed to connect"));
    }

    #[test]
    fn test_error_source_chain() {
        let err = PersistenceError::query("insert validators", sqlx::Error::RowNotFound);
        assert!(err.source().is_some());
        assert!(err.to_string().contains("insert validators"));
    }

    #[test]
    fn test_indexer_error_trait() {
        fn accepts(_: impl IndexerError) {}

        accepts(NetworkError::Timeout {
            endpoint: "http://node".to_string(),
            timeout_ms: 5000,
        });
        accepts(ConfigurationError::MissingRequired {
            key: "schedule.migration_block".to_string(),
        });
        accepts(PersistenceError::MigrationFailed {
            details: "schema".to_string(),
        });
    }

    #[test]
    fn test_invalid_value_helper() {
        match ConfigurationError::invalid_value("schedule.batch_size", 0, "must be positive") {
            ConfigurationError::InvalidValue { key, value, reason } => {
                assert_eq!(key, "schedule.batch_size");
                assert_eq!(value, "0");
                assert_eq!(reason, "must be positive");
            }
            _ => panic!("Expected InvalidValue variant"),
        }
    }
}
