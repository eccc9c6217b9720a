//! # Database Connection Utilities
//!
//! Pool establishment for sqlite. The pool is opened once at process start,
//! handed down explicitly, and closed at shutdown.

use std::path::Path;

use sqlx::sqlite::SqlitePoolOptions;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::PersistenceError;

/// Connection pool type alias for SQLite
pub type SqlitePool = sqlx::SqlitePool;

/// Establish a SQLite connection pool from configuration
pub async fn establish_sqlite_pool(
    config: &DatabaseConfig,
) -> Result<SqlitePool, PersistenceError> {
    ensure_database_directory(&config.url)?;

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connect_timeout())
        .idle_timeout(config.idle_timeout())
        .connect(&config.url)
        .await
        .map_err(|e| PersistenceError::ConnectionFailed {
            source: Box::new(e),
        })?;

    info!(
        "SQLite connection pool established with {} max connections",
        config.max_connections
    );

    Ok(pool)
}

/// Filesystem path of a file-backed sqlite URL, `None` for in-memory databases
pub fn sqlite_file_path(url: &str) -> Option<&Path> {
    let rest = url.strip_prefix("sqlite:")?;
    let rest = rest.strip_prefix("//").unwrap_or(rest);
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path == ":memory:" {
        return None;
    }
    Some(Path::new(path))
}

/// Create the parent directory of a file-backed database if it is missing
pub fn ensure_database_directory(url: &str) -> Result<(), PersistenceError> {
    let Some(parent) = sqlite_file_path(url).and_then(Path::parent) else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() || parent.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|e| PersistenceError::ConnectionFailed {
        source: Box::new(e),
    })?;
    info!("Created database directory {}", parent.display());
    Ok(())
}
