//! Core error types for snoozed-core.
//!
//! One top-level [`CoreError`] with per-concern sub-enums, so callers can
//! match on the failure class without string inspection.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for snoozed-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Durable store errors
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Trigger installation errors
    #[error("trigger install error: {0}")]
    Install(#[from] InstallError),

    /// Notification gateway errors
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// An alarm name not present in the configuration
    #[error("unknown alarm '{0}'")]
    UnknownAlarm(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
///
/// An invalid configuration is never fatal at runtime: the daemon keeps the
/// last known good schedule installed and reports the failure.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key in a get/set operation
    #[error("unknown configuration key: {0}")]
    UnknownKey(String),
}

/// Durable store errors (snooze counters and the deferred job queue).
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open the database
    #[error("failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked by another writer
    #[error("database is locked")]
    Locked,

    /// IO errors while locating or creating the store
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg)
                if e.code == rusqlite::ErrorCode::DatabaseLocked =>
            {
                StoreError::Locked
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

/// Trigger installer errors.
///
/// Install failures leave the previously installed schedule in place; the
/// daemon retries on its next config-watch cycle.
#[derive(Error, Debug)]
pub enum InstallError {
    /// The scheduler program could not be spawned
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The scheduler program rejected the new table
    #[error("{program} exited with {status}: {stderr}")]
    Rejected {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Notification gateway errors.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// No presentation surface could be reached
    #[error("no notification surface available: {0}")]
    Unavailable(String),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
