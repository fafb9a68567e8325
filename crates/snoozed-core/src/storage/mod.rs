mod config;
pub mod database;

pub use config::{Config, NotificationsConfig, SnoozePolicy};
pub use database::{Database, DeferredJob, JobStatus, SnoozeRecord};

use std::path::PathBuf;

/// Returns `~/.config/snoozed[-dev]/` based on SNOOZED_ENV.
///
/// Set SNOOZED_ENV=dev to use a separate development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("SNOOZED_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("snoozed-dev")
    } else {
        base_dir.join("snoozed")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
