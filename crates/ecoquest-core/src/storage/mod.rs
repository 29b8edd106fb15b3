mod config;
pub mod database;
pub mod migrations;

pub use config::{Config, HabitsConfig, LeaderboardConfig, LoggingConfig, StorageConfig};
pub use database::Database;

use std::path::PathBuf;

use chrono::{DateTime, Datelike, SecondsFormat, Utc};

use crate::error::{ConfigError, ValidationError};

/// Returns the EcoQuest data directory, creating it if needed.
///
/// `ECOQUEST_DATA_DIR` wins when set. Otherwise `~/.config/ecoquest[-dev]/`,
/// with the `-dev` suffix when `ECOQUEST_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("ECOQUEST_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("ECOQUEST_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("ecoquest-dev")
            } else {
                base_dir.join("ecoquest")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(e.to_string()))?;
    Ok(dir)
}

/// Encode a timestamp for storage.
///
/// Always UTC, microsecond precision and a `Z` suffix, so string order in
/// SQLite matches chronological order.
pub(crate) fn format_ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Reject timestamps the storage encoding cannot read back.
///
/// `format_ts` only round-trips four-digit years; anything outside
/// `0000..=9999` would be written fine and then fail every later read.
pub(crate) fn check_storable(field: &str, dt: DateTime<Utc>) -> Result<(), ValidationError> {
    if (0..=9999).contains(&dt.year()) {
        Ok(())
    } else {
        Err(ValidationError::invalid(
            field,
            format!("{dt} is outside the supported years 0000-9999"),
        ))
    }
}

/// Decode the stored timestamp in column `index` as part of row mapping.
pub(crate) fn parse_ts(index: usize, raw: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
        })
}
