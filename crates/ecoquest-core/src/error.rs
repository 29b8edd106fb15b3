//! Core error types for ecoquest-core.
//!
//! Every operation reports failures through [`CoreError`]. Callers that only
//! care about the broad category (to pick an HTTP status, say) can use
//! [`CoreError::kind`].

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for ecoquest-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed or out-of-range input
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("User not found: {user_id}")]
    UserNotFound { user_id: String },

    #[error("Challenge not found: {challenge_id}")]
    ChallengeNotFound { challenge_id: String },

    /// A participation already exists for this (challenge, user) pair
    #[error("User {user_id} already joined challenge {challenge_id}")]
    AlreadyJoined {
        challenge_id: String,
        user_id: String,
    },

    #[error("Email already registered: {email}")]
    DuplicateEmail { email: String },

    /// The operation needs a participation that does not exist
    #[error("User {user_id} is not participating in challenge {challenge_id}")]
    NotParticipant {
        challenge_id: String,
        user_id: String,
    },

    /// Storage-layer failures
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Broad error category, stable across variant additions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    NotParticipant,
    Storage,
    Config,
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::UserNotFound { .. } | CoreError::ChallengeNotFound { .. } => {
                ErrorKind::NotFound
            }
            CoreError::AlreadyJoined { .. } | CoreError::DuplicateEmail { .. } => {
                ErrorKind::Conflict
            }
            CoreError::NotParticipant { .. } => ErrorKind::NotParticipant,
            CoreError::Database(_) | CoreError::Io(_) | CoreError::Json(_) => ErrorKind::Storage,
            CoreError::Config(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn user_not_found(user_id: &str) -> Self {
        CoreError::UserNotFound {
            user_id: user_id.to_string(),
        }
    }

    pub(crate) fn challenge_not_found(challenge_id: &str) -> Self {
        CoreError::ChallengeNotFound {
            challenge_id: challenge_id.to_string(),
        }
    }
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// Connection mutex was poisoned by a panicking writer
    #[error("Database connection poisoned")]
    Poisoned,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    #[error("Failed to determine data directory: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Invalid time range
    #[error("Invalid time range: end ({end}) must be greater than start ({start})")]
    InvalidTimeRange {
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    },

    #[error("Value {value} for '{field}' is outside [{min}, {max}]")]
    OutOfRange {
        field: String,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("Unknown habit category: '{0}'")]
    UnknownCategory(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl ValidationError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        ValidationError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg)
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy =>
            {
                DatabaseError::Locked
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// True when `err` is a UNIQUE/PRIMARY KEY constraint violation.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
    )
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
