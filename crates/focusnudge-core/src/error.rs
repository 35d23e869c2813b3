//! Core error types for focusnudge-core.
//!
//! Session-state errors are returned synchronously to the caller.
//! Notification errors stay at the sink boundary: they are logged by the
//! dispatcher and never reach session operations.

use std::path::PathBuf;
use thiserror::Error;

use crate::timer::SessionType;

/// Core error type for focusnudge-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A session is already active, or a conditional write lost a race.
    #[error("Session conflict: {0}")]
    SessionConflict(String),

    /// The requested operation is not valid in the current session state.
    #[error("Invalid transition: cannot {action} while {state}")]
    InvalidTransition { action: &'static str, state: String },

    /// Storage collaborator errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    pub(crate) fn invalid(action: &'static str, state: impl Into<String>) -> Self {
        CoreError::InvalidTransition {
            action,
            state: state.into(),
        }
    }

    pub(crate) fn conflict_with(active: SessionType, session_id: &str) -> Self {
        CoreError::SessionConflict(format!(
            "a {active} session ({session_id}) is already active"
        ))
    }
}

/// Errors raised by the storage collaborators.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The referenced record does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// SQLite query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked by another writer
    #[error("Database is locked")]
    Locked,

    /// Failed to open the database file
    #[error("Failed to open database at {path}: {message}")]
    OpenFailed { path: PathBuf, message: String },

    /// A stored value could not be decoded
    #[error("Corrupt stored value for '{key}': {message}")]
    Corrupt { key: String, message: String },

    /// A lock guarding in-memory state was poisoned
    #[error("Store lock poisoned")]
    Poisoned,
}

impl StoreError {
    pub fn task_not_found(id: &str) -> Self {
        StoreError::NotFound {
            kind: "task",
            id: id.to_string(),
        }
    }

    pub fn project_not_found(id: &str) -> Self {
        StoreError::NotFound {
            kind: "project",
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg)
                if e.code == rusqlite::ErrorCode::DatabaseBusy
                    || e.code == rusqlite::ErrorCode::DatabaseLocked =>
            {
                StoreError::Locked
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        StoreError::Poisoned
    }
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

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// No usable data directory
    #[error("Cannot determine data directory: {0}")]
    DataDir(String),
}

/// Delivery failure for one notification sink.
#[derive(Error, Debug)]
pub enum NotificationError {
    /// The sink has no destination configured
    #[error("{sink}: not configured")]
    NotConfigured { sink: String },

    /// HTTP transport failed
    #[error("{sink}: request failed: {source}")]
    Http {
        sink: String,
        #[source]
        source: reqwest::Error,
    },

    /// Remote side answered with a non-success status
    #[error("{sink}: HTTP {status}: {body}")]
    Rejected {
        sink: String,
        status: u16,
        body: String,
    },

    /// Local helper program failed
    #[error("{sink}: command failed: {message}")]
    Command { sink: String, message: String },
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Priority outside 1..=10
    #[error("Priority {0} out of range (expected 1-10)")]
    PriorityOutOfRange(i64),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
