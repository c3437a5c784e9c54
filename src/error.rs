//! Error types for hive
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, unknown entity, blank text)
//! - 3: Blocked by policy (ownership, dependency rules)
//! - 4: Operation failed (persistence, locking, io)

use std::path::PathBuf;
use thiserror::Error;

use crate::repository::EntityKind;

/// Exit codes for the hive CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const POLICY_BLOCKED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for hive operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("content cannot be empty")]
    EmptyContent,

    #[error("description cannot be empty")]
    EmptyDescription,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Policy blocks (exit code 3)
    #[error("{kind} {id} belongs to another user")]
    Forbidden { kind: EntityKind, id: String },

    #[error("{task} already depends on {dependency}")]
    DuplicateDependency { task: String, dependency: String },

    #[error("adding {dependency} as a dependency of {task} would create a cycle")]
    CycleDetected { task: String, dependency: String },

    // Operation failures (exit code 4)
    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Error {
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn forbidden(kind: EntityKind, id: impl Into<String>) -> Self {
        Error::Forbidden {
            kind,
            id: id.into(),
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors
            Error::NotFound { .. }
            | Error::EmptyContent
            | Error::EmptyDescription
            | Error::InvalidArgument(_)
            | Error::InvalidConfig(_) => exit_codes::USER_ERROR,

            // Policy blocks
            Error::Forbidden { .. }
            | Error::DuplicateDependency { .. }
            | Error::CycleDetected { .. } => exit_codes::POLICY_BLOCKED,

            // Operation failures
            Error::Persistence(_)
            | Error::LockFailed(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Short machine-readable kind used in JSON error envelopes
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound { .. } => "not_found",
            Error::EmptyContent => "empty_content",
            Error::EmptyDescription => "empty_description",
            Error::InvalidArgument(_) => "invalid_argument",
            Error::InvalidConfig(_) => "invalid_config",
            Error::Forbidden { .. } => "forbidden",
            Error::DuplicateDependency { .. } => "duplicate_dependency",
            Error::CycleDetected { .. } => "cycle_detected",
            Error::Persistence(_)
            | Error::LockFailed(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_) => "persistence",
        }
    }

    /// Structured fields for the error, if it carries any
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::NotFound { kind, id } | Error::Forbidden { kind, id } => Some(
                serde_json::json!({ "entity_type": kind.as_str(), "id": id }),
            ),
            Error::DuplicateDependency { task, dependency }
            | Error::CycleDetected { task, dependency } => {
                Some(serde_json::json!({ "task": task, "dependency": dependency }))
            }
            Error::InvalidArgument(message) | Error::InvalidConfig(message) => {
                Some(serde_json::json!({ "message": message }))
            }
            _ => None,
        }
    }
}

/// Result type alias for hive operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            details: err.details(),
        }
    }
}
