//! Core error types for tempo-core.
//!
//! Structural and input-validation problems fail the whole call through
//! [`CoreError`]. Per-rule evaluation problems are returned as data through
//! [`RuleEvaluationError`] and never abort an evaluation pass.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for tempo-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The dependency relation among pending/scheduled tasks has a cycle.
    #[error("Dependency cycle detected among tasks: {}", .task_ids.join(", "))]
    CycleDetected { task_ids: Vec<String> },

    /// Custom energy curve rejected
    #[error("Invalid energy curve: {reason}")]
    InvalidEnergyCurve { reason: String },

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Task repository failures
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
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

    /// Failed to access data directory
    #[error("Failed to access data directory: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Invalid time range
    #[error("Invalid time range: end ({end}) must be greater than start ({start})")]
    InvalidTimeRange {
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    },

    /// Task with a non-positive duration
    #[error("Task '{task_id}' must have a positive estimated duration")]
    ZeroDuration { task_id: String },

    /// Same task identifier submitted twice
    #[error("Duplicate task identifier: {0}")]
    DuplicateTask(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Failures reported by a [`crate::ports::TaskRepository`].
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Workspace '{0}' not found")]
    WorkspaceNotFound(String),

    #[error("Failed to read snapshot: {0}")]
    Unavailable(String),
}

/// Failures reported by a [`crate::ports::NotificationSink`].
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Notification sink rejected batch: {0}")]
    Rejected(String),

    #[error("Notification sink unavailable: {0}")]
    Unavailable(String),
}

/// A single rule that could not be evaluated.
///
/// Collected next to successful results; the rest of the pass proceeds.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Rule '{rule_id}' failed: {kind}")]
pub struct RuleEvaluationError {
    pub rule_id: String,
    pub kind: RuleErrorKind,
}

/// Why a rule failed to evaluate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleErrorKind {
    /// The predicate references a field the subject kind does not have
    #[error("unknown field '{field}' for {subject} subjects")]
    UnknownField { field: String, subject: String },

    /// Literal cannot be compared with the field's value
    #[error("cannot apply '{operator}' to field '{field}': {message}")]
    TypeMismatch {
        field: String,
        operator: String,
        message: String,
    },

    /// Literal could not be interpreted (bad priority name, bad timestamp, ...)
    #[error("invalid literal for field '{field}': {message}")]
    InvalidLiteral { field: String, message: String },
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::InvalidValue {
            key: "<file>".to_string(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
