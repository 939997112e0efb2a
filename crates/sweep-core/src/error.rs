//! Error types for the Sweep engine.
//!
//! Per-item execution failures are not errors: they are recorded as
//! [`FailureDetail`](crate::FailureDetail)s and surface in the summary.

use std::path::PathBuf;
use thiserror::Error;

use crate::form::FieldError;
use crate::job::JobId;

/// User input problems. Surfaced on the same page; the stored selection is
/// left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("No action selected")]
    NoActionSelected,

    #[error("Action '{0}' is not available for this list")]
    ActionNotApplicable(String),

    #[error("Invalid configuration ({} field errors)", .0.len())]
    Preconfiguration(Vec<FieldError>),

    #[error("No items selected")]
    EmptySelection,

    /// A batch job owns the selection; only clearing it is allowed.
    #[error("Selection is locked by a running batch")]
    SelectionLocked,
}

/// Failure to materialize a selection. Fatal to job creation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("Failed to count results: {0}")]
    Count(String),

    #[error("Failed to fetch results at offset {offset}: {message}")]
    Page { offset: usize, message: String },
}

/// Error reported by a result set provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Result set provider error: {0}")]
pub struct ProviderError(pub String);

/// Error reported by an action executor for a whole call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    #[error("Action '{0}' not found")]
    ActionNotFound(String),

    #[error("Action failed: {0}")]
    Failed(String),
}

/// Action registry errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Action '{0}' already registered")]
    AlreadyRegistered(String),

    #[error("Action '{0}' not found")]
    NotFound(String),
}

/// Selection store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error at {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No config directory found.
    #[error("Config directory not found")]
    NoConfigDir,

    /// IO error.
    #[error("IO error: {0}")]
    Io(String),

    /// Parse error.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Semantically invalid value.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Umbrella error of engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Batch job {0} not found")]
    JobNotFound(JobId),

    /// The selection is not in a state that allows the operation.
    #[error("Nothing to execute: selection is {0}")]
    NothingPending(String),
}

impl EngineError {
    /// Whether the error is user-facing validation feedback.
    pub fn is_validation(&self) -> bool {
        matches!(self, EngineError::Validation(_))
    }
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
