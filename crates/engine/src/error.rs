//! Error types for the blueprint execution engine.
//!
//! Step-level capability failures are data, recorded in step outcomes and
//! execution summaries; the variants here cover definition problems,
//! missing resources, and faults that escape orchestration.

use blueprint_capability::CapabilityError;
use thiserror::Error;

/// Engine-level errors.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Definition source could not be parsed (YAML, structure).
    #[error("Parse error: {0}")]
    Parse(String),

    /// Definition parsed but violates a structural rule.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A referenced resource does not exist.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A capability invocation failed at the seam.
    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error while loading definitions.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected error during orchestration, not attributable to one step.
    #[error("Run fault: {0}")]
    RunFault(String),
}

/// Result type alias using EngineError.
pub type EngineResult<T> = Result<T, EngineError>;

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        EngineError::RunFault(err.to_string())
    }
}
