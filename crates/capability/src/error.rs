//! Capability invocation error types.

use thiserror::Error;

/// Errors that can occur when invoking a capability.
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// No capability registered under this name.
    #[error("Unknown capability: {0}")]
    Unknown(String),

    /// The capability ran and reported a failure.
    #[error("Capability '{capability}' failed: {message}")]
    Invocation { capability: String, message: String },

    /// The invocation exceeded its time bound.
    #[error("Capability '{capability}' timed out after {seconds} seconds")]
    Timeout { capability: String, seconds: u64 },

    /// The resolved input could not be consumed by the capability.
    #[error("Capability '{capability}' rejected input: {message}")]
    InvalidInput { capability: String, message: String },
}

impl CapabilityError {
    /// The name of the capability the error is attached to.
    pub fn capability(&self) -> &str {
        match self {
            Self::Unknown(name) => name,
            Self::Invocation { capability, .. }
            | Self::Timeout { capability, .. }
            | Self::InvalidInput { capability, .. } => capability,
        }
    }

    /// Whether retrying the same invocation can possibly succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CapabilityError::Unknown("scrape".to_string());
        assert_eq!(err.to_string(), "Unknown capability: scrape");

        let err = CapabilityError::Timeout {
            capability: "generate_content".to_string(),
            seconds: 30,
        };
        assert_eq!(
            err.to_string(),
            "Capability 'generate_content' timed out after 30 seconds"
        );
    }

    #[test]
    fn test_capability_name_attached() {
        let err = CapabilityError::Invocation {
            capability: "crm_sync".to_string(),
            message: "connection reset".to_string(),
        };
        assert_eq!(err.capability(), "crm_sync");
    }

    #[test]
    fn test_unknown_is_not_retryable() {
        assert!(!CapabilityError::Unknown("x".to_string()).is_retryable());
        assert!(CapabilityError::Timeout {
            capability: "x".to_string(),
            seconds: 1
        }
        .is_retryable());
    }
}
