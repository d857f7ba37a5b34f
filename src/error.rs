//! Error types for the intake service.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Intake error: {0}")]
    Intake(#[from] IntakeError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to open store: {0}")]
    Open(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Language-model provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} is not configured")]
    NotConfigured { provider: String },

    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures surfaced by the conversation engine and its collaborators.
///
/// None of these are fatal. Each one maps to a locally visible message and
/// leaves the conversation state consistent.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("Input rejected as low-signal")]
    InputRejected,

    #[error("Next-question service unavailable: {reason}")]
    UpstreamUnavailable { reason: String },

    #[error("Missing required contact fields: {}", missing.join(", "))]
    ValidationFailed { missing: Vec<&'static str> },

    #[error("Lead delivery failed: {reason}")]
    DeliveryFailed { reason: String },

    #[error("Lead already submitted")]
    AlreadySubmitted,

    #[error("Interview still in progress")]
    NotCollectingContact,
}

impl IntakeError {
    /// Whether the user can fix this by trying again or editing input.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InputRejected
                | Self::UpstreamUnavailable { .. }
                | Self::ValidationFailed { .. }
                | Self::DeliveryFailed { .. }
        )
    }
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_lists_fields() {
        let err = IntakeError::ValidationFailed {
            missing: vec!["name", "consent"],
        };
        assert_eq!(
            err.to_string(),
            "Missing required contact fields: name, consent"
        );
    }

    #[test]
    fn retryable_classification() {
        assert!(IntakeError::InputRejected.is_retryable());
        assert!(
            IntakeError::DeliveryFailed {
                reason: "502".into()
            }
            .is_retryable()
        );
        assert!(!IntakeError::AlreadySubmitted.is_retryable());
        assert!(!IntakeError::NotCollectingContact.is_retryable());
    }

    #[test]
    fn intake_error_converts_into_top_level() {
        let err: Error = IntakeError::InputRejected.into();
        assert!(matches!(err, Error::Intake(IntakeError::InputRejected)));
    }
}
