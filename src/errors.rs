//! Error types for the jobpilot orchestration core.
//!
//! Bus-level failures (unknown agent, timeout, delivery) propagate to the
//! immediate caller of `send`; pipeline code catches them and degrades to a
//! partial user-facing response. Negative decision verdicts (rate limit,
//! low score) are first-class return values, never errors.

use thiserror::Error;

/// Main error type for the orchestration core
#[derive(Error, Debug)]
pub enum AgentError {
    /// Message sent to an agent name that was never registered
    #[error("Agent '{name}' not registered")]
    UnknownAgent { name: String },

    /// Response not received within the send deadline
    #[error("Timed out after {timeout_ms}ms waiting for response from '{agent}'")]
    Timeout { agent: String, timeout_ms: u64 },

    /// Handler raised while processing a required-response message
    #[error("Delivery to '{agent}' failed: {reason}")]
    Delivery { agent: String, reason: String },

    /// Job lookup into the persistence collaborator returned nothing
    #[error("Job not found: {job_id}")]
    JobNotFound { job_id: String },

    /// User profile lookup returned nothing
    #[error("Profile not found for user: {user_id}")]
    ProfileNotFound { user_id: String },

    /// Persistence collaborator failure
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("Agent error: {0}")]
    Generic(String),
}

/// Result type alias for orchestration operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Convert anyhow errors to AgentError
impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Generic(err.to_string())
    }
}
