//! Top-level error type for agent operations
//!
//! Each concern carries its own error enum (`ConfigError`, `MessageError`,
//! `ConnectionError`, `PublishError`, `IdleError`); this umbrella exists for
//! callers that drive the whole agent and want a single fallible surface.

use thiserror::Error;

/// Errors surfaced by the agent's own operations.
#[derive(Debug, Error)]
pub enum AgentError {
    /// An operation that needs a configuration ran before one was attached.
    #[error("no configuration loaded")]
    NotConfigured,

    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("connection error: {0}")]
    Connection(#[from] crate::connection::ConnectionError),

    #[error("publish error: {0}")]
    Publish(#[from] crate::connection::PublishError),

    #[error("invalid message: {0}")]
    Message(#[from] crate::message::MessageError),
}

/// Result type for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageError;

    #[test]
    fn wrapped_errors_keep_their_detail() {
        let error: AgentError = MessageError::QosOutOfRange(9).into();
        assert!(error.to_string().contains('9'));

        let error: AgentError = crate::config::ConfigError::NoClientName.into();
        assert!(matches!(error, AgentError::Config(_)));
    }

    #[test]
    fn not_configured_has_a_clear_message() {
        assert_eq!(AgentError::NotConfigured.to_string(), "no configuration loaded");
    }
}
