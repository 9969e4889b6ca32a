// SPDX-License-Identifier: MPL-2.0

//! Error types for the capture session core

use crate::constants::error_codes;
use thiserror::Error;

/// Result type alias using SessionError
pub type SessionResult<T> = Result<T, SessionError>;

/// Session and sketch errors
///
/// State-machine violations always surface synchronously with a stable code
/// (see [`SessionError::code`]). Getters never return these; they degrade to
/// defaults instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// A required parameter was missing, empty or zero-sized
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// The call is valid but not in the current state (wrong phase, duplicate
    /// commit, duplicate input, already released)
    #[error("Operation not allowed: {0}")]
    OperationNotAllowed(String),
    /// Acting on a session that is not configured or was torn down
    #[error("Session not configured: {0}")]
    NotConfigured(String),
    /// The underlying stream or service could not be reached
    #[error("Service fatal error: {0}")]
    ServiceFatal(String),
    /// A weakly-held collaborator (host stream, listener manager) is gone
    ///
    /// Reports the service fatal code: a vanished host stream means the
    /// service side went away. Match on the variant to tell the two apart.
    #[error("Not available: {0}")]
    NotAvailable(String),
}

impl SessionError {
    /// Stable numeric code for this error
    pub fn code(&self) -> i32 {
        match self {
            SessionError::InvalidArgument(_) => error_codes::INVALID_ARGUMENT,
            SessionError::OperationNotAllowed(_) => error_codes::OPERATION_NOT_ALLOWED,
            SessionError::NotConfigured(_) => error_codes::SESSION_NOT_CONFIG,
            SessionError::ServiceFatal(_) | SessionError::NotAvailable(_) => {
                error_codes::SERVICE_FATAL_ERROR
            }
        }
    }

    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        SessionError::InvalidArgument(msg.into())
    }

    pub(crate) fn not_allowed(msg: impl Into<String>) -> Self {
        SessionError::OperationNotAllowed(msg.into())
    }

    pub(crate) fn not_configured(msg: impl Into<String>) -> Self {
        SessionError::NotConfigured(msg.into())
    }

    pub(crate) fn not_available(msg: impl Into<String>) -> Self {
        SessionError::NotAvailable(msg.into())
    }
}

/// Errors raised while loading configuration or capability files
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(
            SessionError::invalid_argument("x").code(),
            error_codes::INVALID_ARGUMENT
        );
        assert_eq!(
            SessionError::not_allowed("x").code(),
            error_codes::OPERATION_NOT_ALLOWED
        );
        assert_eq!(
            SessionError::not_configured("x").code(),
            error_codes::SESSION_NOT_CONFIG
        );
        assert_eq!(
            SessionError::ServiceFatal("x".into()).code(),
            error_codes::SERVICE_FATAL_ERROR
        );
    }

    #[test]
    fn test_not_available_shares_fatal_code_but_not_variant() {
        let gone = SessionError::not_available("host stream is gone");
        let fatal = SessionError::ServiceFatal("host stream is gone".into());
        assert_eq!(gone.code(), fatal.code());
        assert_ne!(gone, fatal);
        assert_eq!(gone.to_string(), "Not available: host stream is gone");
    }

    #[test]
    fn test_error_display() {
        let err = SessionError::not_allowed("session already released");
        assert_eq!(
            err.to_string(),
            "Operation not allowed: session already released"
        );
    }
}
