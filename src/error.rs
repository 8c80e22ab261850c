//! Error Handling Infrastructure
//!
//! This module defines all error types used throughout Folio.
//! Every failure carries a stable error code so the console and the logs
//! can report it uniformly.
//!
//! # Error Categories
//! - `ConnectionFailed`: the session (or a provisioning sub-session) could not be opened
//! - `CommandFailed`: a stored routine call was rejected by the backend
//! - `BootstrapFailed`: stored routines could not be installed
//! - `Unauthorized`: the caller's role does not permit the action
//! - `SessionClosed`: the session was already released
//! - `InvalidInput`: malformed input from the console
//! - `ConfigError`: configuration file or environment errors
//!
//! # Recovery Policy
//! `CommandFailed`, `Unauthorized`, `InvalidInput` and provisioning
//! `ConnectionFailed` errors are recovered by the dispatcher. Everything
//! raised during bootstrap terminates the process.

use thiserror::Error;

/// Main error type for Folio operations
#[derive(Error, Debug)]
pub enum FolioError {
    /// Session could not be established
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Remote routine call failed (constraint violation, malformed identifier, permission denial)
    #[error("{context}: {detail}")]
    CommandFailed { context: String, detail: String },

    /// Stored routine installation failed
    #[error("Bootstrap failed: {0}")]
    BootstrapFailed(String),

    /// Role check failed. The message never names the reason.
    #[error("Operation not available for the current role")]
    Unauthorized,

    /// Operation attempted after the session was released
    #[error("Session is closed")]
    SessionClosed,

    /// Invalid input or missing required parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error (file not found, invalid JSON, missing env var)
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl FolioError {
    /// Convert error to a stable error code string
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::ConnectionFailed(_) => "CONNECTION_FAILED",
            Self::CommandFailed { .. } => "COMMAND_FAILED",
            Self::BootstrapFailed(_) => "BOOTSTRAP_FAILED",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::SessionClosed => "SESSION_CLOSED",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::ConfigError(_) => "CONFIG_ERROR",
        }
    }

    /// Get human-readable error message
    ///
    /// Never contains passwords: connection errors are built from driver
    /// messages, which do not echo credentials.
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Whether the interactive loop may continue after this error
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::BootstrapFailed(_) | Self::SessionClosed | Self::ConfigError(_))
    }

    /// Create a connection failed error
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed(message.into())
    }

    /// Create a command failed error with the operation it belongs to
    pub fn command_failed(context: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::CommandFailed { context: context.into(), detail: detail.into() }
    }

    /// Create a bootstrap error
    pub fn bootstrap_failed(message: impl Into<String>) -> Self {
        Self::BootstrapFailed(message.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }
}

/// Result type alias for Folio operations
pub type Result<T> = std::result::Result<T, FolioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(FolioError::connection_failed("test").error_code(), "CONNECTION_FAILED");
        assert_eq!(FolioError::command_failed("op", "test").error_code(), "COMMAND_FAILED");
        assert_eq!(FolioError::bootstrap_failed("test").error_code(), "BOOTSTRAP_FAILED");
        assert_eq!(FolioError::Unauthorized.error_code(), "UNAUTHORIZED");
        assert_eq!(FolioError::SessionClosed.error_code(), "SESSION_CLOSED");
        assert_eq!(FolioError::invalid_input("test").error_code(), "INVALID_INPUT");
        assert_eq!(FolioError::config_error("test").error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_command_failed_message_keeps_context() {
        let err = FolioError::command_failed("Error creating table", "syntax error at \"x\"");
        assert_eq!(err.message(), "Error creating table: syntax error at \"x\"");
    }

    #[test]
    fn test_unauthorized_message_is_generic() {
        let msg = FolioError::Unauthorized.message();
        assert!(msg.contains("not available"));
        assert!(!msg.to_lowercase().contains("admin"));
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(FolioError::command_failed("op", "x").is_recoverable());
        assert!(FolioError::connection_failed("x").is_recoverable());
        assert!(FolioError::Unauthorized.is_recoverable());
        assert!(FolioError::invalid_input("x").is_recoverable());
        assert!(!FolioError::bootstrap_failed("x").is_recoverable());
        assert!(!FolioError::SessionClosed.is_recoverable());
        assert!(!FolioError::config_error("x").is_recoverable());
    }
}
