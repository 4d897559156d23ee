//! Error types for the achievement sync system
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the achievement sync system
#[derive(Error, Debug)]
pub enum Error {
    /// An installed mod is not on the allow-list (startup precondition)
    #[error("Mod not whitelisted: {mod_id}")]
    NotWhitelisted {
        /// Unique ID of the offending mod
        mod_id: String,
    },

    /// The remote service declined the credentials
    #[error("Login rejected: {0}")]
    AuthRejected(String),

    /// Network fault during login
    #[error("Login transport failure: {0}")]
    AuthTransportFailure(String),

    /// The remote service declined an award
    #[error("Award rejected: {0}")]
    AwardRejected(String),

    /// Network fault during an award
    #[error("Award transport failure: {0}")]
    AwardTransportFailure(String),

    /// Host collaborator errors
    #[error("Host error: {0}")]
    Host(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a whitelist error
    pub fn not_whitelisted(mod_id: impl Into<String>) -> Self {
        Self::NotWhitelisted {
            mod_id: mod_id.into(),
        }
    }

    /// Create a host error
    pub fn host(msg: impl Into<String>) -> Self {
        Self::Host(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an award rejection error
    pub fn award_rejected(msg: impl Into<String>) -> Self {
        Self::AwardRejected(msg.into())
    }

    /// Create an award transport error
    pub fn award_transport(msg: impl Into<String>) -> Self {
        Self::AwardTransportFailure(msg.into())
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

/// Failure of a login attempt
///
/// Cloneable so every caller awaiting a shared in-flight login
/// receives the same cause.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The remote service answered and declined the credentials
    #[error("login rejected: {0}")]
    Rejected(String),

    /// No interpretable response (connection fault, timeout, abandoned attempt)
    #[error("login transport failure: {0}")]
    Transport(String),
}

impl AuthError {
    /// The literal cause reported by the backend
    pub fn reason(&self) -> &str {
        match self {
            AuthError::Rejected(reason) | AuthError::Transport(reason) => reason,
        }
    }
}

impl From<AuthError> for Error {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Rejected(reason) => Error::AuthRejected(reason),
            AuthError::Transport(reason) => Error::AuthTransportFailure(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_error_converts_to_matching_variant() {
        let rejected: Error = AuthError::Rejected("bad password".to_string()).into();
        assert!(matches!(rejected, Error::AuthRejected(ref r) if r == "bad password"));

        let transport: Error = AuthError::Transport("timed out".to_string()).into();
        assert!(matches!(transport, Error::AuthTransportFailure(_)));
    }

    #[test]
    fn not_whitelisted_names_the_mod() {
        let err = Error::not_whitelisted("Some.Mod");
        assert_eq!(err.to_string(), "Mod not whitelisted: Some.Mod");
    }
}
