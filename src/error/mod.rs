//! Error types for orbital.

use thiserror::Error;

use crate::auth::{ApprovalError, AuthError, StorageError};

/// Broad error category, used by the CLI to pick wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Transport failure talking to the authorization server.
    Network,
    /// The server answered, but not with what the flow needed.
    Protocol,
    Storage,
    Session,
    Configuration,
    UserCancelled,
}

/// Primary error type for orbital operations.
#[derive(Error, Debug)]
pub enum OrbitalError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Token storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Access denied by user")]
    AccessDenied,

    #[error("Device code expired before it was approved")]
    DeviceCodeExpired,

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Login cancelled")]
    Cancelled,

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("Stored token has expired")]
    SessionExpired,

    #[error("Invalid or expired code")]
    InvalidOrExpiredCode,

    #[error("{0}")]
    MalformedUserCode(String),
}

impl From<ApprovalError> for OrbitalError {
    fn from(error: ApprovalError) -> Self {
        match error {
            ApprovalError::Malformed(_) => Self::MalformedUserCode(error.to_string()),
            ApprovalError::Auth(err) => Self::Auth(err),
        }
    }
}

impl OrbitalError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Auth(err) if err.is_transport() => ErrorCategory::Network,
            Self::Auth(AuthError::InvalidUrl(_)) => ErrorCategory::Configuration,
            Self::Auth(_)
            | Self::AccessDenied
            | Self::DeviceCodeExpired
            | Self::Authorization(_)
            | Self::InvalidOrExpiredCode
            | Self::MalformedUserCode(_) => ErrorCategory::Protocol,
            Self::Storage(_) => ErrorCategory::Storage,
            Self::NotLoggedIn | Self::SessionExpired => ErrorCategory::Session,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Cancelled => ErrorCategory::UserCancelled,
        }
    }

    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        1
    }

    /// Follow-up advice for the operator, if any.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::NotLoggedIn => Some("Run: orbital login"),
            Self::SessionExpired | Self::DeviceCodeExpired => Some("Run: orbital login again"),
            Self::Auth(AuthError::InvalidUrl(_)) => {
                Some("Pass --server-url or set ORBITAL_SERVER_URL to an http(s) URL")
            }
            Self::Configuration(_) => {
                Some("Check the flags, ORBITAL_* variables and ~/.orbital-cli/config.toml")
            }
            _ => match self.category() {
                ErrorCategory::Network => Some("Check that the authorization server is reachable"),
                _ => None,
            },
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, OrbitalError>;
