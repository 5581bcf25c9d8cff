//! Session error types.

use thiserror::Error;

/// Errors that can occur during session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session is anonymous.
    #[error("user not authenticated")]
    NotAuthenticated,

    /// The validated response does not yield a usable identity.
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    /// The session store failed.
    #[error("session storage error: {0}")]
    Storage(String),
}

impl SessionError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::NotAuthenticated => 401,
            Self::InvalidIdentity(_) => 403,
            Self::Storage(_) => 500,
        }
    }
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
