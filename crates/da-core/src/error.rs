//! Error handling shared across the workspace.
//!
//! Messages are written for operators. Anything shown to an end user goes
//! through a generic rendering in the HTTP layer.

use thiserror::Error;

/// Result type alias using the core error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type.
#[derive(Debug, Error)]
pub enum Error {
    /// One or more required settings are missing or empty.
    #[error("missing one or more required environment variable(s): {}", .0.join(", "))]
    MissingConfig(Vec<String>),

    /// A setting is present but cannot be parsed.
    #[error("invalid value for {key}: {reason}")]
    InvalidConfig {
        /// The setting name.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },
}
