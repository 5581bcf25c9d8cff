//! Subject name identifiers.

use serde::{Deserialize, Serialize};

use super::NameIdFormat;

/// A `saml:NameID` value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameId {
    value: String,
    format: Option<String>,
}

impl NameId {
    /// Creates a name identifier.
    #[must_use]
    pub fn new(value: impl Into<String>, format: Option<String>) -> Self {
        Self {
            value: value.into(),
            format,
        }
    }

    /// The identifier text.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// The raw `Format` URI, if present.
    #[must_use]
    pub fn format_uri(&self) -> Option<&str> {
        self.format.as_deref()
    }

    /// The format, if it is one of the well-known values.
    #[must_use]
    pub fn format(&self) -> Option<NameIdFormat> {
        self.format.as_deref().and_then(NameIdFormat::from_uri)
    }
}

/// `samlp:NameIDPolicy` sent with a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameIdPolicy {
    /// Requested format.
    pub format: Option<NameIdFormat>,
    /// Whether the identity provider may create a new identifier.
    pub allow_create: bool,
}

impl Default for NameIdPolicy {
    fn default() -> Self {
        Self {
            format: None,
            allow_create: true,
        }
    }
}

impl NameIdPolicy {
    /// Creates a policy requesting `format`.
    #[must_use]
    pub const fn with_format(format: NameIdFormat) -> Self {
        Self {
            format: Some(format),
            allow_create: true,
        }
    }
}
