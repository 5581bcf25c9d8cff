//! SAML error types.
//!
//! Every variant maps to a stable [`category`](SamlError::category) that is
//! safe to show to end users. The `Display` text carries operator detail and
//! belongs in logs only. No variant ever carries key or certificate material.

use thiserror::Error;

/// Result type for SAML operations.
pub type SamlResult<T> = Result<T, SamlError>;

/// SAML protocol errors.
#[derive(Debug, Error)]
pub enum SamlError {
    /// An outbound message could not be serialized or compressed.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// A binding payload could not be decoded (base64, DEFLATE, UTF-8).
    #[error("decoding error: {0}")]
    Decoding(String),

    /// The response is not well-formed or not a SAML `Response`.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// No enveloped signature covers the response or its assertion.
    #[error("response is not signed")]
    SignatureMissing,

    /// A signature is present but does not verify.
    #[error("signature validation failed: {0}")]
    SignatureInvalid(String),

    /// The assertion is no longer valid.
    #[error("response expired")]
    ResponseExpired,

    /// The assertion is not valid yet.
    #[error("response not yet valid")]
    ResponseNotYetValid,

    /// The assertion is restricted to other audiences.
    #[error("audience mismatch: expected {expected}, got {actual}")]
    AudienceMismatch {
        /// This service provider's entity id.
        expected: String,
        /// The audiences listed in the assertion.
        actual: String,
    },

    /// The identity provider reported a non-success status.
    #[error("unsuccessful status: {0}")]
    UnsuccessfulStatus(String),

    /// The assertion was issued by an unexpected party.
    #[error("issuer mismatch: expected {expected}, got {actual}")]
    IssuerMismatch {
        /// The configured identity provider entity id.
        expected: String,
        /// The issuer found in the assertion.
        actual: String,
    },
}

impl SamlError {
    /// Returns a short, user-safe label for the failure.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Encoding(_) => "encoding_error",
            Self::Decoding(_) | Self::MalformedResponse(_) => "malformed_response",
            Self::SignatureMissing => "signature_missing",
            Self::SignatureInvalid(_) => "signature_invalid",
            Self::ResponseExpired => "response_expired",
            Self::ResponseNotYetValid => "response_not_yet_valid",
            Self::AudienceMismatch { .. } => "audience_mismatch",
            Self::UnsuccessfulStatus(_) => "unsuccessful_status",
            Self::IssuerMismatch { .. } => "issuer_mismatch",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::Encoding(_) => 500,
            Self::Decoding(_) | Self::MalformedResponse(_) => 400,
            Self::SignatureMissing
            | Self::SignatureInvalid(_)
            | Self::ResponseExpired
            | Self::ResponseNotYetValid
            | Self::AudienceMismatch { .. }
            | Self::IssuerMismatch { .. } => 401,
            Self::UnsuccessfulStatus(_) => 403,
        }
    }
}

impl From<roxmltree::Error> for SamlError {
    fn from(err: roxmltree::Error) -> Self {
        Self::MalformedResponse(err.to_string())
    }
}

impl From<base64::DecodeError> for SamlError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Decoding(format!("base64: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_categories_and_status() {
        let err = SamlError::SignatureInvalid("digest mismatch".to_string());
        assert_eq!(err.category(), "signature_invalid");
        assert_eq!(err.http_status(), 401);

        let err = SamlError::MalformedResponse("not xml".to_string());
        assert_eq!(err.category(), "malformed_response");
        assert_eq!(err.http_status(), 400);

        let err = SamlError::Encoding("deflate".to_string());
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn category_hides_detail() {
        let err = SamlError::AudienceMismatch {
            expected: "urn:sp".to_string(),
            actual: "urn:other".to_string(),
        };
        assert!(err.to_string().contains("urn:other"));
        assert!(!err.category().contains("urn:other"));
    }
}
