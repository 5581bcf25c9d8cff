//! Signature verification.

use thiserror::Error;

use crate::algorithm::SignatureAlgorithm;

/// Error type for signature operations.
///
/// Messages never include key material or signature bytes.
#[derive(Debug, Error)]
pub enum SignatureError {
    /// The certificate or key could not be parsed.
    #[error("invalid key format: {0}")]
    InvalidKey(String),

    /// The algorithm does not fit the key, or is not supported.
    #[error("algorithm not supported: {0}")]
    UnsupportedAlgorithm(String),

    /// The signature does not match the data.
    #[error("signature verification failed")]
    Verification,
}

/// Something that can check a signature over a message.
///
/// The SAML response validator receives one of these at construction, which
/// pins the identity provider's key independently of anything a response
/// carries.
pub trait SignatureVerifier: Send + Sync {
    /// Verifies `signature` over `message`.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::Verification`] if the signature does not
    /// match, or another variant if the algorithm cannot be used with this key.
    fn verify(
        &self,
        algorithm: SignatureAlgorithm,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), SignatureError>;
}
