//! Pinned identity provider certificate.

use aws_lc_rs::signature::{self as sig, UnparsedPublicKey, VerificationAlgorithm};
use base64::Engine;
use chrono::{DateTime, Utc};
use x509_parser::pem::parse_x509_pem;
use x509_parser::public_key::PublicKey;

use crate::algorithm::SignatureAlgorithm;
use crate::signature::{SignatureError, SignatureVerifier};

/// Public key type held by a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// RSA key.
    Rsa,
    /// EC key on NIST P-256.
    EcP256,
    /// EC key on NIST P-384.
    EcP384,
    /// EC key on NIST P-521.
    EcP521,
}

/// The certificate response signatures are verified against.
///
/// Loaded once at startup and shared read-only. Only the public key and a
/// few descriptive fields are kept.
#[derive(Clone)]
pub struct TrustCertificate {
    public_key: Vec<u8>,
    kind: KeyKind,
    subject: String,
    not_after: Option<DateTime<Utc>>,
}

impl TrustCertificate {
    /// Parses a certificate.
    ///
    /// Accepts a full PEM document or the bare base64 body, which is how
    /// identity providers usually hand out signing certificates.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::InvalidKey`] if the input is not an X.509
    /// certificate with an RSA or NIST EC public key.
    pub fn from_pem(pem: &str) -> Result<Self, SignatureError> {
        let der = pem_to_der(pem)?;
        Self::from_der(&der)
    }

    /// Parses a DER encoded certificate.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::InvalidKey`] if the certificate cannot be used.
    pub fn from_der(der: &[u8]) -> Result<Self, SignatureError> {
        let (_, cert) = x509_parser::parse_x509_certificate(der)
            .map_err(|e| SignatureError::InvalidKey(format!("invalid certificate: {e}")))?;

        let spki = cert.public_key();
        let public_key = spki.subject_public_key.data.to_vec();
        let kind = match spki.parsed() {
            Ok(PublicKey::RSA(_)) => KeyKind::Rsa,
            Ok(PublicKey::EC(_)) => match public_key.len() {
                65 => KeyKind::EcP256,
                97 => KeyKind::EcP384,
                133 => KeyKind::EcP521,
                other => {
                    return Err(SignatureError::InvalidKey(format!(
                        "unsupported EC point length {other}"
                    )))
                }
            },
            Ok(_) => {
                return Err(SignatureError::InvalidKey(
                    "unsupported public key type".to_string(),
                ))
            }
            Err(e) => return Err(SignatureError::InvalidKey(format!("invalid public key: {e}"))),
        };

        Ok(Self {
            public_key,
            kind,
            subject: cert.subject().to_string(),
            not_after: DateTime::from_timestamp(cert.validity().not_after.timestamp(), 0),
        })
    }

    /// Returns the key type.
    #[must_use]
    pub const fn kind(&self) -> KeyKind {
        self.kind
    }

    /// Returns the subject distinguished name.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Returns the end of the validity period.
    #[must_use]
    pub const fn not_after(&self) -> Option<DateTime<Utc>> {
        self.not_after
    }

    /// Returns true if the certificate has expired at `now`.
    ///
    /// Expiry is informational. A pinned certificate stays trusted until the
    /// configuration changes.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.not_after.is_some_and(|not_after| now > not_after)
    }

    fn verification_algorithm(
        &self,
        algorithm: SignatureAlgorithm,
    ) -> Result<&'static dyn VerificationAlgorithm, SignatureError> {
        let alg: &'static dyn VerificationAlgorithm = match (self.kind, algorithm) {
            (KeyKind::Rsa, SignatureAlgorithm::RsaSha1) => {
                &sig::RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY
            }
            (KeyKind::Rsa, SignatureAlgorithm::RsaSha256) => &sig::RSA_PKCS1_2048_8192_SHA256,
            (KeyKind::Rsa, SignatureAlgorithm::RsaSha384) => &sig::RSA_PKCS1_2048_8192_SHA384,
            (KeyKind::Rsa, SignatureAlgorithm::RsaSha512) => &sig::RSA_PKCS1_2048_8192_SHA512,
            // XML-DSig carries ECDSA signatures as raw r || s.
            (KeyKind::EcP256, SignatureAlgorithm::EcdsaSha256) => &sig::ECDSA_P256_SHA256_FIXED,
            (KeyKind::EcP384, SignatureAlgorithm::EcdsaSha384) => &sig::ECDSA_P384_SHA384_FIXED,
            (KeyKind::EcP521, SignatureAlgorithm::EcdsaSha512) => &sig::ECDSA_P521_SHA512_FIXED,
            (kind, alg) => {
                return Err(SignatureError::UnsupportedAlgorithm(format!(
                    "{alg} cannot be used with a {kind:?} key"
                )))
            }
        };
        Ok(alg)
    }
}

impl SignatureVerifier for TrustCertificate {
    fn verify(
        &self,
        algorithm: SignatureAlgorithm,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), SignatureError> {
        let alg = self.verification_algorithm(algorithm)?;
        UnparsedPublicKey::new(alg, &self.public_key)
            .verify(message, signature)
            .map_err(|_| SignatureError::Verification)
    }
}

impl std::fmt::Debug for TrustCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustCertificate")
            .field("kind", &self.kind)
            .field("subject", &self.subject)
            .field("not_after", &self.not_after)
            .finish_non_exhaustive()
    }
}

fn pem_to_der(pem: &str) -> Result<Vec<u8>, SignatureError> {
    let pem = pem.trim();
    if pem.contains("-----BEGIN") {
        let (_, parsed) = parse_x509_pem(pem.as_bytes())
            .map_err(|e| SignatureError::InvalidKey(format!("invalid PEM: {e}")))?;
        if parsed.label != "CERTIFICATE" {
            return Err(SignatureError::InvalidKey(format!(
                "expected CERTIFICATE, found {}",
                parsed.label
            )));
        }
        return Ok(parsed.contents);
    }

    let body: String = pem.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(body)
        .map_err(|e| SignatureError::InvalidKey(format!("invalid base64: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_lc_rs::rand::SystemRandom;
    use aws_lc_rs::signature::{EcdsaKeyPair, ECDSA_P256_SHA256_FIXED_SIGNING};

    fn self_signed() -> (String, rcgen::KeyPair) {
        let key_pair = rcgen::KeyPair::generate().unwrap();
        let mut params = rcgen::CertificateParams::default();
        params
            .distinguished_name
            .push(rcgen::DnType::CommonName, "Test IdP");
        let cert = params.self_signed(&key_pair).unwrap();
        (cert.pem(), key_pair)
    }

    fn sign(key_pair: &rcgen::KeyPair, message: &[u8]) -> Vec<u8> {
        let signer = EcdsaKeyPair::from_pkcs8(
            &ECDSA_P256_SHA256_FIXED_SIGNING,
            &key_pair.serialize_der(),
        )
        .unwrap();
        signer
            .sign(&SystemRandom::new(), message)
            .unwrap()
            .as_ref()
            .to_vec()
    }

    #[test]
    fn parses_pem_and_bare_base64() {
        let (pem, _) = self_signed();
        let cert = TrustCertificate::from_pem(&pem).unwrap();
        assert_eq!(cert.kind(), KeyKind::EcP256);
        assert!(cert.subject().contains("Test IdP"));
        assert!(cert.not_after().is_some());

        let bare: String = pem
            .lines()
            .filter(|line| !line.starts_with("-----"))
            .collect();
        let cert = TrustCertificate::from_pem(&bare).unwrap();
        assert_eq!(cert.kind(), KeyKind::EcP256);
    }

    #[test]
    fn rejects_garbage() {
        assert!(TrustCertificate::from_pem("not a certificate").is_err());
        assert!(TrustCertificate::from_pem(
            "-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----"
        )
        .is_err());
    }

    #[test]
    fn verifies_signature_from_matching_key() {
        let (pem, key_pair) = self_signed();
        let cert = TrustCertificate::from_pem(&pem).unwrap();
        let signature = sign(&key_pair, b"signed info");

        cert.verify(SignatureAlgorithm::EcdsaSha256, b"signed info", &signature)
            .unwrap();
        assert!(matches!(
            cert.verify(SignatureAlgorithm::EcdsaSha256, b"other info", &signature),
            Err(SignatureError::Verification)
        ));
    }

    #[test]
    fn rejects_signature_from_other_key() {
        let (pem, _) = self_signed();
        let (_, other_key) = self_signed();
        let cert = TrustCertificate::from_pem(&pem).unwrap();
        let signature = sign(&other_key, b"signed info");

        assert!(matches!(
            cert.verify(SignatureAlgorithm::EcdsaSha256, b"signed info", &signature),
            Err(SignatureError::Verification)
        ));
    }

    #[test]
    fn rejects_algorithm_that_does_not_fit_key() {
        let (pem, key_pair) = self_signed();
        let cert = TrustCertificate::from_pem(&pem).unwrap();
        let signature = sign(&key_pair, b"data");

        assert!(matches!(
            cert.verify(SignatureAlgorithm::RsaSha256, b"data", &signature),
            Err(SignatureError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn debug_output_omits_key_bytes() {
        let (pem, _) = self_signed();
        let cert = TrustCertificate::from_pem(&pem).unwrap();
        let debug = format!("{cert:?}");
        assert!(debug.contains("EcP256"));
        assert!(!debug.contains("public_key"));
    }
}
