//! Enveloped signature verification.

use std::sync::Arc;

use da_crypto::{digest, SignatureVerifier};
use roxmltree::Node;

use super::c14n::canonicalize_element;
use super::{Transform, XmlSignature};
use crate::error::{SamlError, SamlResult};
use crate::types::{SignedElement, VerifiedSignature, XMLDSIG_NS};
use crate::xml::child_element;

/// Verifies enveloped XML signatures with a pinned key.
#[derive(Clone)]
pub struct XmlSignatureValidator {
    verifier: Arc<dyn SignatureVerifier>,
    allow_sha1: bool,
}

impl XmlSignatureValidator {
    /// Creates a validator that checks signatures with `verifier`.
    ///
    /// SHA-1 based signature and digest methods are rejected unless
    /// `allow_sha1` is set.
    #[must_use]
    pub fn new(verifier: Arc<dyn SignatureVerifier>, allow_sha1: bool) -> Self {
        Self {
            verifier,
            allow_sha1,
        }
    }

    /// Verifies the `ds:Signature` enveloped in `element`.
    ///
    /// Checks, in order, that the signature references `element` by its
    /// `ID`, that the reference digest matches the canonical form of
    /// `element` without the signature, and that `SignatureValue` verifies
    /// over the canonical `SignedInfo`.
    pub(crate) fn verify_enveloped(
        &self,
        element: Node<'_, '_>,
        signature_node: Node<'_, '_>,
        which: SignedElement,
    ) -> SamlResult<VerifiedSignature> {
        let signature = XmlSignature::from_node(signature_node)?;

        if !self.allow_sha1
            && (signature.algorithm.is_legacy() || signature.digest_algorithm.is_legacy())
        {
            return Err(invalid("SHA-1 is not accepted"));
        }
        if !signature.canonicalization.algorithm.is_supported() {
            return Err(invalid(format!(
                "unsupported canonicalization method {}",
                signature.canonicalization.algorithm.uri()
            )));
        }

        let id = element
            .attribute("ID")
            .ok_or_else(|| SamlError::MalformedResponse("signed element has no ID".to_string()))?;
        if signature.reference_uri.strip_prefix('#') != Some(id) {
            return Err(invalid(format!(
                "reference {} does not point at the enclosing element",
                signature.reference_uri
            )));
        }

        for transform in &signature.transforms {
            if let Transform::Canonicalize(c14n) = transform {
                if !c14n.algorithm.is_supported() {
                    return Err(invalid(format!(
                        "unsupported transform {}",
                        c14n.algorithm.uri()
                    )));
                }
            }
        }

        let canonical = canonicalize_element(
            element,
            Some(signature_node),
            &signature.reference_canonicalization(),
        )?;
        let computed = digest(signature.digest_algorithm, canonical.as_bytes());
        if computed != signature.digest_value {
            return Err(invalid("digest mismatch"));
        }

        let signed_info = child_element(signature_node, XMLDSIG_NS, "SignedInfo")
            .ok_or_else(|| invalid("missing SignedInfo"))?;
        let canonical_info = canonicalize_element(signed_info, None, &signature.canonicalization)?;
        self.verifier
            .verify(
                signature.algorithm,
                canonical_info.as_bytes(),
                &signature.signature_value,
            )
            .map_err(|e| invalid(e.to_string()))?;

        tracing::debug!(
            element = ?which,
            algorithm = %signature.algorithm,
            "signature verified"
        );

        Ok(VerifiedSignature {
            element: which,
            algorithm: signature.algorithm,
            digest: signature.digest_algorithm,
        })
    }
}

impl std::fmt::Debug for XmlSignatureValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XmlSignatureValidator")
            .field("allow_sha1", &self.allow_sha1)
            .finish_non_exhaustive()
    }
}

fn invalid(detail: impl Into<String>) -> SamlError {
    SamlError::SignatureInvalid(detail.into())
}
