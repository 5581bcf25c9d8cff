//! XML Signature (XML-DSig) support.
//!
//! Only enveloped signatures are accepted: a `ds:Signature` that is a direct
//! child of the element it signs and references that element by `ID`.
//!
//! - [`XmlSignature`] - the parsed `ds:Signature` element
//! - [`XmlSignatureValidator`] - digest and signature verification against a
//!   pinned key
//! - [`canonicalize_by_id`] / [`canonicalize_signed_info`] - the exact octets
//!   that are digested and signed

mod c14n;
mod validator;

pub use c14n::{canonicalize_by_id, canonicalize_signed_info};
pub use validator::XmlSignatureValidator;

use base64::Engine;
use da_crypto::{DigestAlgorithm, SignatureAlgorithm};
use roxmltree::Node;

use crate::error::{SamlError, SamlResult};
use crate::types::{transforms, XMLDSIG_NS};
use crate::xml::{child_element, child_elements, element_text};

/// XML canonicalization algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CanonicalizationAlgorithm {
    /// Canonical XML 1.0 (omits comments).
    Inclusive,
    /// Canonical XML 1.0 with comments.
    InclusiveWithComments,
    /// Exclusive XML Canonicalization 1.0 (omits comments).
    #[default]
    Exclusive,
    /// Exclusive XML Canonicalization 1.0 with comments.
    ExclusiveWithComments,
}

impl CanonicalizationAlgorithm {
    /// Returns the URI for this canonicalization algorithm.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::Inclusive => transforms::C14N,
            Self::InclusiveWithComments => transforms::C14N_WITH_COMMENTS,
            Self::Exclusive => transforms::EXC_C14N,
            Self::ExclusiveWithComments => transforms::EXC_C14N_WITH_COMMENTS,
        }
    }

    /// Parses a canonicalization algorithm from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            transforms::C14N => Some(Self::Inclusive),
            transforms::C14N_WITH_COMMENTS => Some(Self::InclusiveWithComments),
            transforms::EXC_C14N => Some(Self::Exclusive),
            transforms::EXC_C14N_WITH_COMMENTS => Some(Self::ExclusiveWithComments),
            _ => None,
        }
    }

    /// Whether comments are kept in the canonical form.
    #[must_use]
    pub const fn with_comments(&self) -> bool {
        matches!(self, Self::InclusiveWithComments | Self::ExclusiveWithComments)
    }

    /// Whether signatures using this algorithm can be verified.
    ///
    /// Only the exclusive variants are implemented.
    #[must_use]
    pub const fn is_supported(&self) -> bool {
        matches!(self, Self::Exclusive | Self::ExclusiveWithComments)
    }
}

/// A canonicalization method together with its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Canonicalization {
    /// The algorithm.
    pub algorithm: CanonicalizationAlgorithm,
    /// Prefixes from `ec:InclusiveNamespaces/@PrefixList`. These are
    /// rendered with the inclusive rules. `#default` is stored as `""`.
    pub inclusive_prefixes: Vec<String>,
}

impl Canonicalization {
    /// Creates a canonicalization without inclusive prefixes.
    #[must_use]
    pub const fn new(algorithm: CanonicalizationAlgorithm) -> Self {
        Self {
            algorithm,
            inclusive_prefixes: Vec::new(),
        }
    }

    /// Sets the inclusive namespace prefixes.
    #[must_use]
    pub fn with_inclusive_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inclusive_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// Reads the `Algorithm` and any `ec:InclusiveNamespaces` child of a
    /// `CanonicalizationMethod` or `Transform` element.
    fn from_method(method: Node<'_, '_>, algorithm: CanonicalizationAlgorithm) -> Self {
        let inclusive_prefixes = child_element(method, transforms::EXC_C14N, "InclusiveNamespaces")
            .and_then(|n| n.attribute("PrefixList"))
            .map(|list| {
                list.split_ascii_whitespace()
                    .map(|prefix| if prefix == "#default" { "" } else { prefix })
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Self {
            algorithm,
            inclusive_prefixes,
        }
    }
}

/// A transform listed in a `ds:Reference`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transform {
    /// Removes the signature element from the signed content.
    EnvelopedSignature,
    /// Canonicalizes the signed content.
    Canonicalize(Canonicalization),
}

impl Transform {
    /// Parses a `ds:Transform` element.
    fn from_node(transform: Node<'_, '_>) -> SamlResult<Self> {
        let uri = transform
            .attribute("Algorithm")
            .ok_or_else(|| invalid("Transform has no Algorithm"))?;
        if uri == transforms::ENVELOPED_SIGNATURE {
            return Ok(Self::EnvelopedSignature);
        }
        CanonicalizationAlgorithm::from_uri(uri)
            .map(|alg| Self::Canonicalize(Canonicalization::from_method(transform, alg)))
            .ok_or_else(|| invalid(format!("unsupported transform {uri}")))
    }
}

/// Parsed contents of a `ds:Signature` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlSignature {
    /// `SignedInfo/CanonicalizationMethod`.
    pub canonicalization: Canonicalization,
    /// `SignedInfo/SignatureMethod`.
    pub algorithm: SignatureAlgorithm,
    /// `Reference/@URI`, including the leading `#`.
    pub reference_uri: String,
    /// `Reference/Transforms`, in document order.
    pub transforms: Vec<Transform>,
    /// `Reference/DigestMethod`.
    pub digest_algorithm: DigestAlgorithm,
    /// Decoded `Reference/DigestValue`.
    pub digest_value: Vec<u8>,
    /// Decoded `SignatureValue`.
    pub signature_value: Vec<u8>,
}

impl XmlSignature {
    /// Parses a `ds:Signature` element.
    ///
    /// Any `KeyInfo` is ignored. Verification keys come from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::SignatureInvalid`] if the element is incomplete
    /// or names algorithms that are not recognised.
    pub fn from_node(signature: Node<'_, '_>) -> SamlResult<Self> {
        if !signature.has_tag_name((XMLDSIG_NS, "Signature")) {
            return Err(invalid("element is not ds:Signature"));
        }

        let signed_info = child_element(signature, XMLDSIG_NS, "SignedInfo")
            .ok_or_else(|| invalid("missing SignedInfo"))?;

        let c14n_method = child_element(signed_info, XMLDSIG_NS, "CanonicalizationMethod")
            .ok_or_else(|| invalid("missing CanonicalizationMethod"))?;
        let c14n_uri = c14n_method
            .attribute("Algorithm")
            .ok_or_else(|| invalid("missing CanonicalizationMethod"))?;
        let canonicalization = CanonicalizationAlgorithm::from_uri(c14n_uri)
            .map(|alg| Canonicalization::from_method(c14n_method, alg))
            .ok_or_else(|| invalid(format!("unknown canonicalization method {c14n_uri}")))?;

        let sig_uri = algorithm_attr(signed_info, "SignatureMethod")?;
        let algorithm = SignatureAlgorithm::from_xml_dsig_uri(sig_uri)
            .ok_or_else(|| invalid(format!("unsupported signature method {sig_uri}")))?;

        let mut references = child_elements(signed_info, XMLDSIG_NS, "Reference");
        let reference = references
            .next()
            .ok_or_else(|| invalid("missing Reference"))?;
        if references.next().is_some() {
            return Err(invalid("more than one Reference"));
        }

        let reference_uri = reference
            .attribute("URI")
            .ok_or_else(|| invalid("Reference has no URI"))?
            .to_string();

        let transforms = match child_element(reference, XMLDSIG_NS, "Transforms") {
            Some(list) => child_elements(list, XMLDSIG_NS, "Transform")
                .map(Transform::from_node)
                .collect::<SamlResult<Vec<_>>>()?,
            None => Vec::new(),
        };

        let digest_uri = algorithm_attr(reference, "DigestMethod")?;
        let digest_algorithm = DigestAlgorithm::from_uri(digest_uri)
            .ok_or_else(|| invalid(format!("unsupported digest method {digest_uri}")))?;

        let digest_value = child_element(reference, XMLDSIG_NS, "DigestValue")
            .ok_or_else(|| invalid("missing DigestValue"))
            .and_then(|n| decode_base64(&element_text(n), "DigestValue"))?;

        let signature_value = child_element(signature, XMLDSIG_NS, "SignatureValue")
            .ok_or_else(|| invalid("missing SignatureValue"))
            .and_then(|n| decode_base64(&element_text(n), "SignatureValue"))?;

        Ok(Self {
            canonicalization,
            algorithm,
            reference_uri,
            transforms,
            digest_algorithm,
            digest_value,
            signature_value,
        })
    }

    /// The canonicalization applied to the referenced element.
    ///
    /// Without an explicit canonicalization transform the exclusive form
    /// is used.
    #[must_use]
    pub fn reference_canonicalization(&self) -> Canonicalization {
        self.transforms
            .iter()
            .rev()
            .find_map(|t| match t {
                Transform::Canonicalize(c14n) => Some(c14n.clone()),
                Transform::EnvelopedSignature => None,
            })
            .unwrap_or_default()
    }
}

fn algorithm_attr<'a>(parent: Node<'a, '_>, element: &str) -> SamlResult<&'a str> {
    child_element(parent, XMLDSIG_NS, element)
        .and_then(|n| n.attribute("Algorithm"))
        .ok_or_else(|| invalid(format!("missing {element}")))
}

fn decode_base64(text: &str, what: &str) -> SamlResult<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err(invalid(format!("empty {what}")));
    }
    base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| invalid(format!("{what} is not base64: {e}")))
}

fn invalid(detail: impl Into<String>) -> SamlError {
    SamlError::SignatureInvalid(detail.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGNATURE: &str = r##"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#">
  <ds:SignedInfo>
    <ds:CanonicalizationMethod Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"/>
    <ds:SignatureMethod Algorithm="http://www.w3.org/2001/04/xmldsig-more#rsa-sha256"/>
    <ds:Reference URI="#_abc">
      <ds:Transforms>
        <ds:Transform Algorithm="http://www.w3.org/2000/09/xmldsig#enveloped-signature"/>
        <ds:Transform Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"/>
      </ds:Transforms>
      <ds:DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/>
      <ds:DigestValue>AAEC
        AwQ=</ds:DigestValue>
    </ds:Reference>
  </ds:SignedInfo>
  <ds:SignatureValue>BQYH</ds:SignatureValue>
  <ds:KeyInfo><ds:X509Data><ds:X509Certificate>ignored</ds:X509Certificate></ds:X509Data></ds:KeyInfo>
</ds:Signature>"##;

    #[test]
    fn parses_signature_element() {
        let doc = roxmltree::Document::parse(SIGNATURE).unwrap();
        let sig = XmlSignature::from_node(doc.root_element()).unwrap();

        assert_eq!(
            sig.canonicalization,
            Canonicalization::new(CanonicalizationAlgorithm::Exclusive)
        );
        assert_eq!(sig.algorithm, SignatureAlgorithm::RsaSha256);
        assert_eq!(sig.reference_uri, "#_abc");
        assert_eq!(
            sig.transforms,
            vec![
                Transform::EnvelopedSignature,
                Transform::Canonicalize(Canonicalization::new(
                    CanonicalizationAlgorithm::Exclusive
                ))
            ]
        );
        assert_eq!(sig.digest_algorithm, DigestAlgorithm::Sha256);
        assert_eq!(sig.digest_value, vec![0, 1, 2, 3, 4]);
        assert_eq!(sig.signature_value, vec![5, 6, 7]);
        assert!(sig.reference_canonicalization().inclusive_prefixes.is_empty());
    }

    #[test]
    fn reads_inclusive_namespace_prefixes() {
        let xml = SIGNATURE
            .replace(
                r#"<ds:CanonicalizationMethod Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"/>"#,
                r##"<ds:CanonicalizationMethod Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"><ec:InclusiveNamespaces xmlns:ec="http://www.w3.org/2001/10/xml-exc-c14n#" PrefixList="#default samlp"/></ds:CanonicalizationMethod>"##,
            )
            .replace(
                r#"<ds:Transform Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"/>"#,
                r#"<ds:Transform Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"><ec:InclusiveNamespaces xmlns:ec="http://www.w3.org/2001/10/xml-exc-c14n#" PrefixList=" xs  xsi "/></ds:Transform>"#,
            );
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let sig = XmlSignature::from_node(doc.root_element()).unwrap();

        assert_eq!(sig.canonicalization.inclusive_prefixes, vec!["", "samlp"]);
        assert_eq!(
            sig.reference_canonicalization(),
            Canonicalization::new(CanonicalizationAlgorithm::Exclusive)
                .with_inclusive_prefixes(["xs", "xsi"])
        );
    }

    #[test]
    fn rejects_unknown_signature_method() {
        let xml = SIGNATURE.replace("rsa-sha256", "hmac-sha256");
        let doc = roxmltree::Document::parse(&xml).unwrap();
        assert!(matches!(
            XmlSignature::from_node(doc.root_element()),
            Err(SamlError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn rejects_missing_signature_value() {
        let xml = SIGNATURE.replace("<ds:SignatureValue>BQYH</ds:SignatureValue>", "");
        let doc = roxmltree::Document::parse(&xml).unwrap();
        assert!(XmlSignature::from_node(doc.root_element()).is_err());
    }

    #[test]
    fn canonicalization_uris() {
        for alg in [
            CanonicalizationAlgorithm::Inclusive,
            CanonicalizationAlgorithm::InclusiveWithComments,
            CanonicalizationAlgorithm::Exclusive,
            CanonicalizationAlgorithm::ExclusiveWithComments,
        ] {
            assert_eq!(CanonicalizationAlgorithm::from_uri(alg.uri()), Some(alg));
        }
        assert!(!CanonicalizationAlgorithm::Inclusive.is_supported());
        assert!(CanonicalizationAlgorithm::ExclusiveWithComments.with_comments());
    }
}
