//! Throwaway identity provider key material.

use std::sync::Arc;

use aws_lc_rs::rand::SystemRandom;
use aws_lc_rs::signature::{EcdsaKeyPair, ECDSA_P256_SHA256_FIXED_SIGNING};
use base64::Engine;
use da_crypto::{SignatureVerifier, TrustCertificate};
use da_protocol_saml::signature::{
    canonicalize_by_id, canonicalize_signed_info, Canonicalization, CanonicalizationAlgorithm,
};
use da_protocol_saml::types::{SAML_NS, XMLDSIG_NS};

use crate::response::ResponseBuilder;

/// Placeholder replaced once `SignedInfo` has been signed.
const EMPTY_SIGNATURE_VALUE: &str = "<ds:SignatureValue></ds:SignatureValue>";

/// An identity provider with a freshly generated ECDSA P-256 key.
pub struct TestIdp {
    entity_id: String,
    key_pair: EcdsaKeyPair,
    certificate_pem: String,
}

impl TestIdp {
    /// Creates an identity provider with the default entity id.
    #[must_use]
    pub fn new() -> Self {
        Self::with_entity_id("https://idp.example.test/")
    }

    /// Creates an identity provider with the given entity id.
    ///
    /// # Panics
    ///
    /// Panics if key generation fails.
    #[must_use]
    pub fn with_entity_id(entity_id: &str) -> Self {
        let key = rcgen::KeyPair::generate().expect("generate key pair");
        let mut params = rcgen::CertificateParams::default();
        params
            .distinguished_name
            .push(rcgen::DnType::CommonName, "Test IdP");
        let cert = params.self_signed(&key).expect("self-sign certificate");
        let key_pair =
            EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &key.serialize_der())
                .expect("load signing key");

        Self {
            entity_id: entity_id.to_string(),
            key_pair,
            certificate_pem: cert.pem(),
        }
    }

    /// The issuer written into responses.
    #[must_use]
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// The certificate as a PEM document.
    #[must_use]
    pub fn certificate_pem(&self) -> &str {
        &self.certificate_pem
    }

    /// The certificate as a bare base64 body, the way identity providers
    /// usually publish it.
    #[must_use]
    pub fn certificate_base64(&self) -> String {
        self.certificate_pem
            .lines()
            .filter(|line| !line.starts_with("-----"))
            .collect()
    }

    /// A verifier pinned to this identity provider's certificate.
    ///
    /// # Panics
    ///
    /// Panics if the generated certificate does not parse.
    #[must_use]
    pub fn verifier(&self) -> Arc<dyn SignatureVerifier> {
        Arc::new(TrustCertificate::from_pem(&self.certificate_pem).expect("parse certificate"))
    }

    /// Starts a response addressed to `audience`.
    #[must_use]
    pub fn response_for(&self, audience: &str) -> ResponseBuilder<'_> {
        ResponseBuilder::new(self, audience)
    }

    /// Adds an enveloped signature to the element whose `ID` is `id`.
    ///
    /// The signature is placed right after the element's `saml:Issuer`, or
    /// as its first child when it has none.
    ///
    /// # Panics
    ///
    /// Panics if the document does not contain an element with that `ID`.
    #[must_use]
    pub fn sign(&self, xml: &str, id: &str) -> String {
        let method = Canonicalization::new(CanonicalizationAlgorithm::Exclusive);
        let canonical = canonicalize_by_id(xml, id, &method).expect("canonicalize element");
        let digest = da_crypto::digest(da_crypto::DigestAlgorithm::Sha256, canonical.as_bytes());

        let signature = format!(
            concat!(
                r#"<ds:Signature xmlns:ds="{ns}"><ds:SignedInfo>"#,
                r#"<ds:CanonicalizationMethod Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"/>"#,
                r#"<ds:SignatureMethod Algorithm="http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256"/>"#,
                r##"<ds:Reference URI="#{id}"><ds:Transforms>"##,
                r#"<ds:Transform Algorithm="http://www.w3.org/2000/09/xmldsig#enveloped-signature"/>"#,
                r#"<ds:Transform Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"/>"#,
                r#"</ds:Transforms><ds:DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/>"#,
                r#"<ds:DigestValue>{digest}</ds:DigestValue></ds:Reference></ds:SignedInfo>"#,
                "{placeholder}</ds:Signature>"
            ),
            ns = XMLDSIG_NS,
            id = id,
            digest = base64::engine::general_purpose::STANDARD.encode(digest),
            placeholder = EMPTY_SIGNATURE_VALUE,
        );

        let at = insertion_point(xml, id);
        let mut signed = String::with_capacity(xml.len() + signature.len() + 128);
        signed.push_str(&xml[..at]);
        signed.push_str(&signature);
        signed.push_str(&xml[at..]);

        let signed_info =
            canonicalize_signed_info(&signed, id, &method).expect("canonicalize SignedInfo");
        let value = self
            .key_pair
            .sign(&SystemRandom::new(), signed_info.as_bytes())
            .expect("sign SignedInfo");
        let value = base64::engine::general_purpose::STANDARD.encode(value.as_ref());

        signed.replacen(
            EMPTY_SIGNATURE_VALUE,
            &format!("<ds:SignatureValue>{value}</ds:SignatureValue>"),
            1,
        )
    }
}

impl Default for TestIdp {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TestIdp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestIdp")
            .field("entity_id", &self.entity_id)
            .finish_non_exhaustive()
    }
}

/// Byte offset just after the `saml:Issuer` of the element with `id`.
fn insertion_point(xml: &str, id: &str) -> usize {
    let doc = roxmltree::Document::parse(xml).expect("parse document");
    let element = doc
        .descendants()
        .find(|n| n.is_element() && n.attribute("ID") == Some(id))
        .expect("element with ID");

    if let Some(issuer) = element
        .children()
        .find(|n| n.is_element() && n.has_tag_name((SAML_NS, "Issuer")))
    {
        return issuer.range().end;
    }

    // First child position: the end of the start tag.
    let start = element.range().start;
    start + xml[start..].find('>').expect("start tag end") + 1
}
