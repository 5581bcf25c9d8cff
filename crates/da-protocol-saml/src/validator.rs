//! SAML response validation.
//!
//! [`ResponseValidator::validate`] runs the full pipeline over the decoded
//! XML of a `samlp:Response`. Each step short-circuits:
//!
//! 1. Parse and check the document shape. Exactly one plaintext assertion,
//!    no duplicate `ID` attributes.
//! 2. Verify every enveloped signature on the response and the assertion.
//!    At least one must be present.
//! 3. Require a success status.
//! 4. Check the validity windows, allowing for clock skew.
//! 5. Check the audience restrictions and the issuer.
//! 6. Extract the subject and attributes.
//!
//! Nothing inside the assertion is read before step 2 has succeeded.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use da_core::{AppConfig, Clock};
use da_crypto::SignatureVerifier;
use roxmltree::{Document, Node, ParsingOptions};

use crate::error::{SamlError, SamlResult};
use crate::signature::XmlSignatureValidator;
use crate::types::{
    status_codes, Attributes, Conditions, NameId, SamlResponse, SignedElement, SAMLP_NS, SAML_NS,
    XMLDSIG_NS,
};
use crate::xml::{child_element, child_elements, element_text};

/// Default tolerance for clock differences with the identity provider.
pub const DEFAULT_CLOCK_SKEW_SECS: i64 = 180;

const MAX_NODES: u32 = 10_000;

/// Settings for [`ResponseValidator`].
#[derive(Debug, Clone)]
pub struct ValidatorSettings {
    /// This service provider's entity id. Audience restrictions must name it.
    pub sp_entity_id: String,
    /// Expected assertion issuer. Any issuer is accepted when unset.
    pub idp_entity_id: Option<String>,
    /// Tolerance applied to every time comparison.
    pub clock_skew: Duration,
    /// Accept SHA-1 signature and digest methods.
    pub allow_sha1: bool,
}

impl ValidatorSettings {
    /// Creates settings for the given service provider with defaults.
    #[must_use]
    pub fn new(sp_entity_id: impl Into<String>) -> Self {
        Self {
            sp_entity_id: sp_entity_id.into(),
            idp_entity_id: None,
            clock_skew: Duration::seconds(DEFAULT_CLOCK_SKEW_SECS),
            allow_sha1: false,
        }
    }

    /// Builds settings from the application configuration.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            sp_entity_id: config.issuer_entity_id.clone(),
            idp_entity_id: config.idp_entity_id.clone(),
            clock_skew: config.clock_skew(),
            allow_sha1: config.allow_sha1,
        }
    }

    /// Sets the expected issuer.
    #[must_use]
    pub fn with_idp_entity_id(mut self, idp_entity_id: impl Into<String>) -> Self {
        self.idp_entity_id = Some(idp_entity_id.into());
        self
    }

    /// Sets the clock skew tolerance.
    #[must_use]
    pub const fn with_clock_skew(mut self, clock_skew: Duration) -> Self {
        self.clock_skew = clock_skew;
        self
    }

    /// Allows SHA-1 based signatures.
    #[must_use]
    pub const fn with_sha1_allowed(mut self) -> Self {
        self.allow_sha1 = true;
        self
    }
}

/// Validates SAML responses against a pinned verification key.
///
/// The validator is immutable and cheap to clone, so one instance is shared
/// by every request.
#[derive(Clone)]
pub struct ResponseValidator {
    signatures: XmlSignatureValidator,
    clock: Arc<dyn Clock>,
    settings: ValidatorSettings,
}

impl ResponseValidator {
    /// Creates a validator.
    ///
    /// `verifier` is the only source of trust. Certificates embedded in a
    /// response are never used.
    #[must_use]
    pub fn new(
        verifier: Arc<dyn SignatureVerifier>,
        clock: Arc<dyn Clock>,
        settings: ValidatorSettings,
    ) -> Self {
        Self {
            signatures: XmlSignatureValidator::new(verifier, settings.allow_sha1),
            clock,
            settings,
        }
    }

    /// Returns the settings in use.
    #[must_use]
    pub const fn settings(&self) -> &ValidatorSettings {
        &self.settings
    }

    /// Validates the decoded XML of a `samlp:Response`.
    ///
    /// # Errors
    ///
    /// Returns the first check that fails. See the [module docs](self) for
    /// the order.
    pub fn validate(&self, xml: &str) -> SamlResult<SamlResponse> {
        match self.run(xml) {
            Ok(response) => {
                tracing::info!(
                    issuer = %response.issuer,
                    name_id = %response.name_id.value(),
                    "SAML response accepted"
                );
                Ok(response)
            }
            Err(e) => {
                tracing::warn!(category = e.category(), error = %e, "SAML response rejected");
                Err(e)
            }
        }
    }

    fn run(&self, xml: &str) -> SamlResult<SamlResponse> {
        let mut options = ParsingOptions::default();
        options.allow_dtd = false;
        options.nodes_limit = MAX_NODES;
        let doc = Document::parse_with_options(xml, options)?;
        let root = doc.root_element();
        if !root.has_tag_name((SAMLP_NS, "Response")) {
            return Err(malformed("root element is not samlp:Response"));
        }

        check_unique_ids(&doc)?;
        let assertion = single_assertion(root)?;

        let response_signature = single_signature(root)?;
        let assertion_signature = single_signature(assertion)?;
        if response_signature.is_none() && assertion_signature.is_none() {
            return Err(SamlError::SignatureMissing);
        }

        let mut signatures = Vec::with_capacity(2);
        if let Some(sig) = response_signature {
            signatures.push(
                self.signatures
                    .verify_enveloped(root, sig, SignedElement::Response)?,
            );
        }
        if let Some(sig) = assertion_signature {
            signatures.push(
                self.signatures
                    .verify_enveloped(assertion, sig, SignedElement::Assertion)?,
            );
        }

        check_status(root)?;

        let now = self.clock.now();
        let conditions = self.check_conditions(assertion, now)?;

        let issuer = child_element(assertion, SAML_NS, "Issuer")
            .map(element_text)
            .filter(|issuer| !issuer.is_empty())
            .ok_or_else(|| malformed("assertion has no Issuer"))?;
        if let Some(expected) = &self.settings.idp_entity_id {
            if *expected != issuer {
                return Err(SamlError::IssuerMismatch {
                    expected: expected.clone(),
                    actual: issuer,
                });
            }
        }

        let subject = child_element(assertion, SAML_NS, "Subject")
            .ok_or_else(|| malformed("assertion has no Subject"))?;
        let name_id = extract_name_id(subject)?;
        let in_response_to = self.check_subject_confirmation(subject, now)?;

        let authn_statement = child_element(assertion, SAML_NS, "AuthnStatement");
        let session_index = authn_statement
            .and_then(|s| s.attribute("SessionIndex"))
            .map(str::to_string);
        let session_not_on_or_after = authn_statement
            .map(|s| optional_instant(s, "SessionNotOnOrAfter"))
            .transpose()?
            .flatten();
        if let Some(end) = session_not_on_or_after {
            if self.is_past(now, end) {
                return Err(SamlError::ResponseExpired);
            }
        }

        Ok(SamlResponse {
            id: assertion.attribute("ID").unwrap_or_default().to_string(),
            in_response_to,
            issuer,
            name_id,
            conditions,
            attributes: extract_attributes(assertion),
            session_index,
            session_not_on_or_after,
            signatures,
        })
    }

    fn check_conditions(&self, assertion: Node<'_, '_>, now: DateTime<Utc>) -> SamlResult<Conditions> {
        let Some(node) = child_element(assertion, SAML_NS, "Conditions") else {
            return Ok(Conditions::default());
        };

        let not_before = optional_instant(node, "NotBefore")?;
        let not_on_or_after = optional_instant(node, "NotOnOrAfter")?;

        if let Some(start) = not_before {
            if now
                .checked_add_signed(self.settings.clock_skew)
                .is_some_and(|latest| latest < start)
            {
                return Err(SamlError::ResponseNotYetValid);
            }
        }
        if let Some(end) = not_on_or_after {
            if self.is_past(now, end) {
                return Err(SamlError::ResponseExpired);
            }
        }

        let mut audiences = Vec::new();
        for restriction in child_elements(node, SAML_NS, "AudienceRestriction") {
            let listed: Vec<String> = child_elements(restriction, SAML_NS, "Audience")
                .map(element_text)
                .collect();
            if !listed.iter().any(|a| *a == self.settings.sp_entity_id) {
                return Err(SamlError::AudienceMismatch {
                    expected: self.settings.sp_entity_id.clone(),
                    actual: listed.join(", "),
                });
            }
            audiences.extend(listed);
        }

        Ok(Conditions {
            not_before,
            not_on_or_after,
            audiences,
        })
    }

    /// Checks bearer confirmation data and returns its `InResponseTo`.
    fn check_subject_confirmation(
        &self,
        subject: Node<'_, '_>,
        now: DateTime<Utc>,
    ) -> SamlResult<Option<String>> {
        let mut in_response_to = None;
        for confirmation in child_elements(subject, SAML_NS, "SubjectConfirmation") {
            let Some(data) = child_element(confirmation, SAML_NS, "SubjectConfirmationData") else {
                continue;
            };
            if let Some(end) = optional_instant(data, "NotOnOrAfter")? {
                if self.is_past(now, end) {
                    return Err(SamlError::ResponseExpired);
                }
            }
            if in_response_to.is_none() {
                in_response_to = data.attribute("InResponseTo").map(str::to_string);
            }
        }
        Ok(in_response_to)
    }

    fn is_past(&self, now: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        now.checked_sub_signed(self.settings.clock_skew)
            .is_some_and(|earliest| earliest >= end)
    }
}

impl std::fmt::Debug for ResponseValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseValidator")
            .field("signatures", &self.signatures)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

fn check_unique_ids(doc: &Document<'_>) -> SamlResult<()> {
    let mut seen = HashSet::new();
    for node in doc.descendants().filter(Node::is_element) {
        if let Some(id) = node.attribute("ID") {
            if !seen.insert(id) {
                return Err(malformed(format!("duplicate ID {id}")));
            }
        }
    }
    Ok(())
}

fn single_assertion<'a, 'input>(root: Node<'a, 'input>) -> SamlResult<Node<'a, 'input>> {
    if child_element(root, SAML_NS, "EncryptedAssertion").is_some() {
        return Err(malformed("encrypted assertions are not supported"));
    }
    let mut assertions = child_elements(root, SAML_NS, "Assertion");
    let assertion = assertions
        .next()
        .ok_or_else(|| malformed("response has no Assertion"))?;
    if assertions.next().is_some() {
        return Err(malformed("response has more than one Assertion"));
    }
    Ok(assertion)
}

fn single_signature<'a, 'input>(element: Node<'a, 'input>) -> SamlResult<Option<Node<'a, 'input>>> {
    let mut signatures = child_elements(element, XMLDSIG_NS, "Signature");
    let first = signatures.next();
    if signatures.next().is_some() {
        return Err(malformed(format!(
            "{} has more than one Signature",
            element.tag_name().name()
        )));
    }
    Ok(first)
}

fn check_status(root: Node<'_, '_>) -> SamlResult<()> {
    let code = child_element(root, SAMLP_NS, "Status")
        .and_then(|status| child_element(status, SAMLP_NS, "StatusCode"))
        .and_then(|code| code.attribute("Value"))
        .ok_or_else(|| malformed("response has no StatusCode"))?;
    if code == status_codes::SUCCESS {
        Ok(())
    } else {
        Err(SamlError::UnsuccessfulStatus(code.to_string()))
    }
}

fn extract_name_id(subject: Node<'_, '_>) -> SamlResult<NameId> {
    if child_element(subject, SAML_NS, "EncryptedID").is_some() {
        return Err(malformed("encrypted subjects are not supported"));
    }
    let node = child_element(subject, SAML_NS, "NameID")
        .ok_or_else(|| malformed("subject has no NameID"))?;
    let value = element_text(node);
    if value.is_empty() {
        return Err(malformed("NameID is empty"));
    }
    Ok(NameId::new(value, node.attribute("Format").map(str::to_string)))
}

fn extract_attributes(assertion: Node<'_, '_>) -> Attributes {
    let mut attributes = Attributes::new();
    for statement in child_elements(assertion, SAML_NS, "AttributeStatement") {
        for attribute in child_elements(statement, SAML_NS, "Attribute") {
            let Some(name) = attribute.attribute("Name") else {
                continue;
            };
            let values = attributes.entry(name.to_string()).or_default();
            values.extend(
                child_elements(attribute, SAML_NS, "AttributeValue")
                    .map(element_text)
                    .filter(|v| !v.is_empty()),
            );
        }
    }
    attributes
}

fn optional_instant(node: Node<'_, '_>, attribute: &str) -> SamlResult<Option<DateTime<Utc>>> {
    node.attribute(attribute)
        .map(|value| {
            DateTime::parse_from_rfc3339(value)
                .map(|instant| instant.with_timezone(&Utc))
                .map_err(|e| malformed(format!("invalid {attribute} {value:?}: {e}")))
        })
        .transpose()
}

fn malformed(detail: impl Into<String>) -> SamlError {
    SamlError::MalformedResponse(detail.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use da_core::FixedClock;
    use da_crypto::{SignatureAlgorithm, SignatureError};

    struct RejectAll;

    impl SignatureVerifier for RejectAll {
        fn verify(
            &self,
            _algorithm: SignatureAlgorithm,
            _message: &[u8],
            _signature: &[u8],
        ) -> Result<(), SignatureError> {
            Err(SignatureError::Verification)
        }
    }

    fn validator() -> ResponseValidator {
        ResponseValidator::new(
            Arc::new(RejectAll),
            Arc::new(FixedClock::new(Utc::now())),
            ValidatorSettings::new("urn:sp"),
        )
    }

    fn response(body: &str) -> String {
        format!(
            r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_r" Version="2.0"><samlp:Status><samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:Success"/></samlp:Status>{body}</samlp:Response>"#
        )
    }

    const ASSERTION: &str = r#"<saml:Assertion ID="_a" Version="2.0"><saml:Issuer>idp</saml:Issuer><saml:Subject><saml:NameID>user@example.com</saml:NameID></saml:Subject></saml:Assertion>"#;

    #[test]
    fn rejects_non_xml() {
        let err = validator().validate("not xml").unwrap_err();
        assert!(matches!(err, SamlError::MalformedResponse(_)));
    }

    #[test]
    fn rejects_other_root_elements() {
        let xml = r#"<samlp:AuthnRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" ID="_x"/>"#;
        let err = validator().validate(xml).unwrap_err();
        assert!(matches!(err, SamlError::MalformedResponse(_)));
    }

    #[test]
    fn rejects_doctype() {
        let xml = format!("<!DOCTYPE r [<!ENTITY e \"x\">]>{}", response(ASSERTION));
        let err = validator().validate(&xml).unwrap_err();
        assert!(matches!(err, SamlError::MalformedResponse(_)));
    }

    #[test]
    fn unsigned_response_is_signature_missing() {
        let err = validator().validate(&response(ASSERTION)).unwrap_err();
        assert!(matches!(err, SamlError::SignatureMissing));
        assert_eq!(err.http_status(), 401);
    }

    #[test]
    fn rejects_missing_and_multiple_assertions() {
        let err = validator().validate(&response("")).unwrap_err();
        assert!(matches!(err, SamlError::MalformedResponse(_)));

        let second = ASSERTION.replace("_a", "_b");
        let err = validator()
            .validate(&response(&format!("{ASSERTION}{second}")))
            .unwrap_err();
        assert!(matches!(err, SamlError::MalformedResponse(_)));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let body = ASSERTION.replace(
            "<saml:Issuer>",
            r#"<saml:Extra ID="_a"/><saml:Issuer>"#,
        );
        let err = validator().validate(&response(&body)).unwrap_err();
        assert!(matches!(err, SamlError::MalformedResponse(ref d) if d.contains("duplicate")));
    }

    #[test]
    fn rejects_encrypted_assertions() {
        let err = validator()
            .validate(&response("<saml:EncryptedAssertion/>"))
            .unwrap_err();
        assert!(matches!(err, SamlError::MalformedResponse(_)));
    }

    #[test]
    fn rejects_two_signatures_on_one_element() {
        let sig = r#"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#"/>"#;
        let body = ASSERTION.replace("</saml:Issuer>", &format!("</saml:Issuer>{sig}{sig}"));
        let err = validator().validate(&response(&body)).unwrap_err();
        assert!(matches!(err, SamlError::MalformedResponse(_)));
    }

    #[test]
    fn settings_from_config() {
        let mut config = da_core::AppConfig::for_testing("urn:sp", "https://idp.example/login", "");
        config.idp_entity_id = Some("urn:idp".to_string());
        config.clock_skew_secs = 30;

        let settings = ValidatorSettings::from_config(&config);
        assert_eq!(settings.sp_entity_id, "urn:sp");
        assert_eq!(settings.idp_entity_id.as_deref(), Some("urn:idp"));
        assert_eq!(settings.clock_skew, Duration::seconds(30));
        assert!(!settings.allow_sha1);

        config.clock_skew_secs = 10_000_000_000_000;
        let settings = ValidatorSettings::from_config(&config);
        assert_eq!(settings.clock_skew, Duration::hours(1));
    }
}
