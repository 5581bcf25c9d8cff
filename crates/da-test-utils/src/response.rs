//! SAML response fixtures.

use std::fmt::Write as _;

use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use da_protocol_saml::types::{status_codes, SAMLP_NS, SAML_NS};
use quick_xml::escape::escape;

use crate::idp::TestIdp;

/// Attribute Entra ID uses for group object ids.
pub const GROUPS_ATTRIBUTE: &str = "http://schemas.microsoft.com/ws/2008/06/identity/claims/groups";

/// Which elements of a built response carry a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Signing {
    /// Only the `samlp:Response` root.
    Response,
    /// Only the `saml:Assertion`.
    #[default]
    Assertion,
    /// The assertion, then the response around it.
    Both,
    /// Nothing.
    Unsigned,
}

/// Builds a SAML response as issued by a [`TestIdp`].
///
/// Defaults to a successful, assertion-signed response valid from five
/// minutes ago until five minutes from now.
#[derive(Debug, Clone)]
pub struct ResponseBuilder<'a> {
    idp: &'a TestIdp,
    issuer: String,
    audience: Option<String>,
    destination: Option<String>,
    in_response_to: Option<String>,
    name_id: String,
    name_id_format: Option<String>,
    attributes: Vec<(String, Vec<String>)>,
    issue_instant: DateTime<Utc>,
    not_before: Option<DateTime<Utc>>,
    not_on_or_after: Option<DateTime<Utc>>,
    session_index: Option<String>,
    session_not_on_or_after: Option<DateTime<Utc>>,
    status: String,
    signing: Signing,
    response_id: String,
    assertion_id: String,
}

impl<'a> ResponseBuilder<'a> {
    pub(crate) fn new(idp: &'a TestIdp, audience: &str) -> Self {
        let now = Utc::now();
        Self {
            idp,
            issuer: idp.entity_id().to_string(),
            audience: Some(audience.to_string()),
            destination: None,
            in_response_to: None,
            name_id: "user@example.com".to_string(),
            name_id_format: None,
            attributes: Vec::new(),
            issue_instant: now,
            not_before: Some(now - Duration::minutes(5)),
            not_on_or_after: Some(now + Duration::minutes(5)),
            session_index: Some("_session-1".to_string()),
            session_not_on_or_after: None,
            status: status_codes::SUCCESS.to_string(),
            signing: Signing::default(),
            response_id: da_crypto::random::generate_message_id(),
            assertion_id: da_crypto::random::generate_message_id(),
        }
    }

    /// Overrides the issuer.
    #[must_use]
    pub fn issuer(mut self, issuer: &str) -> Self {
        self.issuer = issuer.to_string();
        self
    }

    /// Overrides the audience.
    #[must_use]
    pub fn audience(mut self, audience: &str) -> Self {
        self.audience = Some(audience.to_string());
        self
    }

    /// Leaves out the audience restriction.
    #[must_use]
    pub fn without_audience(mut self) -> Self {
        self.audience = None;
        self
    }

    /// Sets the response `Destination` and confirmation `Recipient`.
    #[must_use]
    pub fn destination(mut self, destination: &str) -> Self {
        self.destination = Some(destination.to_string());
        self
    }

    /// Marks the response as answering the given request.
    #[must_use]
    pub fn in_response_to(mut self, request_id: &str) -> Self {
        self.in_response_to = Some(request_id.to_string());
        self
    }

    /// Sets the subject.
    #[must_use]
    pub fn name_id(mut self, name_id: &str) -> Self {
        self.name_id = name_id.to_string();
        self
    }

    /// Sets the subject's `Format`.
    #[must_use]
    pub fn name_id_format(mut self, format: &str) -> Self {
        self.name_id_format = Some(format.to_string());
        self
    }

    /// Adds an attribute with the given values.
    #[must_use]
    pub fn attribute<I, S>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes
            .push((name.to_string(), values.into_iter().map(Into::into).collect()));
        self
    }

    /// Adds group memberships under [`GROUPS_ATTRIBUTE`].
    #[must_use]
    pub fn groups<I, S>(self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attribute(GROUPS_ATTRIBUTE, groups)
    }

    /// Shifts the whole validity window so it is centred on `instant`.
    #[must_use]
    pub fn issued_at(mut self, instant: DateTime<Utc>) -> Self {
        self.issue_instant = instant;
        self.not_before = Some(instant - Duration::minutes(5));
        self.not_on_or_after = Some(instant + Duration::minutes(5));
        self
    }

    /// Sets `Conditions/@NotBefore`.
    #[must_use]
    pub fn not_before(mut self, instant: Option<DateTime<Utc>>) -> Self {
        self.not_before = instant;
        self
    }

    /// Sets `Conditions/@NotOnOrAfter` and the confirmation deadline.
    #[must_use]
    pub fn not_on_or_after(mut self, instant: Option<DateTime<Utc>>) -> Self {
        self.not_on_or_after = instant;
        self
    }

    /// Sets `AuthnStatement/@SessionNotOnOrAfter`.
    #[must_use]
    pub fn session_not_on_or_after(mut self, instant: DateTime<Utc>) -> Self {
        self.session_not_on_or_after = Some(instant);
        self
    }

    /// Sets the top-level status code.
    #[must_use]
    pub fn status(mut self, code: &str) -> Self {
        self.status = code.to_string();
        self
    }

    /// Chooses which elements get signed.
    #[must_use]
    pub fn signing(mut self, signing: Signing) -> Self {
        self.signing = signing;
        self
    }

    /// Sets the assertion `ID`.
    #[must_use]
    pub fn assertion_id(mut self, id: &str) -> Self {
        self.assertion_id = id.to_string();
        self
    }

    /// The assertion `ID` that will be written.
    #[must_use]
    pub fn current_assertion_id(&self) -> &str {
        &self.assertion_id
    }

    /// Serializes and signs the response.
    #[must_use]
    pub fn build(&self) -> String {
        let xml = self.unsigned_xml();
        match self.signing {
            Signing::Unsigned => xml,
            Signing::Assertion => self.idp.sign(&xml, &self.assertion_id),
            Signing::Response => self.idp.sign(&xml, &self.response_id),
            Signing::Both => {
                let xml = self.idp.sign(&xml, &self.assertion_id);
                self.idp.sign(&xml, &self.response_id)
            }
        }
    }

    /// The built response, base64 encoded for the HTTP-POST binding.
    #[must_use]
    pub fn build_encoded(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.build())
    }

    fn unsigned_xml(&self) -> String {
        let issued = timestamp(self.issue_instant);
        let mut xml = String::with_capacity(2048);

        let _ = write!(
            xml,
            r#"<samlp:Response xmlns:samlp="{SAMLP_NS}" xmlns:saml="{SAML_NS}" ID="{}" Version="2.0" IssueInstant="{issued}""#,
            self.response_id
        );
        if let Some(destination) = &self.destination {
            let _ = write!(xml, r#" Destination="{}""#, escape(destination.as_str()));
        }
        if let Some(request) = &self.in_response_to {
            let _ = write!(xml, r#" InResponseTo="{}""#, escape(request.as_str()));
        }
        let _ = write!(
            xml,
            r#"><saml:Issuer>{issuer}</saml:Issuer><samlp:Status><samlp:StatusCode Value="{status}"/></samlp:Status>"#,
            issuer = escape(self.issuer.as_str()),
            status = escape(self.status.as_str()),
        );

        let _ = write!(
            xml,
            r#"<saml:Assertion ID="{}" Version="2.0" IssueInstant="{issued}"><saml:Issuer>{}</saml:Issuer>"#,
            self.assertion_id,
            escape(self.issuer.as_str()),
        );
        self.write_subject(&mut xml);
        self.write_conditions(&mut xml);
        self.write_authn_statement(&mut xml, &issued);
        self.write_attributes(&mut xml);
        xml.push_str("</saml:Assertion></samlp:Response>");
        xml
    }

    fn write_subject(&self, xml: &mut String) {
        xml.push_str("<saml:Subject><saml:NameID");
        if let Some(format) = &self.name_id_format {
            let _ = write!(xml, r#" Format="{}""#, escape(format.as_str()));
        }
        let _ = write!(xml, ">{}</saml:NameID>", escape(self.name_id.as_str()));

        xml.push_str(r#"<saml:SubjectConfirmation Method="urn:oasis:names:tc:SAML:2.0:cm:bearer"><saml:SubjectConfirmationData"#);
        if let Some(end) = self.not_on_or_after {
            let _ = write!(xml, r#" NotOnOrAfter="{}""#, timestamp(end));
        }
        if let Some(destination) = &self.destination {
            let _ = write!(xml, r#" Recipient="{}""#, escape(destination.as_str()));
        }
        if let Some(request) = &self.in_response_to {
            let _ = write!(xml, r#" InResponseTo="{}""#, escape(request.as_str()));
        }
        xml.push_str("/></saml:SubjectConfirmation></saml:Subject>");
    }

    fn write_conditions(&self, xml: &mut String) {
        xml.push_str("<saml:Conditions");
        if let Some(start) = self.not_before {
            let _ = write!(xml, r#" NotBefore="{}""#, timestamp(start));
        }
        if let Some(end) = self.not_on_or_after {
            let _ = write!(xml, r#" NotOnOrAfter="{}""#, timestamp(end));
        }
        xml.push('>');
        if let Some(audience) = &self.audience {
            let _ = write!(
                xml,
                "<saml:AudienceRestriction><saml:Audience>{}</saml:Audience></saml:AudienceRestriction>",
                escape(audience.as_str())
            );
        }
        xml.push_str("</saml:Conditions>");
    }

    fn write_authn_statement(&self, xml: &mut String, issued: &str) {
        let _ = write!(xml, r#"<saml:AuthnStatement AuthnInstant="{issued}""#);
        if let Some(index) = &self.session_index {
            let _ = write!(xml, r#" SessionIndex="{}""#, escape(index.as_str()));
        }
        if let Some(end) = self.session_not_on_or_after {
            let _ = write!(xml, r#" SessionNotOnOrAfter="{}""#, timestamp(end));
        }
        xml.push_str("><saml:AuthnContext><saml:AuthnContextClassRef>urn:oasis:names:tc:SAML:2.0:ac:classes:PasswordProtectedTransport</saml:AuthnContextClassRef></saml:AuthnContext></saml:AuthnStatement>");
    }

    fn write_attributes(&self, xml: &mut String) {
        if self.attributes.is_empty() {
            return;
        }
        xml.push_str("<saml:AttributeStatement>");
        for (name, values) in &self.attributes {
            let _ = write!(xml, r#"<saml:Attribute Name="{}">"#, escape(name.as_str()));
            for value in values {
                let _ = write!(
                    xml,
                    "<saml:AttributeValue>{}</saml:AttributeValue>",
                    escape(value.as_str())
                );
            }
            xml.push_str("</saml:Attribute>");
        }
        xml.push_str("</saml:AttributeStatement>");
    }
}

fn timestamp(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
