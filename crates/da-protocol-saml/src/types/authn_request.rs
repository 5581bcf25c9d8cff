//! SAML AuthnRequest.
//!
//! Authentication request message sent by this service provider to the
//! identity provider. A fresh request is built per login attempt and never
//! stored.

use std::io::Cursor;

use chrono::{DateTime, SubsecRound, Utc};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::{NameIdFormat, NameIdPolicy, SamlBinding, SAMLP_NS, SAML_NS};
use crate::bindings::{self, HttpRedirectBinding};
use crate::error::{SamlError, SamlResult};

/// SAML Authentication Request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthnRequest {
    /// Unique identifier for this request.
    pub id: String,

    /// Version of the SAML protocol (always "2.0").
    pub version: String,

    /// Timestamp when this request was issued.
    pub issue_instant: DateTime<Utc>,

    /// The entity ID of the service provider issuing the request.
    pub issuer: String,

    /// The identity provider endpoint the request is sent to.
    pub destination: Option<String>,

    /// The URL where the response should be sent.
    pub assertion_consumer_service_url: Option<String>,

    /// Binding to use for the response.
    pub protocol_binding: Option<SamlBinding>,

    /// Name ID policy constraints.
    pub name_id_policy: Option<NameIdPolicy>,

    /// Whether the IdP must authenticate the user directly.
    pub force_authn: bool,
}

impl AuthnRequest {
    /// Creates a new authentication request with a fresh identifier.
    #[must_use]
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            id: da_crypto::random::generate_message_id(),
            version: "2.0".to_string(),
            issue_instant: Utc::now().trunc_subsecs(0),
            issuer: issuer.into(),
            destination: None,
            assertion_consumer_service_url: None,
            protocol_binding: None,
            name_id_policy: None,
            force_authn: false,
        }
    }

    /// Creates a new authentication request with a custom ID.
    #[must_use]
    pub fn with_id(id: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::new(issuer)
        }
    }

    /// Sets the issue instant.
    #[must_use]
    pub fn with_issue_instant(mut self, instant: DateTime<Utc>) -> Self {
        self.issue_instant = instant.trunc_subsecs(0);
        self
    }

    /// Sets the destination URL.
    #[must_use]
    pub fn with_destination(mut self, url: impl Into<String>) -> Self {
        self.destination = Some(url.into());
        self
    }

    /// Sets the assertion consumer service URL.
    ///
    /// Responses to an explicit ACS URL always use the HTTP-POST binding.
    #[must_use]
    pub fn with_acs_url(mut self, url: impl Into<String>) -> Self {
        self.assertion_consumer_service_url = Some(url.into());
        self.protocol_binding = Some(SamlBinding::HttpPost);
        self
    }

    /// Sets the name ID policy.
    #[must_use]
    pub fn with_name_id_policy(mut self, policy: NameIdPolicy) -> Self {
        self.name_id_policy = Some(policy);
        self
    }

    /// Sets force authentication.
    #[must_use]
    pub const fn force_authn(mut self, force: bool) -> Self {
        self.force_authn = force;
        self
    }

    /// Validates the basic structure of this request.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Encoding`] if a required field is empty.
    pub fn validate(&self) -> SamlResult<()> {
        if self.id.is_empty() {
            return Err(SamlError::Encoding("ID is required".to_string()));
        }
        if self.version != "2.0" {
            return Err(SamlError::Encoding(format!(
                "unsupported SAML version: {}",
                self.version
            )));
        }
        if self.issuer.is_empty() {
            return Err(SamlError::Encoding("issuer is required".to_string()));
        }
        Ok(())
    }

    /// Serializes the request to XML.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Encoding`] if the request is invalid or cannot
    /// be written.
    pub fn to_xml(&self) -> SamlResult<String> {
        self.validate()?;

        let mut writer = Writer::new(Cursor::new(Vec::new()));
        let issue_instant = self.issue_instant.format("%Y-%m-%dT%H:%M:%SZ").to_string();

        let mut root = BytesStart::new("samlp:AuthnRequest");
        root.push_attribute(("xmlns:samlp", SAMLP_NS));
        root.push_attribute(("xmlns:saml", SAML_NS));
        root.push_attribute(("ID", self.id.as_str()));
        root.push_attribute(("Version", self.version.as_str()));
        root.push_attribute(("IssueInstant", issue_instant.as_str()));
        if let Some(destination) = &self.destination {
            root.push_attribute(("Destination", destination.as_str()));
        }
        if self.force_authn {
            root.push_attribute(("ForceAuthn", "true"));
        }
        if let Some(binding) = self.protocol_binding {
            root.push_attribute(("ProtocolBinding", binding.uri()));
        }
        if let Some(acs) = &self.assertion_consumer_service_url {
            root.push_attribute(("AssertionConsumerServiceURL", acs.as_str()));
        }

        write(&mut writer, Event::Start(root))?;
        write(&mut writer, Event::Start(BytesStart::new("saml:Issuer")))?;
        write(&mut writer, Event::Text(BytesText::new(&self.issuer)))?;
        write(&mut writer, Event::End(BytesEnd::new("saml:Issuer")))?;

        if let Some(policy) = &self.name_id_policy {
            let mut element = BytesStart::new("samlp:NameIDPolicy");
            if let Some(format) = policy.format {
                element.push_attribute(("Format", format.uri()));
            }
            element.push_attribute((
                "AllowCreate",
                if policy.allow_create { "true" } else { "false" },
            ));
            write(&mut writer, Event::Empty(element))?;
        }

        write(&mut writer, Event::End(BytesEnd::new("samlp:AuthnRequest")))?;

        String::from_utf8(writer.into_inner().into_inner())
            .map_err(|e| SamlError::Encoding(format!("invalid UTF-8: {e}")))
    }

    /// Produces the HTTP-Redirect transport form: XML, raw DEFLATE, base64.
    ///
    /// The result is not URL-encoded.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Encoding`] if serialization or compression fails.
    pub fn encode(&self) -> SamlResult<String> {
        bindings::deflate_and_encode(self.to_xml()?.as_bytes())
    }

    /// Builds the full redirect URL to the identity provider.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Encoding`] if the request cannot be encoded.
    pub fn redirect_url(&self, login_url: &str, relay_state: Option<&str>) -> SamlResult<String> {
        HttpRedirectBinding::encode_request(&self.to_xml()?, login_url, relay_state)
    }

    /// Parses a request from XML.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Decoding`] if the document is not an
    /// `AuthnRequest`.
    pub fn from_xml(xml: &str) -> SamlResult<Self> {
        let doc = roxmltree::Document::parse(xml)
            .map_err(|e| SamlError::Decoding(format!("invalid XML: {e}")))?;
        let root = doc.root_element();
        if !root.has_tag_name((SAMLP_NS, "AuthnRequest")) {
            return Err(SamlError::Decoding("not an AuthnRequest".to_string()));
        }

        let attr = |name: &str| root.attribute(name).map(String::from);
        let id = attr("ID").ok_or_else(|| SamlError::Decoding("missing ID".to_string()))?;
        let issue_instant = root
            .attribute("IssueInstant")
            .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| SamlError::Decoding("missing or invalid IssueInstant".to_string()))?;
        let issuer = root
            .children()
            .find(|n| n.has_tag_name((SAML_NS, "Issuer")))
            .and_then(|n| n.text())
            .map(str::to_string)
            .ok_or_else(|| SamlError::Decoding("missing Issuer".to_string()))?;
        let name_id_policy = root
            .children()
            .find(|n| n.has_tag_name((SAMLP_NS, "NameIDPolicy")))
            .map(|n| NameIdPolicy {
                format: n.attribute("Format").and_then(NameIdFormat::from_uri),
                allow_create: n.attribute("AllowCreate") == Some("true"),
            });

        Ok(Self {
            id,
            version: attr("Version").unwrap_or_default(),
            issue_instant,
            issuer,
            destination: attr("Destination"),
            assertion_consumer_service_url: attr("AssertionConsumerServiceURL"),
            protocol_binding: root.attribute("ProtocolBinding").and_then(SamlBinding::from_uri),
            name_id_policy,
            force_authn: root.attribute("ForceAuthn") == Some("true"),
        })
    }

    /// Reverses [`encode`](Self::encode).
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Decoding`] if any stage fails.
    pub fn decode(encoded: &str) -> SamlResult<Self> {
        let xml = bindings::decode_and_inflate(encoded)?;
        Self::from_xml(&xml)
    }
}

fn write(writer: &mut Writer<Cursor<Vec<u8>>>, event: Event<'_>) -> SamlResult<()> {
    writer
        .write_event(event)
        .map_err(|e| SamlError::Encoding(format!("XML write error: {e}")))
}
