//! Validated SAML response.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use da_crypto::{DigestAlgorithm, SignatureAlgorithm};
use serde::Serialize;

use super::NameId;

/// Attribute name to the set of its string values.
pub type Attributes = BTreeMap<String, BTreeSet<String>>;

/// Validity conditions of an assertion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Conditions {
    /// Start of the validity window.
    pub not_before: Option<DateTime<Utc>>,
    /// End of the validity window (exclusive).
    pub not_on_or_after: Option<DateTime<Utc>>,
    /// Audiences the assertion is restricted to. Empty if unrestricted.
    pub audiences: Vec<String>,
}

/// The element a verified signature covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SignedElement {
    /// The `samlp:Response` root.
    Response,
    /// The `saml:Assertion` inside it.
    Assertion,
}

/// Metadata of a signature that has been verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedSignature {
    /// Which element the signature covers.
    pub element: SignedElement,
    /// Signature method.
    pub algorithm: SignatureAlgorithm,
    /// Digest method of the reference.
    pub digest: DigestAlgorithm,
}

/// A SAML response that passed validation.
///
/// There is no public constructor. The only way to obtain one is
/// [`ResponseValidator::validate`](crate::ResponseValidator::validate), so
/// holding a `SamlResponse` implies its signature was verified.
#[derive(Debug, Clone, Serialize)]
pub struct SamlResponse {
    pub(crate) id: String,
    pub(crate) in_response_to: Option<String>,
    pub(crate) issuer: String,
    pub(crate) name_id: NameId,
    pub(crate) conditions: Conditions,
    pub(crate) attributes: Attributes,
    pub(crate) session_index: Option<String>,
    pub(crate) session_not_on_or_after: Option<DateTime<Utc>>,
    pub(crate) signatures: Vec<VerifiedSignature>,
}

impl SamlResponse {
    /// The `ID` of the assertion.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The request this response answers, if solicited.
    #[must_use]
    pub fn in_response_to(&self) -> Option<&str> {
        self.in_response_to.as_deref()
    }

    /// The assertion issuer.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// The authenticated subject.
    #[must_use]
    pub const fn name_id(&self) -> &NameId {
        &self.name_id
    }

    /// The assertion's conditions.
    #[must_use]
    pub const fn conditions(&self) -> &Conditions {
        &self.conditions
    }

    /// All attributes from the assertion's attribute statements.
    #[must_use]
    pub const fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Values of a single attribute.
    pub fn attribute(&self, name: &str) -> impl Iterator<Item = &str> {
        self.attributes
            .get(name)
            .into_iter()
            .flat_map(|values| values.iter().map(String::as_str))
    }

    /// First value of a single attribute.
    #[must_use]
    pub fn first_attribute(&self, name: &str) -> Option<&str> {
        self.attribute(name).next()
    }

    /// `SessionIndex` from the authentication statement.
    #[must_use]
    pub fn session_index(&self) -> Option<&str> {
        self.session_index.as_deref()
    }

    /// `SessionNotOnOrAfter` from the authentication statement.
    #[must_use]
    pub const fn session_not_on_or_after(&self) -> Option<DateTime<Utc>> {
        self.session_not_on_or_after
    }

    /// The signatures that were verified.
    #[must_use]
    pub fn signatures(&self) -> &[VerifiedSignature] {
        &self.signatures
    }
}
