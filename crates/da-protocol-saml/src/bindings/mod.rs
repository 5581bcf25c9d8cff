//! SAML bindings implementation.
//!
//! - **HTTP-Redirect Binding** - requests are deflated, base64-encoded, and
//!   URL-encoded into a query parameter
//! - **HTTP-POST Binding** - responses arrive base64-encoded in a form field
//!
//! # Usage
//!
//! ```rust,ignore
//! use da_protocol_saml::bindings::{HttpPostBinding, HttpRedirectBinding};
//!
//! let url = HttpRedirectBinding::encode_request(&request_xml, "https://idp.example.com/sso", None)?;
//! let decoded = HttpPostBinding::decode_response(&form.saml_response, form.relay_state.as_deref())?;
//! ```

mod post;
mod redirect;

pub use post::*;
pub use redirect::*;

/// SAML message type for binding operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamlMessageType {
    /// AuthnRequest message.
    Request,
    /// Response message.
    Response,
}

impl SamlMessageType {
    /// Returns the form parameter name for this message type.
    #[must_use]
    pub const fn form_param(&self) -> &'static str {
        match self {
            Self::Request => "SAMLRequest",
            Self::Response => "SAMLResponse",
        }
    }
}

/// Decoded SAML binding message.
#[derive(Debug, Clone)]
pub struct DecodedMessage {
    /// The decoded XML message.
    pub xml: String,
    /// The message type (request or response).
    pub message_type: SamlMessageType,
    /// The RelayState if present.
    pub relay_state: Option<String>,
}
