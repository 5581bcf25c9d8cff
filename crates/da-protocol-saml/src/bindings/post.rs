//! HTTP-POST Binding implementation.

use base64::Engine;

use crate::error::{SamlError, SamlResult};

use super::{DecodedMessage, SamlMessageType};

/// HTTP-POST binding decoder.
pub struct HttpPostBinding;

impl HttpPostBinding {
    /// Decodes a `SAMLResponse` form value.
    ///
    /// Identity providers may wrap the base64 payload across lines, so
    /// whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Decoding`] if the value is empty, not base64, or
    /// not UTF-8.
    pub fn decode_response(
        saml_response: &str,
        relay_state: Option<&str>,
    ) -> SamlResult<DecodedMessage> {
        let compact: String = saml_response
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        if compact.is_empty() {
            return Err(SamlError::Decoding("empty SAMLResponse".to_string()));
        }

        let decoded = base64::engine::general_purpose::STANDARD.decode(compact)?;
        let xml = String::from_utf8(decoded)
            .map_err(|e| SamlError::Decoding(format!("invalid UTF-8 in message: {e}")))?;

        Ok(DecodedMessage {
            xml,
            message_type: SamlMessageType::Response,
            relay_state: relay_state.map(String::from),
        })
    }

    /// Encodes a response the way an identity provider posts it.
    #[must_use]
    pub fn encode_response(xml: &str) -> String {
        base64::engine::general_purpose::STANDARD.encode(xml)
    }
}
