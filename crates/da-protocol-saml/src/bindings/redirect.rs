//! HTTP-Redirect Binding implementation.

use base64::Engine;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{Read, Write};

use crate::error::{SamlError, SamlResult};

use super::{DecodedMessage, SamlMessageType};

/// Inflated messages larger than this are rejected.
const MAX_INFLATED_LEN: u64 = 512 * 1024;

/// HTTP-Redirect binding encoder/decoder.
pub struct HttpRedirectBinding;

impl HttpRedirectBinding {
    /// Encodes a SAML request for HTTP-Redirect binding.
    ///
    /// Returns `destination` with `SAMLRequest` (and `RelayState`) appended.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Encoding`] if compression fails.
    pub fn encode_request(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
    ) -> SamlResult<String> {
        Self::encode_with_param(
            xml,
            destination,
            SamlMessageType::Request.form_param(),
            relay_state,
        )
    }

    /// Like [`encode_request`](Self::encode_request) with a custom query
    /// parameter name, for identity providers that expect one.
    pub fn encode_with_param(
        xml: &str,
        destination: &str,
        param_name: &str,
        relay_state: Option<&str>,
    ) -> SamlResult<String> {
        let encoded = deflate_and_encode(xml.as_bytes())?;
        let url_encoded = urlencoding::encode(&encoded);

        let separator = if destination.contains('?') { '&' } else { '?' };

        let mut url = format!("{destination}{separator}{param_name}={url_encoded}");

        if let Some(rs) = relay_state {
            url.push_str(&format!("&RelayState={}", urlencoding::encode(rs)));
        }

        Ok(url)
    }

    /// Decodes a SAML message from a full redirect URL.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Decoding`] if the URL carries no message or the
    /// message does not decode.
    pub fn decode_url(url: &str) -> SamlResult<DecodedMessage> {
        let parsed =
            url::Url::parse(url).map_err(|e| SamlError::Decoding(format!("invalid URL: {e}")))?;

        let mut message = None;
        let mut relay_state = None;

        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "SAMLRequest" => message = Some((value.to_string(), SamlMessageType::Request)),
                "SAMLResponse" => message = Some((value.to_string(), SamlMessageType::Response)),
                "RelayState" => relay_state = Some(value.to_string()),
                _ => {}
            }
        }

        let (encoded, message_type) = message.ok_or_else(|| {
            SamlError::Decoding("no SAMLRequest or SAMLResponse parameter".to_string())
        })?;

        Ok(DecodedMessage {
            xml: decode_and_inflate(&encoded)?,
            message_type,
            relay_state,
        })
    }
}

/// Raw DEFLATE then base64, the transport form of the redirect binding.
///
/// # Errors
///
/// Returns [`SamlError::Encoding`] if compression fails.
pub fn deflate_and_encode(data: &[u8]) -> SamlResult<String> {
    let compressed = deflate_compress(data)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(compressed))
}

/// Reverses [`deflate_and_encode`].
///
/// # Errors
///
/// Returns [`SamlError::Decoding`] on bad base64, a corrupt or oversized
/// stream, or non UTF-8 content.
pub fn decode_and_inflate(encoded: &str) -> SamlResult<String> {
    let compressed = base64::engine::general_purpose::STANDARD.decode(encoded.trim())?;
    let xml_bytes = deflate_decompress(&compressed)?;
    String::from_utf8(xml_bytes)
        .map_err(|e| SamlError::Decoding(format!("invalid UTF-8 in message: {e}")))
}

/// Compresses data using DEFLATE (raw, no zlib header).
fn deflate_compress(data: &[u8]) -> SamlResult<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| SamlError::Encoding(format!("compression error: {e}")))?;
    encoder
        .finish()
        .map_err(|e| SamlError::Encoding(format!("compression finish error: {e}")))
}

/// Decompresses DEFLATE data.
fn deflate_decompress(data: &[u8]) -> SamlResult<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(data).take(MAX_INFLATED_LEN + 1);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| SamlError::Decoding(format!("decompression error: {e}")))?;
    if decompressed.len() as u64 > MAX_INFLATED_LEN {
        return Err(SamlError::Decoding("inflated message too large".to_string()));
    }
    Ok(decompressed)
}
