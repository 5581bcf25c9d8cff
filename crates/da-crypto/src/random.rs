//! Cryptographically secure random identifiers.

use rand::distr::{Alphanumeric, SampleString};
use rand::Rng;

/// Generates `len` random bytes from the thread-local CSPRNG.
#[must_use]
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut rng = rand::rng();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes[..]);
    bytes
}

/// Generates a random alphanumeric string (a-z, A-Z, 0-9).
#[must_use]
pub fn random_alphanumeric(len: usize) -> String {
    let mut rng = rand::rng();
    Alphanumeric.sample_string(&mut rng, len)
}

/// Generates a session identifier for the session cookie.
///
/// 43 alphanumeric characters give roughly 256 bits of entropy.
#[must_use]
pub fn generate_session_id() -> String {
    random_alphanumeric(43)
}

/// Generates a SAML message identifier.
///
/// The leading underscore keeps the value a valid `xs:ID`, which may not
/// start with a digit.
#[must_use]
pub fn generate_message_id() -> String {
    let bytes = random_bytes(20);
    let mut id = String::with_capacity(1 + bytes.len() * 2);
    id.push('_');
    for byte in bytes {
        id.push_str(&format!("{byte:02x}"));
    }
    id
}
