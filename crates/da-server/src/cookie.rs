//! Session cookie helpers.
//!
//! The cookie carries only the opaque session id. It is `HttpOnly` and
//! `SameSite=Lax`, and `Secure` unless disabled for local development.

use axum::http::{header::COOKIE, HeaderMap};

/// Cookie name for the session id.
pub const SESSION_COOKIE_NAME: &str = "device_access_session";

/// Builds the `Set-Cookie` value that stores `session_id`.
#[must_use]
pub fn session_cookie(session_id: &str, max_age_secs: i64, secure: bool) -> String {
    let secure_flag = if secure { "; Secure" } else { "" };
    format!(
        "{SESSION_COOKIE_NAME}={session_id}; HttpOnly{secure_flag}; SameSite=Lax; Path=/; Max-Age={max_age_secs}"
    )
}

/// Builds the `Set-Cookie` value that removes the session cookie.
#[must_use]
pub fn clear_session_cookie(secure: bool) -> String {
    let secure_flag = if secure { "; Secure" } else { "" };
    format!("{SESSION_COOKIE_NAME}=; HttpOnly{secure_flag}; SameSite=Lax; Path=/; Max-Age=0")
}

/// Reads the session id from the request's `Cookie` headers.
#[must_use]
pub fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|header| header.split(';'))
        .find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == SESSION_COOKIE_NAME && !value.is_empty()).then(|| value.to_string())
        })
}
