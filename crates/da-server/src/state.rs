//! Application state shared by all request handlers.

use std::sync::Arc;

use da_core::{AppConfig, Clock};
use da_protocol_saml::ResponseValidator;
use da_session::{LoginPolicy, SessionStore};

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Immutable configuration.
    pub config: Arc<AppConfig>,
    /// Validator pinned to the identity provider's certificate.
    pub validator: ResponseValidator,
    /// Server-side session storage.
    pub sessions: Arc<dyn SessionStore>,
    /// How validated responses become session identities.
    pub login_policy: LoginPolicy,
    /// Time source.
    pub clock: Arc<dyn Clock>,
}
