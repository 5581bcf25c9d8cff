//! Authenticated identity.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use da_core::AppConfig;
use da_protocol_saml::SamlResponse;
use serde::Serialize;

use crate::error::{SessionError, SessionResult};

/// How a validated response is turned into a [`SessionIdentity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginPolicy {
    /// Attribute holding group memberships.
    pub groups_attribute: String,
    /// Attribute used as the principal name instead of the `NameID`.
    pub user_attribute: Option<String>,
    /// Maximum session lifetime.
    pub lifetime: Duration,
}

impl LoginPolicy {
    /// Builds the policy from the application configuration.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            groups_attribute: config.groups_attribute.clone(),
            user_attribute: config.user_attribute.clone(),
            lifetime: config.session_lifetime(),
        }
    }
}

/// The user behind an authenticated session.
///
/// An identity can only be built from a validated [`SamlResponse`], through
/// [`SessionAuthState::login`](crate::SessionAuthState::login). It has no
/// public constructor and cannot be deserialized.
///
/// ```compile_fail
/// let forged = da_session::SessionIdentity {
///     principal: "mallory@example.com".to_string(),
///     groups: Default::default(),
///     session_index: None,
///     authenticated_at: chrono::Utc::now(),
///     expires_at: chrono::Utc::now(),
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionIdentity {
    principal: String,
    groups: BTreeSet<String>,
    session_index: Option<String>,
    authenticated_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl SessionIdentity {
    /// Extracts the identity from a validated response.
    ///
    /// The session ends after `policy.lifetime` or at the identity
    /// provider's `SessionNotOnOrAfter`, whichever comes first.
    pub(crate) fn from_response(
        response: &SamlResponse,
        policy: &LoginPolicy,
        now: DateTime<Utc>,
    ) -> SessionResult<Self> {
        let principal = policy
            .user_attribute
            .as_deref()
            .and_then(|name| response.first_attribute(name))
            .unwrap_or_else(|| response.name_id().value())
            .trim()
            .to_string();
        if principal.is_empty() {
            return Err(SessionError::InvalidIdentity(
                "empty principal name".to_string(),
            ));
        }

        let groups = response
            .attribute(&policy.groups_attribute)
            .map(str::to_string)
            .collect();

        let mut expires_at = now
            .checked_add_signed(policy.lifetime)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        if let Some(cap) = response.session_not_on_or_after() {
            expires_at = expires_at.min(cap);
        }

        Ok(Self {
            principal,
            groups,
            session_index: response.session_index().map(str::to_string),
            authenticated_at: now,
            expires_at,
        })
    }

    /// User principal name.
    #[must_use]
    pub fn principal(&self) -> &str {
        &self.principal
    }

    /// Group identifiers the user is a member of.
    #[must_use]
    pub const fn groups(&self) -> &BTreeSet<String> {
        &self.groups
    }

    /// `SessionIndex` assigned by the identity provider.
    #[must_use]
    pub fn session_index(&self) -> Option<&str> {
        self.session_index.as_deref()
    }

    /// When the response was accepted.
    #[must_use]
    pub const fn authenticated_at(&self) -> DateTime<Utc> {
        self.authenticated_at
    }

    /// When the session ends.
    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns true if the user holds `group`.
    #[must_use]
    pub fn is_member_of(&self, group: &str) -> bool {
        self.groups.contains(group)
    }

    /// Returns true if the session has ended at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
