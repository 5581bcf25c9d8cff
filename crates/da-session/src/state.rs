//! The session state machine.

use chrono::{DateTime, Utc};
use da_protocol_saml::SamlResponse;

use crate::error::{SessionError, SessionResult};
use crate::identity::{LoginPolicy, SessionIdentity};

/// Authentication state of one browser session.
///
/// ```text
/// Anonymous --login--> Authenticated
/// Authenticated --logout / expiry--> Anonymous
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionAuthState {
    /// No user is logged in.
    #[default]
    Anonymous,
    /// A user logged in with a validated SAML response. The identity can
    /// only come from [`SessionAuthState::login`].
    Authenticated(SessionIdentity),
}

impl SessionAuthState {
    /// Logs in with a validated response.
    ///
    /// A session that is already authenticated is replaced, never merged.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidIdentity`] if no principal name can be
    /// extracted. The state is left unchanged in that case.
    pub fn login(
        &mut self,
        response: &SamlResponse,
        policy: &LoginPolicy,
        now: DateTime<Utc>,
    ) -> SessionResult<&SessionIdentity> {
        let identity = SessionIdentity::from_response(response, policy, now)?;
        tracing::info!(
            principal = %identity.principal(),
            groups = identity.groups().len(),
            expires_at = %identity.expires_at(),
            "session authenticated"
        );
        *self = Self::Authenticated(identity);
        self.require_authenticated()
    }

    /// Logs out, returning the identity that was logged in.
    pub fn logout(&mut self) -> Option<SessionIdentity> {
        match std::mem::take(self) {
            Self::Authenticated(identity) => {
                tracing::info!(principal = %identity.principal(), "session logged out");
                Some(identity)
            }
            Self::Anonymous => None,
        }
    }

    /// Drops an expired identity. Returns true if the session expired.
    pub fn expire_if_due(&mut self, now: DateTime<Utc>) -> bool {
        let expired = matches!(self, Self::Authenticated(identity) if identity.is_expired_at(now));
        if expired {
            *self = Self::Anonymous;
            tracing::debug!("session expired");
        }
        expired
    }

    /// Returns the identity, or fails if the session is anonymous.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotAuthenticated`] when anonymous.
    pub fn require_authenticated(&self) -> SessionResult<&SessionIdentity> {
        self.identity().ok_or(SessionError::NotAuthenticated)
    }

    /// Returns the identity if authenticated.
    #[must_use]
    pub const fn identity(&self) -> Option<&SessionIdentity> {
        match self {
            Self::Authenticated(identity) => Some(identity),
            Self::Anonymous => None,
        }
    }

    /// Returns true if authenticated.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use da_core::FixedClock;
    use da_protocol_saml::{ResponseValidator, ValidatorSettings};
    use da_test_utils::{TestIdp, GROUPS_ATTRIBUTE};

    use super::*;

    const SP: &str = "urn:sp";

    fn policy() -> LoginPolicy {
        LoginPolicy {
            groups_attribute: GROUPS_ATTRIBUTE.to_string(),
            user_attribute: None,
            lifetime: Duration::hours(8),
        }
    }

    fn validated(idp: &TestIdp, xml: &str) -> SamlResponse {
        ResponseValidator::new(
            idp.verifier(),
            Arc::new(FixedClock::new(Utc::now())),
            ValidatorSettings::new(SP),
        )
        .validate(xml)
        .unwrap()
    }

    #[test]
    fn starts_anonymous() {
        let state = SessionAuthState::default();
        assert!(!state.is_authenticated());
        assert!(matches!(
            state.require_authenticated(),
            Err(SessionError::NotAuthenticated)
        ));
    }

    #[test]
    fn login_extracts_principal_and_groups() {
        let idp = TestIdp::new();
        let response = validated(
            &idp,
            &idp.response_for(SP)
                .name_id("alice@example.com")
                .groups(["g-1", "g-2"])
                .build(),
        );

        let mut state = SessionAuthState::Anonymous;
        let now = Utc::now();
        let identity = state.login(&response, &policy(), now).unwrap();

        assert_eq!(identity.principal(), "alice@example.com");
        assert!(identity.is_member_of("g-2"));
        assert!(!identity.is_member_of("g-3"));
        assert_eq!(identity.authenticated_at(), now);
        assert_eq!(identity.expires_at(), now + Duration::hours(8));
        assert!(state.is_authenticated());
    }

    #[test]
    fn user_attribute_overrides_name_id() {
        let idp = TestIdp::new();
        let response = validated(
            &idp,
            &idp.response_for(SP)
                .name_id("opaque-id")
                .attribute("upn", ["alice@example.com"])
                .build(),
        );
        let policy = LoginPolicy {
            user_attribute: Some("upn".to_string()),
            ..policy()
        };

        let mut state = SessionAuthState::Anonymous;
        let identity = state.login(&response, &policy, Utc::now()).unwrap();
        assert_eq!(identity.principal(), "alice@example.com");
    }

    #[test]
    fn idp_session_end_caps_lifetime() {
        let idp = TestIdp::new();
        let now = Utc::now();
        let cap = now + Duration::minutes(30);
        let response = validated(
            &idp,
            &idp.response_for(SP).session_not_on_or_after(cap).build(),
        );

        let mut state = SessionAuthState::Anonymous;
        let identity = state.login(&response, &policy(), now).unwrap();
        assert!(identity.expires_at() <= cap);
        assert!(identity.expires_at() > now + Duration::minutes(29));
    }

    #[test]
    fn logout_always_returns_to_anonymous() {
        let idp = TestIdp::new();
        let response = validated(&idp, &idp.response_for(SP).build());

        let mut state = SessionAuthState::Anonymous;
        assert!(state.logout().is_none());
        assert_eq!(state, SessionAuthState::Anonymous);

        state.login(&response, &policy(), Utc::now()).unwrap();
        let identity = state.logout().unwrap();
        assert_eq!(identity.principal(), "user@example.com");
        assert_eq!(state, SessionAuthState::Anonymous);
    }

    #[test]
    fn expires_after_lifetime() {
        let idp = TestIdp::new();
        let response = validated(&idp, &idp.response_for(SP).build());
        let now = Utc::now();

        let mut state = SessionAuthState::Anonymous;
        state.login(&response, &policy(), now).unwrap();

        assert!(!state.expire_if_due(now + Duration::hours(7)));
        assert!(state.is_authenticated());
        assert!(state.expire_if_due(now + Duration::hours(8)));
        assert!(!state.is_authenticated());
    }

    #[test]
    fn oversized_lifetime_saturates() {
        let idp = TestIdp::new();
        let response = validated(&idp, &idp.response_for(SP).build());
        let policy = LoginPolicy {
            lifetime: Duration::MAX,
            ..policy()
        };

        let mut state = SessionAuthState::Anonymous;
        let identity = state.login(&response, &policy, Utc::now()).unwrap();
        assert_eq!(identity.expires_at(), DateTime::<Utc>::MAX_UTC);
    }
}
