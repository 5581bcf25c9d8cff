//! Application configuration.
//!
//! Configuration is read once at startup from the process environment, after
//! an optional `.env` file has been merged in. Leading and trailing whitespace
//! is stripped from every value and empty values count as unset.

use chrono::Duration;

use crate::error::{Error, Result};

/// Settings that must be present and non-empty.
pub const REQUIRED_VARS: [&str; 4] = ["ISSUER_ENTITY_ID", "LOGIN_URL", "ACCESS_GROUP", "SAML_CERT"];

/// Claim carrying group object ids in responses from Entra ID.
pub const DEFAULT_GROUPS_ATTRIBUTE: &str =
    "http://schemas.microsoft.com/ws/2008/06/identity/claims/groups";

const DEFAULT_CLOCK_SKEW_SECS: i64 = 180;
const DEFAULT_SESSION_LIFETIME_SECS: i64 = 8 * 60 * 60;

/// Largest accepted `CLOCK_SKEW_SECS`: one hour.
pub const MAX_CLOCK_SKEW_SECS: i64 = 60 * 60;

/// Largest accepted `SESSION_LIFETIME_SECS`: thirty days.
pub const MAX_SESSION_LIFETIME_SECS: i64 = 30 * 24 * 60 * 60;

/// Immutable application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Entity id this service uses as `Issuer` and expects as audience.
    pub issuer_entity_id: String,

    /// Identity provider single sign-on URL.
    pub login_url: String,

    /// Where to send the browser after a local logout.
    pub logout_url: Option<String>,

    /// Directory group that grants device access.
    pub access_group: String,

    /// PEM certificate the identity provider signs responses with.
    pub saml_cert: String,

    /// Expected `Issuer` of responses. Not checked when unset.
    pub idp_entity_id: Option<String>,

    /// Assertion consumer service URL advertised in requests.
    pub acs_url: Option<String>,

    /// Attribute holding group memberships.
    pub groups_attribute: String,

    /// Attribute used as principal name instead of `NameID`.
    pub user_attribute: Option<String>,

    /// Tolerated clock difference in seconds.
    pub clock_skew_secs: i64,

    /// Local session lifetime in seconds.
    pub session_lifetime_secs: i64,

    /// Whether SHA-1 based signatures and digests are accepted.
    pub allow_sha1: bool,

    /// Whether the session cookie carries the `Secure` attribute.
    pub secure_cookies: bool,

    /// Show error details on error pages.
    pub debug: bool,

    /// Host to bind to.
    pub host: String,

    /// Port to bind to.
    pub port: u16,
}

impl AppConfig {
    /// Loads configuration from the environment.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    /// Variables already set in the environment take precedence over it.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env file");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let missing: Vec<String> = REQUIRED_VARS
            .iter()
            .filter(|key| get(**key).is_none())
            .map(|key| (*key).to_string())
            .collect();
        if !missing.is_empty() {
            return Err(Error::MissingConfig(missing));
        }

        let required = |key: &str| get(key).ok_or_else(|| Error::MissingConfig(vec![key.into()]));

        let login_url = required("LOGIN_URL")?;
        validate_url("LOGIN_URL", &login_url)?;

        let logout_url = get("LOGOUT_URL");
        if let Some(url) = &logout_url {
            validate_url("LOGOUT_URL", url)?;
        }

        let acs_url = get("ACS_URL");
        if let Some(url) = &acs_url {
            validate_url("ACS_URL", url)?;
        }

        let clock_skew_secs = parse_number(&get, "CLOCK_SKEW_SECS", DEFAULT_CLOCK_SKEW_SECS)?;
        let session_lifetime_secs =
            parse_number(&get, "SESSION_LIFETIME_SECS", DEFAULT_SESSION_LIFETIME_SECS)?;
        check_range("CLOCK_SKEW_SECS", clock_skew_secs, 0, MAX_CLOCK_SKEW_SECS)?;
        check_range(
            "SESSION_LIFETIME_SECS",
            session_lifetime_secs,
            1,
            MAX_SESSION_LIFETIME_SECS,
        )?;

        Ok(Self {
            issuer_entity_id: required("ISSUER_ENTITY_ID")?,
            login_url,
            logout_url,
            access_group: required("ACCESS_GROUP")?,
            saml_cert: required("SAML_CERT")?,
            idp_entity_id: get("IDP_ENTITY_ID"),
            acs_url,
            groups_attribute: get("GROUPS_ATTRIBUTE")
                .unwrap_or_else(|| DEFAULT_GROUPS_ATTRIBUTE.to_string()),
            user_attribute: get("USER_ATTRIBUTE"),
            clock_skew_secs,
            session_lifetime_secs,
            allow_sha1: parse_bool(&get, "ALLOW_SHA1", false)?,
            secure_cookies: parse_bool(&get, "SECURE_COOKIES", true)?,
            debug: get("DEBUG").as_deref() == Some("1"),
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_number(&get, "PORT", 8080)?,
        })
    }

    /// Creates a configuration suitable for tests.
    #[must_use]
    pub fn for_testing(issuer: &str, login_url: &str, saml_cert: &str) -> Self {
        Self {
            issuer_entity_id: issuer.to_string(),
            login_url: login_url.to_string(),
            logout_url: None,
            access_group: "test-access-group".to_string(),
            saml_cert: saml_cert.to_string(),
            idp_entity_id: None,
            acs_url: None,
            groups_attribute: DEFAULT_GROUPS_ATTRIBUTE.to_string(),
            user_attribute: None,
            clock_skew_secs: DEFAULT_CLOCK_SKEW_SECS,
            session_lifetime_secs: DEFAULT_SESSION_LIFETIME_SECS,
            allow_sha1: false,
            secure_cookies: false,
            debug: false,
            host: "127.0.0.1".to_string(),
            port: 0,
        }
    }

    /// Tolerated clock difference.
    #[must_use]
    pub fn clock_skew(&self) -> Duration {
        Duration::seconds(self.clock_skew_secs.clamp(0, MAX_CLOCK_SKEW_SECS))
    }

    /// Local session lifetime.
    #[must_use]
    pub fn session_lifetime(&self) -> Duration {
        Duration::seconds(self.session_lifetime_secs.clamp(1, MAX_SESSION_LIFETIME_SECS))
    }
}

fn validate_url(key: &str, value: &str) -> Result<()> {
    let parsed = url::Url::parse(value).map_err(|e| Error::InvalidConfig {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::InvalidConfig {
            key: key.to_string(),
            reason: format!("unsupported scheme {other}"),
        }),
    }
}

fn parse_number<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    get(key).map_or(Ok(default), |raw| {
        raw.parse().map_err(|e: T::Err| Error::InvalidConfig {
            key: key.to_string(),
            reason: e.to_string(),
        })
    })
}

fn check_range(key: &str, value: i64, min: i64, max: i64) -> Result<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(Error::InvalidConfig {
            key: key.into(),
            reason: format!("must be between {min} and {max}"),
        })
    }
}

fn parse_bool<G>(get: &G, key: &str, default: bool) -> Result<bool>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.to_ascii_lowercase()).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(Error::InvalidConfig {
            key: key.to_string(),
            reason: format!("expected a boolean, got {other:?}"),
        }),
    }
}
