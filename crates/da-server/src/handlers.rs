//! Request handlers.

use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use da_protocol_saml::bindings::HttpPostBinding;
use da_protocol_saml::{AuthnRequest, SamlError};
use da_session::{new_session_id, SessionAuthState, SessionError};
use serde::Deserialize;

use crate::cookie;
use crate::pages::{self, IndexTemplate};
use crate::state::AppState;

/// Form posted by the identity provider to the assertion consumer service.
#[derive(Debug, Deserialize)]
pub struct AcsForm {
    /// Base64 encoded `samlp:Response`.
    #[serde(rename = "SAMLResponse")]
    pub saml_response: String,
    /// Opaque value echoed by the identity provider.
    #[serde(rename = "RelayState")]
    pub relay_state: Option<String>,
}

/// `GET /`
///
/// Anonymous users are redirected to the identity provider with a fresh
/// `AuthnRequest`. Signed-in users get the status page.
pub async fn index(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session_id = cookie::session_id(&headers);
    let auth = match load_session(&state, session_id.as_deref()).await {
        Ok(auth) => auth,
        Err(e) => return session_error(&state, &e),
    };

    match auth.identity() {
        Some(identity) => pages::render(
            StatusCode::OK,
            &IndexTemplate {
                user: identity.principal().to_string(),
                access_group: state.config.access_group.clone(),
                has_access: identity.is_member_of(&state.config.access_group),
                group_count: identity.groups().len(),
            },
        ),
        None => redirect_to_idp(&state),
    }
}

/// `POST /saml/acs`
///
/// Validates the posted response and starts a new session on success.
pub async fn acs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<AcsForm>,
) -> Response {
    let response = match HttpPostBinding::decode_response(
        &form.saml_response,
        form.relay_state.as_deref(),
    )
    .and_then(|message| state.validator.validate(&message.xml))
    {
        Ok(response) => response,
        Err(e) => return saml_error(&state, &e),
    };

    let mut auth = SessionAuthState::Anonymous;
    if let Err(e) = auth.login(&response, &state.login_policy, state.clock.now()) {
        return session_error(&state, &e);
    }

    // A fresh id on every login, so a planted cookie never becomes authenticated.
    if let Some(old) = cookie::session_id(&headers) {
        if let Err(e) = state.sessions.remove(&old).await {
            tracing::warn!(error = %e, "failed to remove previous session");
        }
    }
    let session_id = new_session_id();
    if let Err(e) = state.sessions.save(&session_id, &auth).await {
        return session_error(&state, &e);
    }

    let max_age = state.login_policy.lifetime.num_seconds();
    let set_cookie = cookie::session_cookie(&session_id, max_age, state.config.secure_cookies);
    ([(SET_COOKIE, set_cookie)], Redirect::to("/")).into_response()
}

/// `GET /saml/logout`
///
/// Ends the session and redirects to the configured logout URL.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(session_id) = cookie::session_id(&headers) {
        let stored = match state.sessions.load(&session_id).await {
            Ok(mut auth) => {
                auth.logout();
                state.sessions.save(&session_id, &auth).await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = stored {
            tracing::warn!(error = %e, "failed to end session on logout");
            if let Err(e) = state.sessions.remove(&session_id).await {
                tracing::warn!(error = %e, "failed to remove session on logout");
            }
        }
    }

    let target = state.config.logout_url.as_deref().unwrap_or("/");
    let clear = cookie::clear_session_cookie(state.config.secure_cookies);
    ([(SET_COOKIE, clear)], Redirect::to(target)).into_response()
}

/// `GET /isAlive`
pub async fn is_alive() -> StatusCode {
    StatusCode::OK
}

/// `GET /isReady`
pub async fn is_ready() -> StatusCode {
    StatusCode::OK
}

/// Loads the session and drops it if it has expired.
async fn load_session(
    state: &AppState,
    session_id: Option<&str>,
) -> Result<SessionAuthState, SessionError> {
    let Some(session_id) = session_id else {
        return Ok(SessionAuthState::Anonymous);
    };
    let mut auth = state.sessions.load(session_id).await?;
    if auth.expire_if_due(state.clock.now()) {
        state.sessions.remove(session_id).await?;
    }
    Ok(auth)
}

fn redirect_to_idp(state: &AppState) -> Response {
    let config = &state.config;
    let mut request = AuthnRequest::new(config.issuer_entity_id.as_str())
        .with_destination(config.login_url.as_str());
    if let Some(acs_url) = &config.acs_url {
        request = request.with_acs_url(acs_url.as_str());
    }

    match request.redirect_url(&config.login_url, None) {
        Ok(url) => {
            tracing::debug!(request_id = %request.id, "redirecting to identity provider");
            Redirect::to(&url).into_response()
        }
        Err(e) => saml_error(state, &e),
    }
}

fn saml_error(state: &AppState, error: &SamlError) -> Response {
    let status =
        StatusCode::from_u16(error.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    pages::error_page(status, &error.to_string(), state.config.debug)
}

fn session_error(state: &AppState, error: &SessionError) -> Response {
    tracing::warn!(error = %error, "session error");
    let status =
        StatusCode::from_u16(error.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    pages::error_page(status, &error.to_string(), state.config.debug)
}
