//! # da-session
//!
//! Per-browser session state.
//!
//! A session is either [`SessionAuthState::Anonymous`] or
//! [`SessionAuthState::Authenticated`]. The server moves a session into the
//! authenticated state only through [`SessionAuthState::login`], which takes
//! a [`SamlResponse`](da_protocol_saml::SamlResponse). That type can only be
//! produced by the response validator, so every session the server
//! authenticates has passed signature verification.
//!
//! Sessions are kept server side in a [`SessionStore`] keyed by an opaque
//! random id. The browser only ever holds that id.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod identity;
pub mod state;
pub mod store;

pub use error::{SessionError, SessionResult};
pub use identity::{LoginPolicy, SessionIdentity};
pub use state::SessionAuthState;
pub use store::{new_session_id, InMemorySessionStore, SessionStore};
