//! Router configuration.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Creates the application router.
pub fn create_router(state: AppState) -> Router {
    let health = Router::new()
        .route("/isAlive", get(handlers::is_alive))
        .route("/isReady", get(handlers::is_ready));

    let app = Router::new()
        .route("/", get(handlers::index))
        .route("/saml/acs", post(handlers::acs))
        .route("/saml/logout", get(handlers::logout))
        .with_state(state);

    app.merge(health).layer(TraceLayer::new_for_http())
}
