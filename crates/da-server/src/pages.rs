//! HTML pages.

use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

/// Page shown to a signed-in user.
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    /// User principal name.
    pub user: String,
    /// The group that grants device access.
    pub access_group: String,
    /// Whether the user is a member of the access group.
    pub has_access: bool,
    /// Number of groups in the assertion.
    pub group_count: usize,
}

/// Generic error page.
#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    /// Message to show.
    pub error_message: String,
}

/// Renders a template with the given status.
pub fn render(status: StatusCode, template: &impl Template) -> Response {
    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            tracing::error!("Template render error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
        }
    }
}

/// Renders the error page.
///
/// `detail` is shown only when `debug` is set. Otherwise the page carries a
/// generic message.
pub fn error_page(status: StatusCode, detail: &str, debug: bool) -> Response {
    let error_message = if debug {
        detail.to_string()
    } else {
        "An error occurred".to_string()
    };
    render(status, &ErrorTemplate { error_message })
}
