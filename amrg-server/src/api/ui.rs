//! UI serving routes
//!
//! Serves the static HTML/JS merge form

use axum::{
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};

use crate::AppState;

const INDEX_HTML: &str = include_str!("../ui/index.html");
const APP_JS: &str = include_str!("../ui/app.js");

/// Build UI routes
pub fn ui_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(serve_index))
        .route("/static/app.js", get(serve_app_js))
}

/// GET /
///
/// Serves the merge form with build identification filled in
pub async fn serve_index() -> Html<String> {
    Html(
        INDEX_HTML
            .replace("{{VERSION}}", env!("CARGO_PKG_VERSION"))
            .replace("{{GIT_HASH}}", env!("GIT_HASH"))
            .replace("{{BUILD_TIMESTAMP}}", env!("BUILD_TIMESTAMP")),
    )
}

/// GET /static/app.js
pub async fn serve_app_js() -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/javascript")],
        APP_JS,
    )
        .into_response()
}
