//! HTTP endpoints.

use askama::Template;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use ipmi_exporter_core::exposition;
use std::sync::Arc;
use tracing::warn;

use crate::state::AppState;

/// Landing page template.
#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate<'a> {
    metrics_path: &'a str,
}

/// Creates the web router.
///
/// The landing page is only served when metrics live somewhere other than `/`.
pub fn create_router(state: Arc<AppState>) -> Router {
    let metrics_path = state.metrics_path().to_string();
    let mut router: Router<Arc<AppState>> = Router::new().route(&metrics_path, get(metrics));
    if metrics_path != "/" {
        router = router.route("/", get(index));
    }
    router.with_state(state)
}

/// GET / - Landing page
async fn index(State(state): State<Arc<AppState>>) -> Response {
    let template = IndexTemplate {
        metrics_path: state.metrics_path(),
    };
    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render page: {}", e),
        )
            .into_response(),
    }
}

/// GET <metrics path> - Prometheus text exposition
async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.scrape().await {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, exposition::content_type())],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
                .into_response()
        }
    }
}
