//! Axum router construction.
//!
//! The [`app`] function wires every page and form endpoint to its handler
//! and returns a ready-to-serve [`axum::Router`].

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::handlers::{images, notes};
use crate::metrics::{metrics_handler, metrics_middleware};
use crate::AppState;

/// Value of the `server` response header.
const SERVER_NAME: &str = "blobnotes";

/// Build the axum [`Router`] with all routes.
///
/// `/metrics` is only mounted when `observability.metrics` is enabled.
pub fn app(state: Arc<AppState>) -> Router {
    let body_limit = state.config.server.max_upload_size;
    let metrics_enabled = state.config.observability.metrics;

    let mut router = Router::new()
        .route("/", get(notes::index).post(notes::create_note))
        .route("/delete/:id", post(notes::delete_note))
        .route("/upload", post(images::upload_image))
        .route("/delete_image/:name", post(images::delete_image))
        .route("/download_image/:name", get(images::download_image))
        .route("/health", get(health_check));

    if metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    router
        .with_state(state)
        // Inner layers run first, outer layers wrap them.
        .layer(middleware::from_fn(common_headers_middleware))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(body_limit))
}

// -- Common headers middleware -----------------------------------------------

/// 16-character uppercase hex request id.
pub fn generate_request_id() -> String {
    let bytes: [u8; 8] = rand::random();
    hex::encode(bytes).to_uppercase()
}

/// Adds `x-request-id` and `server` to every response.
async fn common_headers_middleware(req: Request<axum::body::Body>, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    if !headers.contains_key("x-request-id") {
        if let Ok(value) = HeaderValue::from_str(&generate_request_id()) {
            headers.insert("x-request-id", value);
        }
    }
    headers.insert("server", HeaderValue::from_static(SERVER_NAME));

    response
}

// -- Health check ------------------------------------------------------------

/// `GET /health` -- Returns `{"status": "ok"}` with 200 OK.
async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "application/json")],
        r#"{"status":"ok"}"#,
    )
}
