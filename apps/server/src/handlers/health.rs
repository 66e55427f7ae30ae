use axum::Json;
use axum::http::header;
use axum::response::IntoResponse;
use std::sync::LazyLock;
use std::time::Instant;
use vanish_derive::api_model;

#[api_model]
/// Health check response
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    /// Seconds since the first health check.
    uptime: u64,
}

static START_TIME: LazyLock<Instant> = LazyLock::new(Instant::now);

pub(crate) async fn health_handler() -> impl IntoResponse {
    let body = HealthResponse {
        status: "up",
        version: env!("CARGO_PKG_VERSION"),
        uptime: START_TIME.elapsed().as_secs(),
    };

    (
        [
            (header::CACHE_CONTROL, "no-store, no-cache, must-revalidate"),
            (header::PRAGMA, "no-cache"),
        ],
        Json(body),
    )
}
