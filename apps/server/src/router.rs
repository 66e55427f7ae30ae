use crate::handlers::{forms, health, uploads};
use crate::state::ApiState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Prefix of the JSON API.
pub const API_PREFIX: &str = "/api/v1";

#[allow(unreachable_pub)]
pub fn init(state: ApiState) -> Router {
    let body_limit = state.config.server.body_limit;

    let api = Router::new()
        .route("/uploads", get(uploads::list).post(uploads::create))
        .route("/uploads/{id}", get(uploads::describe).put(uploads::modify).delete(uploads::delete))
        .route("/uploads/{id}/file", get(uploads::fetch))
        .route("/forms", get(forms::list).post(forms::create))
        .route("/forms/{id}", get(forms::describe).delete(forms::delete));

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/download/{id}/{file}", get(uploads::download))
        .route("/form/{id}", get(forms::describe))
        .nest(API_PREFIX, api)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
