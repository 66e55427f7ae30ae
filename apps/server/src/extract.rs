use crate::error::ApiError;
use crate::state::ApiState;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use vanish::domain::ApiContext;

/// The caller's API context, read from the configured header or, when the
/// header is absent, from `server.default_context`.
#[derive(Debug, Clone)]
pub struct Tenant(pub ApiContext);

impl FromRequestParts<ApiState> for Tenant {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &ApiState) -> Result<Self, Self::Rejection> {
        let server = &state.config.server;
        let raw = match parts.headers.get(server.context_header.as_str()) {
            Some(value) => value
                .to_str()
                .map(str::to_owned)
                .map_err(|_| ApiError::bad_request("Invalid api context provided!"))?,
            None => server.default_context.clone().ok_or_else(|| ApiError::unauthorized("No api context provided!"))?,
        };

        ApiContext::new(raw).map(Self).map_err(|_| ApiError::unauthorized("No api context provided!"))
    }
}
