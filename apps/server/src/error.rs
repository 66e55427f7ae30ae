use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response as HttpResponse};
use std::borrow::Cow;
use tracing::{debug, error};
use vanish::content::ContentError;
use vanish::domain::Response;

/// Everything a handler can answer with instead of a success envelope.
#[vanish_derive::vanish_error]
pub enum ApiError {
    #[error("{message}")]
    Unauthorized { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("{message}{}", format_context(.context))]
    BadRequest { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("{source}")]
    Content { source: ContentError, context: Option<Cow<'static, str>> },

    #[error("Unable to parse body{}: {source}", format_context(.context))]
    Multipart { source: MultipartError, context: Option<Cow<'static, str>> },

    #[error("Response could not be built{}: {source}", format_context(.context))]
    Http { source: axum::http::Error, context: Option<Cow<'static, str>> },
}

impl ApiError {
    pub(crate) fn unauthorized(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Unauthorized { message: message.into(), context: None }
    }

    pub(crate) fn bad_request(message: impl Into<Cow<'static, str>>) -> Self {
        Self::BadRequest { message: message.into(), context: None }
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::BadRequest { .. } | Self::Multipart { .. } => StatusCode::BAD_REQUEST,
            Self::Content { source, .. } if source.is_validation() => StatusCode::BAD_REQUEST,
            Self::Content { source, .. } if source.is_not_found() => StatusCode::NOT_FOUND,
            Self::Content { .. } | Self::Http { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> HttpResponse {
        let status = self.status();
        let message = if status.is_server_error() {
            error!(error = %self, "Request failed");
            "Internal server error".to_owned()
        } else {
            debug!(error = %self, %status, "Request rejected");
            self.to_string()
        };

        (status, Json(Response::error(status.as_u16(), message))).into_response()
    }
}
