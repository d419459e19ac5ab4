//! Request-level aborts and per-level loader failures

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use strata_wire::ErrorPayload;
use thiserror::Error;

/// Replaces the whole response, bypassing the stream and document machinery
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestAbort {
    #[error("not found")]
    NotFound,

    #[error("redirect to {location} ({status})")]
    Redirect { location: String, status: u16 },

    #[error("authentication required")]
    Unauthenticated,

    #[error("forbidden")]
    Forbidden,

    #[error("internal error: {0}")]
    Internal(String),
}

impl RequestAbort {
    /// Temporary (302) redirect
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::Redirect {
            location: location.into(),
            status: 302,
        }
    }

    /// Redirect with an explicit 3xx status
    pub fn redirect_with(location: impl Into<String>, status: u16) -> Self {
        Self::Redirect {
            location: location.into(),
            status,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            RequestAbort::NotFound => StatusCode::NOT_FOUND,
            RequestAbort::Redirect { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(StatusCode::is_redirection)
                .unwrap_or(StatusCode::FOUND),
            RequestAbort::Unauthenticated => StatusCode::UNAUTHORIZED,
            RequestAbort::Forbidden => StatusCode::FORBIDDEN,
            RequestAbort::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RequestAbort {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match self {
            RequestAbort::Redirect { location, .. } => match HeaderValue::from_str(&location) {
                Ok(value) => (status, [(header::LOCATION, value)]).into_response(),
                Err(_) => {
                    tracing::warn!("Dropping redirect to invalid location {:?}", location);
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            },
            other => (status, other.to_string()).into_response(),
        }
    }
}

/// What a preloader or loader returns as its error
#[derive(Debug, Clone, PartialEq)]
pub enum LoaderThrow {
    /// Abort the entire request
    Abort(RequestAbort),
    /// Fail only this level
    Failed(ErrorPayload),
}

impl LoaderThrow {
    pub fn failed(message: impl Into<String>) -> Self {
        LoaderThrow::Failed(ErrorPayload::new(message).with_name("LoaderError"))
    }

    pub fn not_found() -> Self {
        LoaderThrow::Abort(RequestAbort::NotFound)
    }

    pub fn redirect(location: impl Into<String>) -> Self {
        LoaderThrow::Abort(RequestAbort::redirect(location))
    }
}

impl From<RequestAbort> for LoaderThrow {
    fn from(abort: RequestAbort) -> Self {
        LoaderThrow::Abort(abort)
    }
}

impl From<ErrorPayload> for LoaderThrow {
    fn from(payload: ErrorPayload) -> Self {
        LoaderThrow::Failed(payload)
    }
}

impl From<anyhow::Error> for LoaderThrow {
    fn from(err: anyhow::Error) -> Self {
        // An abort wrapped in anyhow still aborts
        match err.downcast::<RequestAbort>() {
            Ok(abort) => LoaderThrow::Abort(abort),
            Err(err) => LoaderThrow::Failed(ErrorPayload::from(err)),
        }
    }
}

impl From<serde_json::Error> for LoaderThrow {
    fn from(err: serde_json::Error) -> Self {
        LoaderThrow::Failed(ErrorPayload::new(err.to_string()).with_name("SerializationError"))
    }
}

/// Result of a preloader or loader
pub type LoadResult<T> = Result<T, LoaderThrow>;
