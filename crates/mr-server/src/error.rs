//! Error-to-HTTP response conversion.
//!
//! Route handlers return `Result<Response, AppError>`. [`classify`] decides
//! whether an error becomes a reply or is swallowed; only 5xx replies are
//! logged at error level.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use mr_core::Error;
use serde_json::json;

/// What to do with an error that reached the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Send an error response with this status.
    Reply(StatusCode),
    /// Expected peer disconnect: nothing useful can be sent.
    Swallow,
}

/// Classify an error for the HTTP boundary.
pub fn classify(err: &Error) -> Disposition {
    if err.is_disconnect() {
        return Disposition::Swallow;
    }
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    Disposition::Reply(status)
}

/// Wrapper so we can implement `IntoResponse` for an external type.
pub struct AppError {
    inner: Error,
    request_id: Option<String>,
}

impl AppError {
    pub fn new(inner: Error) -> Self {
        Self {
            inner,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, id: String) -> Self {
        self.request_id = Some(id);
        self
    }

    pub fn inner(&self) -> &Error {
        &self.inner
    }
}

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        Self::new(e)
    }
}

fn error_code(err: &Error) -> &'static str {
    match err {
        Error::InvalidToken(_) => "invalid_token",
        Error::ObjectNotFound(_) => "not_found",
        Error::RangeNotSatisfiable { .. } => "range_not_satisfiable",
        Error::PeerDisconnect(_) => "peer_disconnect",
        Error::Validation(_) => "validation_error",
        Error::Config(_) => "config_error",
        Error::Upstream { .. } => "upstream_error",
        Error::Database { .. } => "database_error",
        Error::Io { .. } => "io_error",
        Error::Internal(_) => "internal_error",
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match classify(&self.inner) {
            Disposition::Swallow => {
                tracing::debug!(error = %self.inner, "Peer went away; dropping response");
                return StatusCode::NO_CONTENT.into_response();
            }
            Disposition::Reply(status) => status,
        };

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                error = %self.inner,
                request_id = self.request_id.as_deref().unwrap_or("-"),
                "Server error in stream handler"
            );
        }

        let body = json!({
            "error": self.inner.to_string(),
            "code": error_code(&self.inner),
            "request_id": self.request_id,
        });

        let mut response = (status, axum::Json(body)).into_response();
        if let Error::RangeNotSatisfiable { total_size } = &self.inner {
            if let Ok(value) = HeaderValue::from_str(&format!("bytes */{total_size}")) {
                response.headers_mut().insert(header::CONTENT_RANGE, value);
            }
        }
        response
    }
}
