//! Error-to-HTTP response conversion.
//!
//! Handlers return `Result<T, AppError>`; the wrapped error decides the
//! status code and a `{"error", "code"}` JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use nepenthe_common::Error;
use serde_json::json;

use crate::ingest::{IngestBusy, IngestError};

/// Wrapper so we can implement `IntoResponse` for the common error type.
#[derive(Debug)]
pub struct AppError {
    inner: Error,
}

impl AppError {
    pub fn new(inner: Error) -> Self {
        Self { inner }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.inner.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        Self::new(e)
    }
}

impl From<IngestBusy> for AppError {
    fn from(e: IngestBusy) -> Self {
        Self::new(Error::conflict(e.to_string()))
    }
}

impl From<IngestError> for AppError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::Busy(busy) => busy.into(),
            IngestError::Failed(e) => Self::new(Error::internal(format!("{e:#}"))),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                error = %self.inner,
                "Server error in API handler"
            );
        }

        let code = match &self.inner {
            Error::NotFound(_) => "not_found",
            Error::Database(_) => "database_error",
            Error::Io(_) => "io_error",
            Error::InvalidInput(_) => "invalid_input",
            Error::Conflict(_) => "conflict",
            Error::Internal(_) => "internal_error",
        };

        let body = json!({
            "error": self.inner.to_string(),
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
