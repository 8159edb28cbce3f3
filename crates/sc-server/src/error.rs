//! Error-to-HTTP response conversion.
//!
//! Route handlers return `Result<T, AppError>`; every failure becomes a
//! structured `{"error", "code", "request_id"}` JSON body with the status
//! from [`sc_core::Error::http_status`].

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::middleware::request_id::RequestId;

/// Seconds a client is asked to wait before resubmitting a timed-out job.
pub const RETRY_AFTER_SECS: u32 = 30;

/// Wrapper so we can implement `IntoResponse` for an external type.
#[derive(Debug)]
pub struct AppError {
    inner: sc_core::Error,
    request_id: Option<String>,
}

impl AppError {
    pub fn new(inner: sc_core::Error) -> Self {
        Self {
            inner,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, id: String) -> Self {
        self.request_id = Some(id);
        self
    }

    pub fn inner(&self) -> &sc_core::Error {
        &self.inner
    }
}

impl From<sc_core::Error> for AppError {
    fn from(e: sc_core::Error) -> Self {
        Self::new(e)
    }
}

/// Attach the request id to an error on its way out of a handler.
pub trait WithRequestId<T> {
    fn for_request(self, id: &RequestId) -> Result<T, AppError>;
}

impl<T> WithRequestId<T> for sc_core::Result<T> {
    fn for_request(self, id: &RequestId) -> Result<T, AppError> {
        self.map_err(|e| AppError::new(e).with_request_id(id.0.clone()))
    }
}

/// Stable machine-readable code for each error variant.
pub fn error_code(err: &sc_core::Error) -> &'static str {
    match err {
        sc_core::Error::MissingField(_) => "missing_field",
        sc_core::Error::InvalidFormat { .. } => "invalid_format",
        sc_core::Error::Validation(_) => "validation_error",
        sc_core::Error::PayloadTooLarge(_) => "payload_too_large",
        sc_core::Error::NotFound { .. } => "not_found",
        sc_core::Error::Probe(_) => "probe_error",
        sc_core::Error::TranscodeTimedOut { .. } => "transcode_timed_out",
        sc_core::Error::TranscodeFailed { .. } => "transcode_failed",
        sc_core::Error::Tool { .. } => "tool_error",
        sc_core::Error::Io { .. } => "io_error",
        sc_core::Error::Internal(_) => "internal_error",
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.inner.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let timed_out = matches!(self.inner, sc_core::Error::TranscodeTimedOut { .. });

        if timed_out {
            tracing::warn!(
                status = %status,
                error = %self.inner,
                "Processing stage timed out"
            );
        } else if self.inner.is_client_error() {
            tracing::debug!(status = %status, error = %self.inner, "Client error");
        } else {
            tracing::error!(
                status = %status,
                error = %self.inner,
                "Request failed in processing"
            );
        }

        let body = json!({
            "error": self.inner.to_string(),
            "code": error_code(&self.inner),
            "request_id": self.request_id,
        });

        let mut response = (status, axum::Json(body)).into_response();
        if timed_out {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECS));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn not_found_produces_404() {
        let err = AppError::new(sc_core::Error::not_found("video", "abc"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn missing_field_produces_400() {
        let err = AppError::new(sc_core::Error::MissingField("audio".into()));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn timeout_is_503_with_retry_after() {
        let err = AppError::new(sc_core::Error::timed_out("mux", Duration::from_secs(30)));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            &RETRY_AFTER_SECS.to_string()
        );
    }

    #[test]
    fn transcode_failure_has_no_retry_after() {
        let err = AppError::new(sc_core::Error::transcode_failed("mux", "boom"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }

    #[test]
    fn with_request_id() {
        let err = AppError::new(sc_core::Error::Internal("oops".into()))
            .with_request_id("req-123".into());
        assert_eq!(err.request_id.as_deref(), Some("req-123"));
    }

    #[test]
    fn for_request_attaches_id() {
        let res: sc_core::Result<()> = Err(sc_core::Error::Probe("bad".into()));
        let err = res.for_request(&RequestId("req-9".into())).unwrap_err();
        assert_eq!(err.request_id.as_deref(), Some("req-9"));
        assert_eq!(error_code(err.inner()), "probe_error");
    }
}
