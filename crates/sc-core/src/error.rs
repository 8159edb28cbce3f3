//! Unified error type for the stillcast application.
//!
//! All crates funnel their failures into [`Error`], which carries enough context
//! for API handlers to derive an HTTP status code via [`Error::http_status`].

use std::fmt;
use std::time::Duration;

/// Unified error type covering all failure modes in stillcast.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required upload field was absent or had an empty filename.
    #[error("Missing field: {0}")]
    MissingField(String),

    /// An upload's extension is not in the field's allow-list.
    #[error("Invalid format for {field}: {message}")]
    InvalidFormat {
        /// The upload field that was rejected (e.g. "image").
        field: String,
        /// Human-readable description of what was wrong.
        message: String,
    },

    /// Request data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The request body exceeded the configured upload limit.
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "artifact").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// Audio metadata could not be read.
    #[error("Probe error: {0}")]
    Probe(String),

    /// A processing stage exceeded its time budget and was terminated.
    #[error("Stage {stage} timed out after {}ms", after.as_millis())]
    TranscodeTimedOut {
        /// The stage that was cancelled.
        stage: String,
        /// The budget that was exceeded.
        after: Duration,
    },

    /// The external transcoder exited with a non-zero status.
    #[error("Stage {stage} failed: {diagnostic}")]
    TranscodeFailed {
        /// The stage that failed.
        stage: String,
        /// Captured standard error of the tool.
        diagnostic: String,
    },

    /// An external tool is missing or could not be started.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::MissingField(_) => 400,
            Error::InvalidFormat { .. } => 400,
            Error::Validation(_) => 400,
            Error::PayloadTooLarge(_) => 413,
            Error::NotFound { .. } => 404,
            Error::Probe(_) => 422,
            Error::TranscodeTimedOut { .. } => 503,
            Error::TranscodeFailed { .. } => 500,
            Error::Tool { .. } => 502,
            Error::Io { .. } => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Whether the failure was caused by the client's input rather than by
    /// the server or a budget.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::MissingField(_)
                | Error::InvalidFormat { .. }
                | Error::Validation(_)
                | Error::PayloadTooLarge(_)
                | Error::NotFound { .. }
        )
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::InvalidFormat`].
    pub fn invalid_format(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidFormat {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::TranscodeTimedOut`].
    pub fn timed_out(stage: impl Into<String>, after: Duration) -> Self {
        Error::TranscodeTimedOut {
            stage: stage.into(),
            after,
        }
    }

    /// Convenience constructor for [`Error::TranscodeFailed`].
    pub fn transcode_failed(stage: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        Error::TranscodeFailed {
            stage: stage.into(),
            diagnostic: diagnostic.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_display() {
        let err = Error::MissingField("audio".into());
        assert_eq!(err.to_string(), "Missing field: audio");
        assert_eq!(err.http_status(), 400);
        assert!(err.is_client_error());
    }

    #[test]
    fn invalid_format_display() {
        let err = Error::invalid_format("image", "extension 'gif' is not allowed");
        assert_eq!(
            err.to_string(),
            "Invalid format for image: extension 'gif' is not allowed"
        );
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn not_found_display() {
        let err = Error::not_found("artifact", "abc-123");
        assert_eq!(err.to_string(), "artifact not found: abc-123");
        assert_eq!(err.http_status(), 404);
    }

    #[test]
    fn payload_too_large_status() {
        let err = Error::PayloadTooLarge("body exceeds 10 bytes".into());
        assert_eq!(err.http_status(), 413);
    }

    #[test]
    fn probe_display() {
        let err = Error::Probe("no duration".into());
        assert_eq!(err.to_string(), "Probe error: no duration");
        assert_eq!(err.http_status(), 422);
        assert!(!err.is_client_error());
    }

    #[test]
    fn timed_out_is_not_a_failure() {
        let err = Error::timed_out("mux", Duration::from_secs(30));
        assert_eq!(err.to_string(), "Stage mux timed out after 30000ms");
        assert_eq!(err.http_status(), 503);
        assert!(!matches!(err, Error::TranscodeFailed { .. }));
    }

    #[test]
    fn transcode_failed_display() {
        let err = Error::transcode_failed("composite", "Invalid data found");
        assert_eq!(err.to_string(), "Stage composite failed: Invalid data found");
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn tool_display() {
        let err = Error::tool("ffmpeg", "not found");
        assert_eq!(err.to_string(), "Tool error [ffmpeg]: not found");
        assert_eq!(err.http_status(), 502);
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn internal_display() {
        let err = Error::Internal("unexpected state".into());
        assert_eq!(err.to_string(), "Internal error: unexpected state");
        assert_eq!(err.http_status(), 500);
    }
}
