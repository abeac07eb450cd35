//! Error types for amrg-server
//!
//! [`MergeError`] is what the pipeline returns; [`ApiError`] is what HTTP
//! handlers return and knows how to render itself as a JSON response.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Merge pipeline failure
///
/// Any variant aborts the whole request; no partial output is produced.
#[derive(Debug, Error)]
pub enum MergeError {
    /// The request carried no audio files
    #[error("No audio files provided for merging")]
    NoInput,

    /// Declared extension is not one of mp3/wav/ogg/flac/aac/m4a
    #[error("Unsupported format for {file_name}: '{extension}' (expected mp3, wav, ogg, flac, aac or m4a)")]
    UnsupportedFormat { file_name: String, extension: String },

    /// Codec missing or file corrupt
    #[error("Error loading file {file_name}: {reason}")]
    DecodeFailure { file_name: String, reason: String },

    /// MP3 encoding failed
    #[error("Error exporting MP3: {0}")]
    ExportFailure(String),

    /// Metadata malformed or tag serialization failed
    #[error("Error writing ID3 tags: {0}")]
    TagWriteFailure(String),
}

impl MergeError {
    /// Name of the upload this error is attributed to, if any
    pub fn file_name(&self) -> Option<&str> {
        match self {
            MergeError::UnsupportedFormat { file_name, .. }
            | MergeError::DecodeFailure { file_name, .. } => Some(file_name),
            _ => None,
        }
    }

    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            MergeError::NoInput => "NO_INPUT",
            MergeError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            MergeError::DecodeFailure { .. } => "DECODE_FAILURE",
            MergeError::ExportFailure(_) => "EXPORT_FAILURE",
            MergeError::TagWriteFailure(_) => "TAG_WRITE_FAILURE",
        }
    }
}

/// Result type for pipeline operations
pub type MergeResult<T> = Result<T, MergeError>;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Upload larger than the configured limit (413)
    #[error("Upload too large: {0}")]
    PayloadTooLarge(String),

    /// Pipeline failure, status depends on the kind
    #[error(transparent)]
    Merge(#[from] MergeError),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg)
            }
            ApiError::Merge(ref err) => {
                let status = match err {
                    MergeError::NoInput | MergeError::UnsupportedFormat { .. } => {
                        StatusCode::BAD_REQUEST
                    }
                    MergeError::DecodeFailure { .. } | MergeError::TagWriteFailure(_) => {
                        StatusCode::UNPROCESSABLE_ENTITY
                    }
                    MergeError::ExportFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.code(), err.to_string())
            }
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
