//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use trellis_store::StoreError;

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
    /// Digest the client declared (digest mismatch only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provided: Option<String>,
    /// Digest the server computed (digest mismatch only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub computed: Option<String>,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("digest mismatch: provided {provided}, computed {computed}")]
    DigestMismatch { provided: String, computed: String },

    #[error("client closed request")]
    ClientClosedRequest,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("core client error: {0}")]
    Client(#[from] trellis_client::ClientError),

    #[error("core error: {0}")]
    Core(#[from] trellis_core::Error),
}

impl ApiError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::DigestMismatch { .. } => StatusCode::BAD_REQUEST,
            // Client-closed-request convention; http has no named constant
            Self::ClientClosedRequest => {
                StatusCode::from_u16(499).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Store(e) => match e {
                StoreError::NotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Client(_) => StatusCode::BAD_GATEWAY,
            Self::Core(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// The message exposed in the response body.
    ///
    /// Server-side failures stay generic; the full error is logged but
    /// internal paths never reach the caller.
    fn public_message(&self) -> String {
        match self {
            Self::DigestMismatch { .. } => "Digest mismatch".to_string(),
            Self::ClientClosedRequest => "client closed request".to_string(),
            Self::Internal(_) => "internal error".to_string(),
            Self::Store(StoreError::NotFound(_)) => "result not found".to_string(),
            Self::Store(_) => "internal error".to_string(),
            Self::Client(_) => "Core request failed".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let (provided, computed) = match &self {
            Self::DigestMismatch { provided, computed } => {
                (Some(provided.clone()), Some(computed.clone()))
            }
            _ => (None, None),
        };
        let body = ErrorResponse {
            error: self.public_message(),
            provided,
            computed,
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::Forbidden("nope".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(ApiError::ClientClosedRequest.status_code().as_u16(), 499);
        assert_eq!(
            ApiError::Store(StoreError::NotFound("j".into())).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::DigestMismatch {
                provided: "a".into(),
                computed: "b".into()
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_internal_detail_not_exposed() {
        let err = ApiError::Internal("/var/lib/trellis/results/job.json".into());
        assert_eq!(err.public_message(), "internal error");
    }
}
