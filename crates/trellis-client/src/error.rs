//! Core client error types.

use thiserror::Error;

/// Errors from the Core API client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid Core API URL: {0}")]
    Url(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("credentials exchange failed ({status}): {body}")]
    Connect { status: u16, body: String },

    #[error("unauthorized after token refresh")]
    Unauthorized,

    #[error("Core API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Result type for Core client operations.
pub type ClientResult<T> = std::result::Result<T, ClientError>;
