//! HTTP gateway for scaffold compute job results.
//!
//! This crate provides the HTTP surface:
//! - Result upload with streamed digest verification and atomic publish
//! - Job submission proxied to the Core compute service
//! - Result download streaming
//! - Health check

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use auth::{TraceId, UploadGrants};
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
