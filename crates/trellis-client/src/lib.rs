//! Client for the external Core compute service.
//!
//! The gateway authenticates against Core with a client-credentials
//! exchange. The resulting bearer token is cached process-wide with an
//! expiry safety margin; a 401 from a protected endpoint forces exactly one
//! refresh-and-retry before the failure surfaces to the caller.

pub mod client;
pub mod error;
pub mod token;

pub use client::{ConnectResponse, CoreClient, CoreJob, SubmitJobRequest};
pub use error::{ClientError, ClientResult};
pub use token::TokenCache;
