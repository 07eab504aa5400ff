//! Authentication middleware and upload grants.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use tracing::Instrument;
use trellis_core::{ContentHash, JobId};
use uuid::Uuid;

/// Maximum length for trace IDs.
/// Longer trace IDs are truncated to prevent log bloat and potential log injection.
const MAX_TRACE_ID_LEN: usize = 128;

/// Trace ID for request correlation.
#[derive(Clone, Debug)]
pub struct TraceId(pub String);

impl TraceId {
    /// Generate a new random trace ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create a trace ID from a client-provided value.
    /// The value is sanitized: truncated to MAX_TRACE_ID_LEN characters and non-printable characters removed.
    pub fn from_client(value: &str) -> Self {
        let sanitized: String = value
            .chars()
            .take(MAX_TRACE_ID_LEN)
            .filter(|c| c.is_ascii_graphic() || *c == ' ')
            .collect();

        if sanitized.is_empty() {
            Self::new()
        } else {
            Self(sanitized)
        }
    }

    /// Get the trace ID as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Authenticated upload extension: the job the caller's grant is bound to.
#[derive(Clone, Debug)]
pub struct AuthenticatedUpload {
    /// Job id claim carried by the upload grant.
    pub job_id: JobId,
}

struct Grant {
    job_id: JobId,
    expires_at: Instant,
}

/// Process-wide registry of outstanding upload grants.
///
/// A grant is an opaque bearer token issued at job submission time and
/// bound to one job id. Only the SHA-256 of the token is kept. Grants live
/// in memory; a restart invalidates them and Core re-requests through job
/// submission.
#[derive(Clone, Default)]
pub struct UploadGrants {
    inner: Arc<RwLock<HashMap<String, Grant>>>,
}

impl UploadGrants {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new grant for a job, returning the raw bearer token.
    ///
    /// Expired entries are purged opportunistically on each issue.
    pub fn issue(&self, job_id: JobId, ttl: Duration) -> String {
        let raw = format!("trl_{}", Uuid::new_v4().simple());
        let hash = hash_token(&raw);
        let now = Instant::now();

        let mut grants = self.inner.write().unwrap_or_else(|e| e.into_inner());
        grants.retain(|_, grant| grant.expires_at > now);
        grants.insert(
            hash,
            Grant {
                job_id,
                expires_at: now + ttl,
            },
        );
        raw
    }

    /// Resolve a raw bearer token to its job id claim, honoring expiry.
    pub fn lookup(&self, raw: &str) -> Option<JobId> {
        let hash = hash_token(raw);
        let now = Instant::now();

        let grants = self.inner.read().unwrap_or_else(|e| e.into_inner());
        grants
            .get(&hash)
            .filter(|grant| grant.expires_at > now)
            .map(|grant| grant.job_id.clone())
    }
}

/// Extract bearer token from Authorization header.
/// Per RFC 6750, the "Bearer" scheme is case-insensitive.
fn extract_bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            if v.len() >= 7 && v[..7].eq_ignore_ascii_case("bearer ") {
                Some(&v[7..])
            } else {
                None
            }
        })
}

/// Extract trace ID from X-Trace-Id header or generate a new one.
fn extract_or_generate_trace_id(req: &Request) -> TraceId {
    req.headers()
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .map(TraceId::from_client)
        .unwrap_or_else(TraceId::new)
}

/// Hash a token for registry lookup.
fn hash_token(token: &str) -> String {
    ContentHash::compute(token.as_bytes()).to_hex()
}

/// Authentication middleware that resolves upload grants and sets up trace context.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let trace_id = extract_or_generate_trace_id(&req);
    let trace_id_str = trace_id.0.clone();
    req.extensions_mut().insert(trace_id);

    let claim = extract_bearer_token(&req).and_then(|token| state.grants.lookup(token));
    if let Some(job_id) = claim {
        req.extensions_mut().insert(AuthenticatedUpload { job_id });
    }

    // Run the request within a tracing span that includes the trace ID
    let response = next
        .run(req)
        .instrument(tracing::info_span!("request", trace_id = %trace_id_str))
        .await;

    Ok(response)
}

/// Require an upload grant (token must resolve to a claim).
pub fn require_upload_auth(req: &Request) -> ApiResult<&AuthenticatedUpload> {
    req.extensions()
        .get::<AuthenticatedUpload>()
        .ok_or_else(|| ApiError::Unauthorized("upload grant required".to_string()))
}

/// Get the trace ID from request extensions.
pub fn get_trace_id(req: &Request) -> Option<&TraceId> {
    req.extensions().get::<TraceId>()
}
