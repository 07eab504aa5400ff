//! Result upload and retrieval handlers.

use crate::auth::{get_trace_id, require_upload_auth};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::body::Body;
use axum::extract::{Path, Request, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use serde::Serialize;
use trellis_core::hash::normalize_expected_digest;
use trellis_core::{Decision, JobId, authorize};

/// Successful upload response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResultResponse {
    pub job_id: String,
    pub path: String,
    pub sha256: String,
    pub stored: bool,
}

/// PUT /{job_id}/upload - Receive, verify and publish a job result.
///
/// The body is streamed to a staged temp file while the digest accumulates;
/// nothing is buffered in memory and nothing becomes visible at the final
/// path before the digest check passes.
#[tracing::instrument(skip(state, req), fields(job_id = %job_id))]
pub async fn upload_result(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    req: Request,
) -> ApiResult<Json<UploadResultResponse>> {
    let trace_id = get_trace_id(&req).cloned().unwrap_or_default();
    let auth = require_upload_auth(&req)?.clone();
    let job_id =
        JobId::parse(&job_id).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    // Identity check comes first: a mismatched grant is rejected before the
    // body is read or any file is created.
    if authorize(&auth.job_id, &job_id) == Decision::Deny {
        tracing::warn!(
            claim = %auth.job_id,
            job_id = %job_id,
            trace_id = %trace_id,
            "Upload grant does not match addressed job"
        );
        return Err(ApiError::Forbidden(
            "upload grant does not match job".to_string(),
        ));
    }

    let expected = req
        .headers()
        .get("digest")
        .and_then(|v| v.to_str().ok())
        .and_then(normalize_expected_digest);

    let mut staged = state.store.stage(&job_id).await?;
    let mut body = req.into_body().into_data_stream();

    while let Some(next) = body.next().await {
        match next {
            Ok(chunk) => staged.write(chunk).await?,
            Err(e) => {
                // The body stream only fails when the client goes away
                // mid-upload; a clean abort, not a server error.
                staged.abort().await?;
                tracing::info!(
                    job_id = %job_id,
                    trace_id = %trace_id,
                    reason = %e,
                    "Upload cancelled by client"
                );
                return Err(ApiError::ClientClosedRequest);
            }
        }
    }

    let sealed = staged.seal().await?;
    let computed = sealed.sha256().to_hex();
    let size = sealed.bytes_written();

    if let Some(provided) = expected
        && provided != computed
    {
        sealed.discard().await?;
        tracing::warn!(
            job_id = %job_id,
            trace_id = %trace_id,
            provided = %provided,
            computed = %computed,
            "Digest mismatch, result not published"
        );
        return Err(ApiError::DigestMismatch { provided, computed });
    }

    let (path, _) = sealed.publish().await?;
    tracing::info!(
        job_id = %job_id,
        trace_id = %trace_id,
        sha256 = %computed,
        size,
        "Result published"
    );

    Ok(Json(UploadResultResponse {
        job_id: job_id.to_string(),
        path: path.display().to_string(),
        sha256: computed,
        stored: true,
    }))
}

/// GET /v1/jobs/{job_id}/result - Stream a published result artifact.
#[tracing::instrument(skip(state), fields(job_id = %job_id))]
pub async fn get_result(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Response> {
    let job_id =
        JobId::parse(&job_id).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let stream = state.store.get_stream(&job_id).await?;

    Ok((
        [(header::CONTENT_TYPE, "application/json")],
        Body::from_stream(stream),
    )
        .into_response())
}
