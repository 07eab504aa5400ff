//! Job submission handlers.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;
use trellis_client::SubmitJobRequest;
use trellis_core::JobId;

/// Job submission response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobResponse {
    pub job_id: String,
    pub status: String,
    /// Bearer token the compute worker presents when delivering the result.
    pub upload_token: String,
}

/// POST /v1/jobs - Submit a job to Core and issue an upload grant for it.
#[tracing::instrument(skip(state, request))]
pub async fn submit_job(
    State(state): State<AppState>,
    Json(request): Json<SubmitJobRequest>,
) -> ApiResult<(StatusCode, Json<SubmitJobResponse>)> {
    let job = state.core.submit_job(&request).await?;

    // Core assigns the id; an unusable one is a Core contract violation
    let job_id = JobId::parse(&job.job_id).map_err(|e| {
        ApiError::Internal(format!("Core returned invalid job id {:?}: {e}", job.job_id))
    })?;

    let upload_token = state
        .grants
        .issue(job_id.clone(), state.config.server.grant_ttl());

    tracing::info!(job_id = %job_id, status = %job.status, "Job submitted to Core");

    Ok((
        StatusCode::CREATED,
        Json(SubmitJobResponse {
            job_id: job_id.to_string(),
            status: job.status,
            upload_token,
        }),
    ))
}
