//! Integration tests for health and result retrieval endpoints.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::TestServer;
use tower::ServiceExt;

async fn get(router: &axum::Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::new().await;

    let (status, body) = get(&server.router, "/v1/health").await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_get_result_streams_published_artifact() {
    let server = TestServer::new().await;
    let payload = br#"{"pores":[{"volume":12.5}]}"#;

    // Publish through the upload endpoint
    let token = server.grant_for("job-1");
    let request = Request::builder()
        .method("PUT")
        .uri("/job-1/upload")
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::from(payload.to_vec()))
        .unwrap();
    let response = server.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (status, body) = get(&server.router, "/v1/jobs/job-1/result").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, payload);
}

#[tokio::test]
async fn test_get_result_absent_is_not_found() {
    let server = TestServer::new().await;

    let (status, body) = get(&server.router, "/v1/jobs/absent/result").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "result not found");
}

#[tokio::test]
async fn test_get_result_invalid_job_id_rejected() {
    let server = TestServer::new().await;

    let (status, _) = get(&server.router, "/v1/jobs/bad%20id/result").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
