//! Upload size limit tests.
//!
//! Driven in-process through `tower::ServiceExt::oneshot` so the oversized
//! body never races a closed socket.

#![cfg(unix)]

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::TestHarness;
use sc_av::testing::FakeTools;
use sc_core::config::Config;
use sc_server::router::build_router;
use tower::ServiceExt;

const BOUNDARY: &str = "stillcast-test-boundary";

fn multipart_body(image: &[u8], audio: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    for (field, file_name, data) in [("image", "a.png", image), ("audio", "b.mp3", audio)] {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(body: Vec<u8>) -> Request<Body> {
    Request::post("/api/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn oversized_upload_is_413() {
    let mut config = Config::default();
    config.server.max_upload_bytes = 1024;
    let harness = TestHarness::with_tools(FakeTools::working(), config);
    let app = build_router(harness.ctx.clone(), None);

    let response = app
        .oneshot(upload_request(multipart_body(&[0u8; 8 * 1024], b"audio")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let json = json_body(response).await;
    assert_eq!(json["code"], "payload_too_large");
    assert!(json["request_id"].is_string());

    assert!(TestHarness::files_in(&harness.upload_dir()).is_empty());
    assert!(TestHarness::files_in(&harness.output_dir()).is_empty());
}

#[tokio::test]
async fn upload_within_limit_is_accepted() {
    let mut config = Config::default();
    config.server.max_upload_bytes = 64 * 1024;
    let harness = TestHarness::with_tools(FakeTools::working(), config);
    let app = build_router(harness.ctx.clone(), None);

    let response = app
        .oneshot(upload_request(multipart_body(&[7u8; 8 * 1024], b"audio")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["display_name"], "b");
}

#[tokio::test]
async fn client_request_id_appears_in_error_body() {
    let harness = TestHarness::new();
    let app = build_router(harness.ctx.clone(), None);

    let response = app
        .oneshot(
            Request::get("/api/artifacts/missing")
                .header("x-request-id", "trace-me")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()["x-request-id"], "trace-me");

    let json = json_body(response).await;
    assert_eq!(json["request_id"], "trace-me");
    assert_eq!(json["code"], "not_found");
}
