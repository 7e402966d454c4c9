//! Upload outcome mapping against a mock endpoint

use std::time::Duration;

use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use glean_core::ports::{IPingUploader, UploadResult};
use glean_net::HttpUploader;

use crate::common::{ping_request, setup_uploader};

#[tokio::test]
async fn success_posts_body_and_headers() {
    let (server, uploader) = setup_uploader().await;

    Mock::given(method("POST"))
        .and(path("/submit/glean-app/custom/1/doc-1"))
        .and(header("Content-Type", "application/json; charset=utf-8"))
        .and(header("X-Debug-ID", "test-tag"))
        .and(body_json(serde_json::json!({"ping_info": {"seq": 0}})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let result = uploader.send(&ping_request("doc-1")).await;
    assert_eq!(result, UploadResult::Success { status: 200 });
}

#[tokio::test]
async fn client_error_is_unrecoverable() {
    let (server, uploader) = setup_uploader().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let result = uploader.send(&ping_request("doc-2")).await;
    assert_eq!(result, UploadResult::UnrecoverableFailure { status: 400 });
}

#[tokio::test]
async fn server_error_is_recoverable() {
    let (server, uploader) = setup_uploader().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let result = uploader.send(&ping_request("doc-3")).await;
    assert_eq!(result, UploadResult::RecoverableFailure { retry_after: None });
}

#[tokio::test]
async fn throttling_honours_retry_after() {
    let (server, uploader) = setup_uploader().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "12"))
        .mount(&server)
        .await;

    let result = uploader.send(&ping_request("doc-4")).await;
    assert_eq!(
        result,
        UploadResult::RecoverableFailure {
            retry_after: Some(Duration::from_secs(12))
        }
    );
}

#[tokio::test]
async fn unreachable_server_is_recoverable() {
    // Nothing listens on port 9 (discard) on test machines
    let uploader = HttpUploader::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
    let result = uploader.send(&ping_request("doc-5")).await;
    assert_eq!(result, UploadResult::RecoverableFailure { retry_after: None });
}

#[tokio::test]
async fn trailing_slash_in_endpoint_is_ignored() {
    let uploader = HttpUploader::new("https://example.com/", Duration::from_secs(1)).unwrap();
    assert_eq!(
        uploader.url_for(&ping_request("doc-6")),
        "https://example.com/submit/glean-app/custom/1/doc-6"
    );
}
