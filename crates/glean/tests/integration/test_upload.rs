//! Upload retries, failure accounting and the HTTP uploader

use std::time::Duration;

use wiremock::matchers::{header, method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use glean::domain::PingType;
use glean::internal_metrics;
use glean::metrics::{LabeledCounterMetric, PingHandle};
use glean::Glean;
use glean_core::ports::UploadResult;

use crate::common::{eventually, start, test_config, RecordingUploader};

async fn upload_failures(glean: &Glean, label: &str) -> Option<i32> {
    LabeledCounterMetric::new(glean, internal_metrics::ping_upload_failure(), None)
        .get(label)
        .test_get_value(None)
        .await
}

#[tokio::test]
async fn recoverable_failures_are_retried_then_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let glean = Glean::new();
    let uploader = RecordingUploader::always(UploadResult::RecoverableFailure { retry_after: None });
    start(&glean, test_config(dir.path()).build(), uploader.clone()).await;
    let probe = PingHandle::new(&glean, PingType::new("probe").with_send_if_empty(true));

    probe.submit(None);

    let attempts = uploader.wait_for("probe", 3).await;
    assert!(attempts.iter().all(|r| r.document_id == attempts[0].document_id));

    let glean = &glean;
    let counted = eventually(move || async move {
        upload_failures(glean, "recoverable").await.filter(|n| *n == 1)
    })
    .await;
    assert_eq!(counted, Some(1));
    assert!(glean.test_get_pending_pings().await.is_empty());
    assert_eq!(uploader.requests_for("probe").len(), 3);
}

#[tokio::test]
async fn transient_failure_then_success_delivers_once() {
    let dir = tempfile::tempdir().unwrap();
    let glean = Glean::new();
    let uploader = RecordingUploader::scripted(vec![
        UploadResult::RecoverableFailure { retry_after: None },
        UploadResult::RecoverableFailure { retry_after: None },
    ]);
    start(&glean, test_config(dir.path()).build(), uploader.clone()).await;
    let probe = PingHandle::new(&glean, PingType::new("probe").with_send_if_empty(true));

    probe.submit(None);

    uploader.wait_for("probe", 3).await;
    let glean = &glean;
    let drained = eventually(move || async move {
        glean.test_get_pending_pings().await.is_empty().then_some(())
    })
    .await;
    assert!(drained.is_some());
    assert_eq!(upload_failures(glean, "recoverable").await, None);
}

#[tokio::test]
async fn unrecoverable_failures_are_dropped_and_counted() {
    let dir = tempfile::tempdir().unwrap();
    let glean = Glean::new();
    let uploader = RecordingUploader::always(UploadResult::UnrecoverableFailure { status: 400 });
    start(&glean, test_config(dir.path()).build(), uploader.clone()).await;
    let probe = PingHandle::new(&glean, PingType::new("probe").with_send_if_empty(true));

    probe.submit(None);
    probe.submit(None);

    uploader.wait_for("probe", 2).await;
    let glean = &glean;
    let counted = eventually(move || async move {
        upload_failures(glean, "unrecoverable").await.filter(|n| *n == 2)
    })
    .await;
    assert_eq!(counted, Some(2));
    assert_eq!(uploader.requests_for("probe").len(), 2);
}

#[tokio::test]
async fn pending_pings_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let glean = Glean::new();
    let failing = RecordingUploader::always(UploadResult::RecoverableFailure {
        retry_after: Some(Duration::from_secs(60)),
    });
    start(&glean, test_config(dir.path()).build(), failing.clone()).await;
    let probe = PingHandle::new(&glean, PingType::new("probe").with_send_if_empty(true));

    probe.submit(None);
    let first = failing.wait_for("probe", 1).await;
    let document_id = first[0].document_id.clone();
    glean.test_destroy_glean(false).await;

    let working = RecordingUploader::new();
    start(&glean, test_config(dir.path()).build(), working.clone()).await;

    let delivered = working.wait_for("probe", 1).await;
    assert_eq!(delivered[0].document_id, document_id);
    assert_eq!(failing.requests_for("probe").len(), 1);
}

#[tokio::test]
async fn http_uploader_posts_to_the_submission_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/submit/org-example-test/probe/1/[0-9a-f-]{36}$"))
        .and(header("Content-Type", "application/json; charset=utf-8"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let glean = Glean::new();
    let config = test_config(dir.path()).server_endpoint(server.uri()).build();
    glean
        .initialize_with_http_uploader(config)
        .await
        .expect("initialize");
    let probe = PingHandle::new(&glean, PingType::new("probe").with_send_if_empty(true));

    probe.submit(None);

    let server_ref = &server;
    let received = eventually(move || async move {
        let requests = server_ref.received_requests().await.unwrap_or_default();
        requests
            .into_iter()
            .find(|r| r.url.path().starts_with("/submit/org-example-test/probe/"))
    })
    .await
    .expect("probe ping reached the server");
    let body: serde_json::Value = serde_json::from_slice(&received.body).unwrap();
    assert_eq!(body["ping_info"]["seq"], 0);
    assert!(received.headers.get("Date").is_some());

    glean.shutdown().await;
    server.verify().await;
}

#[tokio::test]
async fn http_rejection_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/submit/org-example-test/probe/"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let glean = Glean::new();
    let config = test_config(dir.path()).server_endpoint(server.uri()).build();
    glean
        .initialize_with_http_uploader(config)
        .await
        .expect("initialize");
    let probe = PingHandle::new(&glean, PingType::new("probe").with_send_if_empty(true));

    probe.submit(None);

    let glean = &glean;
    let counted = eventually(move || async move {
        upload_failures(glean, "unrecoverable").await.filter(|n| *n >= 1)
    })
    .await;
    assert_eq!(counted, Some(1));
    assert!(glean.test_get_pending_pings().await.is_empty());
    glean.shutdown().await;
    server.verify().await;
}
