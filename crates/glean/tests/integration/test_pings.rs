//! Ping collection, headers and payload

use std::collections::{BTreeMap, HashSet};

use glean::domain::PingType;
use glean::metrics::{CounterMetric, PingHandle, StringMetric};
use glean::Glean;

use crate::common::{meta, setup, start, test_config, RecordingUploader};

#[tokio::test]
async fn every_submission_is_a_distinct_document() {
    let dir = tempfile::tempdir().unwrap();
    let (glean, uploader) = setup(dir.path()).await;
    let ping = PingHandle::new(&glean, PingType::new("custom").with_send_if_empty(true));

    for _ in 0..10 {
        ping.submit(None);
    }

    let sent = uploader.wait_for("custom", 10).await;
    let ids: HashSet<_> = sent.iter().map(|r| r.document_id.clone()).collect();
    assert_eq!(ids.len(), 10);

    let seqs: Vec<_> = sent
        .iter()
        .map(|r| r.body_json().unwrap()["ping_info"]["seq"].as_i64().unwrap())
        .collect();
    assert_eq!(seqs, (0..10).collect::<Vec<_>>());
}

#[tokio::test]
async fn empty_ping_is_not_sent() {
    let dir = tempfile::tempdir().unwrap();
    let (glean, uploader) = setup(dir.path()).await;
    let empty = PingHandle::new(&glean, PingType::new("empty"));
    let marker = PingHandle::new(&glean, PingType::new("marker").with_send_if_empty(true));

    empty.submit(None);
    marker.submit(None);

    // Uploads go out in submission order
    uploader.wait_for("marker", 1).await;
    assert!(uploader.requests_for("empty").is_empty());
}

#[tokio::test]
async fn unknown_and_disabled_pings_send_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let (glean, uploader) = setup(dir.path()).await;
    PingHandle::new(&glean, PingType::new("dormant").with_send_if_empty(true).with_enabled(false));
    let remote_off = PingHandle::new(&glean, PingType::new("remote_off").with_send_if_empty(true));
    let marker = PingHandle::new(&glean, PingType::new("marker").with_send_if_empty(true));

    assert!(glean.apply_server_knobs_config(r#"{"pings_enabled": {"remote_off": false}}"#));

    glean.submit_ping_by_name("never_registered", None);
    glean.submit_ping_by_name("dormant", None);
    remote_off.submit(None);
    marker.submit(None);

    uploader.wait_for("marker", 1).await;
    let names: Vec<_> = uploader.requests().into_iter().map(|r| r.ping_name).collect();
    assert!(!names.iter().any(|n| n == "never_registered"));
    assert!(!names.iter().any(|n| n == "dormant"));
    assert!(!names.iter().any(|n| n == "remote_off"));
}

#[tokio::test]
async fn request_carries_path_headers_and_sections() {
    let dir = tempfile::tempdir().unwrap();
    let (glean, uploader) = setup(dir.path()).await;
    let ping = PingHandle::new(
        &glean,
        PingType::new("custom").with_reason_codes(&["background"]),
    );
    let counter = CounterMetric::new(&glean, meta("visits", &["custom"]));

    counter.add(3);
    ping.submit(Some("background"));

    let sent = uploader.wait_for("custom", 1).await;
    let request = &sent[0];
    assert_eq!(
        request.path,
        format!("/submit/org-example-test/custom/1/{}", request.document_id)
    );
    assert_eq!(
        request.header("Content-Type"),
        Some("application/json; charset=utf-8")
    );
    assert!(request
        .header("X-Telemetry-Agent")
        .is_some_and(|agent| agent.starts_with("Glean/")));
    assert!(request.header("Date").is_some());
    assert!(request.header("X-Debug-ID").is_none());

    let body = request.body_json().unwrap();
    assert_eq!(body["ping_info"]["seq"], 0);
    assert_eq!(body["ping_info"]["reason"], "background");
    assert!(body["ping_info"]["start_time"].is_string());
    assert!(body["ping_info"]["end_time"].is_string());
    assert_eq!(body["client_info"]["app_build"], "100");
    assert_eq!(body["client_info"]["app_display_version"], "1.0.0");
    assert!(body["client_info"]["client_id"].is_string());
    assert!(body["client_info"]["first_run_date"].is_string());
    assert_eq!(body["metrics"]["counter"]["test.visits"], 3);
}

#[tokio::test]
async fn undeclared_reason_is_omitted() {
    let dir = tempfile::tempdir().unwrap();
    let (glean, uploader) = setup(dir.path()).await;
    let ping = PingHandle::new(&glean, PingType::new("custom").with_send_if_empty(true));

    ping.submit(Some("made_up"));

    let sent = uploader.wait_for("custom", 1).await;
    let body = sent[0].body_json().unwrap();
    assert!(body["ping_info"].get("reason").is_none());
}

#[tokio::test]
async fn client_id_can_be_left_out() {
    let dir = tempfile::tempdir().unwrap();
    let (glean, uploader) = setup(dir.path()).await;
    let ping = PingHandle::new(
        &glean,
        PingType::new("anonymous")
            .with_send_if_empty(true)
            .with_include_client_id(false),
    );

    ping.submit(None);

    let sent = uploader.wait_for("anonymous", 1).await;
    let body = sent[0].body_json().unwrap();
    assert!(body["client_info"].get("client_id").is_none());
    assert_eq!(body["client_info"]["app_build"], "100");
}

#[tokio::test]
async fn invalid_debug_tag_keeps_the_previous_one() {
    let dir = tempfile::tempdir().unwrap();
    let (glean, uploader) = setup(dir.path()).await;
    let ping = PingHandle::new(&glean, PingType::new("custom").with_send_if_empty(true));

    assert!(glean.set_debug_view_tag("valid-tag"));
    assert!(!glean.set_debug_view_tag("inv@lid_id"));
    assert!(!glean.set_debug_view_tag(&"x".repeat(21)));
    ping.submit(None);

    let sent = uploader.wait_for("custom", 1).await;
    assert_eq!(sent[0].header("X-Debug-ID"), Some("valid-tag"));
}

#[tokio::test]
async fn source_tags_apply_to_every_ping() {
    let dir = tempfile::tempdir().unwrap();
    let (glean, uploader) = setup(dir.path()).await;
    let first = PingHandle::new(&glean, PingType::new("first").with_send_if_empty(true));
    let second = PingHandle::new(&glean, PingType::new("second").with_send_if_empty(true));

    assert!(!glean.set_source_tags(vec!["glean-reserved".into()]));
    assert!(glean.set_source_tags(vec!["tag1".into(), "tag2".into()]));
    first.submit(None);
    second.submit(None);

    for name in ["first", "second"] {
        let sent = uploader.wait_for(name, 1).await;
        assert_eq!(sent[0].header("X-Source-Tags"), Some("tag1,tag2"));
    }
}

#[tokio::test]
async fn experiments_are_annotated() {
    let dir = tempfile::tempdir().unwrap();
    let glean = Glean::new();
    let uploader = RecordingUploader::new();

    // Set before initialization and replayed
    glean.set_experiment_active("early", "control", None);

    let config = test_config(dir.path())
        .experimentation_id("alpha-beta-gamma")
        .build();
    start(&glean, config, uploader.clone()).await;

    let extra = BTreeMap::from([("type".to_string(), "rollout".to_string())]);
    glean.set_experiment_active("late", "treatment", Some(extra));
    glean.set_experiment_active("gone", "branch", None);
    glean.set_experiment_inactive("gone");

    assert!(glean.test_is_experiment_active("early").await);
    assert!(!glean.test_is_experiment_active("gone").await);
    assert_eq!(
        glean.test_get_experimentation_id().await.as_deref(),
        Some("alpha-beta-gamma")
    );
    let late = glean.test_get_experiment_data("late").await.unwrap();
    assert_eq!(late.branch, "treatment");

    let ping = PingHandle::new(&glean, PingType::new("custom"));
    StringMetric::new(&glean, meta("value", &["custom"])).set("x");
    ping.submit(None);

    let sent = uploader.wait_for("custom", 1).await;
    let body = sent[0].body_json().unwrap();
    let experiments = &body["ping_info"]["experiments"];
    assert_eq!(experiments["early"]["branch"], "control");
    assert_eq!(experiments["late"]["extra"]["type"], "rollout");
    assert!(experiments.get("gone").is_none());
    assert_eq!(
        body["metrics"]["string"]["glean.client.annotation.experimentation_id"],
        "alpha-beta-gamma"
    );
}

#[tokio::test]
async fn scheduled_pings_follow_their_parent() {
    let dir = tempfile::tempdir().unwrap();
    let (glean, uploader) = setup(dir.path()).await;
    PingHandle::new(&glean, PingType::new("child").with_send_if_empty(true));
    let parent = PingHandle::new(
        &glean,
        PingType::new("parent")
            .with_send_if_empty(true)
            .with_schedules_pings(&["child"]),
    );

    parent.submit(None);

    uploader.wait_for("parent", 1).await;
    uploader.wait_for("child", 1).await;
}

#[tokio::test]
async fn oversized_ping_is_discarded_and_counted() {
    let dir = tempfile::tempdir().unwrap();
    let glean = Glean::new();
    let uploader = RecordingUploader::new();
    start(
        &glean,
        test_config(dir.path()).max_ping_body_size(512).build(),
        uploader.clone(),
    )
    .await;
    let big = PingHandle::new(&glean, PingType::new("big"));
    for i in 0..20 {
        StringMetric::new(&glean, meta(&format!("s{i}"), &["big"])).set("x".repeat(100));
    }

    big.submit(None);
    glean.block_on_dispatcher().await;

    assert!(uploader.requests_for("big").is_empty());
    let discarded = CounterMetric::new(
        &glean,
        glean::internal_metrics::discarded_exceeding_pings_size(),
    );
    assert_eq!(discarded.test_get_value(None).await, Some(1));
}

#[tokio::test]
async fn registered_ping_survives_destroy_and_reinitialize() {
    let dir = tempfile::tempdir().unwrap();
    let glean = Glean::new();
    let ping = PingHandle::new(&glean, PingType::new("custom"));
    let counter = CounterMetric::new(&glean, meta("submits", &["custom"]));

    start(&glean, test_config(dir.path()).build(), RecordingUploader::new()).await;
    glean.block_on_dispatcher().await;
    glean.test_destroy_glean(false).await;

    let uploader = RecordingUploader::new();
    start(&glean, test_config(dir.path()).build(), uploader.clone()).await;
    for _ in 0..3 {
        counter.add(1);
        ping.submit(None);
    }

    let sent = uploader.wait_for("custom", 3).await;
    assert_eq!(sent.len(), 3);
    for request in &sent {
        let body = request.body_json().unwrap();
        assert_eq!(body["metrics"]["counter"]["test.submits"], 1);
    }
}
