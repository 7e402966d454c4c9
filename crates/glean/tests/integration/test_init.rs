//! Initialization guards

use glean::config::ConfigurationBuilder;
use glean::metrics::CounterMetric;
use glean::{Glean, GleanError};

use crate::common::{meta, setup, start, test_config, RecordingUploader};

#[tokio::test]
async fn empty_data_path_is_fatal() {
    let glean = Glean::new();
    let config = ConfigurationBuilder::new()
        .data_path("")
        .application_id("org.example.test")
        .build();

    let err = glean
        .initialize(config, RecordingUploader::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GleanError::InvalidDataPath(_)));
    assert!(!glean.is_initialized());
}

#[tokio::test]
async fn unusable_data_path_is_reported_as_such() {
    let dir = tempfile::tempdir().unwrap();
    let not_a_dir = dir.path().join("occupied");
    std::fs::write(&not_a_dir, b"a file, not a directory").unwrap();

    let glean = Glean::new();
    let err = glean
        .initialize(test_config(&not_a_dir).build(), RecordingUploader::new())
        .await
        .unwrap_err();
    match err {
        GleanError::InvalidDataPath(message) => assert!(message.contains("occupied")),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!glean.is_initialized());
}

#[tokio::test]
async fn secondary_process_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let glean = Glean::new();
    let config = test_config(dir.path()).is_main_process(false).build();

    let err = glean
        .initialize(config, RecordingUploader::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GleanError::NotMainProcess));
    assert!(!glean.is_initialized());
    assert!(
        !dir.path().join("db").exists(),
        "nothing is written by a refused process"
    );
}

#[tokio::test]
async fn invalid_configuration_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let glean = Glean::new();
    let config = test_config(dir.path()).metrics_ping_hour(24).build();

    let err = glean
        .initialize(config, RecordingUploader::new())
        .await
        .unwrap_err();
    match err {
        GleanError::InvalidConfiguration(message) => {
            assert!(message.contains("scheduler.metrics_ping_hour"))
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn failed_initialization_keeps_buffering() {
    let dir = tempfile::tempdir().unwrap();
    let glean = Glean::new();
    let counter = CounterMetric::new(&glean, meta("buffered", &["store1"]));

    counter.add(2);
    let refused = test_config(dir.path()).is_main_process(false).build();
    assert!(glean
        .initialize(refused, RecordingUploader::new())
        .await
        .is_err());
    counter.add(3);

    start(&glean, test_config(dir.path()).build(), RecordingUploader::new()).await;
    assert_eq!(counter.test_get_value(None).await, Some(5));
}

#[tokio::test]
async fn second_initialize_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let (glean, _uploader) = setup(dir.path()).await;
    let counter = CounterMetric::new(&glean, meta("once", &["store1"]));
    counter.add(1);

    let other_dir = tempfile::tempdir().unwrap();
    glean
        .initialize(test_config(other_dir.path()).build(), RecordingUploader::new())
        .await
        .expect("ignored, not an error");

    assert_eq!(counter.test_get_value(None).await, Some(1));
    assert!(!other_dir.path().join("db").exists());
}

#[tokio::test]
async fn database_lives_under_data_path() {
    let dir = tempfile::tempdir().unwrap();
    let (glean, _uploader) = setup(dir.path()).await;
    assert!(glean.is_initialized());
    assert!(dir.path().join("db").join("glean.sqlite").exists());
    glean.shutdown().await;
    assert!(!glean.is_initialized());
}
