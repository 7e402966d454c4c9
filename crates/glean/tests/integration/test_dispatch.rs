//! Pre-init buffering and replay

use glean::config::DispatcherConfig;
use glean::internal_metrics;
use glean::metrics::{CounterMetric, StringListMetric, StringMetric};
use glean::Glean;

use crate::common::{meta, setup, start, test_config, RecordingUploader};

#[tokio::test]
async fn preinit_calls_replay_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let glean = Glean::new();
    let counter = CounterMetric::new(&glean, meta("counter", &["store1"]));
    let string = StringMetric::new(&glean, meta("string", &["store1"]));
    let list = StringListMetric::new(&glean, meta("list", &["store1"]));

    counter.add(1);
    string.set("first");
    list.add("a");
    string.set("second");
    counter.add(2);
    list.add("b");

    // Getters do not wait for a core that does not exist yet
    assert_eq!(counter.test_get_value(None).await, None);

    start(&glean, test_config(dir.path()).build(), RecordingUploader::new()).await;

    assert_eq!(counter.test_get_value(None).await, Some(3));
    assert_eq!(string.test_get_value(None).await.as_deref(), Some("second"));
    assert_eq!(
        list.test_get_value(None).await,
        Some(vec!["a".to_string(), "b".to_string()])
    );
}

#[tokio::test]
async fn replay_matches_post_init_recording() {
    let before_dir = tempfile::tempdir().unwrap();
    let before = Glean::new();
    let before_counter = CounterMetric::new(&before, meta("c", &["store1"]));
    let before_string = StringMetric::new(&before, meta("s", &["store1"]));
    for i in 1..=10 {
        before_counter.add(i);
        before_string.set(format!("v{i}"));
    }
    start(&before, test_config(before_dir.path()).build(), RecordingUploader::new()).await;

    let after_dir = tempfile::tempdir().unwrap();
    let (after, _uploader) = setup(after_dir.path()).await;
    let after_counter = CounterMetric::new(&after, meta("c", &["store1"]));
    let after_string = StringMetric::new(&after, meta("s", &["store1"]));
    for i in 1..=10 {
        after_counter.add(i);
        after_string.set(format!("v{i}"));
    }

    assert_eq!(
        before_counter.test_get_value(None).await,
        after_counter.test_get_value(None).await
    );
    assert_eq!(
        before_string.test_get_value(None).await,
        after_string.test_get_value(None).await
    );
}

#[tokio::test]
async fn preinit_overflow_drops_oldest_and_is_counted() {
    let dir = tempfile::tempdir().unwrap();
    let glean = Glean::with_dispatcher_config(DispatcherConfig { max_queue_size: 3 });
    let string = StringMetric::new(&glean, meta("last", &["store1"]));

    for i in 0..5 {
        string.set(format!("value{i}"));
    }
    start(&glean, test_config(dir.path()).build(), RecordingUploader::new()).await;

    assert_eq!(string.test_get_value(None).await.as_deref(), Some("value4"));
    let overflow = CounterMetric::new(&glean, internal_metrics::preinit_tasks_overflow());
    assert_eq!(overflow.test_get_value(None).await, Some(2));
}

#[tokio::test]
async fn calls_after_shutdown_are_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let (glean, _uploader) = setup(dir.path()).await;
    let counter = CounterMetric::new(&glean, meta("late", &["store1"]));
    counter.add(1);
    glean.block_on_dispatcher().await;

    glean.shutdown().await;
    counter.add(5);
    glean.block_on_dispatcher().await;

    // Reopen the same data to look at what was persisted
    let reopened = Glean::new();
    start(&reopened, test_config(dir.path()).build(), RecordingUploader::new()).await;
    let counter = CounterMetric::new(&reopened, meta("late", &["store1"]));
    assert_eq!(
        counter.test_get_value(None).await,
        Some(1),
        "only the value recorded before shutdown was applied"
    );
}

#[tokio::test]
async fn destroy_discards_queued_calls() {
    let dir = tempfile::tempdir().unwrap();
    let (glean, _uploader) = setup(dir.path()).await;
    let counter = CounterMetric::new(&glean, meta("kept", &["store1"]));
    counter.add(1);
    glean.block_on_dispatcher().await;

    glean.test_destroy_glean(false).await;
    assert!(!glean.is_initialized());

    // Buffered again until the next initialization
    counter.add(10);
    glean.test_destroy_glean(false).await;

    start(&glean, test_config(dir.path()).build(), RecordingUploader::new()).await;
    assert_eq!(counter.test_get_value(None).await, Some(1));
}
