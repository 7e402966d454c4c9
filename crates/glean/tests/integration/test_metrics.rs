//! Metric recording, validation and lifetimes

use chrono::DateTime;

use glean::domain::{ErrorType, Lifetime, PingType, TimeUnit};
use glean::metrics::{
    BooleanMetric, CounterMetric, DatetimeMetric, LabeledCounterMetric, PingHandle,
    QuantityMetric, StringListMetric, StringMetric, UuidMetric,
};

use crate::common::{meta, meta_with_lifetime, setup};

#[tokio::test]
async fn disabled_metrics_never_store() {
    let dir = tempfile::tempdir().unwrap();
    let (glean, _uploader) = setup(dir.path()).await;
    let off = |name: &str| meta(name, &["store1"]).with_disabled(true);

    let boolean = BooleanMetric::new(&glean, off("b"));
    let counter = CounterMetric::new(&glean, off("c"));
    let quantity = QuantityMetric::new(&glean, off("q"));
    let string = StringMetric::new(&glean, off("s"));
    let list = StringListMetric::new(&glean, off("l"));
    let uuid = UuidMetric::new(&glean, off("u"));
    let datetime = DatetimeMetric::new(&glean, off("d"), TimeUnit::Second);
    let labeled = LabeledCounterMetric::new(&glean, off("lc"), None);

    boolean.set(true);
    counter.add(1);
    quantity.set(5);
    string.set("x");
    list.add("x");
    uuid.generate_and_set();
    datetime.set(None);
    labeled.get("label").add(1);
    // Invalid input on a disabled metric is not counted either
    counter.add(-1);

    assert_eq!(boolean.test_get_value(None).await, None);
    assert_eq!(counter.test_get_value(None).await, None);
    assert_eq!(quantity.test_get_value(None).await, None);
    assert_eq!(string.test_get_value(None).await, None);
    assert_eq!(list.test_get_value(None).await, None);
    assert_eq!(uuid.test_get_value(None).await, None);
    assert_eq!(datetime.test_get_value(None).await, None);
    assert_eq!(labeled.get("label").test_get_value(None).await, None);
    assert_eq!(
        counter
            .test_get_num_recorded_errors(ErrorType::InvalidValue)
            .await,
        0
    );
}

#[tokio::test]
async fn values_are_written_to_every_ping() {
    let dir = tempfile::tempdir().unwrap();
    let (glean, _uploader) = setup(dir.path()).await;
    let counter = CounterMetric::new(&glean, meta("shared", &["store1", "store2"]));

    counter.add(4);

    assert_eq!(counter.test_get_value(None).await, Some(4));
    assert_eq!(counter.test_get_value(Some("store2")).await, Some(4));
    assert_eq!(counter.test_get_value(Some("store3")).await, None);
}

#[tokio::test]
async fn ping_lifetime_is_cleared_by_collection() {
    let dir = tempfile::tempdir().unwrap();
    let (glean, uploader) = setup(dir.path()).await;
    let ping = PingHandle::new(&glean, PingType::new("store1"));

    let per_ping = CounterMetric::new(&glean, meta("per_ping", &["store1"]));
    let per_app = StringMetric::new(
        &glean,
        meta_with_lifetime("per_app", &["store1"], Lifetime::Application),
    );
    let per_user = BooleanMetric::new(
        &glean,
        meta_with_lifetime("per_user", &["store1"], Lifetime::User),
    );

    per_ping.add(1);
    per_app.set("app");
    per_user.set(true);
    ping.submit(None);

    let sent = uploader.wait_for("store1", 1).await;
    let body = sent[0].body_json().unwrap();
    assert_eq!(body["metrics"]["counter"]["test.per_ping"], 1);
    assert_eq!(body["metrics"]["string"]["test.per_app"], "app");
    assert_eq!(body["metrics"]["boolean"]["test.per_user"], true);

    assert_eq!(per_ping.test_get_value(None).await, None);
    assert_eq!(per_app.test_get_value(None).await.as_deref(), Some("app"));
    assert_eq!(per_user.test_get_value(None).await, Some(true));
}

#[tokio::test]
async fn longer_lifetimes_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let (glean, uploader) = setup(dir.path()).await;
    let per_user = StringMetric::new(
        &glean,
        meta_with_lifetime("per_user", &["store1"], Lifetime::User),
    );
    per_user.set("kept");
    glean.block_on_dispatcher().await;

    glean.test_destroy_glean(false).await;
    crate::common::start(
        &glean,
        crate::common::test_config(dir.path()).build(),
        uploader,
    )
    .await;

    assert_eq!(per_user.test_get_value(None).await.as_deref(), Some("kept"));
}

#[tokio::test]
async fn counter_rejects_negative_amounts() {
    let dir = tempfile::tempdir().unwrap();
    let (glean, _uploader) = setup(dir.path()).await;
    let counter = CounterMetric::new(&glean, meta("counter", &["store1"]));

    counter.add(-3);
    counter.add(0);
    assert_eq!(counter.test_get_value(None).await, None);
    assert_eq!(
        counter
            .test_get_num_recorded_errors(ErrorType::InvalidValue)
            .await,
        1
    );

    counter.add(i32::MAX);
    counter.add(10);
    assert_eq!(counter.test_get_value(None).await, Some(i32::MAX));
}

#[tokio::test]
async fn quantity_rejects_negative_values() {
    let dir = tempfile::tempdir().unwrap();
    let (glean, _uploader) = setup(dir.path()).await;
    let quantity = QuantityMetric::new(&glean, meta("quantity", &["store1"]));

    quantity.set(-1);
    assert_eq!(quantity.test_get_value(None).await, None);
    quantity.set(42);
    assert_eq!(quantity.test_get_value(None).await, Some(42));
    assert_eq!(
        quantity
            .test_get_num_recorded_errors(ErrorType::InvalidValue)
            .await,
        1
    );
}

#[tokio::test]
async fn long_strings_are_truncated_and_counted() {
    let dir = tempfile::tempdir().unwrap();
    let (glean, _uploader) = setup(dir.path()).await;
    let string = StringMetric::new(&glean, meta("string", &["store1"]));

    string.set("x".repeat(150));

    assert_eq!(string.test_get_value(None).await, Some("x".repeat(100)));
    assert_eq!(
        string
            .test_get_num_recorded_errors(ErrorType::InvalidOverflow)
            .await,
        1
    );
}

#[tokio::test]
async fn string_list_stops_at_its_limit() {
    let dir = tempfile::tempdir().unwrap();
    let (glean, _uploader) = setup(dir.path()).await;
    let list = StringListMetric::new(&glean, meta("list", &["store1"]));

    list.set((0..100).map(|i| i.to_string()).collect());
    list.add("one too many");

    let value = list.test_get_value(None).await.unwrap();
    assert_eq!(value.len(), 100);
    assert_eq!(value.last().map(String::as_str), Some("99"));
    assert_eq!(
        list.test_get_num_recorded_errors(ErrorType::InvalidOverflow)
            .await,
        1
    );
}

#[tokio::test]
async fn kind_conflict_keeps_stored_value_and_counts_invalid_state() {
    let dir = tempfile::tempdir().unwrap();
    let (glean, _uploader) = setup(dir.path()).await;
    let list = StringListMetric::new(&glean, meta("shared", &["store1"]));
    let counter = CounterMetric::new(&glean, meta("shared", &["store1"]));

    list.set(vec!["a".into(), "b".into()]);
    counter.add(1);

    assert_eq!(counter.test_get_value(None).await, None);
    assert_eq!(
        counter
            .test_get_num_recorded_errors(ErrorType::InvalidState)
            .await,
        1
    );
    assert_eq!(
        list.test_get_value(None).await,
        Some(vec!["a".to_string(), "b".to_string()])
    );

    list.add("c");
    assert_eq!(list.test_get_value(None).await.map(|l| l.len()), Some(3));
}

#[tokio::test]
async fn uuid_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let (glean, _uploader) = setup(dir.path()).await;
    let uuid = UuidMetric::new(&glean, meta("uuid", &["store1"]));

    let generated = uuid.generate_and_set();
    assert_eq!(uuid.test_get_value(None).await, Some(generated));
}

#[tokio::test]
async fn datetime_keeps_offset_and_resolution() {
    let dir = tempfile::tempdir().unwrap();
    let (glean, _uploader) = setup(dir.path()).await;

    let cases = [
        (TimeUnit::Minute, "1983-04-13T12:09:14.274+05:30", "1983-04-13T12:09+05:30"),
        (TimeUnit::Second, "1969-07-20T20:17:40.5-04:00", "1969-07-20T20:17:40-04:00"),
        (TimeUnit::Day, "2040-02-29T23:59:59+13:00", "2040-02-29+13:00"),
        (
            TimeUnit::Millisecond,
            "2021-03-28T01:59:59.999999+01:00",
            "2021-03-28T01:59:59.999+01:00",
        ),
    ];

    for (i, (unit, input, expected)) in cases.into_iter().enumerate() {
        let metric = DatetimeMetric::new(&glean, meta(&format!("dt{i}"), &["store1"]), unit);
        metric.set(Some(DateTime::parse_from_rfc3339(input).unwrap()));
        assert_eq!(
            metric.test_get_value_as_string(None).await.as_deref(),
            Some(expected),
            "{input} at {unit:?}"
        );
    }
}

#[tokio::test]
async fn dynamic_labels_are_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let (glean, _uploader) = setup(dir.path()).await;
    let labeled = LabeledCounterMetric::new(&glean, meta("labeled", &["store1"]), None);

    for i in 0..20 {
        labeled.get(&format!("label_{i}")).add(1);
    }
    labeled.get("label_0").add(1);

    assert_eq!(labeled.get("label_0").test_get_value(None).await, Some(2));
    assert_eq!(labeled.get("label_15").test_get_value(None).await, Some(1));
    assert_eq!(labeled.get("label_16").test_get_value(None).await, None);
    assert_eq!(labeled.get("__other__").test_get_value(None).await, Some(4));
}

#[tokio::test]
async fn invalid_dynamic_label_goes_to_other() {
    let dir = tempfile::tempdir().unwrap();
    let (glean, _uploader) = setup(dir.path()).await;
    let labeled = LabeledCounterMetric::new(&glean, meta("labeled", &["store1"]), None);

    labeled.get("bad\nlabel").add(1);
    labeled.get(&"x".repeat(112)).add(1);

    assert_eq!(labeled.get("__other__").test_get_value(None).await, Some(2));
    assert_eq!(
        labeled
            .test_get_num_recorded_errors(ErrorType::InvalidLabel)
            .await,
        2
    );
}

#[tokio::test]
async fn static_labels_reject_unknown_labels() {
    let dir = tempfile::tempdir().unwrap();
    let (glean, _uploader) = setup(dir.path()).await;
    let labeled = LabeledCounterMetric::new(
        &glean,
        meta("static", &["store1"]),
        Some(vec!["yes".to_string(), "no".to_string()]),
    );

    labeled.get("yes").add(2);
    labeled.get("maybe").add(1);

    assert_eq!(labeled.get("yes").test_get_value(None).await, Some(2));
    assert_eq!(labeled.get("maybe").test_get_value(None).await, None);
    assert_eq!(labeled.get("__other__").test_get_value(None).await, Some(1));
}

#[tokio::test]
async fn remote_configuration_overrides_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let (glean, _uploader) = setup(dir.path()).await;
    let dormant = CounterMetric::new(&glean, meta("dormant", &["store1"]).with_disabled(true));
    let active = CounterMetric::new(&glean, meta("active", &["store1"]));

    dormant.add(1);
    assert_eq!(dormant.test_get_value(None).await, None);

    assert!(glean.apply_server_knobs_config(
        r#"{"metrics_enabled": {"test.dormant": true, "test.active": false}}"#
    ));
    dormant.add(1);
    active.add(1);
    assert_eq!(dormant.test_get_value(None).await, Some(1));
    assert_eq!(active.test_get_value(None).await, None);

    // A new payload replaces the previous one
    assert!(glean.apply_server_knobs_config(r#"{"metrics_enabled": {}}"#));
    dormant.add(1);
    active.add(1);
    assert_eq!(dormant.test_get_value(None).await, Some(1));
    assert_eq!(active.test_get_value(None).await, Some(1));
}

#[tokio::test]
async fn malformed_remote_configuration_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (glean, _uploader) = setup(dir.path()).await;
    assert!(!glean.apply_server_knobs_config("not json"));
    assert!(!glean.apply_server_knobs_config(r#"{"metrics_enabled": {"a": "yes"}}"#));
}
