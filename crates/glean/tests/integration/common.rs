//! Shared test helpers

use std::collections::VecDeque;
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use glean::config::{Configuration, ConfigurationBuilder};
use glean::domain::{CommonMetricData, Lifetime, PingRequest};
use glean::Glean;
use glean_core::ports::{IPingUploader, UploadResult};

// ============================================================================
// Recording uploader
// ============================================================================

/// Records requests and answers with scripted results (default: 200)
#[derive(Default)]
pub struct RecordingUploader {
    requests: Mutex<Vec<PingRequest>>,
    script: Mutex<VecDeque<UploadResult>>,
    fallback: Mutex<Option<UploadResult>>,
}

impl RecordingUploader {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answers with `results` in order, then with success
    pub fn scripted(results: Vec<UploadResult>) -> Arc<Self> {
        let uploader = Self::default();
        *uploader.script.lock().unwrap() = results.into();
        Arc::new(uploader)
    }

    /// Answers every request with `result`
    pub fn always(result: UploadResult) -> Arc<Self> {
        let uploader = Self::default();
        *uploader.fallback.lock().unwrap() = Some(result);
        Arc::new(uploader)
    }

    pub fn requests(&self) -> Vec<PingRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_for(&self, ping: &str) -> Vec<PingRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.ping_name == ping)
            .collect()
    }

    /// Waits until at least `count` requests for `ping` arrived
    pub async fn wait_for(&self, ping: &str, count: usize) -> Vec<PingRequest> {
        let this = self;
        let found = eventually(move || async move {
            let requests = this.requests_for(ping);
            (requests.len() >= count).then_some(requests)
        })
        .await;
        found.unwrap_or_else(|| {
            panic!(
                "expected {count} '{ping}' uploads, got {}",
                self.requests_for(ping).len()
            )
        })
    }
}

#[async_trait::async_trait]
impl IPingUploader for RecordingUploader {
    async fn send(&self, request: &PingRequest) -> UploadResult {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(result) = self.script.lock().unwrap().pop_front() {
            return result;
        }
        self.fallback
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(UploadResult::Success { status: 200 })
    }
}

// ============================================================================
// Setup
// ============================================================================

/// Test configuration rooted at `dir` with short backoffs
pub fn test_config(dir: &Path) -> ConfigurationBuilder {
    ConfigurationBuilder::new()
        .data_path(dir)
        .application_id("org.example.test")
        .app_build("100")
        .app_display_version("1.0.0")
        .backoff_ms(10, 40)
        .shutdown_timeout_secs(5)
        .logging_level("debug")
}

pub async fn start(glean: &Glean, config: Configuration, uploader: Arc<RecordingUploader>) {
    glean
        .initialize(config, uploader)
        .await
        .expect("initialize");
}

/// A fresh instance initialized on `dir`
pub async fn setup(dir: &Path) -> (Glean, Arc<RecordingUploader>) {
    let glean = Glean::new();
    let uploader = RecordingUploader::new();
    start(&glean, test_config(dir).build(), uploader.clone()).await;
    (glean, uploader)
}

pub fn meta(name: &str, pings: &[&str]) -> CommonMetricData {
    CommonMetricData::new("test", name, pings)
}

pub fn meta_with_lifetime(name: &str, pings: &[&str], lifetime: Lifetime) -> CommonMetricData {
    meta(name, pings).with_lifetime(lifetime)
}

/// Polls `check` until it yields a value or five seconds pass
pub async fn eventually<T, F, Fut>(mut check: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for _ in 0..250 {
        if let Some(value) = check().await {
            return Some(value);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    None
}
