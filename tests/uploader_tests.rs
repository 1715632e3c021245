use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio::time::Duration;

use async_trait::async_trait;
use blobdrop::config::UploaderConfig;
use blobdrop::errors::{AppError, AppResult, QueueState};
use blobdrop::render::{NullRenderer, Renderer};
use blobdrop::uploader::blob_client::{BlobTransport, ProgressFn, PutOutcome};
use blobdrop::uploader::endpoint::UploadTarget;
use blobdrop::uploader::progress;
use blobdrop::uploader::queue::{CandidateFile, QueueStats, UploadQueue, UploadStatus};
use blobdrop::uploader::UploadManager;

/// Integration tests for the batch uploader: status transitions, retry
/// selection, group concurrency, and mid-flight races.

fn test_config() -> UploaderConfig {
    UploaderConfig {
        max_file_size: 10 * 1024 * 1024,
        allowed_types: vec!["image/png".to_string()],
        max_files: 20,
        concurrency_limit: 3,
        storage_account: "teststorage".to_string(),
        container_name: "raw-images".to_string(),
        sas_token: "sv=2024&sig=abc".to_string(),
    }
}

fn png(name: &str, bytes: usize) -> CandidateFile {
    CandidateFile::new(name, "image/png", vec![0u8; bytes])
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Start(String),
    End(String),
}

/// Resolved blob names look like `{millis}-{rand}-{name}`; recover the
/// original file name for bookkeeping.
fn original_name(target: &UploadTarget) -> String {
    target
        .blob_name
        .splitn(3, '-')
        .nth(2)
        .unwrap_or(&target.blob_name)
        .to_string()
}

/// Transport double. Status per file name (default 201); status 0 simulates a
/// transport-level failure. Per-file delays let tests scramble completion
/// order inside a group, and an optional gate holds uploads in flight.
struct MockTransport {
    events: Arc<Mutex<Vec<Event>>>,
    statuses: Mutex<HashMap<String, u16>>,
    delays_ms: HashMap<String, u64>,
    gate: Option<Arc<Notify>>,
}

impl MockTransport {
    fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            statuses: Mutex::new(HashMap::new()),
            delays_ms: HashMap::new(),
            gate: None,
        }
    }

    fn with_status(self, name: &str, status: u16) -> Self {
        self.statuses
            .lock()
            .unwrap()
            .insert(name.to_string(), status);
        self
    }

    fn with_delay(mut self, name: &str, delay_ms: u64) -> Self {
        self.delays_ms.insert(name.to_string(), delay_ms);
        self
    }

    fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    fn set_status(&self, name: &str, status: u16) {
        self.statuses
            .lock()
            .unwrap()
            .insert(name.to_string(), status);
    }

    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn started(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Start(name) => Some(name),
                Event::End(_) => None,
            })
            .collect()
    }
}

#[async_trait]
impl BlobTransport for MockTransport {
    async fn put(
        &self,
        target: &UploadTarget,
        _body: Vec<u8>,
        _content_type: &str,
        on_progress: ProgressFn,
    ) -> AppResult<PutOutcome> {
        let name = original_name(target);
        self.events.lock().unwrap().push(Event::Start(name.clone()));

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let delay = self.delays_ms.get(&name).copied().unwrap_or(1);
        tokio::time::sleep(Duration::from_millis(delay)).await;

        on_progress(50);
        on_progress(100);

        self.events.lock().unwrap().push(Event::End(name.clone()));

        let status = self.statuses.lock().unwrap().get(&name).copied().unwrap_or(201);
        if status == 0 {
            return Err(AppError::upload_failed("simulated network failure"));
        }

        Ok(PutOutcome {
            status,
            message: if (200..300).contains(&status) {
                None
            } else {
                Some("simulated store error".to_string())
            },
        })
    }
}

/// Renderer double that counts invocations.
struct CountingRenderer {
    renders: AtomicUsize,
    stats_refreshes: AtomicUsize,
}

impl CountingRenderer {
    fn new() -> Self {
        Self {
            renders: AtomicUsize::new(0),
            stats_refreshes: AtomicUsize::new(0),
        }
    }
}

impl Renderer for CountingRenderer {
    fn render(&self, _queue: &UploadQueue) {
        self.renders.fetch_add(1, Ordering::SeqCst);
    }

    fn render_stats(&self, _stats: &QueueStats) {
        self.stats_refreshes.fetch_add(1, Ordering::SeqCst);
    }
}

fn record_status(queue: &QueueState, name: &str) -> Option<UploadStatus> {
    queue
        .lock()
        .unwrap()
        .record(name)
        .map(|record| record.status.clone())
}

#[tokio::test]
async fn test_successful_upload_settles_record_and_is_not_retried() {
    let transport = Arc::new(MockTransport::new());
    let manager = UploadManager::with_transport(
        test_config(),
        Arc::clone(&transport) as Arc<dyn BlobTransport>,
        Arc::new(NullRenderer),
    );

    manager.add_files(vec![png("photo.png", 2048)]).unwrap();
    assert_eq!(
        record_status(&manager.queue(), "photo.png"),
        Some(UploadStatus::Pending)
    );
    assert!(manager.set_preview("photo.png", "data:image/png;base64,xyz"));

    let has_pending = manager.upload_all().await.unwrap();
    assert!(!has_pending);

    let queue = manager.queue();
    {
        let queue = queue.lock().unwrap();
        let record = queue.record("photo.png").unwrap();
        assert_eq!(record.status, UploadStatus::Success);
        assert_eq!(record.progress(), 100);
    }

    // Second pass: the succeeded file is excluded, nothing is re-uploaded
    let has_pending = manager.upload_all().await.unwrap();
    assert!(!has_pending);
    assert_eq!(transport.started(), vec!["photo.png"]);
}

#[tokio::test]
async fn test_failed_upload_records_reason_and_is_retried_next_pass() {
    let transport = Arc::new(MockTransport::new().with_status("a.png", 500));
    let manager = UploadManager::with_transport(
        test_config(),
        Arc::clone(&transport) as Arc<dyn BlobTransport>,
        Arc::new(NullRenderer),
    );

    manager.add_files(vec![png("a.png", 100)]).unwrap();

    let has_pending = manager.upload_all().await.unwrap();
    assert!(has_pending);
    assert!(manager.has_pending_work());

    match record_status(&manager.queue(), "a.png") {
        Some(UploadStatus::Error { reason }) => assert!(reason.contains("500")),
        other => panic!("expected error status, got {:?}", other),
    }
    assert_eq!(manager.stats().succeeded_count, 0);

    // The store recovers; re-invoking upload retries the failed file
    transport.set_status("a.png", 201);
    let has_pending = manager.upload_all().await.unwrap();
    assert!(!has_pending);
    assert_eq!(
        record_status(&manager.queue(), "a.png"),
        Some(UploadStatus::Success)
    );
    assert_eq!(transport.started().len(), 2);
}

#[tokio::test]
async fn test_one_failure_never_aborts_siblings() {
    let transport = Arc::new(MockTransport::new().with_status("bad.png", 0));
    let manager = UploadManager::with_transport(
        test_config(),
        Arc::clone(&transport) as Arc<dyn BlobTransport>,
        Arc::new(NullRenderer),
    );

    manager
        .add_files(vec![png("bad.png", 100), png("good.png", 100), png("also.png", 100)])
        .unwrap();

    let has_pending = manager.upload_all().await.unwrap();
    assert!(has_pending);

    assert!(matches!(
        record_status(&manager.queue(), "bad.png"),
        Some(UploadStatus::Error { .. })
    ));
    assert_eq!(
        record_status(&manager.queue(), "good.png"),
        Some(UploadStatus::Success)
    );
    assert_eq!(
        record_status(&manager.queue(), "also.png"),
        Some(UploadStatus::Success)
    );

    let stats = manager.stats();
    assert_eq!(stats.succeeded_count, 2);
    // round(100 * 2/3) = 67
    assert_eq!(stats.success_rate_percent, 67);
}

#[tokio::test]
async fn test_groups_of_three_run_sequentially_with_full_settlement() {
    // Uneven delays scramble completion order inside each group
    let transport = Arc::new(
        MockTransport::new()
            .with_delay("f0.png", 30)
            .with_delay("f1.png", 5)
            .with_delay("f2.png", 15)
            .with_delay("f3.png", 20)
            .with_delay("f4.png", 5)
            .with_delay("f5.png", 10)
            .with_delay("f6.png", 5),
    );
    let manager = UploadManager::with_transport(
        test_config(),
        Arc::clone(&transport) as Arc<dyn BlobTransport>,
        Arc::new(NullRenderer),
    );

    let candidates: Vec<CandidateFile> = (0..7).map(|i| png(&format!("f{}.png", i), 64)).collect();
    manager.add_files(candidates).unwrap();

    manager.upload_all().await.unwrap();

    let events = transport.events();
    assert_eq!(events.len(), 14);

    let position = |event: &Event| events.iter().position(|e| e == event).unwrap();
    let groups: [&[&str]; 3] = [
        &["f0.png", "f1.png", "f2.png"],
        &["f3.png", "f4.png", "f5.png"],
        &["f6.png"],
    ];

    // Every file in group N+1 starts only after every file in group N settled
    for window in groups.windows(2) {
        let last_end_prev = window[0]
            .iter()
            .map(|name| position(&Event::End(name.to_string())))
            .max()
            .unwrap();
        for name in window[1] {
            let start = position(&Event::Start(name.to_string()));
            assert!(
                start > last_end_prev,
                "{} started before the previous group settled",
                name
            );
        }
    }

    // In-flight count never exceeds the concurrency limit
    let mut in_flight: i32 = 0;
    let mut peak = 0;
    for event in &events {
        match event {
            Event::Start(_) => {
                in_flight += 1;
                peak = peak.max(in_flight);
            }
            Event::End(_) => in_flight -= 1,
        }
    }
    assert!(peak <= 3, "peak concurrency {} exceeded the limit", peak);

    assert!(!manager.has_pending_work());
    assert_eq!(manager.stats().succeeded_count, 7);
}

#[tokio::test]
async fn test_upload_all_with_nothing_eligible_is_a_noop() {
    let transport = Arc::new(MockTransport::new());
    let manager = UploadManager::with_transport(
        test_config(),
        Arc::clone(&transport) as Arc<dyn BlobTransport>,
        Arc::new(NullRenderer),
    );

    let has_pending = manager.upload_all().await.unwrap();
    assert!(!has_pending);
    assert!(transport.events().is_empty());
}

#[tokio::test]
async fn test_missing_credentials_block_upload_with_records_untouched() {
    let mut config = test_config();
    config.storage_account = String::new();

    let transport = Arc::new(MockTransport::new());
    let manager = UploadManager::with_transport(
        config,
        Arc::clone(&transport) as Arc<dyn BlobTransport>,
        Arc::new(NullRenderer),
    );

    manager.add_files(vec![png("a.png", 100)]).unwrap();

    let result = manager.upload_all().await;
    assert!(matches!(result, Err(AppError::Config(_))));

    assert_eq!(
        record_status(&manager.queue(), "a.png"),
        Some(UploadStatus::Pending)
    );
    assert!(transport.events().is_empty());
}

#[tokio::test]
async fn test_remove_mid_flight_lets_completion_noop() {
    let gate = Arc::new(Notify::new());
    let transport = Arc::new(MockTransport::new().with_gate(Arc::clone(&gate)));
    let manager = Arc::new(UploadManager::with_transport(
        test_config(),
        Arc::clone(&transport) as Arc<dyn BlobTransport>,
        Arc::new(NullRenderer),
    ));

    manager.add_files(vec![png("a.png", 100)]).unwrap();

    let upload_manager = Arc::clone(&manager);
    let handle = tokio::spawn(async move { upload_manager.upload_all().await });

    // Let the upload reach the gate, then pull the file out from under it
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(manager.remove_file("a.png"));

    gate.notify_one();
    let has_pending = handle.await.unwrap().unwrap();

    // The in-flight PUT ran to completion and its callbacks found no record
    assert_eq!(transport.events().len(), 2);
    assert!(!has_pending);
    assert!(record_status(&manager.queue(), "a.png").is_none());
    assert_eq!(manager.stats().total_files, 0);
}

#[tokio::test]
async fn test_stats_refresh_happens_for_every_outcome() {
    let transport = Arc::new(MockTransport::new().with_status("bad.png", 503));
    let renderer = Arc::new(CountingRenderer::new());
    let manager = UploadManager::with_transport(
        test_config(),
        Arc::clone(&transport) as Arc<dyn BlobTransport>,
        Arc::clone(&renderer) as Arc<dyn Renderer>,
    );

    manager.add_files(vec![png("bad.png", 10), png("good.png", 10)]).unwrap();
    let after_admit = renderer.stats_refreshes.load(Ordering::SeqCst);
    assert!(after_admit >= 1);

    manager.upload_all().await.unwrap();

    // One refresh per settled file at minimum, success or failure alike
    assert!(renderer.stats_refreshes.load(Ordering::SeqCst) >= after_admit + 2);
    assert!(renderer.renders.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn test_progress_events_rerender_the_queue_in_flight() {
    let transport = Arc::new(MockTransport::new());
    let renderer = Arc::new(CountingRenderer::new());
    let manager = UploadManager::with_transport(
        test_config(),
        Arc::clone(&transport) as Arc<dyn BlobTransport>,
        Arc::clone(&renderer) as Arc<dyn Renderer>,
    );

    manager.add_files(vec![png("a.png", 10)]).unwrap();
    let after_admit = renderer.renders.load(Ordering::SeqCst);

    manager.upload_all().await.unwrap();

    // Start render, one render per forward progress event (50 then 100),
    // and the settle render
    assert!(
        renderer.renders.load(Ordering::SeqCst) >= after_admit + 4,
        "expected a render for each in-flight progress event"
    );
}

#[test]
fn test_progress_events_ignored_unless_uploading() {
    let queue: QueueState = Arc::new(Mutex::new(UploadQueue::new()));
    queue
        .lock()
        .unwrap()
        .admit(vec![png("a.png", 10)], &test_config())
        .unwrap();

    // Pending record: progress and settlement events are ignored
    assert!(!progress::update_progress(&queue, "a.png", 40));
    progress::mark_success(&queue, "a.png");
    assert_eq!(record_status(&queue, "a.png"), Some(UploadStatus::Pending));

    // Uploading record: progress only moves forward
    assert!(progress::mark_uploading(&queue, "a.png"));
    assert!(progress::update_progress(&queue, "a.png", 50));
    assert!(!progress::update_progress(&queue, "a.png", 30));
    assert_eq!(
        record_status(&queue, "a.png"),
        Some(UploadStatus::Uploading { progress: 50 })
    );
    progress::update_progress(&queue, "a.png", 80);
    assert_eq!(
        record_status(&queue, "a.png"),
        Some(UploadStatus::Uploading { progress: 80 })
    );

    // Terminal record: a late progress event cannot reopen it
    progress::mark_success(&queue, "a.png");
    assert!(!progress::update_progress(&queue, "a.png", 90));
    assert_eq!(record_status(&queue, "a.png"), Some(UploadStatus::Success));
}

#[test]
fn test_progress_events_against_absent_records_noop() {
    let queue: QueueState = Arc::new(Mutex::new(UploadQueue::new()));

    assert!(!progress::update_progress(&queue, "ghost.png", 10));
    progress::mark_success(&queue, "ghost.png");
    progress::mark_error(&queue, "ghost.png", "late".to_string());
    assert!(!progress::mark_uploading(&queue, "ghost.png"));

    assert!(queue.lock().unwrap().is_empty());
}

#[test]
fn test_success_is_not_demoted_by_late_uploading_transition() {
    let queue: QueueState = Arc::new(Mutex::new(UploadQueue::new()));
    queue
        .lock()
        .unwrap()
        .admit(vec![png("a.png", 10)], &test_config())
        .unwrap();

    assert!(progress::mark_uploading(&queue, "a.png"));
    progress::mark_success(&queue, "a.png");

    // A straggling start attempt cannot pull a settled record back
    assert!(!progress::mark_uploading(&queue, "a.png"));
    assert_eq!(record_status(&queue, "a.png"), Some(UploadStatus::Success));
}
