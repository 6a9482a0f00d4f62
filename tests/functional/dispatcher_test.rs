//! Functional tests for the dispatch lifecycle

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use edgeforge_client::backend::GenerationBackend;
use edgeforge_client::config::{OutputConfig, Settings};
use edgeforge_client::dispatch::Payload;
use edgeforge_client::{
    AppError, Dispatch, ErrorKind, InputState, Phase, ReferenceImage, RequestDispatcher,
    ResponseHandler, Result, StatusReporter,
};

const INTENT: &str = "A futuristic car, hard to see, heavy fog";
const ZIP: &[u8] = b"PK\x03\x04generated";

fn valid_state(batch_size: u32) -> InputState {
    let mut state = InputState::new();
    state.set_intent(INTENT);
    state.set_reference_image(
        ReferenceImage::from_data_url("data:image/png;base64,iVBORw0KGgo=").unwrap(),
    );
    state.set_batch_size(batch_size);
    state
}

fn handler(dir: &Path) -> ResponseHandler {
    ResponseHandler::new(&OutputConfig {
        download_dir: dir.to_path_buf(),
        overwrite: false,
    })
}

fn settings(server: &MockServer, dir: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.service.base_url = server.uri();
    settings.output.download_dir = dir.to_path_buf();
    settings
}

fn saved_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

/// Backend that waits for the test to release it and records what it saw
struct GatedBackend {
    status: Arc<StatusReporter>,
    calls: AtomicUsize,
    busy_seen: Mutex<Vec<bool>>,
    entered: Notify,
    release: Notify,
}

impl GatedBackend {
    fn new(status: Arc<StatusReporter>) -> Self {
        Self {
            status,
            calls: AtomicUsize::new(0),
            busy_seen: Mutex::new(Vec::new()),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationBackend for GatedBackend {
    fn name(&self) -> &str {
        "gated"
    }

    async fn submit(&self, _payload: Payload) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.busy_seen.lock().unwrap().push(self.status.snapshot().busy);
        self.entered.notify_one();
        self.release.notified().await;
        Ok(ZIP.to_vec())
    }
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Succeed,
    Fail,
    Panic,
}

/// Backend that plays back a fixed sequence of outcomes
struct ScriptedBackend {
    steps: Mutex<VecDeque<Step>>,
}

impl ScriptedBackend {
    fn new(steps: &[Step]) -> Self {
        Self {
            steps: Mutex::new(steps.iter().copied().collect()),
        }
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn submit(&self, _payload: Payload) -> Result<Vec<u8>> {
        let step = self.steps.lock().unwrap().pop_front().unwrap_or(Step::Succeed);
        match step {
            Step::Succeed => Ok(ZIP.to_vec()),
            Step::Fail => Err(AppError::Transport(
                "Service returned 502 Bad Gateway".to_string(),
            )),
            Step::Panic => panic!("backend crashed"),
        }
    }
}

fn scripted(dir: &Path, steps: &[Step]) -> RequestDispatcher {
    RequestDispatcher::new(Arc::new(ScriptedBackend::new(steps)), handler(dir))
}

#[tokio::test]
async fn test_single_scenario_saves_asset() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(ZIP))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = RequestDispatcher::from_settings(&settings(&server, dir.path())).unwrap();
    let outcome = dispatcher.generate(&valid_state(1)).await.unwrap();

    match outcome {
        Dispatch::Delivered(receipt) => {
            assert_eq!(receipt.file_name, "edgeforge_asset.zip");
            assert_eq!(std::fs::read(receipt.path).unwrap(), ZIP);
        }
        Dispatch::Skipped => panic!("request was skipped"),
    }
    let lifecycle = dispatcher.lifecycle();
    assert_eq!(lifecycle.phase, Phase::Success);
    assert!(!lifecycle.busy);
    assert!(!dispatcher.is_busy());
}

#[tokio::test]
async fn test_batch_scenario_saves_dataset() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    Mock::given(method("POST"))
        .and(path("/generate_batch"))
        .and(wiremock::matchers::body_string_contains(
            "name=\"batch_size\"\r\n\r\n5",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(ZIP))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = RequestDispatcher::from_settings(&settings(&server, dir.path())).unwrap();
    dispatcher.generate(&valid_state(5)).await.unwrap();

    assert_eq!(saved_files(dir.path()), vec!["edgeforge_dataset.zip"]);
    assert_eq!(dispatcher.lifecycle().phase, Phase::Success);
}

#[tokio::test]
async fn test_empty_intent_never_dispatches() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(ZIP))
        .expect(0)
        .mount(&server)
        .await;

    let dispatcher = RequestDispatcher::from_settings(&settings(&server, dir.path())).unwrap();
    let mut state = valid_state(1);
    state.set_intent("");

    let err = dispatcher.generate(&state).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let mut no_image = InputState::new();
    no_image.set_intent(INTENT);
    assert!(dispatcher.generate(&no_image).await.unwrap_err().is_validation());

    let lifecycle = dispatcher.lifecycle();
    assert_eq!(lifecycle.phase, Phase::Ready);
    assert!(!lifecycle.busy);
    assert!(saved_files(dir.path()).is_empty());
}

#[tokio::test]
async fn test_service_failure_sets_error_and_saves_nothing() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = RequestDispatcher::from_settings(&settings(&server, dir.path())).unwrap();
    let err = dispatcher.generate(&valid_state(1)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
    let lifecycle = dispatcher.lifecycle();
    assert_eq!(lifecycle.phase, Phase::Error);
    assert_eq!(
        lifecycle.status,
        "Error: Generation failed. Check backend console."
    );
    assert!(!lifecycle.busy);
    assert!(!dispatcher.is_busy());
    assert!(saved_files(dir.path()).is_empty());
}

#[tokio::test]
async fn test_second_generate_while_busy_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let status = Arc::new(StatusReporter::new());
    let backend = Arc::new(GatedBackend::new(status.clone()));
    let dispatcher = Arc::new(RequestDispatcher::with_status(
        backend.clone(),
        handler(dir.path()),
        status.clone(),
    ));

    let first = {
        let dispatcher = dispatcher.clone();
        let state = valid_state(1);
        tokio::spawn(async move { dispatcher.generate(&state).await })
    };

    backend.entered.notified().await;
    assert!(dispatcher.is_busy());
    assert_eq!(status.phase(), Phase::Forging);

    let second = dispatcher.generate(&valid_state(3)).await.unwrap();
    assert!(matches!(second, Dispatch::Skipped));

    backend.release.notify_one();
    let first = first.await.unwrap().unwrap();
    assert!(matches!(first, Dispatch::Delivered(_)));

    assert_eq!(backend.calls(), 1);
    assert_eq!(*backend.busy_seen.lock().unwrap(), vec![true]);
    assert!(!dispatcher.is_busy());
    assert_eq!(saved_files(dir.path()), vec!["edgeforge_asset.zip"]);
}

#[tokio::test]
async fn test_busy_cleared_after_failure_and_next_request_runs() {
    let dir = tempfile::tempdir().unwrap();
    let dispatcher = scripted(dir.path(), &[Step::Fail, Step::Succeed]);

    let err = dispatcher.generate(&valid_state(2)).await.unwrap_err();
    assert!(matches!(err, AppError::Transport(ref msg) if msg.contains("502")));
    assert_eq!(dispatcher.lifecycle().phase, Phase::Error);
    assert!(!dispatcher.is_busy());
    assert!(saved_files(dir.path()).is_empty());

    let mut updates = dispatcher.status().subscribe();
    let outcome = dispatcher.generate(&valid_state(2)).await.unwrap();
    assert!(matches!(outcome, Dispatch::Delivered(_)));
    assert!(updates.has_changed().unwrap());

    let lifecycle = dispatcher.lifecycle();
    assert_eq!(lifecycle.phase, Phase::Success);
    assert!(!lifecycle.busy);
    assert_eq!(saved_files(dir.path()), vec!["edgeforge_dataset.zip"]);
}

#[tokio::test]
async fn test_consecutive_successes_on_one_dispatcher() {
    let dir = tempfile::tempdir().unwrap();
    let dispatcher = scripted(dir.path(), &[Step::Succeed, Step::Succeed, Step::Succeed]);

    for batch_size in [1, 1, 4] {
        let outcome = dispatcher.generate(&valid_state(batch_size)).await.unwrap();
        assert!(matches!(outcome, Dispatch::Delivered(_)));
        assert_eq!(dispatcher.lifecycle().phase, Phase::Success);
        assert!(!dispatcher.is_busy());
    }

    assert_eq!(
        saved_files(dir.path()),
        vec![
            "edgeforge_asset (1).zip",
            "edgeforge_asset.zip",
            "edgeforge_dataset.zip",
        ]
    );
}

#[tokio::test]
async fn test_dropped_generate_does_not_wedge_the_dispatcher() {
    let dir = tempfile::tempdir().unwrap();
    let status = Arc::new(StatusReporter::new());
    let backend = Arc::new(GatedBackend::new(status.clone()));
    let dispatcher =
        RequestDispatcher::with_status(backend.clone(), handler(dir.path()), status.clone());
    let state = valid_state(1);

    let timed_out =
        tokio::time::timeout(Duration::from_millis(20), dispatcher.generate(&state)).await;
    assert!(timed_out.is_err());

    let lifecycle = dispatcher.lifecycle();
    assert_eq!(lifecycle.phase, Phase::Error);
    assert!(!lifecycle.busy);
    assert!(!dispatcher.is_busy());
    assert!(saved_files(dir.path()).is_empty());

    backend.release.notify_one();
    let outcome = dispatcher.generate(&state).await.unwrap();
    assert!(matches!(outcome, Dispatch::Delivered(_)));
    assert_eq!(status.phase(), Phase::Success);
    assert_eq!(backend.calls(), 2);
    assert_eq!(saved_files(dir.path()), vec!["edgeforge_asset.zip"]);
}

#[tokio::test]
async fn test_panicking_backend_does_not_wedge_the_dispatcher() {
    let dir = tempfile::tempdir().unwrap();
    let dispatcher = Arc::new(scripted(dir.path(), &[Step::Panic, Step::Succeed]));

    let crashed = {
        let dispatcher = dispatcher.clone();
        let state = valid_state(3);
        tokio::spawn(async move { dispatcher.generate(&state).await })
    };
    assert!(crashed.await.unwrap_err().is_panic());

    assert_eq!(dispatcher.lifecycle().phase, Phase::Error);
    assert!(!dispatcher.is_busy());

    let outcome = dispatcher.generate(&valid_state(3)).await.unwrap();
    assert!(matches!(outcome, Dispatch::Delivered(_)));
    assert_eq!(dispatcher.lifecycle().phase, Phase::Success);
    assert_eq!(saved_files(dir.path()), vec!["edgeforge_dataset.zip"]);
}

#[tokio::test]
async fn test_delivery_failure_is_reported_as_error() {
    let dir = tempfile::tempdir().unwrap();
    // A regular file where the download directory should be
    let blocked = dir.path().join("downloads");
    std::fs::write(&blocked, b"not a directory").unwrap();

    let status = Arc::new(StatusReporter::new());
    let backend = Arc::new(GatedBackend::new(status.clone()));
    let dispatcher = RequestDispatcher::with_status(backend.clone(), handler(&blocked), status.clone());

    backend.release.notify_one();
    let err = dispatcher.generate(&valid_state(1)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(status.phase(), Phase::Error);
    assert!(!dispatcher.is_busy());
}

#[tokio::test]
async fn test_status_updates_are_published() {
    let dir = tempfile::tempdir().unwrap();
    let status = Arc::new(StatusReporter::new());
    let backend = Arc::new(GatedBackend::new(status.clone()));
    let dispatcher = Arc::new(RequestDispatcher::with_status(
        backend.clone(),
        handler(dir.path()),
        status.clone(),
    ));
    let mut updates = status.subscribe();

    let task = {
        let dispatcher = dispatcher.clone();
        let state = valid_state(4);
        tokio::spawn(async move { dispatcher.generate(&state).await })
    };

    backend.entered.notified().await;
    let current = updates.borrow_and_update().clone();
    assert_eq!(current.phase, Phase::Forging);
    assert!(current.busy);
    assert_eq!(
        current.status,
        "Artist: Forging dataset (4 items)... This may take time."
    );

    backend.release.notify_one();
    task.await.unwrap().unwrap();

    let done = updates.borrow_and_update().clone();
    assert_eq!(done.phase, Phase::Success);
    assert!(!done.busy);
}

#[tokio::test]
async fn test_joined_generates_send_one_request() {
    let dir = tempfile::tempdir().unwrap();
    let status = Arc::new(StatusReporter::new());
    let backend = Arc::new(GatedBackend::new(status.clone()));
    let dispatcher = RequestDispatcher::with_status(backend.clone(), handler(dir.path()), status);
    let state = valid_state(1);

    let (first, second, ()) = futures::join!(
        dispatcher.generate(&state),
        dispatcher.generate(&state),
        async {
            backend.entered.notified().await;
            backend.release.notify_one();
        }
    );

    assert!(matches!(first.unwrap(), Dispatch::Delivered(_)));
    assert!(matches!(second.unwrap(), Dispatch::Skipped));
    assert_eq!(backend.calls(), 1);
}
