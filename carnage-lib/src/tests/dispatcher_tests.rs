use super::*;
use carnage_report::ReportError;
use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
struct FakeProcessor {
    calls: AtomicUsize,
    results: Mutex<VecDeque<Result<ProcessOutcome, PipelineError>>>,
}

impl FakeProcessor {
    fn scripted(results: Vec<Result<ProcessOutcome, PipelineError>>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            results: Mutex::new(results.into()),
        })
    }
}

impl MatchProcessor for FakeProcessor {
    fn process<'a>(&'a self, _path: &'a Path) -> BoxFuture<'a, Result<ProcessOutcome, PipelineError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = self.results.lock().unwrap().pop_front().unwrap_or_else(|| Ok(done()));
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            result
        })
    }
}

fn done() -> ProcessOutcome {
    ProcessOutcome::Duplicate {
        match_id: "1".to_string(),
        source_removed: true,
    }
}

fn locked() -> PipelineError {
    PipelineError::Report(ReportError::Io(std::io::Error::from(
        std::io::ErrorKind::PermissionDenied,
    )))
}

fn config() -> DispatcherConfig {
    DispatcherConfig {
        quiet_period: Duration::from_millis(300),
        poll_interval: Duration::from_millis(50),
        max_stabilize: Duration::from_secs(5),
        inter_match_delay: Duration::from_secs(1),
        release_grace: Duration::from_secs(2),
        release_grace_on_cleanup_failure: Duration::from_secs(4),
        redrive_delay: Duration::from_secs(1),
        max_redrives: 2,
    }
}

fn start(
    processor: Arc<FakeProcessor>,
    config: DispatcherConfig,
) -> (DispatcherHandle, mpsc::UnboundedReceiver<DispatchEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = Dispatcher::new(processor, config).with_events(tx).spawn();
    (handle, rx)
}

fn report(dir: &Path) -> PathBuf {
    let path = dir.join("mpcarnagereport1_3528_0_0.xml");
    std::fs::write(&path, b"<MultiplayerCarnageReport/>").unwrap();
    path
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_events_process_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = report(dir.path());
    let processor = FakeProcessor::scripted(vec![]);
    let (handle, mut events) = start(Arc::clone(&processor), config());

    handle.submit(path.clone());
    handle.submit(path.clone());

    assert!(matches!(events.recv().await.unwrap(), DispatchEvent::Suppressed { .. }));
    assert!(matches!(events.recv().await.unwrap(), DispatchEvent::Processed { .. }));
    assert_eq!(processor.calls.load(Ordering::SeqCst), 1);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_file_is_released_after_grace() {
    let dir = tempfile::tempdir().unwrap();
    let path = report(dir.path());
    let processor = FakeProcessor::scripted(vec![]);
    let (handle, mut events) = start(Arc::clone(&processor), config());

    handle.submit(path.clone());
    assert!(matches!(events.recv().await.unwrap(), DispatchEvent::Processed { .. }));

    // Still inside the grace window.
    handle.submit(path.clone());
    assert!(matches!(events.recv().await.unwrap(), DispatchEvent::Suppressed { .. }));

    tokio::time::sleep(Duration::from_secs(3)).await;
    handle.submit(path.clone());
    assert!(matches!(events.recv().await.unwrap(), DispatchEvent::Processed { .. }));
    assert_eq!(processor.calls.load(Ordering::SeqCst), 2);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_cleanup_failure_uses_longer_grace() {
    let dir = tempfile::tempdir().unwrap();
    let path = report(dir.path());
    let processor = FakeProcessor::scripted(vec![Ok(ProcessOutcome::Duplicate {
        match_id: "1".to_string(),
        source_removed: false,
    })]);
    let (handle, mut events) = start(Arc::clone(&processor), config());

    handle.submit(path.clone());
    assert!(matches!(events.recv().await.unwrap(), DispatchEvent::Processed { .. }));

    tokio::time::sleep(Duration::from_secs(3)).await;
    handle.submit(path.clone());
    assert!(matches!(events.recv().await.unwrap(), DispatchEvent::Suppressed { .. }));

    tokio::time::sleep(Duration::from_secs(2)).await;
    handle.submit(path.clone());
    assert!(matches!(events.recv().await.unwrap(), DispatchEvent::Processed { .. }));
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_is_redriven() {
    let dir = tempfile::tempdir().unwrap();
    let path = report(dir.path());
    let processor = FakeProcessor::scripted(vec![Err(locked())]);
    let (handle, mut events) = start(Arc::clone(&processor), config());

    handle.submit(path.clone());
    assert!(matches!(
        events.recv().await.unwrap(),
        DispatchEvent::Failed { will_retry: true, .. }
    ));
    assert!(matches!(events.recv().await.unwrap(), DispatchEvent::Processed { .. }));
    assert_eq!(processor.calls.load(Ordering::SeqCst), 2);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_redrives_are_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let path = report(dir.path());
    let processor = FakeProcessor::scripted(vec![Err(locked()), Err(locked()), Err(locked())]);
    let (handle, mut events) = start(Arc::clone(&processor), config());

    handle.submit(path.clone());
    for _ in 0..2 {
        assert!(matches!(
            events.recv().await.unwrap(),
            DispatchEvent::Failed { will_retry: true, .. }
        ));
    }
    assert!(matches!(
        events.recv().await.unwrap(),
        DispatchEvent::Failed { will_retry: false, .. }
    ));
    assert_eq!(processor.calls.load(Ordering::SeqCst), 3);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_terminal_failure_is_not_redriven() {
    let dir = tempfile::tempdir().unwrap();
    let path = report(dir.path());
    let processor = FakeProcessor::scripted(vec![Err(PipelineError::Report(ReportError::malformed(
        "missing Players",
    )))]);
    let (handle, mut events) = start(Arc::clone(&processor), config());

    handle.submit(path.clone());
    match events.recv().await.unwrap() {
        DispatchEvent::Failed { error, will_retry, .. } => {
            assert!(!will_retry);
            assert!(error.contains("missing Players"));
        }
        other => panic!("unexpected event {:?}", other),
    }
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(processor.calls.load(Ordering::SeqCst), 1);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_vanished_file_is_released_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gone_mpcarnagereport.xml");
    let processor = FakeProcessor::scripted(vec![]);
    let (handle, mut events) = start(Arc::clone(&processor), config());

    handle.submit(path.clone());
    assert!(matches!(events.recv().await.unwrap(), DispatchEvent::Unsettled { .. }));

    handle.submit(path.clone());
    assert!(matches!(events.recv().await.unwrap(), DispatchEvent::Unsettled { .. }));
    assert_eq!(processor.calls.load(Ordering::SeqCst), 0);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_matches_are_processed_one_at_a_time() {
    let dir = tempfile::tempdir().unwrap();
    let first = report(dir.path());
    let second = dir.path().join("mpcarnagereport2_3528_0_0.xml");
    std::fs::write(&second, b"<MultiplayerCarnageReport/>").unwrap();
    let processor = FakeProcessor::scripted(vec![]);
    let (handle, mut events) = start(Arc::clone(&processor), config());

    let started = tokio::time::Instant::now();
    handle.submit(first);
    handle.submit(second);
    for _ in 0..2 {
        assert!(matches!(events.recv().await.unwrap(), DispatchEvent::Processed { .. }));
    }
    // settle, process, inter-match delay, process
    assert!(started.elapsed() >= Duration::from_millis(300 + 500 + 1000 + 500));
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_abandons_settling_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = report(dir.path());
    let processor = FakeProcessor::scripted(vec![]);
    let (handle, _events) = start(Arc::clone(&processor), config());

    handle.submit(path);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = tokio::time::Instant::now();
    handle.shutdown().await;
    assert!(started.elapsed() < Duration::from_millis(300));

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(processor.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_finishes_current_match_only() {
    let dir = tempfile::tempdir().unwrap();
    let first = report(dir.path());
    let second = dir.path().join("mpcarnagereport2_3528_0_0.xml");
    std::fs::write(&second, b"<MultiplayerCarnageReport/>").unwrap();
    let processor = FakeProcessor::scripted(vec![]);
    let (handle, _events) = start(Arc::clone(&processor), config());

    handle.submit(first);
    handle.submit(second);
    // Both settled; one is being processed, the other is queued.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(processor.calls.load(Ordering::SeqCst), 1);

    handle.shutdown().await;
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(processor.calls.load(Ordering::SeqCst), 1);
}
