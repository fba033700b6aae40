use super::*;
use carnage_core::PlayerRecord;
use chrono::NaiveDate;
use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

struct FakeDestination {
    name: &'static str,
    readiness: Mutex<Readiness>,
    image_results: Mutex<VecDeque<Result<(), DeliveryError>>>,
    fallback_ok: bool,
    images: AtomicU32,
    fallbacks: AtomicU32,
    exhausted: AtomicBool,
}

impl FakeDestination {
    fn new(name: &'static str, results: Vec<Result<(), DeliveryError>>, fallback_ok: bool) -> Arc<Self> {
        Arc::new(Self {
            name,
            readiness: Mutex::new(Readiness::Ready),
            image_results: Mutex::new(results.into()),
            fallback_ok,
            images: AtomicU32::new(0),
            fallbacks: AtomicU32::new(0),
            exhausted: AtomicBool::new(false),
        })
    }

    fn with_readiness(self: Arc<Self>, readiness: Readiness) -> Arc<Self> {
        *self.readiness.lock().unwrap() = readiness;
        self
    }
}

impl Destination for FakeDestination {
    fn name(&self) -> &str {
        self.name
    }

    fn readiness(&self) -> Readiness {
        self.readiness.lock().unwrap().clone()
    }

    fn send_image<'a>(
        &'a self,
        _png: &'a [u8],
        _file_name: &'a str,
        _record: &'a MatchRecord,
    ) -> BoxFuture<'a, Result<(), DeliveryError>> {
        self.images.fetch_add(1, Ordering::SeqCst);
        let result = self
            .image_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(DeliveryError::transport("HTTP 500: down")));
        Box::pin(async move { result })
    }

    fn send_fallback<'a>(&'a self, _record: &'a MatchRecord) -> BoxFuture<'a, Result<(), DeliveryError>> {
        self.fallbacks.fetch_add(1, Ordering::SeqCst);
        let ok = self.fallback_ok;
        Box::pin(async move {
            if ok {
                Ok(())
            } else {
                Err(DeliveryError::transport("HTTP 500: still down"))
            }
        })
    }

    fn on_exhausted(&self, _error: &DeliveryError) {
        self.exhausted.store(true, Ordering::SeqCst);
    }
}

fn record(match_id: &str) -> MatchRecord {
    let player = |name: &str, score| PlayerRecord {
        display_name: name.to_string(),
        score,
        ..PlayerRecord::default()
    };
    MatchRecord {
        match_id: match_id.to_string(),
        map_name: "Narrows".to_string(),
        mode_name: "Slayer".to_string(),
        is_ranked: false,
        teams_enabled: false,
        played_at: NaiveDate::from_ymd_opt(2026, 1, 20)
            .unwrap()
            .and_hms_opt(18, 14, 4)
            .unwrap(),
        game_enum: 0,
        hopper_name: "Unknown".to_string(),
        players: vec![player("A", 10), player("B", 5), player("C", 1)],
    }
}

fn fanout(dests: &[Arc<FakeDestination>]) -> DeliveryFanout {
    dests.iter().fold(DeliveryFanout::new(RetryPolicy::default()), |f, d| {
        f.with_destination(Arc::clone(d) as Arc<dyn Destination>)
    })
}

#[tokio::test(start_paused = true)]
async fn test_first_attempt_success() {
    let dest = FakeDestination::new("webhook", vec![Ok(())], true);
    let report = fanout(&[dest.clone()]).deliver(b"png", "1", &record("1")).await;
    assert_eq!(report.outcome("webhook"), Some(&DestinationOutcome::Delivered { attempts: 1 }));
    assert_eq!(dest.fallbacks.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_transport_error_uses_text_fallback() {
    let dest = FakeDestination::new("webhook", vec![Err(DeliveryError::transport("HTTP 500: boom"))], true);
    let report = fanout(&[dest.clone()]).deliver(b"png", "1", &record("1")).await;
    assert!(matches!(
        report.outcome("webhook"),
        Some(DestinationOutcome::DeliveredFallback { attempts: 1, .. })
    ));
    assert_eq!(report.status_of("webhook"), "fallback");
    assert_eq!(dest.images.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_retries_with_backoff_until_success() {
    let dest = FakeDestination::new(
        "webhook",
        vec![
            Err(DeliveryError::transport("HTTP 502")),
            Err(DeliveryError::transport("HTTP 502")),
            Ok(()),
        ],
        false,
    );
    let start = tokio::time::Instant::now();
    let report = fanout(&[dest.clone()]).deliver(b"png", "1", &record("1")).await;
    assert_eq!(report.outcome("webhook"), Some(&DestinationOutcome::Delivered { attempts: 3 }));
    // 1s after the first failure, 2s after the second
    assert_eq!(start.elapsed(), Duration::from_secs(3));
    assert_eq!(dest.fallbacks.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_one_failure_does_not_block_others() {
    let broken = FakeDestination::new("webhook", vec![], false);
    let healthy = FakeDestination::new("session", vec![Ok(())], true);
    let report = fanout(&[broken.clone(), healthy.clone()])
        .deliver(b"png", "1", &record("1"))
        .await;

    assert!(matches!(
        report.outcome("webhook"),
        Some(DestinationOutcome::Failed { attempts: 5, .. })
    ));
    assert_eq!(report.outcome("session"), Some(&DestinationOutcome::Delivered { attempts: 1 }));
    assert!(broken.exhausted.load(Ordering::SeqCst));
    assert!(!healthy.exhausted.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn test_skipped_destination_sends_nothing() {
    let dest = FakeDestination::new("webhook", vec![Ok(())], true)
        .with_readiness(Readiness::Skip("webhook URL not set".to_string()));
    let report = fanout(&[dest.clone()]).deliver(b"png", "1", &record("1")).await;
    assert_eq!(report.status_of("webhook"), "skipped");
    assert_eq!(dest.images.load(Ordering::SeqCst), 0);
    assert_eq!(dest.fallbacks.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_not_ready_falls_through_to_fallback_once() {
    let dest = FakeDestination::new("session", vec![Ok(())], false)
        .with_readiness(Readiness::NotReady("session restarting".to_string()));
    let report = fanout(&[dest.clone()]).deliver(b"png", "1", &record("1")).await;
    assert!(matches!(
        report.outcome("session"),
        Some(DestinationOutcome::Failed { attempts: 0, .. })
    ));
    assert_eq!(dest.images.load(Ordering::SeqCst), 0);
    assert_eq!(dest.fallbacks.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_stops_retrying() {
    let dest = FakeDestination::new(
        "session",
        vec![Err(DeliveryError::SessionDisconnected("probe failed".into()))],
        true,
    );
    let report = fanout(&[dest.clone()]).deliver(b"png", "1", &record("1")).await;
    assert!(matches!(
        report.outcome("session"),
        Some(DestinationOutcome::Failed { attempts: 1, .. })
    ));
    assert_eq!(dest.fallbacks.load(Ordering::SeqCst), 0);
    assert!(dest.exhausted.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn test_unregistered_destination_status_is_skipped() {
    let report = fanout(&[]).deliver(b"png", "1", &record("1")).await;
    assert_eq!(report.status_of("session"), "skipped");
    assert!(matches!(report.persistence, PersistOutcome::Skipped { .. }));
}

#[tokio::test]
async fn test_repeated_delivery_is_idempotent_in_store() {
    let store = Arc::new(MatchStore::in_memory().unwrap());
    let fanout = DeliveryFanout::new(RetryPolicy::default()).with_store(Arc::clone(&store));
    let record = record("4242");

    let first = fanout.deliver(b"png", "4242", &record).await;
    assert_eq!(first.persistence, PersistOutcome::Persisted { players: 3 });
    let after_first = store.stats().unwrap();

    let second = fanout.deliver(b"png", "4242", &record).await;
    assert_eq!(second.persistence, PersistOutcome::Persisted { players: 3 });
    assert_eq!(store.stats().unwrap(), after_first);
    assert_eq!(after_first.games, 1);
    assert_eq!(after_first.players, 3);
}

#[tokio::test]
async fn test_unknown_match_id_is_not_persisted() {
    let store = Arc::new(MatchStore::in_memory().unwrap());
    let fanout = DeliveryFanout::new(RetryPolicy::default()).with_store(Arc::clone(&store));
    let report = fanout.deliver(b"png", "mpcarnagereport1_3528_0_0", &record("unknown")).await;
    assert!(matches!(report.persistence, PersistOutcome::Skipped { .. }));
    assert_eq!(store.stats().unwrap().games, 0);
}
