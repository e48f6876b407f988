//! Integration tests for the ingest pipeline.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tally_core::{
    CloseReason, Event, EventKind, EventStore, IngestPipeline, MemoryEventStore, SledEventStore,
    StorageError, StoreConfig, StoredEvent, SubmitError, SubscriberHandle, SubscriberRegistry,
    SubscriptionSession,
};
use tokio::sync::mpsc;

/// Store that can be told to fail every append.
#[derive(Default)]
struct FaultyStore {
    inner: MemoryEventStore,
    failing: AtomicBool,
}

impl FaultyStore {
    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl EventStore for FaultyStore {
    fn append(&self, event: Event) -> Result<StoredEvent, StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("injected fault".to_string()));
        }
        self.inner.append(event)
    }

    fn list(&self, kind: EventKind) -> Result<Vec<StoredEvent>, StorageError> {
        self.inner.list(kind)
    }
}

/// Store that registers a new subscriber in the middle of every append.
struct LateJoinStore {
    inner: MemoryEventStore,
    registry: Arc<SubscriberRegistry>,
    joined: Mutex<Vec<(SubscriberHandle, mpsc::Receiver<tally_core::Frame>)>>,
}

impl EventStore for LateJoinStore {
    fn append(&self, event: Event) -> Result<StoredEvent, StorageError> {
        self.joined.lock().push(self.registry.register());
        self.inner.append(event)
    }

    fn list(&self, kind: EventKind) -> Result<Vec<StoredEvent>, StorageError> {
        self.inner.list(kind)
    }
}

fn usage_body(n: i64) -> Value {
    json!({"domain": format!("site-{n}.io"), "timestamp": "2024-01-01T00:00:00Z", "duration": n})
}

fn drain(rx: &mut mpsc::Receiver<tally_core::Frame>) -> Vec<Value> {
    std::iter::from_fn(|| rx.try_recv().ok())
        .map(|frame| serde_json::from_str(&frame).unwrap())
        .collect()
}

#[test]
fn test_ids_strictly_increase_per_kind() {
    let pipeline = IngestPipeline::new(
        Arc::new(SledEventStore::open(StoreConfig::temporary()).unwrap()),
        Arc::new(SubscriberRegistry::default()),
    );

    let mut last = 0;
    for n in 0..20 {
        let stored = pipeline.submit_usage_log(&usage_body(n)).unwrap();
        assert!(stored.id > last);
        last = stored.id;
    }

    let result = pipeline
        .submit_test_result(&json!({"type": "unit", "timestamp": "t", "result": {}}))
        .unwrap();
    assert_eq!(result.id, 1);
}

#[test]
fn test_storage_fault_triggers_no_broadcast() {
    let store = Arc::new(FaultyStore::default());
    let registry = Arc::new(SubscriberRegistry::default());
    let pipeline = IngestPipeline::new(store.clone(), registry.clone());
    let (_handle, mut rx) = registry.register();

    store.set_failing(true);
    let err = pipeline.submit_usage_log(&usage_body(1)).unwrap_err();

    assert!(matches!(err, SubmitError::Storage(StorageError::Unavailable(_))));
    assert!(drain(&mut rx).is_empty());
    assert_eq!(pipeline.broadcaster().frames_delivered(), 0);
    assert!(pipeline.list(EventKind::UsageLog).unwrap().is_empty());

    store.set_failing(false);
    let stored = pipeline.submit_usage_log(&usage_body(2)).unwrap();
    assert_eq!(stored.id, 1);
    assert_eq!(drain(&mut rx).len(), 1);
}

#[test]
fn test_every_live_subscriber_gets_exactly_one_copy() {
    let registry = Arc::new(SubscriberRegistry::default());
    let pipeline = IngestPipeline::new(Arc::new(MemoryEventStore::new()), registry.clone());

    let mut live: Vec<_> = (0..5).map(|_| registry.register()).collect();
    let (gone, mut gone_rx) = registry.register();
    registry.unregister(&gone);

    let stored = pipeline.submit_usage_log(&usage_body(42)).unwrap();

    for (_, rx) in &mut live {
        let frames = drain(rx);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["id"], json!(stored.id));
    }
    assert!(drain(&mut gone_rx).is_empty());
}

#[test]
fn test_late_joiner_gets_at_most_one_copy() {
    let registry = Arc::new(SubscriberRegistry::default());
    let store = Arc::new(LateJoinStore {
        inner: MemoryEventStore::new(),
        registry: registry.clone(),
        joined: Mutex::new(Vec::new()),
    });
    let pipeline = IngestPipeline::new(store.clone(), registry.clone());

    pipeline.submit_usage_log(&usage_body(1)).unwrap();

    let mut joined = store.joined.lock();
    assert_eq!(joined.len(), 1);
    let (_, rx) = &mut joined[0];
    assert!(drain(rx).len() <= 1);
}

#[test]
fn test_closed_subscriber_does_not_stop_delivery() {
    let registry = Arc::new(SubscriberRegistry::default());
    let pipeline = IngestPipeline::new(Arc::new(MemoryEventStore::new()), registry.clone());

    let (_a, mut rx_a) = registry.register();
    let (_b, rx_b) = registry.register();
    let (_c, mut rx_c) = registry.register();
    drop(rx_b);

    let event = tally_core::validate::validate(EventKind::UsageLog, &usage_body(3)).unwrap();
    let accepted = pipeline.commit(event).unwrap();

    assert_eq!(accepted.report.delivered, 2);
    assert_eq!(accepted.report.failures.len(), 1);
    assert_eq!(drain(&mut rx_a).len(), 1);
    assert_eq!(drain(&mut rx_c).len(), 1);
}

#[test]
fn test_test_result_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SledEventStore::open(StoreConfig::new(dir.path())).unwrap());
    let pipeline = IngestPipeline::new(store, Arc::new(SubscriberRegistry::default()));

    let body = json!({
        "type": "unit",
        "timestamp": "2024-01-01T00:00:00Z",
        "result": {"pass": true}
    });
    let stored = pipeline.submit_test_result(&body).unwrap();

    let history = pipeline.list(EventKind::TestResult).unwrap();
    assert_eq!(history.len(), 1);

    let listed = serde_json::to_value(&history[0]).unwrap();
    assert_eq!(listed["type"], body["type"]);
    assert_eq!(listed["timestamp"], body["timestamp"]);
    assert_eq!(listed["result"], body["result"]);
    assert_eq!(listed["id"], json!(stored.id));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submissions_with_live_subscriber() {
    let registry = Arc::new(SubscriberRegistry::default());
    let pipeline = Arc::new(IngestPipeline::new(
        Arc::new(SledEventStore::open(StoreConfig::temporary()).unwrap()),
        registry.clone(),
    ));

    let mut session = SubscriptionSession::new(registry.clone());
    session.open().unwrap();

    let tasks: Vec<_> = (0..100)
        .map(|n| {
            let pipeline = pipeline.clone();
            tokio::task::spawn_blocking(move || pipeline.submit_usage_log(&usage_body(n)))
        })
        .collect();

    let mut ids = Vec::new();
    for task in futures::future::join_all(tasks).await {
        ids.push(task.unwrap().unwrap().id);
    }
    ids.sort_unstable();
    assert_eq!(ids, (1..=100).collect::<Vec<u64>>());

    let mut frames = Vec::new();
    while frames.len() < 100 {
        let frame = tokio::time::timeout(Duration::from_secs(5), session.recv())
            .await
            .expect("timed out waiting for broadcast")
            .expect("session closed");
        frames.push(serde_json::from_str::<Value>(&frame).unwrap());
    }

    // Delivery order follows commit order.
    let delivered_ids: Vec<u64> = frames.iter().map(|f| f["id"].as_u64().unwrap()).collect();
    assert_eq!(delivered_ids, (1..=100).collect::<Vec<u64>>());

    let durations: HashSet<i64> = frames.iter().map(|f| f["duration"].as_i64().unwrap()).collect();
    assert_eq!(durations, (0..100).collect::<HashSet<i64>>());

    session.close(CloseReason::ClientClosed);
    assert!(registry.is_empty());
}
