//! Ingest pipeline: validate, persist, broadcast.
//!
//! A submission moves through `Received → Validated → Persisted → Broadcast`.
//! A validation failure or a storage failure ends it before anything is
//! broadcast, so subscribers only ever see events that can be read back from
//! the store.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::broadcast::{BroadcastReport, Broadcaster, Frame};
use crate::error::{StorageError, SubmitError};
use crate::event::{Event, EventKind, StoredEvent};
use crate::registry::SharedRegistry;
use crate::store::EventStore;
use crate::validate::validate;

/// Result of an accepted submission.
#[derive(Debug, Clone)]
pub struct Accepted {
    /// The committed record.
    pub event: StoredEvent,
    /// How the broadcast of that record went.
    pub report: BroadcastReport,
}

/// Orchestrates persistence and fan-out for every submitted event.
pub struct IngestPipeline {
    store: Arc<dyn EventStore>,
    registry: SharedRegistry,
    broadcaster: Broadcaster,
    /// One per kind. Held from append through enqueue so that every
    /// subscriber queue receives a kind's events in commit order.
    commit_locks: [Mutex<()>; 2],
}

impl IngestPipeline {
    pub fn new(store: Arc<dyn EventStore>, registry: SharedRegistry) -> Self {
        Self {
            store,
            registry,
            broadcaster: Broadcaster::new(),
            commit_locks: [Mutex::new(()), Mutex::new(())],
        }
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    /// Validate a raw test-result body and submit it.
    pub fn submit_test_result(&self, raw: &Value) -> Result<StoredEvent, SubmitError> {
        self.submit_raw(EventKind::TestResult, raw)
    }

    /// Validate a raw usage-log body and submit it.
    pub fn submit_usage_log(&self, raw: &Value) -> Result<StoredEvent, SubmitError> {
        self.submit_raw(EventKind::UsageLog, raw)
    }

    /// Validate a raw body as `kind` and submit it.
    pub fn submit_raw(&self, kind: EventKind, raw: &Value) -> Result<StoredEvent, SubmitError> {
        let event = validate(kind, raw).inspect_err(|e| {
            tracing::debug!(kind = %kind, error = %e, "submission rejected");
        })?;
        self.submit(event)
    }

    /// Persist a validated event and broadcast the committed record.
    pub fn submit(&self, event: Event) -> Result<StoredEvent, SubmitError> {
        self.commit(event).map(|accepted| accepted.event)
    }

    /// Like [`submit`](Self::submit), also returning the broadcast report.
    pub fn commit(&self, event: Event) -> Result<Accepted, SubmitError> {
        let kind = event.kind();
        let guard = self.commit_locks[kind.index()].lock();

        let stored = self.store.append(event).inspect_err(|e| {
            tracing::error!(kind = %kind, error = %e, "failed to persist event");
        })?;

        let report = match stored.to_json() {
            Ok(json) => {
                let frame: Frame = Arc::from(json);
                self.broadcaster.broadcast(&frame, &self.registry.snapshot())
            }
            Err(e) => {
                // Persisted but not announceable; still a successful commit.
                tracing::error!(kind = %kind, id = stored.id, error = %e, "failed to serialize event");
                BroadcastReport::default()
            }
        };
        drop(guard);

        tracing::info!(
            kind = %kind,
            id = stored.id,
            delivered = report.delivered,
            failed = report.failures.len(),
            "event received"
        );

        Ok(Accepted {
            event: stored,
            report,
        })
    }

    /// Every committed event of a kind, in commit order.
    pub fn list(&self, kind: EventKind) -> Result<Vec<StoredEvent>, StorageError> {
        self.store.list(kind)
    }
}
