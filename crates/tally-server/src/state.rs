use std::sync::Arc;

use serde_json::Value;
use tally_core::{
    EventKind, EventStore, IngestPipeline, MemoryEventStore, SledEventStore, StorageError,
    StoredEvent, SubscriberRegistry,
};
use tokio::sync::watch;

use crate::config::ServerConfig;
use crate::error::AppError;

/// Application state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<IngestPipeline>,
    pub config: ServerConfig,
    shutdown: Arc<watch::Sender<bool>>,
}

impl AppState {
    /// Open the configured store and build the pipeline around it.
    pub fn open(config: ServerConfig) -> Result<Self, StorageError> {
        let store: Arc<dyn EventStore> = if config.ephemeral {
            Arc::new(MemoryEventStore::new())
        } else {
            Arc::new(SledEventStore::open(config.store_config())?)
        };
        Ok(Self::with_store(store, config))
    }

    /// Build state around an existing store.
    pub fn with_store(store: Arc<dyn EventStore>, config: ServerConfig) -> Self {
        let registry = Arc::new(SubscriberRegistry::new(config.subscriber_buffer));
        let (shutdown, _) = watch::channel(false);

        Self {
            pipeline: Arc::new(IngestPipeline::new(store, registry)),
            config,
            shutdown: Arc::new(shutdown),
        }
    }

    /// Validate, persist and broadcast a submission.
    ///
    /// Runs on a detached blocking task, so a client that disconnects
    /// mid-request cannot interrupt a commit in progress.
    pub async fn submit(&self, kind: EventKind, body: Value) -> Result<StoredEvent, AppError> {
        let pipeline = self.pipeline.clone();
        let stored = tokio::task::spawn_blocking(move || pipeline.submit_raw(kind, &body))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))??;
        Ok(stored)
    }

    /// All committed events of a kind.
    pub async fn list(&self, kind: EventKind) -> Result<Vec<StoredEvent>, AppError> {
        let pipeline = self.pipeline.clone();
        let events = tokio::task::spawn_blocking(move || pipeline.list(kind))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))??;
        Ok(events)
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.pipeline.registry().len()
    }

    /// Receiver that flips to `true` when the server begins shutting down.
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Tell every open subscription to close.
    pub fn begin_shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}
