//! In-process event store.

use parking_lot::RwLock;

use super::EventStore;
use crate::error::StorageError;
use crate::event::{Event, EventKind, StoredEvent};

/// Event store that keeps everything in memory. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    partitions: RwLock<[Vec<StoredEvent>; 2]>,
}

impl MemoryEventStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed events of a kind.
    pub fn len(&self, kind: EventKind) -> usize {
        self.partitions.read()[kind.index()].len()
    }

    /// Check if no event of a kind was committed.
    pub fn is_empty(&self, kind: EventKind) -> bool {
        self.len(kind) == 0
    }
}

impl EventStore for MemoryEventStore {
    fn append(&self, event: Event) -> Result<StoredEvent, StorageError> {
        let mut partitions = self.partitions.write();
        let partition = &mut partitions[event.kind().index()];
        let id = partition.last().map_or(1, |last| last.id + 1);

        let stored = StoredEvent::new(id, event);
        partition.push(stored.clone());
        Ok(stored)
    }

    fn list(&self, kind: EventKind) -> Result<Vec<StoredEvent>, StorageError> {
        Ok(self.partitions.read()[kind.index()].clone())
    }
}
