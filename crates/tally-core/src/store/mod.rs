//! Durable append-only event storage.
//!
//! Each [`EventKind`] lives in its own partition with its own identity
//! sequence. `list` materializes the whole partition; history is expected to
//! be bounded by retention, and there is no pagination.

mod config;
mod memory;
mod sled_store;

pub use config::StoreConfig;
pub use memory::MemoryEventStore;
pub use sled_store::SledEventStore;

use crate::error::StorageError;
use crate::event::{Event, EventKind, StoredEvent};

/// Storage backend for committed events.
pub trait EventStore: Send + Sync {
    /// Persist one event and return it with its assigned identity.
    ///
    /// Identities are assigned atomically per kind: concurrent appends of the
    /// same kind never share an id, and ids increase in commit order.
    fn append(&self, event: Event) -> Result<StoredEvent, StorageError>;

    /// All events of a kind in commit order.
    fn list(&self, kind: EventKind) -> Result<Vec<StoredEvent>, StorageError>;

    /// Flush any buffered writes.
    fn flush(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
