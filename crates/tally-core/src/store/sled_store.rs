//! Sled-backed event store.

use parking_lot::Mutex;
use sled::{Db, Tree};

use super::{EventStore, StoreConfig};
use crate::error::StorageError;
use crate::event::{Event, EventKind, StoredEvent, TestResult, UsageLog};

/// One append-only partition.
///
/// Entries are keyed by id in big-endian so sled's key order is commit order.
struct Partition {
    tree: Tree,
    /// Highest committed id. Held across the insert so ids are gap-free.
    last_id: Mutex<u64>,
}

impl Partition {
    fn open(db: &Db, kind: EventKind) -> Result<Self, StorageError> {
        let tree = db.open_tree(kind.partition())?;
        let last_id = load_last_id(&tree)?;

        Ok(Self {
            tree,
            last_id: Mutex::new(last_id),
        })
    }
}

/// Load the last id from the tree, or 0 if empty.
fn load_last_id(tree: &Tree) -> Result<u64, StorageError> {
    match tree.last()? {
        Some((key, _)) => decode_id(&key),
        None => Ok(0),
    }
}

fn decode_id(key: &[u8]) -> Result<u64, StorageError> {
    let bytes: [u8; 8] = key.try_into().map_err(|_| StorageError::InvalidKey)?;
    Ok(u64::from_be_bytes(bytes))
}

fn encode_event(event: &Event) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec(event).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode_event(kind: EventKind, bytes: &[u8]) -> Result<Event, StorageError> {
    let event = match kind {
        EventKind::TestResult => serde_json::from_slice::<TestResult>(bytes).map(Event::from),
        EventKind::UsageLog => serde_json::from_slice::<UsageLog>(bytes).map(Event::from),
    };
    event.map_err(|e| StorageError::Deserialization(e.to_string()))
}

/// Event store persisting each kind in its own sled tree.
pub struct SledEventStore {
    db: Db,
    partitions: [Partition; 2],
    flush_on_append: bool,
}

impl SledEventStore {
    /// Open or create a store with the given configuration.
    pub fn open(config: StoreConfig) -> Result<Self, StorageError> {
        let db = config.to_sled_config().open()?;
        let partitions = [
            Partition::open(&db, EventKind::TestResult)?,
            Partition::open(&db, EventKind::UsageLog)?,
        ];

        tracing::debug!(
            path = %config.path.display(),
            temporary = config.temporary,
            recovered = db.was_recovered(),
            "event store opened"
        );

        Ok(Self {
            db,
            partitions,
            flush_on_append: config.flush_on_append,
        })
    }

    fn partition(&self, kind: EventKind) -> &Partition {
        &self.partitions[kind.index()]
    }

    /// Highest id committed for a kind, 0 if none.
    pub fn last_id(&self, kind: EventKind) -> u64 {
        *self.partition(kind).last_id.lock()
    }
}

impl EventStore for SledEventStore {
    fn append(&self, event: Event) -> Result<StoredEvent, StorageError> {
        let kind = event.kind();
        let partition = self.partition(kind);
        let value = encode_event(&event)?;

        let mut last_id = partition.last_id.lock();
        let id = last_id.checked_add(1).ok_or(StorageError::IdExhausted)?;
        partition.tree.insert(id.to_be_bytes(), value)?;
        *last_id = id;

        if self.flush_on_append {
            partition.tree.flush()?;
        }
        drop(last_id);

        tracing::trace!(kind = %kind, id, "event appended");
        Ok(StoredEvent::new(id, event))
    }

    fn list(&self, kind: EventKind) -> Result<Vec<StoredEvent>, StorageError> {
        self.partition(kind)
            .tree
            .iter()
            .map(|entry| -> Result<StoredEvent, StorageError> {
                let (key, value) = entry?;
                Ok(StoredEvent::new(decode_id(&key)?, decode_event(kind, &value)?))
            })
            .collect()
    }

    fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn usage(domain: &str, duration: i64) -> Event {
        UsageLog {
            domain: domain.to_string(),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            duration,
        }
        .into()
    }

    fn test_result(tag: &str) -> Event {
        let mut payload = Map::new();
        payload.insert("pass".to_string(), json!(true));
        TestResult {
            kind: tag.to_string(),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            payload,
        }
        .into()
    }

    #[test]
    fn test_append_assigns_increasing_ids() {
        let store = SledEventStore::open(StoreConfig::temporary()).unwrap();

        let first = store.append(usage("a.io", 1)).unwrap();
        let second = store.append(usage("b.io", 2)).unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(store.last_id(EventKind::UsageLog), 2);
    }

    #[test]
    fn test_partitions_have_independent_ids() {
        let store = SledEventStore::open(StoreConfig::temporary()).unwrap();

        store.append(usage("a.io", 1)).unwrap();
        store.append(usage("a.io", 1)).unwrap();
        let result = store.append(test_result("unit")).unwrap();

        assert_eq!(result.id, 1);
        assert_eq!(store.list(EventKind::TestResult).unwrap().len(), 1);
        assert_eq!(store.list(EventKind::UsageLog).unwrap().len(), 2);
    }

    #[test]
    fn test_list_returns_commit_order() {
        let store = SledEventStore::open(StoreConfig::temporary()).unwrap();
        for i in 0..300 {
            store.append(usage("x", i)).unwrap();
        }

        let logs = store.list(EventKind::UsageLog).unwrap();
        let ids: Vec<u64> = logs.iter().map(|e| e.id).collect();
        assert_eq!(ids, (1..=300).collect::<Vec<_>>());
        assert_eq!(logs[255].event, usage("x", 255));
    }

    #[test]
    fn test_reopen_resumes_ids() {
        let dir = tempfile::tempdir().unwrap();

        {
            let store = SledEventStore::open(StoreConfig::new(dir.path())).unwrap();
            store.append(test_result("unit")).unwrap();
            store.append(test_result("e2e")).unwrap();
            store.flush().unwrap();
        }

        let store = SledEventStore::open(StoreConfig::new(dir.path())).unwrap();
        assert_eq!(store.last_id(EventKind::TestResult), 2);

        let next = store.append(test_result("smoke")).unwrap();
        assert_eq!(next.id, 3);

        let history = store.list(EventKind::TestResult).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].event, test_result("unit"));
    }

    #[test]
    fn test_concurrent_appends_never_collide() {
        let store = std::sync::Arc::new(SledEventStore::open(StoreConfig::temporary()).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    (0..25)
                        .map(|i| store.append(usage("c", t * 100 + i)).unwrap().id)
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        ids.sort_unstable();

        assert_eq!(ids, (1..=200).collect::<Vec<_>>());
    }

    #[test]
    fn test_decode_id_rejects_short_keys() {
        assert!(matches!(decode_id(&[1, 2, 3]), Err(StorageError::InvalidKey)));
        assert_eq!(decode_id(&5u64.to_be_bytes()).unwrap(), 5);
    }
}
