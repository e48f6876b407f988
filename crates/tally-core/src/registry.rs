//! Registry of live subscribers.
//!
//! Each subscriber owns a bounded queue. The registry holds the sending half
//! behind a [`SubscriberHandle`]; the session holds the receiving half.
//! Mutations take the write lock, and [`SubscriberRegistry::snapshot`] copies
//! the handles out under a short read lock, so broadcasting never iterates a
//! structure that is being mutated.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::broadcast::Frame;
use crate::error::DeliveryError;

/// Default capacity of each subscriber's outbound queue.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 1024;

/// Ids are process-wide so a handle from one registry can never alias a
/// handle in another.
static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one subscriber connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    fn next() -> Self {
        Self(NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Opaque reference to one live subscriber.
///
/// Only the registry can create one, and cloning it does not create a new
/// registration.
#[derive(Debug, Clone)]
pub struct SubscriberHandle {
    id: SubscriberId,
    tx: mpsc::Sender<Frame>,
}

impl SubscriberHandle {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Whether the receiving session has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Enqueue a frame without waiting.
    pub(crate) fn try_deliver(&self, frame: &Frame) -> Result<(), DeliveryError> {
        self.tx.try_send(Arc::clone(frame)).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::Lagged,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

/// The set of currently live subscribers.
pub struct SubscriberRegistry {
    handles: RwLock<HashMap<SubscriberId, SubscriberHandle>>,
    buffer: usize,
}

impl SubscriberRegistry {
    /// Create a registry whose subscribers queue up to `buffer` frames each.
    pub fn new(buffer: usize) -> Self {
        Self {
            handles: RwLock::new(HashMap::new()),
            buffer: buffer.max(1),
        }
    }

    /// Create and add a new subscriber. Returns its handle and the receiving
    /// half of its queue.
    pub fn register(&self) -> (SubscriberHandle, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(self.buffer);
        let handle = SubscriberHandle {
            id: SubscriberId::next(),
            tx,
        };

        self.handles.write().insert(handle.id, handle.clone());
        tracing::debug!(subscriber = %handle.id, "subscriber registered");

        (handle, rx)
    }

    /// Remove a subscriber. Removing an absent handle is a no-op.
    ///
    /// Returns whether the handle was present.
    pub fn unregister(&self, handle: &SubscriberHandle) -> bool {
        let removed = self.handles.write().remove(&handle.id).is_some();
        if removed {
            tracing::debug!(subscriber = %handle.id, "subscriber unregistered");
        }
        removed
    }

    /// Handles live at the instant of the call.
    pub fn snapshot(&self) -> Vec<SubscriberHandle> {
        self.handles.read().values().cloned().collect()
    }

    /// Check whether a subscriber is registered.
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.handles.read().contains_key(&id)
    }

    /// Number of live subscribers.
    pub fn len(&self) -> usize {
        self.handles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.read().is_empty()
    }

    /// Capacity of each subscriber's queue.
    pub fn buffer(&self) -> usize {
        self.buffer
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

/// Shared registry handle.
pub type SharedRegistry = Arc<SubscriberRegistry>;
