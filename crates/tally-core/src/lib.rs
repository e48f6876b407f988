//! Tally Core - event storage, subscriber registry and the ingest pipeline.
//!
//! Producers submit events through an [`IngestPipeline`], which validates them,
//! commits them to an [`EventStore`] and pushes the committed record to every
//! live [`SubscriptionSession`].

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod broadcast;
pub mod error;
pub mod event;
pub mod pipeline;
pub mod registry;
pub mod session;
pub mod store;
pub mod validate;

pub use broadcast::{BroadcastReport, Broadcaster, Frame};
pub use error::{DeliveryError, StorageError, SubmitError, ValidationError};
pub use event::{Event, EventKind, StoredEvent, TestResult, UsageLog};
pub use pipeline::{Accepted, IngestPipeline};
pub use registry::{
    SharedRegistry, SubscriberHandle, SubscriberId, SubscriberRegistry, DEFAULT_SUBSCRIBER_BUFFER,
};
pub use session::{CloseReason, SessionState, SubscriptionSession};
pub use store::{EventStore, MemoryEventStore, SledEventStore, StoreConfig};
