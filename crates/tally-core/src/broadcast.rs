//! Fan-out of serialized events to subscribers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::DeliveryError;
use crate::registry::{SubscriberHandle, SubscriberId};

/// A serialized event, shared by every subscriber queue it is pushed to.
pub type Frame = Arc<str>;

/// Per-subscriber outcome of one broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Handles in the snapshot.
    pub attempted: usize,
    /// Handles whose queue accepted the frame.
    pub delivered: usize,
    /// Handles that could not take the frame.
    pub failures: Vec<(SubscriberId, DeliveryError)>,
}

impl BroadcastReport {
    /// Whether every handle accepted the frame.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Delivers frames to a snapshot of subscribers.
///
/// Delivery is a non-blocking enqueue on each handle's own queue, so a stalled
/// or dead subscriber costs one failed `try_send` and nothing more. Failures
/// are logged and collected; they never stop delivery to the remaining
/// handles. Failed handles stay registered until their session closes.
#[derive(Debug, Default)]
pub struct Broadcaster {
    frames_delivered: AtomicU64,
    delivery_failures: AtomicU64,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push `frame` to every handle in `snapshot`.
    pub fn broadcast(&self, frame: &Frame, snapshot: &[SubscriberHandle]) -> BroadcastReport {
        let mut report = BroadcastReport {
            attempted: snapshot.len(),
            ..Default::default()
        };

        for handle in snapshot {
            match handle.try_deliver(frame) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::warn!(subscriber = %handle.id(), error = %e, "failed to deliver event");
                    report.failures.push((handle.id(), e));
                }
            }
        }

        self.frames_delivered
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.delivery_failures
            .fetch_add(report.failures.len() as u64, Ordering::Relaxed);

        tracing::debug!(
            attempted = report.attempted,
            delivered = report.delivered,
            failed = report.failures.len(),
            "broadcast complete"
        );

        report
    }

    /// Total frames accepted by subscriber queues.
    pub fn frames_delivered(&self) -> u64 {
        self.frames_delivered.load(Ordering::Relaxed)
    }

    /// Total failed deliveries.
    pub fn delivery_failures(&self) -> u64 {
        self.delivery_failures.load(Ordering::Relaxed)
    }
}
