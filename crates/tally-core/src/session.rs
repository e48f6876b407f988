//! Lifecycle of one subscriber connection.
//!
//! A session moves `Connecting → Open → Closed`. Opening registers a handle
//! with the registry; closing unregisters that same handle exactly once. A
//! session dropped while open closes itself, so a panicking or cancelled
//! connection task never leaves a stale registration behind.

use std::fmt;

use tokio::sync::mpsc;

use crate::broadcast::Frame;
use crate::registry::{SharedRegistry, SubscriberHandle, SubscriberId};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Closed,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The subscriber closed the channel.
    ClientClosed,
    /// Reading from or writing to the transport failed.
    TransportError,
    /// Nothing was heard from the subscriber within the idle timeout.
    IdleTimeout,
    /// The server is shutting down.
    Shutdown,
    /// The session was dropped without an explicit close.
    Dropped,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            CloseReason::ClientClosed => "client closed",
            CloseReason::TransportError => "transport error",
            CloseReason::IdleTimeout => "idle timeout",
            CloseReason::Shutdown => "shutdown",
            CloseReason::Dropped => "dropped",
        };
        f.write_str(reason)
    }
}

/// One subscriber's registration and inbound frame queue.
pub struct SubscriptionSession {
    registry: SharedRegistry,
    state: SessionState,
    handle: Option<SubscriberHandle>,
    rx: Option<mpsc::Receiver<Frame>>,
    frames_received: u64,
}

impl SubscriptionSession {
    /// Create a session in the `Connecting` state. Nothing is registered yet.
    pub fn new(registry: SharedRegistry) -> Self {
        Self {
            registry,
            state: SessionState::Connecting,
            handle: None,
            rx: None,
            frames_received: 0,
        }
    }

    /// Register with the registry and move to `Open`.
    ///
    /// Calling this on an open session returns its existing id. A closed
    /// session cannot be reopened and returns `None`.
    pub fn open(&mut self) -> Option<SubscriberId> {
        match self.state {
            SessionState::Connecting => {
                let (handle, rx) = self.registry.register();
                let id = handle.id();
                self.handle = Some(handle);
                self.rx = Some(rx);
                self.state = SessionState::Open;
                tracing::info!(subscriber = %id, "subscriber connected");
                Some(id)
            }
            SessionState::Open => self.id(),
            SessionState::Closed => None,
        }
    }

    /// Wait for the next broadcast frame.
    ///
    /// Returns `None` once the session is not open.
    pub async fn recv(&mut self) -> Option<Frame> {
        let frame = self.rx.as_mut()?.recv().await?;
        self.frames_received += 1;
        Some(frame)
    }

    /// Unregister and move to `Closed`. Later calls are no-ops.
    pub fn close(&mut self, reason: CloseReason) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closed;
        self.rx = None;

        if let Some(handle) = self.handle.take() {
            self.registry.unregister(&handle);
            tracing::info!(
                subscriber = %handle.id(),
                reason = %reason,
                frames = self.frames_received,
                "subscriber disconnected"
            );
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The registered id while open.
    pub fn id(&self) -> Option<SubscriberId> {
        self.handle.as_ref().map(SubscriberHandle::id)
    }

    /// Frames handed out by [`recv`](Self::recv) so far.
    pub fn frames_received(&self) -> u64 {
        self.frames_received
    }
}

impl Drop for SubscriptionSession {
    fn drop(&mut self) {
        self.close(CloseReason::Dropped);
    }
}
