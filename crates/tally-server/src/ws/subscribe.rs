use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tally_core::{CloseReason, SharedRegistry, SubscriptionSession};
use tokio::sync::watch;
use tokio::time::{self, Instant};

use crate::state::AppState;

/// Liveness settings for one subscription.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    /// Interval between server pings.
    pub ping_interval: Duration,
    /// Close the session when nothing arrives for this long. Also bounds how
    /// long a single write may take.
    pub idle_timeout: Duration,
}

/// WebSocket upgrade handler for subscribers.
pub async fn ws_subscribe(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let registry = state.pipeline.registry().clone();
    let settings = SessionSettings {
        ping_interval: state.config.ping_interval,
        idle_timeout: state.config.idle_timeout,
    };
    let shutdown = state.shutdown_receiver();

    ws.on_upgrade(move |socket| run_subscription(socket, registry, settings, shutdown))
}

/// Drive one subscriber from upgrade to disconnect.
///
/// Broadcast frames are forwarded as text messages. Inbound messages carry no
/// meaning beyond proving the client is still there.
pub async fn run_subscription(
    socket: WebSocket,
    registry: SharedRegistry,
    settings: SessionSettings,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut session = SubscriptionSession::new(registry);
    let Some(subscriber) = session.open() else {
        return;
    };
    if *shutdown.borrow() {
        session.close(CloseReason::Shutdown);
        return;
    }

    let (mut ws_tx, mut ws_rx) = socket.split();

    let mut ping = time::interval(settings.ping_interval.max(Duration::from_millis(1)));
    // Skip the immediate first tick
    ping.tick().await;

    let idle = time::sleep(settings.idle_timeout);
    tokio::pin!(idle);

    let reason = loop {
        tokio::select! {
            frame = session.recv() => {
                let Some(frame) = frame else {
                    break CloseReason::Shutdown;
                };
                let send = ws_tx.send(Message::Text(frame.to_string()));
                match time::timeout(settings.idle_timeout, send).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::debug!(subscriber = %subscriber, error = %e, "write failed");
                        break CloseReason::TransportError;
                    }
                    Err(_) => {
                        tracing::warn!(subscriber = %subscriber, "write stalled, disconnecting");
                        break CloseReason::TransportError;
                    }
                }
            }
            inbound = ws_rx.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => break CloseReason::ClientClosed,
                Some(Ok(_)) => idle.as_mut().reset(Instant::now() + settings.idle_timeout),
                Some(Err(e)) => {
                    tracing::debug!(subscriber = %subscriber, error = %e, "read failed");
                    break CloseReason::TransportError;
                }
            },
            _ = ping.tick() => {
                if ws_tx.send(Message::Ping(Vec::new())).await.is_err() {
                    break CloseReason::TransportError;
                }
            }
            () = &mut idle => break CloseReason::IdleTimeout,
            _ = shutdown.changed() => break CloseReason::Shutdown,
        }
    };

    session.close(reason);

    if reason != CloseReason::TransportError {
        let _ = ws_tx.send(Message::Close(None)).await;
    }
}
