//! Tally HTTP/WebSocket gateway.
//!
//! Producers post test results and usage logs over REST; observers connect to
//! `/ws` and receive every committed event as it happens.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod ws;

pub use config::{Args, ServerConfig};
pub use error::AppError;
pub use state::AppState;

use std::future::Future;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::health::routes())
        .merge(routes::events::routes())
        .route("/ws", get(ws::ws_subscribe))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve until `shutdown` resolves, then close every open subscription and
/// flush the store.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state.clone());
    let signal_state = state.clone();

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("shutting down");
            signal_state.begin_shutdown();
        })
        .await?;

    if let Err(e) = state.pipeline.store().flush() {
        tracing::error!(error = %e, "failed to flush event store");
    }
    Ok(())
}
