use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tally_server::{serve, AppState, Args, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    let log_filter = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("tally_server={log_filter},tally_core={log_filter},tower_http=info").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from(&args);
    info!(
        listen = %config.listen_addr,
        data_dir = %config.data_dir.display(),
        ephemeral = config.ephemeral,
        flush_on_append = config.flush_on_append,
        "Starting Tally server"
    );

    let state = AppState::open(config.clone())?;

    let listener = TcpListener::bind(&config.listen_addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    info!("Subscribe at ws://{}/ws", listener.local_addr()?);

    serve(listener, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    })
    .await?;

    Ok(())
}
