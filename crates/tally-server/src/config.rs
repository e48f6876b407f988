//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tally_core::{StoreConfig, DEFAULT_SUBSCRIBER_BUFFER};

/// Tally server command line arguments.
#[derive(Debug, Parser)]
#[command(name = "tally-server")]
#[command(about = "Ingest test results and usage logs, and stream them live over WebSocket")]
#[command(version)]
pub struct Args {
    /// Address to listen on for HTTP and WebSocket requests.
    #[arg(short, long, default_value = "127.0.0.1:8000")]
    pub listen: String,

    /// Directory holding the event database.
    #[arg(short, long, default_value = "./tally_data")]
    pub data_dir: PathBuf,

    /// Keep events in memory only.
    #[arg(long, default_value_t = false)]
    pub ephemeral: bool,

    /// Do not flush to disk on every append.
    #[arg(long, default_value_t = false)]
    pub no_flush: bool,

    /// Page cache size in megabytes.
    #[arg(long, default_value_t = 64)]
    pub cache_capacity_mb: u64,

    /// Frames queued per subscriber before it counts as lagging.
    #[arg(long, default_value_t = DEFAULT_SUBSCRIBER_BUFFER)]
    pub subscriber_buffer: usize,

    /// Seconds between WebSocket pings.
    #[arg(long, default_value_t = 30)]
    pub ping_interval_secs: u64,

    /// Close subscribers that have sent nothing for this many seconds.
    #[arg(long, default_value_t = 60)]
    pub idle_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on.
    pub listen_addr: String,
    /// Event database directory.
    pub data_dir: PathBuf,
    /// Use an in-memory store instead of the database.
    pub ephemeral: bool,
    /// Flush each append before acknowledging it.
    pub flush_on_append: bool,
    /// Page cache capacity in bytes.
    pub cache_capacity: u64,
    /// Per-subscriber queue capacity.
    pub subscriber_buffer: usize,
    /// Interval between WebSocket pings.
    pub ping_interval: Duration,
    /// Silence after which a subscriber is disconnected.
    pub idle_timeout: Duration,
}

impl ServerConfig {
    /// Storage configuration derived from this server configuration.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(&self.data_dir)
            .with_cache_capacity(self.cache_capacity)
            .with_flush_on_append(self.flush_on_append)
    }
}

impl From<&Args> for ServerConfig {
    fn from(args: &Args) -> Self {
        Self {
            listen_addr: args.listen.clone(),
            data_dir: args.data_dir.clone(),
            ephemeral: args.ephemeral,
            flush_on_append: !args.no_flush,
            cache_capacity: args.cache_capacity_mb * 1024 * 1024,
            subscriber_buffer: args.subscriber_buffer,
            ping_interval: Duration::from_secs(args.ping_interval_secs),
            idle_timeout: Duration::from_secs(args.idle_timeout_secs),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8000".to_string(),
            data_dir: PathBuf::from("./tally_data"),
            ephemeral: false,
            flush_on_append: true,
            cache_capacity: 64 * 1024 * 1024,
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
            ping_interval: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(60),
        }
    }
}
