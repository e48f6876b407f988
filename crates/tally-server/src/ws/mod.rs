//! WebSocket subscription channel.

mod subscribe;

pub use subscribe::{run_subscription, ws_subscribe, SessionSettings};
