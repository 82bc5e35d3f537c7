//! Centralized configuration (environment variables + defaults).

use std::time::Duration;

/// Root directory the KV engine stores its files under.
///
/// Defaults to `.data/quipubase` under the user's home directory, matching
/// the original implementation's `~/.data/<collection>` layout.
pub fn storage_root() -> String {
    std::env::var("QUIPUBASE_STORAGE_ROOT").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        format!("{home}/.data/quipubase")
    })
}

/// Address the HTTP surface listens on.
pub fn listen_addr() -> String {
    std::env::var("QUIPUBASE_LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string())
}

/// Per-subscription bounded-buffer capacity (drop-oldest backpressure).
pub fn subscriber_buffer_capacity() -> usize {
    std::env::var("QUIPUBASE_SUBSCRIBER_BUFFER")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(64)
}

/// Interval between keep-alive comment frames on a streaming subscription.
pub fn keepalive_interval() -> Duration {
    let secs = std::env::var("QUIPUBASE_KEEPALIVE_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(15);
    Duration::from_secs(secs)
}

/// Deadline the server waits for live subscriptions to drain during shutdown.
pub fn shutdown_deadline() -> Duration {
    let secs = std::env::var("QUIPUBASE_SHUTDOWN_DEADLINE_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(5);
    Duration::from_secs(secs)
}

/// Maximum nesting depth the record model compiler accepts.
pub fn max_schema_depth() -> usize {
    std::env::var("QUIPUBASE_MAX_SCHEMA_DEPTH")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v >= 10)
        .unwrap_or(16)
}
