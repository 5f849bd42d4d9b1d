//! Protocol bounds and server sizing.
//!
//! The parser bounds are deliberately strict: the whole request head must fit
//! a single fixed buffer, so every limit below translates directly into a
//! predictable per-connection memory ceiling.
//!
//! # Memory Consumption
//!
//! Each pooled connection owns exactly one [`CONN_BUFFER_SIZE`] buffer which
//! is reused for the received request head and for the formatted response
//! head. Nothing else is allocated per request on the happy path.

use crate::config::HttpConfig;
use std::time::Duration;

/// Per-connection buffer, shared between the request head and the formatted
/// response head (16 KiB).
pub const CONN_BUFFER_SIZE: usize = 16 * 1024;

/// Transport-level write granularity for response bodies. Bodies are sent as
/// plain entity bytes in slices of at most this size; this is not HTTP
/// chunked encoding.
pub const SEND_CHUNK_SIZE: usize = 16 * 1024;

/// Maximum request-target length in bytes (path plus query, verbatim).
pub const MAX_TARGET_SIZE: usize = 4000;

/// Maximum number of `name=value` pairs in a query string.
pub const MAX_QUERY_PAIRS: usize = 8;

/// Maximum number of header fields per request and per response.
pub const MAX_HEADERS: usize = 24;

/// Maximum header name length in bytes, after trimming.
pub const MAX_HEADER_NAME_SIZE: usize = 256;

/// Maximum header value length in bytes, after trimming.
pub const MAX_HEADER_VALUE_SIZE: usize = 4096;

/// Controls server-level concurrency and admission behavior.
///
/// Exactly `worker_slots` connection states are pre-allocated at startup and
/// recycled for the lifetime of the server. Accepted sockets wait in an
/// admission queue of at most `max_pending` entries; overflow receives an
/// immediate `503` status line.
#[derive(Debug, Clone)]
pub struct ServerLimits {
    /// Number of pre-allocated in-flight connection slots (default: `512`).
    pub worker_slots: usize,

    /// Maximum number of accepted sockets waiting for a free slot
    /// (default: `1024`).
    pub max_pending: usize,

    /// How the dispatch loop waits when a queue is empty
    /// (default: `Sleep(50µs)`).
    pub wait_strategy: WaitStrategy,
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self {
            worker_slots: 512,
            max_pending: 1024,
            wait_strategy: WaitStrategy::Sleep(Duration::from_micros(50)),
        }
    }
}

/// Strategy for dispatch-loop waiting when no work is available.
#[derive(Debug, Clone)]
pub enum WaitStrategy {
    /// Spin through [`tokio::task::yield_now`]. Lowest latency, busy CPU.
    Yield,
    /// Sleep between polls via [`tokio::time::sleep`].
    Sleep(Duration),
}

/// Per-connection timing and lifecycle switches.
#[derive(Debug, Clone)]
pub struct ConnLimits {
    /// Idle timer armed around every receive. A connection that stays silent
    /// this long is marked stale and shut down; a second expiry closes it.
    pub keepalive: Duration,

    /// When `true`, a fully-sent successful response loops the connection
    /// back to reading instead of terminating it.
    pub reuse_connections: bool,
}

impl Default for ConnLimits {
    fn default() -> Self {
        Self {
            keepalive: Duration::from_secs(30),
            reuse_connections: false,
        }
    }
}

impl From<&HttpConfig> for ConnLimits {
    fn from(cfg: &HttpConfig) -> Self {
        Self {
            keepalive: Duration::from_secs(cfg.keepalive.max(1) as u64),
            reuse_connections: cfg.reuse_connections,
        }
    }
}
