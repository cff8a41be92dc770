//! Timeouts and buffer limits for the proxy's connection handling.
//!
//! Every duration named here corresponds directly to one of the suspension
//! points described in the design: the initial client header read, the
//! upstream connect and read, the tunnel idle wait, and the per-worker join
//! during shutdown. Defaults match the behavior frozen in the design notes;
//! change them through [`ProxyConfig`](crate::config::ProxyConfig) rather
//! than editing these constants.

use std::time::Duration;

/// Limits governing a single client connection, from accept to close.
#[derive(Debug, Clone)]
pub struct ConnLimits {
    /// Time allowed to accumulate the header block before giving up (default: `5s`).
    ///
    /// Applies to every `read()` while waiting for `CRLF CRLF`. A connection
    /// that stalls longer than this, or one that never sends a byte, is
    /// closed without a log entry — see the propagation policy.
    pub header_read_timeout: Duration,

    /// Maximum size of the header block read before parsing (default: `64 KiB`).
    ///
    /// If `CRLF CRLF` has not appeared by the time this many bytes have been
    /// read, the connection is closed without a log entry.
    pub max_header_bytes: usize,

    /// Time allowed to establish the upstream TCP connection (default: `10s`).
    pub connect_timeout: Duration,

    /// Time allowed between chunks while reading the upstream response, or
    /// while either side of a tunnel is idle before the relay gives up on a
    /// quiet connection (default: `10s` for the forwarder).
    pub upstream_read_timeout: Duration,

    /// Idle timeout for the `CONNECT` relay: the tunnel closes once neither
    /// side has produced a byte for this long (default: `15s`).
    pub tunnel_idle_timeout: Duration,

    /// Size of each chunk read from the upstream socket or relayed between
    /// tunnel peers (default: `4 KiB`).
    pub relay_chunk_size: usize,

    /// Time the lifecycle controller waits for a single worker to finish
    /// during shutdown before giving up on it (default: `2s`).
    pub worker_join_timeout: Duration,
}

impl Default for ConnLimits {
    fn default() -> Self {
        Self {
            header_read_timeout: Duration::from_secs(5),
            max_header_bytes: 64 * 1024,
            connect_timeout: Duration::from_secs(10),
            upstream_read_timeout: Duration::from_secs(10),
            tunnel_idle_timeout: Duration::from_secs(15),
            relay_chunk_size: 4 * 1024,
            worker_join_timeout: Duration::from_secs(2),
        }
    }
}
