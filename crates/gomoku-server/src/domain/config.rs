//! Server configuration types.
//!
//! [`ServerConfig`] is the resolved set of runtime settings.  The
//! infrastructure layer builds it from defaults, the TOML file and the
//! command line; everything below `main.rs` only ever sees this struct.

use std::net::SocketAddr;
use std::time::Duration;

/// Default TCP port the server listens on.
pub const DEFAULT_PORT: u16 = 8080;

/// All runtime configuration for the session server.
///
/// Build this once at startup and wrap it in an `Arc` so every connection
/// task can share it.
///
/// # Example
///
/// ```rust
/// use gomoku_server::domain::ServerConfig;
///
/// let cfg = ServerConfig::default();
/// assert_eq!(cfg.bind_addr.port(), 8080);
/// assert!(cfg.idle_timeout.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address and port the TCP listener binds to.
    pub bind_addr: SocketAddr,

    /// Close a connection that sends nothing for this long.  `None` disables
    /// the idle check.
    pub idle_timeout: Option<Duration>,

    /// Capacity of each session's outbound message queue.  Messages sent to
    /// a full queue are dropped.
    pub outbound_queue: usize,

    /// Longest accepted inbound line in bytes, excluding the terminator.
    pub max_line_length: usize,

    /// How long a finished room stays listed before the reaper removes it.
    pub finished_ttl: Duration,

    /// How often the reaper runs.
    pub sweep_interval: Duration,
}

impl ServerConfig {
    /// Converts an idle timeout in seconds into the optional form, with `0`
    /// meaning "disabled".
    pub fn idle_timeout_from_secs(secs: u64) -> Option<Duration> {
        (secs > 0).then(|| Duration::from_secs(secs))
    }
}

impl Default for ServerConfig {
    /// | Field           | Default        |
    /// |-----------------|----------------|
    /// | bind_addr       | `0.0.0.0:8080` |
    /// | idle_timeout    | disabled       |
    /// | outbound_queue  | 256            |
    /// | max_line_length | 1024           |
    /// | finished_ttl    | 300 seconds    |
    /// | sweep_interval  | 30 seconds     |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            idle_timeout: None,
            outbound_queue: 256,
            max_line_length: 1024,
            finished_ttl: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(30),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_port_is_8080() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind_addr.port(), 8080);
        assert_eq!(cfg.bind_addr.ip().to_string(), "0.0.0.0");
    }

    #[test]
    fn test_default_limits() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.outbound_queue, 256);
        assert_eq!(cfg.max_line_length, 1024);
    }

    #[test]
    fn test_default_eviction_timings() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.finished_ttl, Duration::from_secs(300));
        assert_eq!(cfg.sweep_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_idle_timeout_zero_disables() {
        assert_eq!(ServerConfig::idle_timeout_from_secs(0), None);
        assert_eq!(
            ServerConfig::idle_timeout_from_secs(45),
            Some(Duration::from_secs(45))
        );
    }
}
