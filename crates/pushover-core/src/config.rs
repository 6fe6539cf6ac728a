// ── Runtime connection configuration ──
//
// These types describe *how* the realtime loop connects and recovers.
// They never touch disk: pushover-config builds a `RealtimeConfig` and
// hands it in.

use std::time::Duration;

use pushover_api::TlsMode;
use url::Url;

/// Exponential backoff configuration for socket reconnection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 60s.
    pub max_delay: Duration,

    /// Maximum consecutive failed attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            max_retries: None,
        }
    }
}

impl ReconnectConfig {
    /// Exponential backoff with jitter.
    ///
    /// `delay = min(initial * 2^attempt, max) * (1 + 0.25 * sin(7.3 * attempt))`
    ///
    /// Jitter is +-25%, deterministic per attempt number, enough to
    /// spread out reconnection storms from many clients.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.min(30)).unwrap_or(30);
        let base = self.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
        let capped = base.min(self.max_delay.as_secs_f64());

        let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
        let with_jitter = (capped * jitter_factor).max(0.0);

        Duration::from_secs_f64(with_jitter)
    }
}

/// Configuration for one realtime connection.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Push endpoint (`wss://client.pushover.net/push`).
    pub socket_url: Url,

    /// TLS trust for the push socket.
    pub tls: TlsMode,

    /// Upper bound on opening the socket, including the TLS and
    /// WebSocket handshakes and the login frame.
    pub connect_timeout: Duration,

    /// Longest silence tolerated on an open socket before it is treated
    /// as dead. The server sends keep-alives well inside this window.
    pub idle_timeout: Duration,

    /// Run one fetch cycle right after every successful authentication,
    /// picking up messages that arrived while disconnected.
    pub sync_on_connect: bool,

    /// Reconnect backoff policy.
    pub reconnect: ReconnectConfig,
}

impl RealtimeConfig {
    /// Defaults for the given push endpoint.
    pub fn new(socket_url: Url) -> Self {
        Self {
            socket_url,
            tls: TlsMode::System,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(90),
            sync_on_connect: true,
            reconnect: ReconnectConfig::default(),
        }
    }
}
