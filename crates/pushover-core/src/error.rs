// ── Core error types ──
//
// Errors surfaced by the connection engine. Consumers see connection
// outcomes (evicted, auth failed, transient failure) rather than HTTP
// status codes. The `From<pushover_api::Error>` impl does the mapping.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Fatal session errors ─────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Two-factor authentication code required")]
    TwoFactorRequired,

    #[error("Session closed: this device logged in from another session")]
    Evicted,

    #[error("Push server reported a permanent error: log in again or re-enable the device")]
    DevicePermanentError,

    // ── Transient errors ─────────────────────────────────────────────
    #[error("Connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Gave up reconnecting after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Returns `true` if the realtime loop must stop instead of
    /// reconnecting.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed { .. }
                | Self::TwoFactorRequired
                | Self::Evicted
                | Self::DevicePermanentError
                | Self::Config { .. }
                | Self::RetriesExhausted { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<pushover_api::Error> for CoreError {
    fn from(err: pushover_api::Error) -> Self {
        use pushover_api::Error as Api;

        match err {
            Api::Authentication { message } => CoreError::AuthenticationFailed { message },
            Api::TwoFactorRequired => CoreError::TwoFactorRequired,
            Api::Rejected { status, errors } => CoreError::AuthenticationFailed {
                message: format!("request rejected (HTTP {status}): {}", errors.join("; ")),
            },
            Api::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else {
                    CoreError::ConnectionFailed {
                        reason: e.to_string(),
                    }
                }
            }
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            Api::Tls(msg) => CoreError::ConnectionFailed {
                reason: format!("TLS error: {msg}"),
            },
            Api::RateLimited => CoreError::Api {
                message: "rate limited".into(),
                status: Some(429),
            },
            Api::Server { status } => CoreError::Api {
                message: "server error".into(),
                status: Some(status),
            },
            Api::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                reason: format!("WebSocket connection failed: {reason}"),
            },
            Api::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                reason: format!("WebSocket closed (code {code}): {reason}"),
            },
            Api::Deserialization { message, body: _ } => CoreError::Api {
                message: format!("unexpected response: {message}"),
                status: None,
            },
            Api::InvalidInput { field, reason } => CoreError::Config {
                message: format!("invalid {field}: {reason}"),
            },
        }
    }
}
