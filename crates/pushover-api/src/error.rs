use thiserror::Error;

/// Top-level error type for the `pushover-api` crate.
///
/// Covers every failure mode across both API surfaces: the
/// request/response endpoints and the realtime signalling socket.
/// `pushover-core` maps these into connection-level decisions.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login failed (wrong email/password, account locked, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The account has two-factor authentication enabled and no code was
    /// supplied (the vendor answers HTTP 412).
    #[error("Two-factor authentication code required")]
    TwoFactorRequired,

    /// The vendor refused a request made with a secret/device pair
    /// (expired secret, deleted or disabled device).
    #[error("Request rejected (HTTP {status}): {}", errors.join("; "))]
    Rejected { status: u16, errors: Vec<String> },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request or handshake timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Rate limited by the vendor.
    #[error("Rate limited (HTTP 429)")]
    RateLimited,

    /// The vendor answered with a server-side failure.
    #[error("Server error (HTTP {status})")]
    Server { status: u16 },

    // ── Realtime socket ─────────────────────────────────────────────
    /// Socket connection or read failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// Socket closed by the server.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// Caller-supplied value rejected before any request was made.
    #[error("Invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },
}

impl Error {
    /// Returns `true` if this error means the credentials in hand are no
    /// longer usable and a fresh login is required.
    pub fn is_auth_expired(&self) -> bool {
        matches!(
            self,
            Self::Authentication { .. } | Self::TwoFactorRequired | Self::Rejected { .. }
        )
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Timeout { .. }
            | Self::RateLimited
            | Self::Server { .. }
            | Self::WebSocketConnect(_)
            | Self::WebSocketClosed { .. } => true,
            _ => false,
        }
    }
}
