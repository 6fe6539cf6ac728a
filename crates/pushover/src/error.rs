//! CLI error types with miette diagnostics.
//!
//! Maps core, config and credential errors into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use pushover_config::{ConfigError, CredentialError};
use pushover_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const EVICTED: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
#[allow(unused_assignments)]
pub enum CliError {
    // ── Session ──────────────────────────────────────────────────────

    #[error("Not logged in")]
    #[diagnostic(
        code(pushover::not_logged_in),
        help(
            "No usable session in {path}.\n\
             Run: pushover login"
        )
    )]
    NotLoggedIn { path: String },

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(pushover::auth_failed),
        help(
            "Check your email and password, or log in again to get a new session.\n\
             Run: pushover login --force"
        )
    )]
    AuthFailed { message: String },

    #[error("Two-factor code required")]
    #[diagnostic(
        code(pushover::twofa_required),
        help("Pass the current code with: pushover login --twofa <CODE>")
    )]
    TwoFactorRequired,

    #[error("This device was logged out by a login elsewhere")]
    #[diagnostic(
        code(pushover::evicted),
        help(
            "Another client logged in with this device. The stored session was cleared.\n\
             Run: pushover login"
        )
    )]
    Evicted,

    #[error("The push server rejected this device permanently")]
    #[diagnostic(
        code(pushover::device_error),
        help(
            "Re-enable the device on the Pushover website or register a new one.\n\
             Run: pushover login --force"
        )
    )]
    DevicePermanentError,

    // ── Connection ───────────────────────────────────────────────────

    #[error("Connection failed: {reason}")]
    #[diagnostic(
        code(pushover::connection_failed),
        help("Check network access to api.pushover.net and client.pushover.net.")
    )]
    ConnectionFailed { reason: String },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(pushover::timeout),
        help("Increase [api] timeout_secs in the config file or retry later.")
    )]
    Timeout { seconds: u64 },

    #[error("API error: {message}")]
    #[diagnostic(code(pushover::api_error))]
    Api { message: String },

    // ── Validation / config ──────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(pushover::validation))]
    Validation { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(
        code(pushover::config),
        help("Check the config file and PUSHOVER_* environment variables.")
    )]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(code(pushover::credentials))]
    Credentials(CredentialError),

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(pushover::json))]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotLoggedIn { .. }
            | Self::AuthFailed { .. }
            | Self::TwoFactorRequired
            | Self::DevicePermanentError => exit_code::AUTH,
            Self::Evicted => exit_code::EVICTED,
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::Config(ConfigError::Validation { .. }) => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },
            CoreError::TwoFactorRequired => CliError::TwoFactorRequired,
            CoreError::Evicted => CliError::Evicted,
            CoreError::DevicePermanentError => CliError::DevicePermanentError,
            CoreError::ConnectionFailed { reason } => CliError::ConnectionFailed { reason },
            CoreError::RetriesExhausted { attempts } => CliError::ConnectionFailed {
                reason: format!("gave up after {attempts} reconnect attempts"),
            },
            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },
            CoreError::Api { message, status } => CliError::Api {
                message: match status {
                    Some(code) => format!("{message} (HTTP {code})"),
                    None => message,
                },
            },
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
            CoreError::Internal(msg) => CliError::Internal(msg),
        }
    }
}

impl From<pushover_api::Error> for CliError {
    fn from(err: pushover_api::Error) -> Self {
        CoreError::from(err).into()
    }
}

impl From<CredentialError> for CliError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::NotFound { path } => CliError::NotLoggedIn {
                path: path.display().to_string(),
            },
            other => CliError::Credentials(other),
        }
    }
}
