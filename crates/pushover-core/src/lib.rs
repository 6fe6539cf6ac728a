// pushover-core: Realtime connection and dispatch engine between pushover-api and consumers.

pub mod account;
pub mod config;
pub mod connection;
pub mod credentials;
pub mod dispatch;
pub mod error;
pub mod session;
pub mod shell;

// ── Primary re-exports ──────────────────────────────────────────────
pub use account::AccountApi;
pub use config::{RealtimeConfig, ReconnectConfig};
pub use connection::{ConnectionState, RealtimeConnection};
pub use credentials::{Credentials, Session};
pub use dispatch::{DispatchRegistry, DispatchReport, HandlerError, HandlerResult};
pub use error::CoreError;
pub use session::{SessionOutcome, ensure_session};
pub use shell::{ShellExecutor, ShellTemplate, SystemShell};

pub use pushover_api::Message;
