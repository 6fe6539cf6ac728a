// pushover-api: Async Rust client for the Pushover Open Client API

pub mod client;
pub mod error;
pub mod models;
pub mod realtime;
pub mod transport;

pub use client::{AccountClient, DEFAULT_API_URL};
pub use error::Error;
pub use models::{Message, generate_device_name, validate_device_name};
pub use realtime::{ControlSignal, DEFAULT_SOCKET_URL, SignalSocket, login_frame};
pub use transport::{TlsMode, TransportConfig};
