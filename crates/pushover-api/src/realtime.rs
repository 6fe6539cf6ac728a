//! Realtime signalling socket.
//!
//! The vendor's push endpoint never carries message content. After the
//! client sends a login frame, the server only emits single-byte control
//! tokens; message payloads are always fetched through the REST API.
//! This module owns the wire level of that exchange: connecting, sending
//! the login frame, and decoding frames into [`ControlSignal`]s. The
//! connection state machine and reconnect policy live in `pushover-core`.
//!
//! # Example
//!
//! ```rust,ignore
//! use pushover_api::realtime::{SignalSocket, ControlSignal};
//! use pushover_api::TlsMode;
//!
//! let url = Url::parse(pushover_api::DEFAULT_SOCKET_URL)?;
//! let mut socket = SignalSocket::connect(&url, &TlsMode::System, &device_id, &secret).await?;
//!
//! while let Some(signal) = socket.next_signal().await? {
//!     if signal == ControlSignal::NewMessage {
//!         // fetch and acknowledge
//!     }
//! }
//! ```

use std::collections::VecDeque;
use std::fmt;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::Error;
use crate::transport::TlsMode;

/// Production push endpoint.
pub const DEFAULT_SOCKET_URL: &str = "wss://client.pushover.net/push";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ── ControlSignal ────────────────────────────────────────────────────

/// A control token sent by the push server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlSignal {
    /// `#`: keep-alive, no response needed.
    KeepAlive,
    /// `!`: a new message arrived; sync with the REST API.
    NewMessage,
    /// `R`: drop the connection and reconnect.
    Reload,
    /// `E`: permanent problem (device disabled, login needed). Do not
    /// reconnect automatically.
    PermanentError,
    /// `A`: the device logged in from another session and this one is
    /// being closed. Do not reconnect automatically.
    Evicted,
}

impl ControlSignal {
    /// Decode one byte of a control frame.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'#' => Some(Self::KeepAlive),
            b'!' => Some(Self::NewMessage),
            b'R' => Some(Self::Reload),
            b'E' => Some(Self::PermanentError),
            b'A' => Some(Self::Evicted),
            _ => None,
        }
    }

    /// The wire byte for this signal.
    pub fn as_byte(self) -> u8 {
        match self {
            Self::KeepAlive => b'#',
            Self::NewMessage => b'!',
            Self::Reload => b'R',
            Self::PermanentError => b'E',
            Self::Evicted => b'A',
        }
    }

    /// `true` for the signals after which the client must not reconnect.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::PermanentError | Self::Evicted)
    }
}

impl fmt::Display for ControlSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::KeepAlive => "keep-alive",
            Self::NewMessage => "new-message",
            Self::Reload => "reload",
            Self::PermanentError => "permanent-error",
            Self::Evicted => "evicted",
        };
        f.write_str(name)
    }
}

/// The frame that authenticates a device on a freshly opened socket.
pub fn login_frame(device_id: &str, secret: &SecretString) -> String {
    format!("login:{device_id}:{}\n", secret.expose_secret())
}

// ── SignalSocket ─────────────────────────────────────────────────────

/// One open, logged-in connection to the push endpoint.
///
/// Dropping the socket closes the underlying connection.
pub struct SignalSocket {
    // Held so the write half stays open for the connection's lifetime.
    _write: SplitSink<WsStream, tungstenite::Message>,
    read: SplitStream<WsStream>,
    pending: VecDeque<ControlSignal>,
}

impl SignalSocket {
    /// Open the socket and send the login frame.
    ///
    /// Returns once the frame is written; the server's first control
    /// signal is the acknowledgement and is read by the caller through
    /// [`next_signal`](Self::next_signal).
    pub async fn connect(
        url: &Url,
        tls: &TlsMode,
        device_id: &str,
        secret: &SecretString,
    ) -> Result<Self, Error> {
        tracing::info!(url = %url, "Connecting to push socket");

        let uri: tungstenite::http::Uri = url
            .as_str()
            .parse()
            .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

        let request = ClientRequestBuilder::new(uri);
        let connector = tls.socket_connector()?;
        let (ws_stream, _response) =
            tokio_tungstenite::connect_async_tls_with_config(request, None, false, connector)
                .await
                .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

        let (mut write, read) = ws_stream.split();
        write
            .send(tungstenite::Message::text(login_frame(device_id, secret)))
            .await
            .map_err(|e| Error::WebSocketConnect(format!("failed to send login frame: {e}")))?;

        tracing::debug!("Push socket login frame sent");

        Ok(Self {
            _write: write,
            read,
            pending: VecDeque::new(),
        })
    }

    /// Wait for the next control signal.
    ///
    /// Returns `Ok(None)` when the server ends the stream without an
    /// error. A close frame is reported as [`Error::WebSocketClosed`].
    /// Unknown bytes are logged and skipped.
    pub async fn next_signal(&mut self) -> Result<Option<ControlSignal>, Error> {
        loop {
            if let Some(signal) = self.pending.pop_front() {
                return Ok(Some(signal));
            }

            match self.read.next().await {
                Some(Ok(tungstenite::Message::Binary(bytes))) => {
                    self.pending.extend(decode_frame(&bytes));
                }
                Some(Ok(tungstenite::Message::Text(text))) => {
                    self.pending.extend(decode_frame(text.as_bytes()));
                }
                Some(Ok(tungstenite::Message::Ping(_))) => {
                    // tungstenite handles pong replies automatically
                    tracing::trace!("Push socket ping");
                }
                Some(Ok(tungstenite::Message::Close(frame))) => {
                    let (code, reason) = frame.map_or_else(
                        || (1005, String::new()),
                        |cf| (u16::from(cf.code), cf.reason.to_string()),
                    );
                    tracing::info!(code, reason = %reason, "Push socket close frame received");
                    return Err(Error::WebSocketClosed { code, reason });
                }
                Some(Ok(_)) => {
                    // Pong, raw Frame -- ignore
                }
                Some(Err(e)) => return Err(Error::WebSocketConnect(e.to_string())),
                None => {
                    tracing::info!("Push socket stream ended");
                    return Ok(None);
                }
            }
        }
    }
}

/// Decode every byte of a frame, skipping unknown tokens and line
/// terminators.
fn decode_frame(bytes: &[u8]) -> Vec<ControlSignal> {
    bytes
        .iter()
        .filter(|b| !b.is_ascii_whitespace())
        .filter_map(|&b| {
            let signal = ControlSignal::from_byte(b);
            if signal.is_none() {
                tracing::debug!(byte = b, "Ignoring unknown control byte");
            }
            signal
        })
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────
