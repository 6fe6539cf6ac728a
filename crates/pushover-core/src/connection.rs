// ── Realtime connection ──
//
// Owns the push socket for one device session. The socket only carries
// single-byte control signals; message content is always pulled through
// the account API in a fetch cycle, dispatched, then acknowledged.
//
// State is published two ways: a `watch` channel holds the current
// state for anyone who just wants to read it, and a `broadcast` channel
// delivers every transition in order.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pushover_api::{AccountClient, ControlSignal, SignalSocket};

use crate::account::AccountApi;
use crate::config::RealtimeConfig;
use crate::credentials::Session;
use crate::dispatch::DispatchRegistry;
use crate::error::CoreError;

const TRANSITION_CHANNEL_SIZE: usize = 64;

// ── ConnectionState ──────────────────────────────────────────────────

/// Lifecycle of the realtime connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumIs)]
pub enum ConnectionState {
    /// Not started.
    Disconnected,
    /// Opening the socket and sending the login frame.
    Connecting,
    /// The server acknowledged the login.
    Authenticated,
    /// Listening for control signals.
    Idle,
    /// Waiting out the backoff delay before the next attempt.
    Reconnecting,
    /// Stopped, evicted or failed fatally. No further reconnects.
    Closed,
}

/// How a single socket session ended.
enum SessionEnd {
    /// The server asked for a fresh connection.
    Reload,
    /// Recoverable failure: back off and reconnect.
    Transient(CoreError),
    /// Stop the loop with this error.
    Fatal(CoreError),
}

/// What to do after handling one control signal.
enum SignalAction {
    Continue,
    End(SessionEnd),
}

// ── RealtimeConnection ───────────────────────────────────────────────

/// Persistent connection to the push endpoint for one device session.
///
/// Generic over the account API so the fetch cycle can run against a
/// substitute in tests; production code uses [`AccountClient`].
pub struct RealtimeConnection<A: AccountApi = AccountClient> {
    config: RealtimeConfig,
    session: Session,
    account: Arc<A>,
    registry: Arc<DispatchRegistry>,
    state_tx: watch::Sender<ConnectionState>,
    transitions_tx: broadcast::Sender<ConnectionState>,
    cancel: CancellationToken,
}

impl<A: AccountApi> RealtimeConnection<A> {
    pub fn new(
        config: RealtimeConfig,
        session: Session,
        account: Arc<A>,
        registry: Arc<DispatchRegistry>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (transitions_tx, _) = broadcast::channel(TRANSITION_CHANNEL_SIZE);

        Self {
            config,
            session,
            account,
            registry,
            state_tx,
            transitions_tx,
            cancel: CancellationToken::new(),
        }
    }

    // ── Observability ────────────────────────────────────────────────

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Watch receiver for the current state.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Every transition from now on, in order.
    pub fn transitions(&self) -> broadcast::Receiver<ConnectionState> {
        self.transitions_tx.subscribe()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn registry(&self) -> &Arc<DispatchRegistry> {
        &self.registry
    }

    // ── Control ──────────────────────────────────────────────────────

    /// Ask the loop to close. Interrupts socket reads, fetches in flight
    /// and backoff delays.
    pub fn stop(&self) {
        debug!("stop requested");
        self.cancel.cancel();
    }

    /// Token that stops the loop when cancelled. Child tokens can be
    /// handed to signal handlers.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state_tx.send_replace(next);
        if previous == next {
            return;
        }
        debug!(from = %previous, to = %next, "connection state changed");
        // No receivers is fine: nobody is watching transitions.
        let _ = self.transitions_tx.send(next);
    }

    // ── Fetch cycle ──────────────────────────────────────────────────

    /// List pending messages, dispatch them in ascending id order, then
    /// acknowledge the highest id.
    ///
    /// Returns the number of messages dispatched. An empty list sends no
    /// acknowledgement. A failed acknowledgement is logged and the
    /// messages will be delivered again on the next cycle, unless the
    /// failure means the session is no longer valid.
    pub async fn fetch_cycle(&self) -> Result<usize, CoreError> {
        let Session { secret, device_id } = &self.session;

        let mut messages = self.account.list_messages(secret, device_id).await?;
        if messages.is_empty() {
            debug!("no pending messages");
            return Ok(0);
        }

        messages.sort_by_key(pushover_api::Message::id);
        info!(count = messages.len(), "dispatching pending messages");

        let mut failures = 0;
        for message in &messages {
            failures += self.registry.dispatch(message).failures;
        }
        if failures > 0 {
            warn!(failures, "some handlers failed");
        }

        let highest = messages.last().map_or(0, pushover_api::Message::id);
        match self.account.acknowledge(secret, device_id, highest).await {
            Ok(()) => debug!(highest, "acknowledged messages"),
            Err(e) if e.is_auth_expired() => return Err(e.into()),
            Err(e) => {
                warn!(highest, error = %e, "acknowledge failed, messages will be delivered again");
            }
        }

        Ok(messages.len())
    }

    // ── Main loop ────────────────────────────────────────────────────

    /// Run until stopped, evicted or failed fatally.
    ///
    /// Returns `Ok(())` after [`stop`](Self::stop) and the fatal error
    /// otherwise. Transient failures are retried with backoff; the
    /// attempt counter resets every time the server acknowledges a login.
    pub async fn run_forever(&self) -> Result<(), CoreError> {
        let reconnect = &self.config.reconnect;
        let mut attempt: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                return self.close(Ok(()));
            }

            self.set_state(ConnectionState::Connecting);

            let end = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return self.close(Ok(())),
                end = self.run_session(&mut attempt) => end,
            };

            match end {
                SessionEnd::Fatal(e) => {
                    warn!(error = %e, "realtime connection closing");
                    return self.close(Err(e));
                }
                SessionEnd::Reload => {
                    info!("server requested reload, reconnecting");
                    self.set_state(ConnectionState::Reconnecting);
                    attempt = 0;
                }
                SessionEnd::Transient(e) => {
                    self.set_state(ConnectionState::Reconnecting);
                    attempt = attempt.saturating_add(1);

                    if let Some(max) = reconnect.max_retries {
                        if attempt > max {
                            warn!(attempts = attempt, error = %e, "giving up on reconnecting");
                            return self.close(Err(CoreError::RetriesExhausted { attempts: attempt }));
                        }
                    }

                    let delay = reconnect.backoff(attempt - 1);
                    info!(
                        error = %e,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Waiting before reconnect"
                    );

                    tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => return self.close(Ok(())),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    fn close(&self, result: Result<(), CoreError>) -> Result<(), CoreError> {
        self.set_state(ConnectionState::Closed);
        info!("realtime connection closed");
        result
    }

    /// One socket from connect to disconnect.
    async fn run_session(&self, attempt: &mut u32) -> SessionEnd {
        let connect_timeout = self.config.connect_timeout;
        let connect = SignalSocket::connect(
            &self.config.socket_url,
            &self.config.tls,
            &self.session.device_id,
            &self.session.secret,
        );

        let mut socket = match tokio::time::timeout(connect_timeout, connect).await {
            Ok(Ok(socket)) => socket,
            Ok(Err(e)) => return SessionEnd::Transient(e.into()),
            Err(_) => {
                warn!(timeout_secs = connect_timeout.as_secs(), "push socket connect timed out");
                return SessionEnd::Transient(CoreError::Timeout {
                    timeout_secs: connect_timeout.as_secs(),
                });
            }
        };

        // The server's first signal acknowledges the login.
        let first = match self.read_signal(&mut socket).await {
            Ok(signal) => signal,
            Err(end) => return end,
        };

        info!(device_id = %self.session.device_id, "push socket authenticated");
        self.set_state(ConnectionState::Authenticated);
        *attempt = 0;
        self.set_state(ConnectionState::Idle);

        // A terminal first signal means the session is already gone, so
        // nothing may be fetched or acknowledged under it.
        if self.config.sync_on_connect
            && first != ControlSignal::NewMessage
            && !first.is_terminal()
        {
            if let SignalAction::End(end) = self.run_fetch().await {
                return end;
            }
        }

        let mut signal = first;
        loop {
            if let SignalAction::End(end) = self.handle_signal(signal).await {
                return end;
            }

            signal = match self.read_signal(&mut socket).await {
                Ok(signal) => signal,
                Err(end) => return end,
            };
        }
    }

    /// Next control signal, bounded by the idle timeout.
    async fn read_signal(&self, socket: &mut SignalSocket) -> Result<ControlSignal, SessionEnd> {
        let idle_timeout = self.config.idle_timeout;

        match tokio::time::timeout(idle_timeout, socket.next_signal()).await {
            Err(_) => {
                warn!(timeout_secs = idle_timeout.as_secs(), "push socket idle timeout");
                Err(SessionEnd::Transient(CoreError::Timeout {
                    timeout_secs: idle_timeout.as_secs(),
                }))
            }
            Ok(Err(e)) => Err(SessionEnd::Transient(e.into())),
            Ok(Ok(None)) => Err(SessionEnd::Transient(CoreError::ConnectionFailed {
                reason: "push socket closed by server".into(),
            })),
            Ok(Ok(Some(signal))) => Ok(signal),
        }
    }

    async fn handle_signal(&self, signal: ControlSignal) -> SignalAction {
        debug!(%signal, "control signal");

        match signal {
            ControlSignal::KeepAlive => SignalAction::Continue,
            ControlSignal::NewMessage => self.run_fetch().await,
            ControlSignal::Reload => SignalAction::End(SessionEnd::Reload),
            ControlSignal::PermanentError => {
                warn!("push server reported a permanent error for this device");
                SignalAction::End(SessionEnd::Fatal(CoreError::DevicePermanentError))
            }
            ControlSignal::Evicted => {
                warn!("device session was closed by a login elsewhere");
                SignalAction::End(SessionEnd::Fatal(CoreError::Evicted))
            }
        }
    }

    /// Fetch cycle from inside the loop: fatal errors end the session,
    /// anything else is logged and the socket stays up.
    async fn run_fetch(&self) -> SignalAction {
        match self.fetch_cycle().await {
            Ok(_) => SignalAction::Continue,
            Err(e) if e.is_fatal() => SignalAction::End(SessionEnd::Fatal(e)),
            Err(e) => {
                warn!(error = %e, "fetch cycle failed");
                SignalAction::Continue
            }
        }
    }
}

impl<A: AccountApi> std::fmt::Debug for RealtimeConnection<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeConnection")
            .field("socket_url", &self.config.socket_url.as_str())
            .field("device_id", &self.session.device_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_display_by_name() {
        assert_eq!(ConnectionState::Reconnecting.to_string(), "Reconnecting");
        assert!(ConnectionState::Closed.is_closed());
    }
}
