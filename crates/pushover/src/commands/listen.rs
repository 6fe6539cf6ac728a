//! `pushover listen`: hold the realtime connection open and dispatch
//! messages until interrupted or evicted.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use pushover_core::{ConnectionState, CoreError, DispatchRegistry, Message, RealtimeConnection};

use super::Context;
use crate::cli::ListenArgs;
use crate::error::CliError;
use crate::output;

/// Log every state change until the connection is dropped. Falling behind
/// only skips the missed states.
async fn log_transitions(mut transitions: broadcast::Receiver<ConnectionState>) -> usize {
    let mut logged = 0;
    loop {
        match transitions.recv().await {
            Ok(state) => {
                tracing::info!(%state, "connection state");
                logged += 1;
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "state log fell behind");
            }
            Err(RecvError::Closed) => return logged,
        }
    }
}

pub async fn handle(args: ListenArgs, ctx: &Context) -> Result<(), CliError> {
    let (mut credentials, session) = ctx.session()?;
    let client = ctx.account_client()?;

    let mut realtime = ctx.config.realtime_config()?;
    if args.no_sync {
        realtime.sync_on_connect = false;
    }

    let registry = DispatchRegistry::global();
    let registered = ctx.config.register_shell_commands(&registry);
    tracing::debug!(registered, "shell commands registered");

    if !args.quiet {
        let color = ctx.color;
        registry.register_parser(move |message: &Message| {
            output::print_output(&output::format_live(message, color));
            Ok(())
        });
    }

    let conn = Arc::new(RealtimeConnection::new(
        realtime,
        session,
        Arc::new(client),
        registry,
    ));

    tokio::spawn(log_transitions(conn.transitions()));

    let cancel = conn.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, closing connection");
            cancel.cancel();
        }
    });

    match conn.run_forever().await {
        Ok(()) => Ok(()),
        Err(e @ (CoreError::Evicted | CoreError::DevicePermanentError)) => {
            credentials.clear_session();
            ctx.store.save(&credentials)?;
            tracing::error!(error = %e, "session ended by the server");
            Err(e.into())
        }
        Err(e) => {
            tracing::error!(error = %e, "realtime connection failed");
            Err(e.into())
        }
    }
}
