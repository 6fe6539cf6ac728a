//! `pushover messages` and `pushover ack`.

use pushover_api::AccountClient;
use pushover_core::{Message, Session};

use super::Context;
use crate::cli::MessagesArgs;
use crate::error::CliError;
use crate::output;

async fn acknowledge_all(
    client: &AccountClient,
    session: &Session,
    messages: &[Message],
) -> Result<Option<u64>, CliError> {
    let Some(highest) = messages.last().map(Message::id) else {
        return Ok(None);
    };
    client
        .acknowledge(&session.secret, &session.device_id, highest)
        .await?;
    tracing::info!(highest, "acknowledged messages");
    Ok(Some(highest))
}

pub async fn handle_list(args: MessagesArgs, ctx: &Context) -> Result<(), CliError> {
    let (_credentials, session) = ctx.session()?;
    let client = ctx.account_client()?;

    let messages = client
        .list_messages(&session.secret, &session.device_id)
        .await?;
    output::print_output(&output::render_messages(&messages, args.json)?);

    if args.ack {
        acknowledge_all(&client, &session, &messages).await?;
    }
    Ok(())
}

pub async fn handle_ack(ctx: &Context) -> Result<(), CliError> {
    let (_credentials, session) = ctx.session()?;
    let client = ctx.account_client()?;

    let messages = client
        .list_messages(&session.secret, &session.device_id)
        .await?;

    let line = match acknowledge_all(&client, &session, &messages).await? {
        Some(highest) => format!(
            "Acknowledged {} message(s) up to id {highest}",
            messages.len()
        ),
        None => "No pending messages.".into(),
    };
    output::print_output(&line);
    Ok(())
}
