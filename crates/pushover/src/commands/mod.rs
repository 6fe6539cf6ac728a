//! Command handlers and the shared context they run with.

mod listen;
mod login;
mod messages;

use pushover_api::AccountClient;
use pushover_config::{Config, CredentialStore, load_config, load_config_from};
use pushover_core::{Credentials, Session};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;
use crate::output;

/// Settings and storage resolved from global flags.
pub struct Context {
    pub config: Config,
    pub store: CredentialStore,
    pub color: bool,
}

impl Context {
    pub fn load(global: &GlobalOpts) -> Result<Self, CliError> {
        let config = match &global.config {
            Some(path) => load_config_from(path)?,
            None => load_config()?,
        };
        let credentials_path = global
            .credentials
            .clone()
            .unwrap_or_else(|| config.credentials_path());

        tracing::debug!(credentials = %credentials_path.display(), "resolved credential file");

        Ok(Self {
            config,
            store: CredentialStore::new(credentials_path),
            color: output::should_color(global.color),
        })
    }

    pub fn account_client(&self) -> Result<AccountClient, CliError> {
        let url = self.config.api_url()?;
        Ok(AccountClient::new(url, &self.config.transport_config())?)
    }

    /// Stored credentials that already hold a full session.
    pub fn session(&self) -> Result<(Credentials, Session), CliError> {
        let credentials = self.store.load()?;
        let session = credentials.session().ok_or_else(|| CliError::NotLoggedIn {
            path: self.store.path().display().to_string(),
        })?;
        Ok((credentials, session))
    }
}

/// Route a parsed command to its handler.
pub async fn dispatch(cmd: Command, ctx: &Context) -> Result<(), CliError> {
    match cmd {
        Command::Login(args) => login::handle(args, ctx).await,
        Command::Messages(args) => messages::handle_list(args, ctx).await,
        Command::Ack => messages::handle_ack(ctx).await,
        Command::Listen(args) => listen::handle(args, ctx).await,
        Command::Completions(_) => Err(CliError::Internal(
            "completions are generated before any context is loaded".into(),
        )),
    }
}
