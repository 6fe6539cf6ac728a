//! `pushover login`: obtain a session secret and register this device.

use dialoguer::Input;
use secrecy::SecretString;

use pushover_core::{CoreError, Credentials, ensure_session};

use super::Context;
use crate::cli::LoginArgs;
use crate::error::CliError;
use crate::output;

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn prompt_email() -> Result<String, CliError> {
    Input::new()
        .with_prompt("Email")
        .interact_text()
        .map_err(prompt_err)
}

fn prompt_twofa() -> Result<String, CliError> {
    Input::new()
        .with_prompt("Two-factor code")
        .interact_text()
        .map_err(prompt_err)
}

fn resolve_password(args: &LoginArgs) -> Result<SecretString, CliError> {
    let password = match &args.password {
        Some(p) => p.clone(),
        None => rpassword::prompt_password("Password: ").map_err(prompt_err)?,
    };
    if password.is_empty() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "cannot be empty".into(),
        });
    }
    Ok(SecretString::from(password))
}

/// Start from stored credentials when they belong to the same account.
fn initial_credentials(args: &LoginArgs, ctx: &Context) -> Result<Credentials, CliError> {
    let stored = ctx.store.load().ok();

    let email = match (&args.email, &stored) {
        (Some(email), _) => email.clone(),
        (None, Some(creds)) => creds.email().to_owned(),
        (None, None) => prompt_email()?,
    };
    if email.trim().is_empty() {
        return Err(CliError::Validation {
            field: "email".into(),
            reason: "cannot be empty".into(),
        });
    }

    match stored {
        Some(mut creds) if creds.email() == email && args.password.is_none() => {
            if args.force {
                creds.clear_session();
            }
            Ok(creds)
        }
        _ => Ok(Credentials::new(email, resolve_password(args)?)),
    }
}

pub async fn handle(args: LoginArgs, ctx: &Context) -> Result<(), CliError> {
    let client = ctx.account_client()?;
    let mut credentials = initial_credentials(&args, ctx)?;
    let device_name = args
        .device_name
        .clone()
        .or_else(|| ctx.config.device_name.clone());

    let mut twofa = args.twofa.clone();
    let outcome = loop {
        match ensure_session(&client, &mut credentials, device_name.as_deref(), twofa.as_deref())
            .await
        {
            Ok(outcome) => break outcome,
            Err(CoreError::TwoFactorRequired) if twofa.is_none() => {
                twofa = Some(prompt_twofa()?);
            }
            Err(e) => {
                // Keep a freshly issued secret so the next attempt only registers.
                if credentials.secret().is_some() {
                    ctx.store.save(&credentials)?;
                }
                return Err(e.into());
            }
        }
    };

    if outcome.changed {
        ctx.store.save(&credentials)?;
        tracing::info!(path = %ctx.store.path().display(), "credentials saved");
    }

    output::print_output(&format!(
        "Logged in as {} (device {})",
        credentials.email(),
        outcome.session.device_id
    ));
    Ok(())
}
