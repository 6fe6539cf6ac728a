// ── Session bootstrap ──
//
// Turns stored credentials into a usable secret/device pair: log in when
// no secret is held, register a device when no device id is held, and
// reuse whatever is already there otherwise.

use pushover_api::{AccountClient, generate_device_name};
use tracing::info;

use crate::credentials::{Credentials, Session};
use crate::error::CoreError;

/// Result of [`ensure_session`].
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub session: Session,
    /// `true` when a login or registration happened and the credentials
    /// should be persisted again.
    pub changed: bool,
}

/// Make sure `credentials` hold a secret and a registered device.
///
/// `device_name` defaults to a generated timestamped name. `twofa` is
/// only sent when a login is needed.
pub async fn ensure_session(
    client: &AccountClient,
    credentials: &mut Credentials,
    device_name: Option<&str>,
    twofa: Option<&str>,
) -> Result<SessionOutcome, CoreError> {
    if let Some(session) = credentials.session() {
        return Ok(SessionOutcome {
            session,
            changed: false,
        });
    }

    if credentials.secret().is_none() {
        info!(email = credentials.email(), "logging in");
        let secret = client
            .login(credentials.email(), credentials.password(), twofa)
            .await?;
        credentials.set_secret(secret);
    }

    let Some(secret) = credentials.secret().cloned() else {
        return Err(CoreError::Internal("secret missing after login".into()));
    };

    let name = device_name.map_or_else(generate_device_name, str::to_owned);
    info!(device_name = %name, "registering device");
    let device_id = client
        .register_device(&secret, &name)
        .await
        .map_err(|e| match e {
            pushover_api::Error::Rejected { status, errors } => CoreError::Api {
                message: format!("device registration rejected: {}", errors.join("; ")),
                status: Some(status),
            },
            other => other.into(),
        })?;
    credentials.set_device_id(device_id.clone());

    Ok(SessionOutcome {
        session: Session { secret, device_id },
        changed: true,
    })
}
