// ── Account credentials ──
//
// What the client knows about its account: email and password always,
// and, once obtained, the session secret and the id of the device
// registered under that secret. Persistence lives in pushover-config.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};

/// Account credentials owned by the running client.
///
/// Invariant: a device id is only ever held together with the secret it
/// was issued under. Setting a new secret drops the device id.
#[derive(Clone)]
pub struct Credentials {
    email: String,
    password: SecretString,
    secret: Option<SecretString>,
    device_id: Option<String>,
}

/// A usable secret/device pair, the input of every realtime call.
#[derive(Clone)]
pub struct Session {
    pub secret: SecretString,
    pub device_id: String,
}

impl Credentials {
    /// Fresh credentials with no session yet.
    pub fn new(email: impl Into<String>, password: SecretString) -> Self {
        Self {
            email: email.into(),
            password,
            secret: None,
            device_id: None,
        }
    }

    /// Rebuild credentials from stored fields.
    ///
    /// A device id without a secret cannot be used and is dropped.
    pub fn from_parts(
        email: String,
        password: SecretString,
        secret: Option<SecretString>,
        device_id: Option<String>,
    ) -> Self {
        let device_id = if secret.is_some() { device_id } else { None };
        Self {
            email,
            password,
            secret,
            device_id,
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password(&self) -> &SecretString {
        &self.password
    }

    pub fn secret(&self) -> Option<&SecretString> {
        self.secret.as_ref()
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    /// Store a newly issued secret. Any device id belonged to the
    /// previous secret and is cleared.
    pub fn set_secret(&mut self, secret: SecretString) {
        self.secret = Some(secret);
        self.device_id = None;
    }

    /// Store the id of a device registered under the current secret.
    ///
    /// Ignored when no secret is held.
    pub fn set_device_id(&mut self, device_id: impl Into<String>) {
        if self.secret.is_some() {
            self.device_id = Some(device_id.into());
        }
    }

    /// Forget the session (after a permanent error or eviction).
    pub fn clear_session(&mut self) {
        self.secret = None;
        self.device_id = None;
    }

    /// The secret/device pair, when both are present.
    pub fn session(&self) -> Option<Session> {
        match (&self.secret, &self.device_id) {
            (Some(secret), Some(device_id)) => Some(Session {
                secret: secret.clone(),
                device_id: device_id.clone(),
            }),
            _ => None,
        }
    }
}

impl PartialEq for Credentials {
    fn eq(&self, other: &Self) -> bool {
        fn same(a: Option<&SecretString>, b: Option<&SecretString>) -> bool {
            a.map(|s| s.expose_secret()) == b.map(|s| s.expose_secret())
        }

        self.email == other.email
            && self.password.expose_secret() == other.password.expose_secret()
            && same(self.secret.as_ref(), other.secret.as_ref())
            && self.device_id == other.device_id
    }
}

impl Eq for Credentials {}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("device_id", &self.device_id)
            .finish()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("secret", &"[REDACTED]")
            .field("device_id", &self.device_id)
            .finish()
    }
}
