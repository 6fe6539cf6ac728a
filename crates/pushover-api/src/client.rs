// Open Client API HTTP client
//
// Wraps `reqwest::Client` with endpoint URL construction and envelope
// unwrapping. Every call is a single request/response: nothing is
// retried here, failures are surfaced as typed errors and the caller
// decides what to do with them.

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::error::Error;
use crate::models::{Envelope, Message, validate_device_name};
use crate::transport::TransportConfig;

/// Production API root.
pub const DEFAULT_API_URL: &str = "https://api.pushover.net/1/";

/// Operating-system code the vendor assigns to open clients.
const OPEN_CLIENT_OS: &str = "O";

/// Request/response client for the account endpoints: login, device
/// registration, message listing and message acknowledgement.
///
/// Holds no session state; secrets and device ids are passed per call.
#[derive(Debug, Clone)]
pub struct AccountClient {
    http: reqwest::Client,
    base_url: Url,
    timeout_secs: u64,
}

impl AccountClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the API root (e.g. `https://api.pushover.net/1/`);
    /// a missing trailing slash is added so relative joins keep the
    /// version segment.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url: normalize_base(base_url),
            timeout_secs: transport.timeout_secs(),
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url: normalize_base(base_url),
            timeout_secs: 0,
        }
    }

    /// The API root all endpoints are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Endpoints ───────────────────────────────────────────────────

    /// Log in with email and password, returning the session secret.
    ///
    /// `POST users/login.json`. Accounts with two-factor authentication
    /// answer HTTP 412 until `twofa` carries the current code; that case
    /// surfaces as [`Error::TwoFactorRequired`] so the caller can prompt
    /// and call again.
    pub async fn login(
        &self,
        email: &str,
        password: &SecretString,
        twofa: Option<&str>,
    ) -> Result<SecretString, Error> {
        let url = self.endpoint("users/login.json")?;
        debug!(%url, twofa = twofa.is_some(), "logging in");

        let mut form = vec![
            ("email", email.to_owned()),
            ("password", password.expose_secret().to_owned()),
        ];
        if let Some(code) = twofa {
            form.push(("twofa", code.to_owned()));
        }

        let resp = self
            .http
            .post(url)
            .form(&form)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if resp.status() == reqwest::StatusCode::PRECONDITION_FAILED {
            debug!("login needs a two-factor code");
            return Err(Error::TwoFactorRequired);
        }

        let status = resp.status();
        if status.is_server_error() {
            return Err(Error::Server {
                status: status.as_u16(),
            });
        }
        let body = resp.text().await.map_err(|e| self.transport_error(e))?;
        let mut envelope = Envelope::parse(&body)?;

        if !envelope.is_ok() {
            let errors = envelope.error_lines();
            return Err(Error::Authentication {
                message: if errors.is_empty() {
                    format!("login refused (HTTP {status})")
                } else {
                    errors.join("; ")
                },
            });
        }

        let secret = envelope.take_string("secret", &body)?;
        debug!("login successful");
        Ok(SecretString::from(secret))
    }

    /// Register a new device under the account, returning its id.
    ///
    /// `POST devices.json`. Each call with a fresh name creates another
    /// device; callers should only register when no device id is stored.
    pub async fn register_device(
        &self,
        secret: &SecretString,
        device_name: &str,
    ) -> Result<String, Error> {
        validate_device_name(device_name)?;
        let url = self.endpoint("devices.json")?;
        debug!(%url, device_name, "registering device");

        let form = [
            ("secret", secret.expose_secret()),
            ("name", device_name),
            ("os", OPEN_CLIENT_OS),
        ];
        let resp = self
            .http
            .post(url)
            .form(&form)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let (mut envelope, body) = self.parse_envelope(resp).await?;
        let device_id = envelope.take_string("id", &body)?;
        debug!(device_id, "device registered");
        Ok(device_id)
    }

    /// Download every message pending for the device.
    ///
    /// `GET messages.json?secret=..&device_id=..`. The result is sorted
    /// ascending by id; an empty list is a normal answer. Entries without
    /// an id cannot be acknowledged and are skipped.
    pub async fn list_messages(
        &self,
        secret: &SecretString,
        device_id: &str,
    ) -> Result<Vec<Message>, Error> {
        let url = self.endpoint("messages.json")?;
        debug!(%url, "listing messages");

        let resp = self
            .http
            .get(url)
            .query(&[("secret", secret.expose_secret()), ("device_id", device_id)])
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let (mut envelope, _body) = self.parse_envelope(resp).await?;
        let received_at = Utc::now();

        let raw_messages = match envelope.rest.remove("messages") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };

        let mut messages: Vec<Message> = raw_messages
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(map) => {
                    let parsed = Message::from_raw(map, received_at);
                    if parsed.is_none() {
                        warn!("skipping message without an id");
                    }
                    parsed
                }
                other => {
                    warn!(payload = %other, "skipping non-object message entry");
                    None
                }
            })
            .collect();
        messages.sort_by_key(Message::id);

        debug!(count = messages.len(), "messages listed");
        Ok(messages)
    }

    /// Tell the vendor every message up to and including `highest_id`
    /// may be discarded.
    ///
    /// `POST devices/{device_id}/update_highest_message.json`. Idempotent:
    /// acknowledging an id that is already gone is accepted.
    pub async fn acknowledge(
        &self,
        secret: &SecretString,
        device_id: &str,
        highest_id: u64,
    ) -> Result<(), Error> {
        let url = self.endpoint(&format!(
            "devices/{device_id}/update_highest_message.json"
        ))?;
        debug!(%url, highest_id, "acknowledging messages");

        let highest = highest_id.to_string();
        let form = [
            ("secret", secret.expose_secret()),
            ("message", highest.as_str()),
        ];
        let resp = self
            .http
            .post(url)
            .form(&form)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        self.parse_envelope(resp).await?;
        Ok(())
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        self.base_url.join(path).map_err(Error::InvalidUrl)
    }

    fn transport_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() && self.timeout_secs > 0 {
            Error::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else {
            Error::Transport(err)
        }
    }

    /// Parse the `{status, errors, ...}` envelope, returning the envelope
    /// and raw body on success.
    async fn parse_envelope(&self, resp: reqwest::Response) -> Result<(Envelope, String), Error> {
        let status = resp.status();
        let body = resp.text().await.map_err(|e| self.transport_error(e))?;

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited);
        }
        if status.is_server_error() {
            return Err(Error::Server {
                status: status.as_u16(),
            });
        }

        let envelope = Envelope::parse(&body)?;
        if envelope.is_ok() {
            return Ok((envelope, body));
        }

        Err(Error::Rejected {
            status: status.as_u16(),
            errors: envelope.error_lines(),
        })
    }
}

fn normalize_base(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_trailing_slash() {
        let client = AccountClient::with_client(
            reqwest::Client::new(),
            Url::parse("https://api.pushover.net/1").unwrap(),
        );
        assert_eq!(client.base_url().as_str(), "https://api.pushover.net/1/");
        assert_eq!(
            client.endpoint("messages.json").unwrap().as_str(),
            "https://api.pushover.net/1/messages.json"
        );
    }
}
