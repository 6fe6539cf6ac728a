// Wire models for the Open Client API
//
// Messages are kept as the open key/value map the vendor sends so that
// fields added server-side reach handlers untouched. Typed accessors
// cover the documented keys and tolerate missing or mistyped values.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::Error;

/// Longest device name the vendor accepts.
pub const MAX_DEVICE_NAME_LEN: usize = 25;

// ── Message ─────────────────────────────────────────────────────────

/// A single notification fetched from the vendor.
///
/// Immutable once fetched. `id` increases monotonically per account and
/// is the unit of acknowledgement.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    id: u64,
    raw: Map<String, Value>,
    received_at: DateTime<Utc>,
}

impl Message {
    /// Build a message from a raw payload, stamping `received_at`.
    ///
    /// Returns `None` when the payload carries no usable id (neither a
    /// numeric `id` nor a numeric-string `id_str`). Every other field is
    /// optional.
    pub fn from_raw(raw: Map<String, Value>, received_at: DateTime<Utc>) -> Option<Self> {
        let id = raw
            .get("id")
            .and_then(Value::as_u64)
            .or_else(|| raw.get("id_str").and_then(Value::as_str)?.parse().ok())?;
        Some(Self {
            id,
            raw,
            received_at,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// The full payload as received.
    pub fn raw(&self) -> &Map<String, Value> {
        &self.raw
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// The notification text. Empty when the payload has no `message`.
    pub fn body(&self) -> &str {
        self.str_field("message").unwrap_or("")
    }

    pub fn title(&self) -> Option<&str> {
        self.str_field("title")
    }

    /// Name of the sending application.
    pub fn app(&self) -> Option<&str> {
        self.str_field("app")
    }

    pub fn url(&self) -> Option<&str> {
        self.str_field("url")
    }

    pub fn priority(&self) -> Option<i64> {
        self.raw.get("priority").and_then(Value::as_i64)
    }

    /// When the sender submitted the message (`date`, unix seconds).
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        let secs = self.raw.get("date").and_then(Value::as_i64)?;
        Utc.timestamp_opt(secs, 0).single()
    }

    pub fn is_html(&self) -> bool {
        self.raw
            .get("html")
            .and_then(Value::as_i64)
            .is_some_and(|v| v == 1)
    }

    /// Look up any string field of the payload.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.raw.get(key).and_then(Value::as_str)
    }
}

// ── Response envelope ───────────────────────────────────────────────

/// Common shape of every Open Client API reply: `status` is 1 on
/// success; failures carry `errors` as either a list or a map of
/// field name to list.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub errors: Option<Value>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl Envelope {
    pub(crate) fn parse(body: &str) -> Result<Self, Error> {
        serde_json::from_str(body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: body.to_owned(),
        })
    }

    pub(crate) fn is_ok(&self) -> bool {
        self.status == 1
    }

    /// Flatten the `errors` field into readable lines.
    pub(crate) fn error_lines(&self) -> Vec<String> {
        flatten_errors(self.errors.as_ref())
    }

    /// A required string field of a successful reply.
    pub(crate) fn take_string(&mut self, key: &str, body: &str) -> Result<String, Error> {
        match self.rest.remove(key) {
            Some(Value::String(s)) => Ok(s),
            _ => Err(Error::Deserialization {
                message: format!("missing string field `{key}`"),
                body: body.to_owned(),
            }),
        }
    }
}

fn flatten_errors(errors: Option<&Value>) -> Vec<String> {
    match errors {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().map(value_text).collect(),
        Some(Value::Object(fields)) => fields
            .iter()
            .flat_map(|(field, list)| match list {
                Value::Array(items) => items
                    .iter()
                    .map(|item| format!("{field}: {}", value_text(item)))
                    .collect::<Vec<_>>(),
                other => vec![format!("{field}: {}", value_text(other))],
            })
            .collect(),
        Some(other) => vec![value_text(other)],
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ── Device names ────────────────────────────────────────────────────

/// Generate a fresh device name of the form `rust-YYYYmmdd_HHMMSS`.
pub fn generate_device_name() -> String {
    format!("rust-{}", Utc::now().format("%Y%m%d_%H%M%S"))
}

/// Check a device name against the vendor's rules: 1–25 characters of
/// `[A-Za-z0-9_-]`.
pub fn validate_device_name(name: &str) -> Result<(), Error> {
    if name.is_empty() || name.len() > MAX_DEVICE_NAME_LEN {
        return Err(Error::InvalidInput {
            field: "device name",
            reason: format!("must be 1-{MAX_DEVICE_NAME_LEN} characters, got {}", name.len()),
        });
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(Error::InvalidInput {
            field: "device name",
            reason: format!("character {bad:?} is not allowed"),
        });
    }
    Ok(())
}
