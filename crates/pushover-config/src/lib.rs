//! Settings and credential storage for the Pushover open client.
//!
//! TOML settings layered with `PUSHOVER_` environment variables, the
//! JSON credential file, and translation into `pushover_core` runtime
//! types. The core crate never reads files; everything on disk is
//! resolved here.

mod store;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use pushover_api::{DEFAULT_API_URL, DEFAULT_SOCKET_URL, TlsMode, TransportConfig};
use pushover_core::{DispatchRegistry, RealtimeConfig, ReconnectConfig, ShellTemplate};

pub use store::{CredentialError, CredentialStore, default_credentials_path};

/// Prefix for environment overrides. Nested keys use `__`, so
/// `PUSHOVER_REALTIME__IDLE_TIMEOUT_SECS` sets `realtime.idle_timeout_secs`.
pub const ENV_PREFIX: &str = "PUSHOVER_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Name to register the device under. Generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,

    /// Override of the credential file location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_file: Option<PathBuf>,

    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub realtime: RealtimeSettings,

    #[serde(default)]
    pub reconnect: ReconnectSettings,

    #[serde(default)]
    pub shell: ShellSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ApiSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_socket_url")]
    pub socket_url: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Extra CA certificate (PEM) to trust.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            socket_url: default_socket_url(),
            timeout_secs: default_timeout(),
            ca_cert: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RealtimeSettings {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    #[serde(default = "default_true")]
    pub sync_on_connect: bool,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            sync_on_connect: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReconnectSettings {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,

    /// Consecutive failures before giving up. Absent means retry forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_secs: default_max_delay_secs(),
            max_retries: None,
        }
    }
}

/// Shell commands run when a message's first token matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ShellSettings {
    /// Command name → template (`{0}`, `{1}`.., `{@}` placeholders).
    #[serde(default)]
    pub commands: BTreeMap<String, String>,

    /// Alias → command name.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

fn default_base_url() -> String {
    DEFAULT_API_URL.into()
}
fn default_socket_url() -> String {
    DEFAULT_SOCKET_URL.into()
}
fn default_timeout() -> u64 {
    30
}
fn default_connect_timeout() -> u64 {
    30
}
fn default_idle_timeout() -> u64 {
    90
}
fn default_true() -> bool {
    true
}
fn default_initial_delay_ms() -> u64 {
    1000
}
fn default_max_delay_secs() -> u64 {
    60
}

// ── Translation to runtime types ────────────────────────────────────

impl Config {
    /// Account API root.
    pub fn api_url(&self) -> Result<Url, ConfigError> {
        parse_url("api.base_url", &self.api.base_url)
    }

    /// HTTP transport settings.
    pub fn transport_config(&self) -> TransportConfig {
        let tls = self
            .api
            .ca_cert
            .clone()
            .map_or(TlsMode::System, TlsMode::CustomCa);

        TransportConfig {
            tls,
            timeout: Duration::from_secs(self.api.timeout_secs),
        }
    }

    /// Build the realtime connection settings.
    pub fn realtime_config(&self) -> Result<RealtimeConfig, ConfigError> {
        let socket_url = parse_url("api.socket_url", &self.api.socket_url)?;

        for (field, secs) in [
            ("realtime.connect_timeout_secs", self.realtime.connect_timeout_secs),
            ("realtime.idle_timeout_secs", self.realtime.idle_timeout_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::Validation {
                    field: field.into(),
                    reason: "must be greater than zero".into(),
                });
            }
        }

        let reconnect = ReconnectConfig {
            initial_delay: Duration::from_millis(self.reconnect.initial_delay_ms),
            max_delay: Duration::from_secs(self.reconnect.max_delay_secs),
            max_retries: self.reconnect.max_retries,
        };
        if reconnect.max_delay < reconnect.initial_delay {
            return Err(ConfigError::Validation {
                field: "reconnect.max_delay_secs".into(),
                reason: "must not be shorter than reconnect.initial_delay_ms".into(),
            });
        }

        let mut config = RealtimeConfig::new(socket_url);
        config.tls = self.transport_config().tls;
        config.connect_timeout = Duration::from_secs(self.realtime.connect_timeout_secs);
        config.idle_timeout = Duration::from_secs(self.realtime.idle_timeout_secs);
        config.sync_on_connect = self.realtime.sync_on_connect;
        config.reconnect = reconnect;
        Ok(config)
    }

    /// Where credentials are stored.
    pub fn credentials_path(&self) -> PathBuf {
        self.credentials_file
            .clone()
            .unwrap_or_else(default_credentials_path)
    }

    /// Register the `[shell]` commands and aliases with `registry`.
    ///
    /// Returns the number of entries registered.
    pub fn register_shell_commands(&self, registry: &DispatchRegistry) -> usize {
        for (name, template) in &self.shell.commands {
            registry.register_shell_command(name.clone(), ShellTemplate::new(template.clone()));
        }
        for (alias, target) in &self.shell.aliases {
            if !self.shell.commands.contains_key(target) {
                tracing::warn!(%alias, %target, "shell alias points at a command not in [shell.commands]");
            }
            registry.register_shell_command_alias(alias.clone(), target.clone());
        }
        self.shell.commands.len() + self.shell.aliases.len()
    }
}

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    raw.parse().map_err(|e| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL '{raw}': {e}"),
    })
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("net", "pushover", "pushover-open-client").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("pushover-open-client");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the default file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from `path` + environment. A missing file is
/// not an error; defaults and environment still apply.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    tracing::debug!(path = %path.display(), "loading config");

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

/// Serialize config to TOML at `path`, creating parent directories.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Tests ────────────────────────────────────────────────────────────
