// ── Credential file ──
//
// A small JSON document holding the account email and password plus the
// session secret and device id once issued. Absent fields are simply
// omitted from the file.

use std::io::Write;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

use pushover_core::Credentials;

const CREDENTIALS_FILE_NAME: &str = ".pushover-open-client-creds.json";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("no credentials stored at {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("credential file {} is unreadable: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("credential file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// `~/.pushover-open-client-creds.json`, or the working directory when no
/// home directory can be determined.
pub fn default_credentials_path() -> PathBuf {
    BaseDirs::new().map_or_else(
        || PathBuf::from(CREDENTIALS_FILE_NAME),
        |dirs| dirs.home_dir().join(CREDENTIALS_FILE_NAME),
    )
}

#[derive(Deserialize, Serialize)]
struct StoredCredentials {
    email: String,
    password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    device_id: Option<String>,
}

/// Loads and saves [`Credentials`] at a fixed path.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new(default_credentials_path())
    }
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn load(&self) -> Result<Credentials, CredentialError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CredentialError::NotFound {
                    path: self.path.clone(),
                });
            }
            Err(source) => return Err(self.io_error(source)),
        };

        let stored: StoredCredentials =
            serde_json::from_str(&text).map_err(|source| CredentialError::Corrupt {
                path: self.path.clone(),
                source,
            })?;

        tracing::debug!(path = %self.path.display(), "loaded credentials");
        Ok(Credentials::from_parts(
            stored.email,
            SecretString::from(stored.password),
            stored.secret.map(SecretString::from),
            stored.device_id,
        ))
    }

    /// Write `credentials`, creating parent directories. The file is
    /// replaced atomically and is only readable by its owner on Unix.
    pub fn save(&self, credentials: &Credentials) -> Result<(), CredentialError> {
        let stored = StoredCredentials {
            email: credentials.email().to_owned(),
            password: credentials.password().expose_secret().to_owned(),
            secret: credentials.secret().map(|s| s.expose_secret().to_owned()),
            device_id: credentials.device_id().map(str::to_owned),
        };
        let json = serde_json::to_string_pretty(&stored).map_err(|source| {
            CredentialError::Corrupt {
                path: self.path.clone(),
                source,
            }
        })?;

        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
                parent
            }
            None => Path::new("."),
        };

        // Write a sibling temp file (0600 on Unix) and rename it over the
        // target, so an interrupted save never leaves a truncated file.
        let mut file = NamedTempFile::new_in(dir).map_err(|e| self.io_error(e))?;
        file.write_all(json.as_bytes())
            .and_then(|()| file.write_all(b"\n"))
            .and_then(|()| file.as_file().sync_all())
            .map_err(|e| self.io_error(e))?;
        file.persist(&self.path)
            .map_err(|e| self.io_error(e.error))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| self.io_error(e))?;
        }

        tracing::debug!(path = %self.path.display(), "saved credentials");
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> CredentialError {
        CredentialError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
