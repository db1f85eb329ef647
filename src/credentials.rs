//! Persisted OAuth credentials stored at `~/.elfsquad/auth.json`.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::AuthError;

/// File name of the credential record inside the credentials directory.
pub const CREDENTIALS_FILE: &str = "auth.json";

/// Token record as persisted on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Bearer credential for API calls.
    pub access_token: String,
    /// Used to mint a new access token without logging in again.
    pub refresh_token: String,
    /// Issuance time, seconds since the Unix epoch.
    pub created_at: i64,
    /// Validity window from `created_at`, in seconds.
    pub expires_in: i64,
    /// Any other fields the provider returned (`token_type`, `scope`, `id_token`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenRecord {
    pub fn expires_at(&self) -> i64 {
        self.created_at.saturating_add(self.expires_in)
    }

    /// A record is stale once `now` is past its expiry.
    pub fn is_stale_at(&self, now: i64) -> bool {
        now > self.expires_at()
    }
}

/// Successful token endpoint response, validated before it becomes a record.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenGrant {
    /// Stamp the grant with its issuance time. `previous_refresh_token` is kept
    /// when the provider does not rotate refresh tokens.
    pub fn into_record(
        self,
        created_at: i64,
        previous_refresh_token: Option<&str>,
    ) -> Result<TokenRecord, AuthError> {
        let refresh_token = self
            .refresh_token
            .or_else(|| previous_refresh_token.map(str::to_string))
            .ok_or(AuthError::MissingRefreshToken)?;

        let mut extra = self.extra;
        extra.remove("created_at");

        Ok(TokenRecord {
            access_token: self.access_token,
            refresh_token,
            created_at,
            expires_in: self.expires_in,
            extra,
        })
    }
}

/// Reads and writes the single token record of the current user.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CredentialStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored record.
    ///
    /// A missing file, an unreadable file and unparsable content all mean
    /// "logged out" and return `None`.
    pub fn load(&self) -> Option<TokenRecord> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "no readable credentials");
                return None;
            }
        };
        match serde_json::from_str(&contents) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "ignoring unparsable credentials");
                None
            }
        }
    }

    /// Persist `record`, replacing whatever was stored before.
    ///
    /// Creates the parent directory if needed. The record is written to a
    /// temporary file and renamed into place; on Unix the file is readable by
    /// the owner only.
    pub fn save(&self, record: &TokenRecord) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_vec_pretty(record).map_err(std::io::Error::other)?;
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = std::fs::File::create(&tmp)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
            }
            file.write_all(&contents)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), "credentials saved");
        Ok(())
    }

    /// Remove the stored record. Succeeds if there was nothing to remove.
    pub fn delete(&self) -> std::io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
