//! Publishing credentials, read from `~/.truckrc`.
//!
//! The value is loaded once at startup and handed to the publish path
//! explicitly. The sync engine never needs it.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::json_file;

pub const SECRETS_FILENAME: &str = ".truckrc";

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Secrets {
    #[serde(rename = "AWS_ACCESS_KEY_ID", default)]
    pub aws_access_key_id: String,
    #[serde(rename = "AWS_SECRET_ACCESS_KEY", default)]
    pub aws_secret_access_key: String,
    #[serde(rename = "GITHUB_TOKEN", default, skip_serializing_if = "String::is_empty")]
    pub github_token: String,
}

impl Secrets {
    /// `(access key id, secret access key)` when both are filled in.
    pub fn aws_credentials(&self) -> Option<(&str, &str)> {
        if self.aws_access_key_id.is_empty() || self.aws_secret_access_key.is_empty() {
            return None;
        }
        Some((
            self.aws_access_key_id.as_str(),
            self.aws_secret_access_key.as_str(),
        ))
    }

    pub fn github_token(&self) -> Option<&str> {
        (!self.github_token.is_empty()).then_some(self.github_token.as_str())
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |s: &str| if s.is_empty() { "<unset>" } else { "<redacted>" };
        f.debug_struct("Secrets")
            .field("aws_access_key_id", &mask(self.aws_access_key_id.as_str()))
            .field("aws_secret_access_key", &mask(self.aws_secret_access_key.as_str()))
            .field("github_token", &mask(self.github_token.as_str()))
            .finish()
    }
}

/// `~/.truckrc`.
pub fn default_secrets_path() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(SECRETS_FILENAME))
        .ok_or(ConfigError::HomeNotFound)
}

/// Load secrets from `path`; a missing file yields empty secrets.
pub fn load_secrets_at(path: &Path) -> Result<Secrets, ConfigError> {
    if !path.exists() {
        return Ok(Secrets::default());
    }
    json_file::read(path)
}

/// Write an empty secrets template if `path` does not exist yet.
///
/// Returns `true` when the file was created.
pub fn init_secrets_at(path: &Path) -> Result<bool, ConfigError> {
    if path.exists() {
        return Ok(false);
    }
    json_file::write_atomic(path, &Secrets::default())?;
    set_file_permissions(path)?;
    Ok(true)
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| crate::error::io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}
