//! Author-side configuration: `truck-author.json` and per-target staging
//! configs (`<target>-config.json`).
//!
//! The author config is parsed once into a [`HostingConfig`], an ordered list
//! of tagged [`BackendConfig`] variants. Which variants are active is decided
//! here, at load time, and never re-probed later.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::json_file;

pub const AUTHOR_CONFIG_FILENAME: &str = "truck-author.json";

fn default_region() -> String {
    "eu-west-1".to_string()
}

fn default_spec_tag() -> String {
    "truck-specs".to_string()
}

/// `aws` section: object-storage hosting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Config {
    #[serde(rename = "s3_base_path")]
    pub base_path: String,
    #[serde(rename = "default_region", default = "default_region")]
    pub region: String,
}

/// `github` section: release-asset hosting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubConfig {
    /// `owner/name` of the repository hosting the releases.
    pub repository: String,
    /// Release tag whose assets hold the spec documents.
    #[serde(default = "default_spec_tag")]
    pub spec_tag: String,
}

/// Raw `truck-author.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AuthorConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<S3Config>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<GithubConfig>,
}

/// One validated hosting backend selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    S3(S3Config),
    Github(GithubConfig),
}

/// Validated hosting selection, in priority order (object storage first).
///
/// An empty list means "no hosting backend configured".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HostingConfig {
    pub backends: Vec<BackendConfig>,
}

impl AuthorConfig {
    /// The template written by `truck init`.
    pub fn template() -> Self {
        Self {
            aws: Some(S3Config {
                base_path: String::new(),
                region: default_region(),
            }),
            github: None,
        }
    }

    /// Validate the present sections into a [`HostingConfig`].
    pub fn hosting(&self) -> Result<HostingConfig, ConfigError> {
        let mut backends = Vec::new();

        if let Some(aws) = &self.aws {
            if aws.base_path.trim_matches('/').is_empty() {
                return Err(ConfigError::InvalidAuthorConfig(
                    "aws.s3_base_path is empty".to_string(),
                ));
            }
            if aws.region.trim().is_empty() {
                return Err(ConfigError::InvalidAuthorConfig(
                    "aws.default_region is empty".to_string(),
                ));
            }
            backends.push(BackendConfig::S3(aws.clone()));
        }

        if let Some(github) = &self.github {
            let mut parts = github.repository.split('/');
            let valid = matches!(
                (parts.next(), parts.next(), parts.next()),
                (Some(owner), Some(repo), None) if !owner.is_empty() && !repo.is_empty()
            );
            if !valid {
                return Err(ConfigError::InvalidAuthorConfig(format!(
                    "github.repository must be 'owner/name', got '{}'",
                    github.repository
                )));
            }
            backends.push(BackendConfig::Github(github.clone()));
        }

        Ok(HostingConfig { backends })
    }
}

/// `<work_dir>/truck-author.json` (pure, no I/O).
pub fn author_config_path_at(work_dir: &Path) -> PathBuf {
    work_dir.join(AUTHOR_CONFIG_FILENAME)
}

/// Load `truck-author.json` from `work_dir`.
pub fn load_author_at(work_dir: &Path) -> Result<AuthorConfig, ConfigError> {
    let path = author_config_path_at(work_dir);
    if !path.is_file() {
        return Err(ConfigError::AuthorConfigNotFound { path });
    }
    json_file::read(&path)
}

/// Load and validate the hosting selection in one step.
pub fn load_hosting_at(work_dir: &Path) -> Result<HostingConfig, ConfigError> {
    load_author_at(work_dir)?.hosting()
}

/// Write the author template if no `truck-author.json` exists yet.
///
/// Returns `true` when the file was created.
pub fn init_author_at(work_dir: &Path) -> Result<bool, ConfigError> {
    let path = author_config_path_at(work_dir);
    if path.exists() {
        return Ok(false);
    }
    json_file::write_atomic(&path, &AuthorConfig::template())?;
    Ok(true)
}

// ---------------------------------------------------------------------------
// Target staging configs
// ---------------------------------------------------------------------------

/// `<target>-config.json`: the files staged into a release archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TargetConfig {
    #[serde(default)]
    pub files: Vec<String>,
}

/// Result of [`add_file_at`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyPresent,
}

/// `<work_dir>/<target>-config.json` (pure, no I/O).
pub fn target_config_path_at(work_dir: &Path, target: &str) -> PathBuf {
    work_dir.join(format!("{target}-config.json"))
}

/// Load a target's staging config.
pub fn load_target_config_at(work_dir: &Path, target: &str) -> Result<TargetConfig, ConfigError> {
    json_file::read(&target_config_path_at(work_dir, target))
}

/// Record `path` (relative to `work_dir`) as part of `target`'s release.
///
/// A trailing slash on directories is stripped. Requires an author config
/// in `work_dir` so files are not added from the wrong directory.
pub fn add_file_at(work_dir: &Path, target: &str, path: &str) -> Result<AddOutcome, ConfigError> {
    load_author_at(work_dir)?;

    let trimmed = path.trim_end_matches('/');
    let path = if trimmed.is_empty() { path } else { trimmed };
    if !work_dir.join(path).exists() {
        return Err(ConfigError::MissingPath {
            path: PathBuf::from(path),
        });
    }

    let config_path = target_config_path_at(work_dir, target);
    let mut config = if config_path.exists() {
        json_file::read::<TargetConfig>(&config_path)?
    } else {
        TargetConfig::default()
    };

    if config.files.iter().any(|f| f == path) {
        tracing::warn!("{path} already exists in {}", config_path.display());
        return Ok(AddOutcome::AlreadyPresent);
    }
    config.files.push(path.to_string());
    json_file::write_atomic(&config_path, &config)?;
    Ok(AddOutcome::Added)
}
