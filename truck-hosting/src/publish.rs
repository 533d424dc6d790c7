//! Publish boundary: where release files go and how they get there.
//!
//! Backends describe uploads as data ([`Upload`]); an [`Uploader`] carries
//! them out. [`CommandUploader`] shells out to the `aws` / `gh` CLIs with
//! credentials passed only through the child-process environment.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use truck_core::Secrets;

use crate::error::{io_err, HostingError};

/// Remote location of one uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// `s3://bucket/key`, publicly readable once uploaded.
    S3 { uri: String, region: String },
    /// An asset named `asset` on release `tag` of `repository`.
    GithubRelease {
        repository: String,
        tag: String,
        asset: String,
    },
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::S3 { uri, .. } => f.write_str(uri),
            Destination::GithubRelease {
                repository,
                tag,
                asset,
            } => write!(f, "github.com/{repository} release {tag} asset {asset}"),
        }
    }
}

/// One local file and where it should end up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub file: PathBuf,
    pub destination: Destination,
}

/// Carries out uploads. Implementations must be all-or-error per call.
pub trait Uploader {
    /// Fail early when `destination` can't be reached, before anything is
    /// written locally.
    fn check(&self, _destination: &Destination) -> Result<(), HostingError> {
        Ok(())
    }

    fn upload(&self, upload: &Upload) -> Result<(), HostingError>;
}

// ---------------------------------------------------------------------------
// CLI-backed uploader
// ---------------------------------------------------------------------------

/// Uploads with the `aws` and `gh` command-line tools.
pub struct CommandUploader {
    secrets: Secrets,
}

impl CommandUploader {
    pub fn new(secrets: Secrets) -> Self {
        Self { secrets }
    }

    fn aws_credentials(&self) -> Result<(&str, &str), HostingError> {
        self.secrets
            .aws_credentials()
            .ok_or(HostingError::MissingCredentials {
                what: "AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY",
            })
    }

    fn s3_copy(&self, file: &Path, uri: &str, region: &str) -> Result<(), HostingError> {
        let (key_id, secret) = self.aws_credentials()?;
        let mut cmd = Command::new("aws");
        cmd.arg("s3")
            .arg("cp")
            .arg(file)
            .arg(uri)
            .args(["--acl", "public-read", "--region", region])
            .env("AWS_ACCESS_KEY_ID", key_id)
            .env("AWS_SECRET_ACCESS_KEY", secret);
        run(cmd, file, uri)
    }

    fn github_upload(
        &self,
        file: &Path,
        repository: &str,
        tag: &str,
        asset: &str,
    ) -> Result<(), HostingError> {
        let destination = format!("{repository}@{tag}");
        let mut view = self.gh();
        view.args(["release", "view", tag, "--repo", repository]);
        let exists = view
            .output()
            .map_err(|e| io_err("gh", e))?
            .status
            .success();
        if !exists {
            info!(%repository, %tag, "creating release");
            let mut create = self.gh();
            create.args([
                "release", "create", tag, "--repo", repository, "--title", tag, "--notes", "",
            ]);
            run(create, file, &destination)?;
        }

        // `gh` names assets after the file, so stage a copy when they differ.
        let named = file.file_name().and_then(|n| n.to_str()) == Some(asset);
        let staged_dir = std::env::temp_dir().join(format!("truck-upload-{}", std::process::id()));
        let source = if named {
            file.to_path_buf()
        } else {
            std::fs::create_dir_all(&staged_dir).map_err(|e| io_err(&staged_dir, e))?;
            let staged = staged_dir.join(asset);
            std::fs::copy(file, &staged).map_err(|e| io_err(&staged, e))?;
            staged
        };

        let mut upload = self.gh();
        upload
            .args(["release", "upload", tag])
            .arg(&source)
            .args(["--repo", repository, "--clobber"]);
        let result = run(upload, file, &destination);
        if !named {
            let _ = std::fs::remove_dir_all(&staged_dir);
        }
        result
    }

    fn gh(&self) -> Command {
        let mut cmd = Command::new("gh");
        if let Some(token) = self.secrets.github_token() {
            cmd.env("GH_TOKEN", token);
        }
        cmd
    }
}

impl Uploader for CommandUploader {
    // `gh` falls back to its own login when no token is configured.
    fn check(&self, destination: &Destination) -> Result<(), HostingError> {
        match destination {
            Destination::S3 { .. } => self.aws_credentials().map(|_| ()),
            Destination::GithubRelease { .. } => Ok(()),
        }
    }

    fn upload(&self, upload: &Upload) -> Result<(), HostingError> {
        info!(file = %upload.file.display(), destination = %upload.destination, "uploading");
        match &upload.destination {
            Destination::S3 { uri, region } => self.s3_copy(&upload.file, uri, region),
            Destination::GithubRelease {
                repository,
                tag,
                asset,
            } => self.github_upload(&upload.file, repository, tag, asset),
        }
    }
}

fn run(mut cmd: Command, file: &Path, destination: &str) -> Result<(), HostingError> {
    debug!(program = ?cmd.get_program(), "running upload command");
    let output = cmd.output().map_err(|e| HostingError::Upload {
        file: file.to_path_buf(),
        destination: destination.to_string(),
        reason: format!("could not run {:?}: {e}", cmd.get_program()),
    })?;
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    Err(HostingError::Upload {
        file: file.to_path_buf(),
        destination: destination.to_string(),
        reason: format!("exit status {}: {stderr}", output.status),
    })
}

// ---------------------------------------------------------------------------
// Recording uploader
// ---------------------------------------------------------------------------

/// Uploader that only records what it was asked to do. Clones share the log.
#[derive(Debug, Clone, Default)]
pub struct RecordingUploader {
    uploads: Arc<Mutex<Vec<Upload>>>,
}

impl RecordingUploader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }
}

impl Uploader for RecordingUploader {
    fn upload(&self, upload: &Upload) -> Result<(), HostingError> {
        if let Ok(mut log) = self.uploads.lock() {
            log.push(upload.clone());
        }
        Ok(())
    }
}
