//! Hosting backends: where specs and binaries of a target live remotely.
//!
//! The set of backend kinds is closed ([`BackendConfig`]); each kind is a
//! [`HostingBackend`] implementation built once from validated config.

use std::path::Path;

use tracing::info;

use truck_core::{BackendConfig, GithubConfig, S3Config};

use crate::error::HostingError;
use crate::publish::{Destination, Upload, Uploader};

pub trait HostingBackend {
    /// Short label for logs and CLI output.
    fn name(&self) -> &'static str;

    /// Public HTTP location of the spec document for `target`.
    fn spec_uri(&self, target: &str) -> String;

    /// Public HTTP location of the archive for `target` at `version`.
    fn binary_uri(&self, target: &str, version: &str) -> String;

    /// Upload list for one release: the spec document, then the archive if
    /// there is one.
    fn uploads(
        &self,
        target: &str,
        version: &str,
        spec_file: &Path,
        archive: Option<&Path>,
    ) -> Vec<Upload>;

    /// Push the spec (and archive, if any) through `uploader`. Stops at the
    /// first failed upload.
    fn publish(
        &self,
        target: &str,
        version: &str,
        spec_file: &Path,
        archive: Option<&Path>,
        uploader: &dyn Uploader,
    ) -> Result<Vec<Upload>, HostingError> {
        let uploads = self.uploads(target, version, spec_file, archive);
        for upload in &uploads {
            uploader.upload(upload)?;
        }
        info!(backend = self.name(), %target, %version, files = uploads.len(), "published");
        Ok(uploads)
    }
}

/// Instantiate the backend for one validated config section.
pub fn backend_for(config: &BackendConfig) -> Box<dyn HostingBackend> {
    match config {
        BackendConfig::S3(s3) => Box::new(S3Backend::new(s3)),
        BackendConfig::Github(github) => Box::new(GithubBackend::new(github)),
    }
}

// ---------------------------------------------------------------------------
// Object storage
// ---------------------------------------------------------------------------

/// Specs at `<base>/<target>.json`, archives at
/// `<base>/<target>/<version>/<target>.zip`, served over the regional S3
/// HTTP endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Backend {
    base_path: String,
    region: String,
}

impl S3Backend {
    pub fn new(config: &S3Config) -> Self {
        Self {
            base_path: config.base_path.trim_matches('/').to_string(),
            region: config.region.clone(),
        }
    }

    fn spec_key(&self, target: &str) -> String {
        format!("{}/{target}.json", self.base_path)
    }

    fn binary_key(&self, target: &str, version: &str) -> String {
        format!("{}/{target}/{version}/{target}.zip", self.base_path)
    }

    fn http_uri(&self, key: &str) -> String {
        format!("https://s3-{}.amazonaws.com/{key}", self.region)
    }

    fn destination(&self, key: &str) -> Destination {
        Destination::S3 {
            uri: format!("s3://{key}"),
            region: self.region.clone(),
        }
    }
}

impl HostingBackend for S3Backend {
    fn name(&self) -> &'static str {
        "s3"
    }

    fn spec_uri(&self, target: &str) -> String {
        self.http_uri(&self.spec_key(target))
    }

    fn binary_uri(&self, target: &str, version: &str) -> String {
        self.http_uri(&self.binary_key(target, version))
    }

    fn uploads(
        &self,
        target: &str,
        version: &str,
        spec_file: &Path,
        archive: Option<&Path>,
    ) -> Vec<Upload> {
        let mut uploads = vec![Upload {
            file: spec_file.to_path_buf(),
            destination: self.destination(&self.spec_key(target)),
        }];
        if let Some(archive) = archive {
            uploads.push(Upload {
                file: archive.to_path_buf(),
                destination: self.destination(&self.binary_key(target, version)),
            });
        }
        uploads
    }
}

// ---------------------------------------------------------------------------
// Release assets
// ---------------------------------------------------------------------------

/// Specs as assets of one shared release (`spec_tag`), archives as the
/// `<target>.zip` asset of a per-version release tagged `<target>-<version>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubBackend {
    repository: String,
    spec_tag: String,
}

impl GithubBackend {
    pub fn new(config: &GithubConfig) -> Self {
        Self {
            repository: config.repository.clone(),
            spec_tag: config.spec_tag.clone(),
        }
    }

    fn release_tag(target: &str, version: &str) -> String {
        format!("{target}-{version}")
    }

    fn download_uri(&self, tag: &str, asset: &str) -> String {
        format!(
            "https://github.com/{}/releases/download/{tag}/{asset}",
            self.repository
        )
    }
}

impl HostingBackend for GithubBackend {
    fn name(&self) -> &'static str {
        "github"
    }

    fn spec_uri(&self, target: &str) -> String {
        self.download_uri(&self.spec_tag, &format!("{target}.json"))
    }

    fn binary_uri(&self, target: &str, version: &str) -> String {
        self.download_uri(&Self::release_tag(target, version), &format!("{target}.zip"))
    }

    fn uploads(
        &self,
        target: &str,
        version: &str,
        spec_file: &Path,
        archive: Option<&Path>,
    ) -> Vec<Upload> {
        let mut uploads = vec![Upload {
            file: spec_file.to_path_buf(),
            destination: Destination::GithubRelease {
                repository: self.repository.clone(),
                tag: self.spec_tag.clone(),
                asset: format!("{target}.json"),
            },
        }];
        if let Some(archive) = archive {
            uploads.push(Upload {
                file: archive.to_path_buf(),
                destination: Destination::GithubRelease {
                    repository: self.repository.clone(),
                    tag: Self::release_tag(target, version),
                    asset: format!("{target}.zip"),
                },
            });
        }
        uploads
    }
}
