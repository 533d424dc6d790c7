//! Error types for truck-hosting.

use std::path::PathBuf;

use thiserror::Error;

use truck_core::ConfigError;

/// All errors that can arise from resolving, packaging, and publishing
/// targets.
#[derive(Debug, Error)]
pub enum HostingError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("spec JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The release archive could not be written.
    #[error("archive error at {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// `truck-author.json` has no recognised backend section.
    #[error("no hosting backend configured; add an `aws` or `github` section to truck-author.json")]
    NoBackend,

    /// `<target>-config.json` is missing.
    #[error("can't find {path}; run `truck add {target} path/to/stuff`")]
    TargetConfigNotFound { target: String, path: PathBuf },

    /// The staging config lists no files.
    #[error("{target} has no files to release")]
    NothingToRelease { target: String },

    /// `~/.truckrc` lacks the credentials a backend needs.
    #[error("missing {what} in ~/.truckrc")]
    MissingCredentials { what: &'static str },

    /// An upload command failed.
    #[error("upload of {file} to {destination} failed: {reason}")]
    Upload {
        file: PathBuf,
        destination: String,
        reason: String,
    },
}

/// Convenience constructor for [`HostingError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> HostingError {
    HostingError::Io {
        path: path.into(),
        source,
    }
}
