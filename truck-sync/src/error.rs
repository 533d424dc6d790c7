//! Error types for truck-sync.

use std::path::PathBuf;

use thiserror::Error;

use truck_core::{ConfigError, TargetName};

/// All errors that can arise from sync, fetch, and clean operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An error loading or saving configuration.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error (manifest writes).
    #[error("manifest JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A downloaded binary could not be opened or extracted as a zip archive.
    #[error("archive error at {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// A download failed (network error, non-2xx status, unreadable body).
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// The spec document does not list the declared version, even after a
    /// cache-bypassing re-fetch.
    #[error("version {version} of {target} not found in spec {spec_url}")]
    VersionNotFound {
        target: TargetName,
        version: String,
        spec_url: String,
    },

    /// The target has no spec URL (name-only entry without a usable pin).
    #[error("{target} has no spec url; declare it with {{url, version}} to fetch it")]
    NotFetchable { target: TargetName },

    /// A manifest lists a path that would escape the install root.
    #[error("refusing to touch unsafe path '{path}'")]
    UnsafePath { path: String },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
