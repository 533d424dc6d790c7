//! Error types for truck-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from loading or saving truck configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure, annotated with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error (write/save path).
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// JSON parse error on load; includes file path and line context.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// `truck.json` did not exist in the working directory.
    #[error("cannot find {path} in local directory")]
    DeclarationNotFound { path: PathBuf },

    /// An entry of `truck.json` is neither `{url, version}` nor `{name}`.
    #[error("invalid dependency entry #{index}: {reason}")]
    InvalidDeclaration { index: usize, reason: String },

    /// `truck-author.json` did not exist in the working directory.
    #[error("cannot find {path}; run from the correct directory or run `truck init`")]
    AuthorConfigNotFound { path: PathBuf },

    /// `truck-author.json` exists but a backend section is unusable.
    #[error("invalid author config: {0}")]
    InvalidAuthorConfig(String),

    /// No declared dependency matches the requested target name.
    #[error("no dependency named '{name}' is declared")]
    UnknownTarget { name: String },

    /// A path handed to `truck add` does not exist.
    #[error("{path} doesn't exist")]
    MissingPath { path: PathBuf },

    /// Two paths staged for one archive share a file name.
    #[error("{first} and {second} would both be archived as '{name}'; rename one of them")]
    DuplicateArchiveEntry {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// `dirs::home_dir()` returned `None`, cannot locate `~/.truckrc`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

/// Convenience constructor for [`ConfigError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
