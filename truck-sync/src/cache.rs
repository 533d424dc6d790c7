//! Download cache keyed by source URL.
//!
//! Blobs live at `<root>/<sha256(url)>`; existence on disk is the index.
//! Validity is URL identity, not content: two payloads served from the same
//! URL alias to one entry until [`ArtifactCache::nuke`] is called.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, trace, warn};

use crate::error::{io_err, SyncError};

/// Result of a cache lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookup {
    Hit,
    Miss,
}

#[derive(Debug, Clone)]
pub struct ArtifactCache {
    root: PathBuf,
}

impl ArtifactCache {
    /// Create a cache rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stable key for `url`: hex SHA-256 of the URL text.
    pub fn key(url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// `<root>/<key>` (pure, no I/O).
    pub fn blob_path(&self, url: &str) -> PathBuf {
        self.root.join(Self::key(url))
    }

    pub fn contains(&self, url: &str) -> bool {
        self.blob_path(url).is_file()
    }

    /// Copy the cached blob for `url` to `dest`.
    ///
    /// A blob that exists but cannot be copied is reported as a miss so the
    /// caller falls back to the network.
    pub fn fetch_to_local(&self, url: &str, dest: &Path) -> CacheLookup {
        let blob = self.blob_path(url);
        if !blob.is_file() {
            trace!(%url, "cache miss");
            return CacheLookup::Miss;
        }
        if let Some(parent) = dest.parent() {
            if let Err(err) = std::fs::create_dir_all(parent) {
                warn!(%url, "cache hit unusable, cannot create {}: {err}", parent.display());
                return CacheLookup::Miss;
            }
        }
        match std::fs::copy(&blob, dest) {
            Ok(_) => {
                debug!(%url, "cache hit");
                CacheLookup::Hit
            }
            Err(err) => {
                warn!(%url, "cache hit unusable, copy to {} failed: {err}", dest.display());
                CacheLookup::Miss
            }
        }
    }

    /// Copy `source` into the cache under `url`.
    ///
    /// Writes `<key>.tmp` then renames, so a crash never leaves a truncated
    /// blob that would later be served as a hit.
    pub fn store(&self, url: &str, source: &Path) -> Result<(), SyncError> {
        std::fs::create_dir_all(&self.root).map_err(|e| io_err(&self.root, e))?;
        let blob = self.blob_path(url);
        let tmp = blob.with_extension("tmp");
        std::fs::copy(source, &tmp).map_err(|e| io_err(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &blob) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err(&blob, e));
        }
        debug!(%url, blob = %blob.display(), "stored in cache");
        Ok(())
    }

    /// Remove the whole cache store. Returns `false` if there was nothing to
    /// remove.
    pub fn nuke(&self) -> Result<bool, SyncError> {
        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(io_err(&self.root, err)),
        }
    }
}
