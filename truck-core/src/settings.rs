//! Explicit runtime configuration, built once at startup.
//!
//! # On-disk layout
//!
//! ```text
//! <work_dir>/
//!   truck.json                 declared dependencies
//!   Truck/                     install root (archives extract here)
//!     .truck/
//!       pins/<target>.json     installed manifests
//!       tmp/                   per-batch scratch workspace
//! <cache_root>/<sha256(url)>   download cache blobs
//! ```

use std::path::{Path, PathBuf};

use crate::types::TargetName;

pub const INSTALL_DIRNAME: &str = "Truck";
pub const STATE_DIRNAME: &str = ".truck";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub work_dir: PathBuf,
    pub install_root: PathBuf,
    pub cache_root: PathBuf,
    /// Render the download progress line on stderr.
    pub show_progress: bool,
}

impl Settings {
    /// Default layout rooted at `work_dir`, caching under the user cache dir.
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        let work_dir = work_dir.into();
        let cache_root = dirs::cache_dir()
            .map(|dir| dir.join("truck"))
            .unwrap_or_else(|| work_dir.join(".truck-cache"));
        Self {
            install_root: work_dir.join(INSTALL_DIRNAME),
            cache_root,
            work_dir,
            show_progress: true,
        }
    }

    #[must_use]
    pub fn with_cache_root(mut self, cache_root: impl Into<PathBuf>) -> Self {
        self.cache_root = cache_root.into();
        self
    }

    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// `<install_root>/.truck`
    pub fn state_dir(&self) -> PathBuf {
        self.install_root.join(STATE_DIRNAME)
    }

    /// `<install_root>/.truck/pins`
    pub fn pins_dir(&self) -> PathBuf {
        self.state_dir().join("pins")
    }

    /// `<install_root>/.truck/pins/<target>.json` (pure, no I/O).
    pub fn manifest_path(&self, target: &TargetName) -> PathBuf {
        self.pins_dir().join(format!("{}.json", target.0))
    }

    /// `<install_root>/.truck/tmp`
    pub fn scratch_dir(&self) -> PathBuf {
        self.state_dir().join("tmp")
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_rooted_at_work_dir() {
        let settings = Settings::new("/work").with_cache_root("/cache");
        assert_eq!(settings.install_root, PathBuf::from("/work/Truck"));
        assert_eq!(
            settings.manifest_path(&TargetName::from("sdk")),
            PathBuf::from("/work/Truck/.truck/pins/sdk.json")
        );
        assert_eq!(settings.scratch_dir(), PathBuf::from("/work/Truck/.truck/tmp"));
        assert_eq!(settings.cache_root, PathBuf::from("/cache"));
    }
}
