//! The configured backends of an author workspace.

use std::path::Path;

use tracing::{debug, warn};

use truck_core::{parse_spec, HostingConfig, Spec};
use truck_sync::{FetchOutcome, Fetcher};

use crate::backend::{backend_for, HostingBackend};
use crate::error::HostingError;

/// Ordered backends; the first is the one releases are published to.
pub struct HostingRegistry {
    backends: Vec<Box<dyn HostingBackend>>,
}

impl HostingRegistry {
    pub fn new(backends: Vec<Box<dyn HostingBackend>>) -> Self {
        Self { backends }
    }

    pub fn from_config(config: &HostingConfig) -> Self {
        Self::new(config.backends.iter().map(backend_for).collect())
    }

    pub fn backends(&self) -> &[Box<dyn HostingBackend>] {
        &self.backends
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// The backend single-target operations act on.
    pub fn active_backend(&self) -> Result<&dyn HostingBackend, HostingError> {
        self.backends
            .first()
            .map(|b| b.as_ref())
            .ok_or(HostingError::NoBackend)
    }

    /// Merge the remote spec of `target` across every backend.
    ///
    /// Later backends win on version collisions. A backend whose spec cannot
    /// be fetched contributes nothing. Downloads bypass the cache and land in
    /// `scratch`.
    pub fn find_spec(&self, target: &str, fetcher: &Fetcher, scratch: &Path) -> Spec {
        let mut merged = Spec::new();
        for (index, backend) in self.backends.iter().enumerate() {
            let url = backend.spec_uri(target);
            let dest = scratch.join(format!("{index}-{target}.json"));
            if let FetchOutcome::Failed { reason } = fetcher.download(&url, &dest, false) {
                debug!(backend = backend.name(), %url, "no remote spec: {reason}");
                continue;
            }
            match std::fs::read_to_string(&dest) {
                Ok(contents) => merged.extend(parse_spec(&contents)),
                Err(err) => warn!(backend = backend.name(), "unreadable spec {}: {err}", dest.display()),
            }
        }
        merged
    }
}
