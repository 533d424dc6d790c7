//! Per-dependency resolution and staleness.
//!
//! A [`DependencyRecord`] lives for one run: it is built from a
//! [`DependencyDeclaration`] plus whatever pin is on disk, then (if stale)
//! resolves its spec and binary into the scratch workspace.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use truck_core::{parse_spec, DependencyDeclaration, Provenance, Settings, TargetName};

use crate::error::SyncError;
use crate::extract;
use crate::fetch::{FetchOutcome, Fetcher};
use crate::manifest::{self, InstalledManifest};

#[derive(Debug, Clone)]
pub struct DependencyRecord {
    pub name: TargetName,
    pub provenance: Provenance,
    pub spec_url: Option<String>,
    pub declared_version: Option<String>,
    /// Pin found on disk when the record was built.
    pub manifest: Option<InstalledManifest>,
    /// Resolved by [`DependencyRecord::download_spec`].
    pub binary_url: Option<String>,
    /// Top-level entries of the fetched archive, set by
    /// [`DependencyRecord::download_binary`].
    pub new_files: BTreeSet<String>,
    binary_path: Option<PathBuf>,
}

impl DependencyRecord {
    /// Build a record for `declaration`, reading its pin if present.
    pub fn load(settings: &Settings, declaration: &DependencyDeclaration) -> Result<Self, SyncError> {
        Ok(Self {
            name: declaration.name.clone(),
            provenance: declaration.provenance,
            spec_url: declaration.spec_url.clone(),
            declared_version: declaration.version.clone(),
            manifest: manifest::load(settings, &declaration.name)?,
            binary_url: None,
            new_files: BTreeSet::new(),
            binary_path: None,
        })
    }

    /// Reconstruct a record from its pin alone.
    pub fn discovered(settings: &Settings, name: TargetName) -> Result<Self, SyncError> {
        Self::load(settings, &DependencyDeclaration::discovered(name))
    }

    /// Version this record should end up at: the declared one, or for
    /// name-only records the pinned one.
    pub fn version(&self) -> Option<&str> {
        self.declared_version
            .as_deref()
            .or_else(|| self.manifest.as_ref().map(|m| m.version.as_str()))
    }

    pub fn installed_version(&self) -> Option<&str> {
        self.manifest.as_ref().map(|m| m.version.as_str())
    }

    /// No pin, or a pin whose version differs from the declared one (plain
    /// string comparison).
    pub fn is_out_of_sync(&self) -> bool {
        match (&self.manifest, self.version()) {
            (Some(pinned), Some(version)) => pinned.version != version,
            _ => true,
        }
    }

    /// Files owned by the previous pin.
    pub fn owned_files(&self) -> BTreeSet<String> {
        self.manifest
            .as_ref()
            .map(|m| m.files.clone())
            .unwrap_or_default()
    }

    /// Fetch the spec and resolve the binary URL for the declared version.
    ///
    /// The first attempt may be served from cache. If the version is absent,
    /// the spec is fetched once more bypassing the cache, since a cached spec
    /// may predate a fresh release. Only then is the lookup failure returned.
    pub fn download_spec(&mut self, fetcher: &Fetcher, scratch: &Path) -> Result<&str, SyncError> {
        let (spec_url, version) = match (&self.spec_url, &self.declared_version) {
            (Some(url), Some(version)) => (url.clone(), version.clone()),
            _ => {
                return Err(SyncError::NotFetchable {
                    target: self.name.clone(),
                })
            }
        };
        let dest = scratch.join(format!("{}.spec.json", self.name));

        let (_, found) = lookup(fetcher, &spec_url, &dest, &version, true);
        let binary_url = match found {
            Some(url) => url,
            None => {
                warn!(
                    dependency = %self.name,
                    %version,
                    "version missing from spec, possible stale spec cache; re-fetching"
                );
                match lookup(fetcher, &spec_url, &dest, &version, false) {
                    (_, Some(url)) => url,
                    (FetchOutcome::Failed { reason }, None) => {
                        return Err(SyncError::Fetch {
                            url: spec_url,
                            reason,
                        })
                    }
                    (_, None) => {
                        return Err(SyncError::VersionNotFound {
                            target: self.name.clone(),
                            version,
                            spec_url,
                        })
                    }
                }
            }
        };

        debug!(dependency = %self.name, %version, %binary_url, "resolved");
        Ok(self.binary_url.insert(binary_url).as_str())
    }

    /// Fetch the resolved binary (cache-aware) and record its top-level
    /// entries as the new owned-file set.
    pub fn download_binary(&mut self, fetcher: &Fetcher, scratch: &Path) -> Result<&Path, SyncError> {
        let url = self.binary_url.clone().ok_or_else(|| SyncError::NotFetchable {
            target: self.name.clone(),
        })?;
        let file_name = url
            .split(['?', '#'])
            .next()
            .and_then(|u| u.rsplit('/').next())
            .filter(|s| !s.is_empty())
            .unwrap_or("archive.zip");
        let dest = scratch.join(format!("{}-{file_name}", self.name));

        if let FetchOutcome::Failed { reason } = fetcher.download(&url, &dest, true) {
            return Err(SyncError::Fetch { url, reason });
        }

        self.new_files = extract::top_level_entries(&dest)?;
        Ok(self.binary_path.insert(dest).as_path())
    }

    /// Local path of the fetched archive, once downloaded.
    pub fn binary_path(&self) -> Option<&Path> {
        self.binary_path.as_deref()
    }
}

fn lookup(
    fetcher: &Fetcher,
    spec_url: &str,
    dest: &Path,
    version: &str,
    use_cache: bool,
) -> (FetchOutcome, Option<String>) {
    let outcome = fetcher.download(spec_url, dest, use_cache);
    let spec = std::fs::read_to_string(dest)
        .map(|contents| parse_spec(&contents))
        .unwrap_or_default();
    (outcome, spec.get(version).cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ArtifactCache;
    use crate::fetch::MemoryTransport;
    use tempfile::TempDir;

    const SPEC: &str = "https://host/specs/sdk.json";

    fn setup() -> (TempDir, Settings, MemoryTransport, Fetcher) {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::new(tmp.path()).with_cache_root(tmp.path().join("cache"));
        let transport = MemoryTransport::new();
        let fetcher = Fetcher::new(
            Box::new(transport.clone()),
            ArtifactCache::new(&settings.cache_root),
        );
        (tmp, settings, transport, fetcher)
    }

    fn declared(version: &str) -> DependencyDeclaration {
        DependencyDeclaration::declared(SPEC, version).unwrap()
    }

    #[test]
    fn pin_roundtrip_drives_staleness() {
        let (_tmp, settings, _, _) = setup();
        let name = TargetName::from("sdk");
        let files = ["a", "b"].iter().map(|s| s.to_string()).collect();
        manifest::save(&settings, &name, &InstalledManifest::new("1.2.3", files)).unwrap();

        let current = DependencyRecord::load(&settings, &declared("1.2.3")).unwrap();
        assert!(!current.is_out_of_sync());
        assert_eq!(current.owned_files().len(), 2);

        let bumped = DependencyRecord::load(&settings, &declared("1.2.4")).unwrap();
        assert!(bumped.is_out_of_sync());
    }

    #[test]
    fn no_pin_is_out_of_sync() {
        let (_tmp, settings, _, _) = setup();
        let record = DependencyRecord::load(&settings, &declared("1.0")).unwrap();
        assert!(record.is_out_of_sync());
        assert!(record.installed_version().is_none());
    }

    #[test]
    fn discovered_record_takes_version_from_pin() {
        let (_tmp, settings, _, _) = setup();
        let name = TargetName::from("sdk");
        manifest::save(&settings, &name, &InstalledManifest::new("4.0", BTreeSet::new())).unwrap();

        let record = DependencyRecord::discovered(&settings, name).unwrap();
        assert_eq!(record.provenance, Provenance::Discovered);
        assert_eq!(record.version(), Some("4.0"));
        assert!(!record.is_out_of_sync());
    }

    #[test]
    fn stale_cached_spec_triggers_exactly_one_bypass_refetch() {
        let (tmp, settings, transport, fetcher) = setup();
        let scratch = tmp.path().join("scratch");

        // Prime the cache with a spec that predates 2.0.
        transport.insert(SPEC, r#"{"1.0": "https://host/sdk/1.0/sdk.zip"}"#);
        fetcher.download(SPEC, &scratch.join("prime.json"), true);
        transport.insert(
            SPEC,
            r#"{"1.0": "https://host/sdk/1.0/sdk.zip", "2.0": "https://host/sdk/2.0/sdk.zip"}"#,
        );

        let mut record = DependencyRecord::load(&settings, &declared("2.0")).unwrap();
        let url = record.download_spec(&fetcher, &scratch).unwrap().to_string();
        assert_eq!(url, "https://host/sdk/2.0/sdk.zip");
        assert_eq!(transport.requests_for(SPEC), 2, "prime + one bypass");
    }

    #[test]
    fn version_missing_after_bypass_is_fatal() {
        let (tmp, settings, transport, fetcher) = setup();
        transport.insert(SPEC, r#"{"1.0": "https://host/sdk/1.0/sdk.zip"}"#);

        let mut record = DependencyRecord::load(&settings, &declared("9.9")).unwrap();
        let err = record.download_spec(&fetcher, tmp.path()).unwrap_err();
        assert!(matches!(err, SyncError::VersionNotFound { .. }), "got {err}");
        assert_eq!(transport.requests_for(SPEC), 2);
        assert!(record.binary_url.is_none());
    }

    #[test]
    fn unreachable_spec_surfaces_fetch_error() {
        let (tmp, settings, transport, fetcher) = setup();
        let mut record = DependencyRecord::load(&settings, &declared("1.0")).unwrap();
        let err = record.download_spec(&fetcher, tmp.path()).unwrap_err();
        assert!(matches!(err, SyncError::Fetch { .. }), "got {err}");
        assert_eq!(transport.requests_for(SPEC), 2);
    }

    #[test]
    fn name_only_record_cannot_fetch() {
        let (tmp, settings, _, fetcher) = setup();
        let mut record = DependencyRecord::discovered(&settings, TargetName::from("x")).unwrap();
        assert!(matches!(
            record.download_spec(&fetcher, tmp.path()),
            Err(SyncError::NotFetchable { .. })
        ));
    }
}
