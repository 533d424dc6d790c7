//! Author-side release: pick the next version, package the target's files,
//! record the version in the target's spec, and publish both.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use truck_core::author::{load_target_config_at, target_config_path_at};
use truck_core::{json_file, ConfigError, Spec};
use truck_sync::Fetcher;

use crate::error::{io_err, HostingError};
use crate::publish::{Upload, Uploader};
use crate::registry::HostingRegistry;

/// Scratch directory for remote spec downloads during a release.
pub const RELEASE_STAGING_DIRNAME: &str = ".truck-release";

pub const INITIAL_VERSION: &str = "1.0.0";

/// `<work_dir>/<target>-spec.json`, the author's local copy of the spec.
pub fn local_spec_path_at(work_dir: &Path, target: &str) -> PathBuf {
    work_dir.join(format!("{target}-spec.json"))
}

/// `<work_dir>/<target>.zip`
pub fn archive_path_at(work_dir: &Path, target: &str) -> PathBuf {
    work_dir.join(format!("{target}.zip"))
}

// ---------------------------------------------------------------------------
// Versions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Part {
    Num(u64),
    Word(String),
}

/// Split into runs of digits and runs of letters; anything else separates.
fn loose_parts(version: &str) -> Vec<Part> {
    let mut parts = Vec::new();
    let mut chars = version.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() {
            let mut run = String::new();
            while let Some(d) = chars.next_if(char::is_ascii_digit) {
                run.push(d);
            }
            parts.push(run.parse().map(Part::Num).unwrap_or(Part::Word(run)));
        } else if c.is_alphabetic() {
            let mut run = String::new();
            while let Some(a) = chars.next_if(|ch| ch.is_alphabetic()) {
                run.push(a);
            }
            parts.push(Part::Word(run));
        } else {
            chars.next();
        }
    }
    parts
}

/// Loose version ordering: numeric runs compare as numbers, `1.10 > 1.9`.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    loose_parts(a).cmp(&loose_parts(b)).then_with(|| a.cmp(b))
}

/// Next version after the highest one in `spec`.
///
/// Bumps the last dot-separated component when it is numeric, otherwise
/// appends `.1`. An empty spec starts at [`INITIAL_VERSION`].
pub fn infer_next_version(spec: &Spec) -> String {
    let Some(latest) = spec.keys().max_by(|a, b| compare_versions(a, b)) else {
        return INITIAL_VERSION.to_string();
    };
    match latest.rsplit_once('.') {
        Some((head, last)) => match last.parse::<u64>() {
            Ok(n) => format!("{head}.{}", n + 1),
            Err(_) => format!("{latest}.1"),
        },
        None => match latest.parse::<u64>() {
            Ok(n) => (n + 1).to_string(),
            Err(_) => format!("{latest}.1"),
        },
    }
}

// ---------------------------------------------------------------------------
// Local spec
// ---------------------------------------------------------------------------

/// Load `<target>-spec.json`. A missing file is an empty spec.
pub fn load_local_spec_at(work_dir: &Path, target: &str) -> Result<Spec, HostingError> {
    let path = local_spec_path_at(work_dir, target);
    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(serde_json::from_str(&contents)?),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(Spec::new()),
        Err(err) => Err(io_err(path, err)),
    }
}

/// Write `<target>-spec.json` atomically.
pub fn write_local_spec_at(work_dir: &Path, target: &str, spec: &Spec) -> Result<PathBuf, HostingError> {
    let path = local_spec_path_at(work_dir, target);
    json_file::write_atomic(&path, spec)?;
    Ok(path)
}

// ---------------------------------------------------------------------------
// Archive
// ---------------------------------------------------------------------------

/// Zip `files` (relative to `work_dir`) into `dest`. Each path lands at the
/// archive root under its own file name; directories are added recursively.
/// Returns the number of file entries written.
pub fn stage_archive(work_dir: &Path, files: &[String], dest: &Path) -> Result<usize, HostingError> {
    check_archive_names(work_dir, files)?;
    let tmp = dest.with_extension("zip.tmp");
    let file = File::create(&tmp).map_err(|e| io_err(&tmp, e))?;
    let mut zip = ZipWriter::new(file);

    let count = match write_entries(&mut zip, work_dir, files, dest) {
        Ok(count) => count,
        Err(err) => {
            let _ = std::fs::remove_file(&tmp);
            return Err(err);
        }
    };
    if let Err(source) = zip.finish() {
        let _ = std::fs::remove_file(&tmp);
        return Err(HostingError::Archive {
            path: dest.to_path_buf(),
            source,
        });
    }

    std::fs::rename(&tmp, dest).map_err(|e| io_err(dest, e))?;
    debug!(archive = %dest.display(), entries = count, "archive written");
    Ok(count)
}

/// Every configured path lands at the archive root, so their file names
/// must be distinct.
fn check_archive_names(work_dir: &Path, files: &[String]) -> Result<(), ConfigError> {
    let mut seen: BTreeMap<String, PathBuf> = BTreeMap::new();
    for relative in files {
        let source = work_dir.join(relative);
        let Some(name) = source.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if let Some(first) = seen.get(&name) {
            return Err(ConfigError::DuplicateArchiveEntry {
                name,
                first: first.clone(),
                second: source,
            });
        }
        seen.insert(name, source);
    }
    Ok(())
}

fn write_entries(
    zip: &mut ZipWriter<File>,
    work_dir: &Path,
    files: &[String],
    archive: &Path,
) -> Result<usize, HostingError> {
    let mut count = 0;
    for relative in files {
        let source = work_dir.join(relative);
        let name = match source.file_name() {
            Some(name) if source.exists() => name.to_string_lossy().into_owned(),
            _ => return Err(ConfigError::MissingPath { path: source.clone() }.into()),
        };
        count += add_path(zip, &source, &name, archive)?;
    }
    Ok(count)
}

fn add_path<W: std::io::Write + std::io::Seek>(
    zip: &mut ZipWriter<W>,
    source: &Path,
    name: &str,
    archive: &Path,
) -> Result<usize, HostingError> {
    let zip_err = |source: zip::result::ZipError| HostingError::Archive {
        path: archive.to_path_buf(),
        source,
    };
    let metadata = std::fs::metadata(source).map_err(|e| io_err(source, e))?;
    let options = entry_options(&metadata);

    if metadata.is_dir() {
        zip.add_directory(format!("{name}/"), options).map_err(zip_err)?;
        let mut children = std::fs::read_dir(source)
            .map_err(|e| io_err(source, e))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| io_err(source, e))?;
        children.sort_by_key(|entry| entry.file_name());

        let mut count = 0;
        for child in children {
            let child_name = format!("{name}/{}", child.file_name().to_string_lossy());
            count += add_path(zip, &child.path(), &child_name, archive)?;
        }
        return Ok(count);
    }

    zip.start_file(name, options).map_err(zip_err)?;
    let mut input = File::open(source).map_err(|e| io_err(source, e))?;
    std::io::copy(&mut input, zip).map_err(|e| io_err(source, e))?;
    Ok(1)
}

#[cfg(unix)]
fn entry_options(metadata: &std::fs::Metadata) -> SimpleFileOptions {
    use std::os::unix::fs::PermissionsExt;
    SimpleFileOptions::default().unix_permissions(metadata.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn entry_options(_metadata: &std::fs::Metadata) -> SimpleFileOptions {
    SimpleFileOptions::default()
}

// ---------------------------------------------------------------------------
// Release flow
// ---------------------------------------------------------------------------

/// What a release produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub target: String,
    pub version: String,
    pub binary_uri: String,
    pub spec_uri: String,
    pub spec_path: PathBuf,
    pub archive_path: PathBuf,
    pub entries: usize,
    pub uploads: Vec<Upload>,
}

/// Package and publish `target` from `work_dir`.
///
/// `version` defaults to [`infer_next_version`] over the remote spec merged
/// with the local `<target>-spec.json` (local entries win).
pub fn release_at(
    work_dir: &Path,
    target: &str,
    version: Option<&str>,
    registry: &HostingRegistry,
    fetcher: &Fetcher,
    uploader: &dyn Uploader,
) -> Result<Release, HostingError> {
    let backend = registry.active_backend()?;

    let config_path = target_config_path_at(work_dir, target);
    if !config_path.is_file() {
        return Err(HostingError::TargetConfigNotFound {
            target: target.to_string(),
            path: config_path,
        });
    }
    let config = load_target_config_at(work_dir, target)?;
    if config.files.is_empty() {
        return Err(HostingError::NothingToRelease {
            target: target.to_string(),
        });
    }

    let staging = work_dir.join(RELEASE_STAGING_DIRNAME);
    std::fs::create_dir_all(&staging).map_err(|e| io_err(&staging, e))?;
    let mut spec = registry.find_spec(target, fetcher, &staging);
    if let Err(err) = std::fs::remove_dir_all(&staging) {
        warn!("could not remove {}: {err}", staging.display());
    }
    spec.extend(load_local_spec_at(work_dir, target)?);

    let version = match version {
        Some(v) => v.to_string(),
        None => infer_next_version(&spec),
    };
    if spec.contains_key(&version) {
        warn!(%target, %version, "version already released; overwriting");
    }

    let archive_path = archive_path_at(work_dir, target);
    let spec_path = local_spec_path_at(work_dir, target);
    for upload in backend.uploads(target, &version, &spec_path, Some(&archive_path)) {
        uploader.check(&upload.destination)?;
    }

    let entries = stage_archive(work_dir, &config.files, &archive_path)?;

    let binary_uri = backend.binary_uri(target, &version);
    spec.insert(version.clone(), binary_uri.clone());
    write_local_spec_at(work_dir, target, &spec)?;
    info!(%target, %version, %binary_uri, "spec updated");

    let uploads = backend.publish(target, &version, &spec_path, Some(&archive_path), uploader)?;

    Ok(Release {
        target: target.to_string(),
        spec_uri: backend.spec_uri(target),
        version,
        binary_uri,
        spec_path,
        archive_path,
        entries,
        uploads,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn spec(versions: &[&str]) -> Spec {
        versions
            .iter()
            .map(|v| (v.to_string(), format!("https://host/{v}.zip")))
            .collect()
    }

    #[rstest]
    #[case(&[], "1.0.0")]
    #[case(&["1.0.0"], "1.0.1")]
    #[case(&["1.9", "1.10", "1.2"], "1.11")]
    #[case(&["3.0.2", "3.0.10", "2.9.99"], "3.0.11")]
    #[case(&["7"], "8")]
    #[case(&["1.0.0-beta"], "1.0.0-beta.1")]
    fn next_version(#[case] existing: &[&str], #[case] expected: &str) {
        assert_eq!(infer_next_version(&spec(existing)), expected);
    }

    #[test]
    fn loose_ordering_is_numeric_per_run() {
        assert_eq!(compare_versions("1.10", "1.9"), Ordering::Greater);
        assert_eq!(compare_versions("2.0", "2.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.0a", "1.0"), Ordering::Greater);
        assert_eq!(compare_versions("1.0", "1.0b"), Ordering::Less);
    }

    #[test]
    fn archive_refuses_two_paths_with_the_same_name() {
        let tmp = tempfile::TempDir::new().unwrap();
        for dir in ["a", "b"] {
            std::fs::create_dir_all(tmp.path().join(dir)).unwrap();
            std::fs::write(tmp.path().join(dir).join("README"), dir).unwrap();
        }
        let dest = tmp.path().join("sdk.zip");

        let err = stage_archive(
            tmp.path(),
            &["a/README".to_string(), "b/README".to_string()],
            &dest,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            HostingError::Config(ConfigError::DuplicateArchiveEntry { ref name, .. }) if name == "README"
        ));
        assert!(!dest.exists());
        assert!(!tmp.path().join("sdk.zip.tmp").exists());
    }

    #[test]
    fn local_spec_round_trips_and_defaults_to_empty() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert!(load_local_spec_at(tmp.path(), "sdk").unwrap().is_empty());

        let written = spec(&["1.0", "1.1"]);
        let path = write_local_spec_at(tmp.path(), "sdk", &written).unwrap();
        assert_eq!(path, tmp.path().join("sdk-spec.json"));
        assert_eq!(load_local_spec_at(tmp.path(), "sdk").unwrap(), written);
    }
}
