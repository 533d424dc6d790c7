//! Zip archive inspection and extraction over the install root.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};
use zip::ZipArchive;

use truck_core::settings::STATE_DIRNAME;

use crate::error::{io_err, SyncError};

fn open(archive_path: &Path) -> Result<ZipArchive<BufReader<File>>, SyncError> {
    let file = File::open(archive_path).map_err(|e| io_err(archive_path, e))?;
    ZipArchive::new(BufReader::new(file)).map_err(|source| SyncError::Archive {
        path: archive_path.to_path_buf(),
        source,
    })
}

fn archive_err(archive_path: &Path) -> impl Fn(zip::result::ZipError) -> SyncError + '_ {
    move |source| SyncError::Archive {
        path: archive_path.to_path_buf(),
        source,
    }
}

/// First normal component of an entry path, unless it is reserved.
fn top_level(path: &Path) -> Option<String> {
    match path.components().next()? {
        Component::Normal(name) => {
            let name = name.to_string_lossy().into_owned();
            (name != STATE_DIRNAME).then_some(name)
        }
        _ => None,
    }
}

/// Distinct top-level entry names of the archive.
///
/// Only top-level names are tracked: nested paths are owned through their
/// top-level ancestor.
pub fn top_level_entries(archive_path: &Path) -> Result<BTreeSet<String>, SyncError> {
    let mut archive = open(archive_path)?;
    let mut names = BTreeSet::new();
    for i in 0..archive.len() {
        let entry = archive.by_index(i).map_err(archive_err(archive_path))?;
        if let Some(name) = entry.enclosed_name().and_then(|p| top_level(&p)) {
            names.insert(name);
        }
    }
    Ok(names)
}

/// Extract every entry of the archive under `dest`, overwriting existing
/// files. Entries that would escape `dest` or land in the engine's state
/// directory are skipped.
pub fn extract_into(archive_path: &Path, dest: &Path) -> Result<usize, SyncError> {
    let mut archive = open(archive_path)?;
    std::fs::create_dir_all(dest).map_err(|e| io_err(dest, e))?;

    let mut written = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(archive_err(archive_path))?;
        let Some(relative) = entry.enclosed_name() else {
            warn!("skipping unsafe archive entry '{}'", entry.name());
            continue;
        };
        let relative = PathBuf::from(relative);
        if top_level(&relative).is_none() {
            warn!("skipping reserved archive entry '{}'", entry.name());
            continue;
        }

        let outpath = dest.join(&relative);
        if entry.is_dir() {
            std::fs::create_dir_all(&outpath).map_err(|e| io_err(&outpath, e))?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        let mut out = File::create(&outpath).map_err(|e| io_err(&outpath, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| io_err(&outpath, e))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode & 0o7777))
                .map_err(|e| io_err(&outpath, e))?;
        }
        written += 1;
    }

    debug!(archive = %archive_path.display(), written, "extracted");
    Ok(written)
}
