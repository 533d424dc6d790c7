//! Shared JSON read / atomic write helpers.

use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{io_err, ConfigError};

/// Read and parse a JSON document, attaching the path to parse errors.
pub fn read<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Write pretty JSON (with a trailing newline) atomically.
///
/// Write flow: serialize → `<file>.tmp` sibling → `rename`. The `.tmp` lives
/// in the same directory as the target so the rename never crosses devices.
pub fn write_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }
    }

    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!("{file_name}.tmp"));
    std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}
