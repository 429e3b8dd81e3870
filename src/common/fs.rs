use std::{fs, path::Path};

use crate::error::{Result, RsmError};

/// Create the directory if it doesn't exist; error if a non-directory exists there.
pub fn ensure_dir_exists(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            return Err(RsmError::Config(format!("Path exists but is not a directory: {}", path.display())));
        }
    } else {
        fs::create_dir_all(path)
            .map_err(|source| RsmError::Io { path: path.to_path_buf(), source })?;
    }
    Ok(())
}

/// Create the parent directory of an output file if needed.
pub fn ensure_parent_exists(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir_exists(parent),
        _ => Ok(()),
    }
}

/// Error unless every path exists and is a regular file.
/// Checked before any table is read so a bad run fails without partial output.
pub fn require_files<P: AsRef<Path>>(paths: &[P]) -> Result<()> {
    for path in paths {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(RsmError::MissingFile(path.to_path_buf()));
        }
    }
    Ok(())
}
