//! Temp-file-plus-atomic-rename persistence, the write pattern every registry file uses.

use crate::error::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;

/// Reads and deserializes a JSON file, treating a missing file as the caller's `default`.
///
/// This is the "a missing file is treated as empty" rule from the on-disk registry layout.
pub fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}

/// Serializes `value` to pretty JSON and writes it to `path` via a temp file in the same
/// directory followed by an atomic rename, so a reader never observes a partially written
/// file.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, value)?;
    use std::io::Write;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
