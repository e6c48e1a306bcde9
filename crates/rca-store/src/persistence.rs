//! JSON snapshot files
//!
//! Writes go to a temporary file in the target directory which then
//! replaces the target, so a crash never leaves a half-written snapshot.

use crate::error::{StoreError, StoreResult};
use crate::snapshot::StoreSnapshot;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Atomically write a snapshot to `path`
///
/// # Errors
/// Returns [`StoreError::Io`] or [`StoreError::Json`] on failure; the
/// previous file, if any, is left untouched.
pub fn save_snapshot(path: &Path, snapshot: &StoreSnapshot) -> StoreResult<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut file = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut file, snapshot)?;
    file.write_all(b"\n")?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|err| StoreError::Io(err.error))?;

    tracing::debug!(
        path = %path.display(),
        records = snapshot.record_count(),
        "snapshot saved"
    );
    Ok(())
}

/// Read a snapshot from `path`; `None` when the file does not exist
///
/// # Errors
/// Returns [`StoreError::Io`] on read failure and [`StoreError::Json`] on
/// malformed content.
pub fn load_snapshot(path: &Path) -> StoreResult<Option<StoreSnapshot>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let snapshot = serde_json::from_slice(&bytes)?;
    Ok(Some(snapshot))
}
