//! File helpers shared by every writer in the crate.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;

use crate::error::Result;

type LockTable<T> = Mutex<HashMap<PathBuf, Arc<T>>>;

static PATH_LOCKS: LazyLock<LockTable<Mutex<()>>> = LazyLock::new(Default::default);

/// Key under which a path's process-wide lock is registered.
pub fn lock_key(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Look up (or register) the entry for `path` in `table`.
pub fn registered<T: Default>(table: &LockTable<T>, path: &Path) -> Arc<T> {
    table.lock().entry(lock_key(path)).or_default().clone()
}

/// Process-wide mutex for read-modify-write cycles on `path`.
///
/// Every caller naming the same file gets the same mutex, whichever handle
/// it goes through.
pub fn path_lock(path: &Path) -> Arc<Mutex<()>> {
    registered(&PATH_LOCKS, path)
}

/// Create the parent directory of `path` if it has one.
pub fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)?,
        _ => {}
    }
    Ok(())
}

/// Sibling temp path used while a file is being written.
///
/// Each call returns a fresh name, so concurrent writers never share one.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
    path.with_file_name(name)
}

/// Write `bytes` to `path` through a temp file and a rename.
///
/// Readers either see the previous contents or the new ones, never a
/// partially written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    ensure_parent(path)?;
    let tmp = temp_path(path);
    {
        let mut output = File::create(&tmp)?;
        output.write_all(bytes)?;
        output.sync_all()?;
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

/// Serialize `value` as pretty JSON and write it atomically.
pub fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &bytes)
}
