//! Process-wide registry of transient directories
//!
//! Backends may unpack templates into scratch directories. Each one is
//! registered here the moment preparation sees it, so it is removed at exit
//! even if its template is never released. Binaries keep an [`ExitGuard`]
//! alive for the duration of `main` to run that final purge.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use once_cell::sync::Lazy;

static REGISTERED: Lazy<Mutex<HashSet<PathBuf>>> = Lazy::new(|| Mutex::new(HashSet::new()));

fn registry() -> MutexGuard<'static, HashSet<PathBuf>> {
    // A panic while holding the lock leaves the set itself intact
    REGISTERED.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Arm exit-time deletion for `path`
pub fn register(path: &Path) {
    registry().insert(path.to_path_buf());
}

/// Disarm exit-time deletion for `path`
pub fn unregister(path: &Path) -> bool {
    registry().remove(path)
}

/// Whether `path` is currently scheduled for exit-time deletion
pub fn is_registered(path: &Path) -> bool {
    registry().contains(path)
}

/// Remove a directory tree (or a single file).
///
/// A path that no longer exists counts as deleted.
pub fn force_delete(path: &Path) -> io::Result<()> {
    let result = match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(e) => Err(e),
    };
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Delete every registered path and clear the registry.
///
/// Failures are logged and skipped. Returns the number of paths removed.
pub fn purge() -> usize {
    let paths: Vec<PathBuf> = registry().drain().collect();
    let mut removed = 0;
    for path in paths {
        match force_delete(&path) {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!("Failed to delete scratch directory {}: {}", path.display(), e),
        }
    }
    if removed > 0 {
        tracing::debug!("Purged {} scratch directories at exit", removed);
    }
    removed
}

/// Purges the registry when dropped.
///
/// Hold one for the lifetime of `main`:
///
/// ```rust
/// let _guard = stencil_prep::scratch::exit_guard();
/// // ... prepare and render templates ...
/// ```
#[must_use = "the registry is purged when the guard is dropped"]
#[derive(Debug)]
pub struct ExitGuard {
    _private: (),
}

/// Create the guard that runs the exit-time purge
pub fn exit_guard() -> ExitGuard {
    ExitGuard { _private: () }
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        purge();
    }
}
