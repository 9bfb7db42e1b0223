//! Advisory cross-process lock for the registry directory.
//!
//! This resolves the cross-process-locking open question from the design notes: a plain
//! lock-file with a pid check, not a real `flock` — an intentionally modest "straightforward
//! addition", not a substitute for one.

use crate::error::{Result, TrebError};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Holds `<dir>/registry.lock` for its lifetime and removes it on drop.
pub struct AdvisoryLock {
    path: PathBuf,
}

impl AdvisoryLock {
    /// Acquires the lock, failing with [`TrebError::RegistryConflict`] if another live process
    /// already holds it.
    pub fn acquire(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join("registry.lock");
        if let Ok(mut existing) = std::fs::File::open(&path) {
            let mut contents = String::new();
            existing.read_to_string(&mut contents).ok();
            if let Ok(pid) = contents.trim().parse::<u32>() {
                if pid_is_alive(pid) {
                    return Err(TrebError::RegistryConflict(format!(
                        "registry directory is locked by process {pid}"
                    )));
                }
            }
        }
        let mut file = std::fs::File::create(&path)?;
        write!(file, "{}", std::process::id())?;
        Ok(Self { path })
    }
}

impl Drop for AdvisoryLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(unix)]
fn pid_is_alive(pid: u32) -> bool {
    // Signal 0 performs no action but still validates that the pid exists and is reachable.
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

#[cfg(not(unix))]
fn pid_is_alive(_pid: u32) -> bool {
    // Conservative default off Unix: assume the recorded holder may still be alive.
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_in_same_process_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let _first = AdvisoryLock::acquire(dir.path()).unwrap();
        let second = AdvisoryLock::acquire(dir.path());
        assert!(matches!(second, Err(TrebError::RegistryConflict(_))));
    }

    #[test]
    fn lock_is_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        {
            let _lock = AdvisoryLock::acquire(dir.path()).unwrap();
        }
        let again = AdvisoryLock::acquire(dir.path());
        assert!(again.is_ok());
    }
}
