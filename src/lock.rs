//! Capture lock.
//!
//! Only one process may capture the microphone for translation at a time.
//! The lock is a small JSON file naming its owner and when it was last
//! refreshed. A crashed owner leaves the file behind, so acquisition treats
//! a lock that has not been refreshed within [`defaults::LOCK_STALE_AFTER`]
//! as abandoned and takes it over instead of failing forever.

use crate::defaults;
use crate::error::{Result, VoxlateError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockInfo {
    /// Human-readable owner identity, e.g. "voxlate-cli".
    owner: String,
    pid: u32,
    /// Last refresh, milliseconds since the unix epoch.
    refreshed_ms: u64,
}

/// Exclusive capture lock, released on drop.
#[derive(Debug)]
pub struct CaptureLock {
    path: PathBuf,
    owner: String,
}

impl CaptureLock {
    /// Default lock location: the user runtime dir, falling back to the
    /// system temp dir.
    pub fn default_path() -> PathBuf {
        dirs::runtime_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("voxlate-capture.lock")
    }

    /// Acquires the lock, taking over stale or unreadable locks.
    ///
    /// Fails with [`VoxlateError::LockHeld`] when another live owner
    /// refreshed the lock recently.
    pub fn acquire(path: impl Into<PathBuf>, owner: &str) -> Result<Self> {
        Self::acquire_with_staleness(path, owner, defaults::LOCK_STALE_AFTER)
    }

    /// Like [`acquire`](Self::acquire) with an explicit staleness window.
    pub fn acquire_with_staleness(
        path: impl Into<PathBuf>,
        owner: &str,
        stale_after: Duration,
    ) -> Result<Self> {
        let path = path.into();

        if let Some(existing) = read_lock(&path) {
            let held_by_us = existing.pid == std::process::id();
            if !held_by_us && !is_stale(&existing, stale_after) {
                return Err(VoxlateError::LockHeld {
                    owner: existing.owner,
                });
            }
            // Stale, unreadable, or our own: take it over.
        }

        let lock = Self {
            path,
            owner: owner.to_string(),
        };
        lock.write_info()?;
        Ok(lock)
    }

    /// Refreshes the lock timestamp so other processes keep seeing it as
    /// live. Call periodically while capturing.
    pub fn refresh(&self) -> Result<()> {
        self.write_info()
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Releases the lock explicitly. Dropping does the same.
    pub fn release(self) {
        drop(self);
    }

    fn write_info(&self) -> Result<()> {
        let info = LockInfo {
            owner: self.owner.clone(),
            pid: std::process::id(),
            refreshed_ms: now_ms(),
        };
        let json = serde_json::to_string(&info).map_err(|e| {
            VoxlateError::Other(format!("failed to encode lock file: {}", e))
        })?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

impl Drop for CaptureLock {
    fn drop(&mut self) {
        // Only remove a lock we still own.
        if let Some(info) = read_lock(&self.path)
            && info.pid == std::process::id()
        {
            let _ = fs::remove_file(&self.path);
        }
    }
}

fn read_lock(path: &Path) -> Option<LockInfo> {
    let contents = fs::read_to_string(path).ok()?;
    serde_json::from_str(&contents).ok()
}

fn is_stale(info: &LockInfo, stale_after: Duration) -> bool {
    let age_ms = now_ms().saturating_sub(info.refreshed_ms);
    age_ms > stale_after.as_millis() as u64
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn lock_path(dir: &TempDir) -> PathBuf {
        dir.path().join("capture.lock")
    }

    #[test]
    fn test_acquire_creates_lock_file() {
        let dir = TempDir::new().unwrap();
        let path = lock_path(&dir);

        let lock = CaptureLock::acquire(&path, "voxlate-test").unwrap();
        assert!(path.exists());
        assert_eq!(lock.owner(), "voxlate-test");
    }

    #[test]
    fn test_release_removes_lock_file() {
        let dir = TempDir::new().unwrap();
        let path = lock_path(&dir);

        let lock = CaptureLock::acquire(&path, "voxlate-test").unwrap();
        lock.release();
        assert!(!path.exists());
    }

    #[test]
    fn test_fresh_lock_by_other_pid_blocks_acquisition() {
        let dir = TempDir::new().unwrap();
        let path = lock_path(&dir);

        // A recently refreshed lock held by a different pid.
        let info = LockInfo {
            owner: "other-instance".to_string(),
            pid: std::process::id() + 1,
            refreshed_ms: now_ms(),
        };
        fs::write(&path, serde_json::to_string(&info).unwrap()).unwrap();

        let err = CaptureLock::acquire(&path, "voxlate-test").unwrap_err();
        match err {
            VoxlateError::LockHeld { owner } => assert_eq!(owner, "other-instance"),
            other => panic!("expected LockHeld, got {:?}", other),
        }
    }

    #[test]
    fn test_stale_lock_is_taken_over() {
        let dir = TempDir::new().unwrap();
        let path = lock_path(&dir);

        let info = LockInfo {
            owner: "crashed-instance".to_string(),
            pid: std::process::id() + 1,
            refreshed_ms: now_ms() - 60_000,
        };
        fs::write(&path, serde_json::to_string(&info).unwrap()).unwrap();

        let lock =
            CaptureLock::acquire_with_staleness(&path, "voxlate-test", Duration::from_secs(30))
                .unwrap();
        assert_eq!(lock.owner(), "voxlate-test");
    }

    #[test]
    fn test_unreadable_lock_is_taken_over() {
        let dir = TempDir::new().unwrap();
        let path = lock_path(&dir);
        fs::write(&path, "garbage").unwrap();

        assert!(CaptureLock::acquire(&path, "voxlate-test").is_ok());
    }

    #[test]
    fn test_own_pid_can_reacquire() {
        let dir = TempDir::new().unwrap();
        let path = lock_path(&dir);

        let first = CaptureLock::acquire(&path, "voxlate-test").unwrap();
        // Same process acquiring again succeeds rather than deadlocking.
        let second = CaptureLock::acquire(&path, "voxlate-test").unwrap();
        drop(second);
        drop(first);
    }

    #[test]
    fn test_refresh_keeps_lock_live() {
        let dir = TempDir::new().unwrap();
        let path = lock_path(&dir);

        let lock = CaptureLock::acquire(&path, "voxlate-test").unwrap();
        lock.refresh().unwrap();

        let info = read_lock(&path).unwrap();
        assert!(now_ms() - info.refreshed_ms < 5_000);
    }
}
