//! Filesystem lock preventing a second concurrent `apply` on the same
//! host (§5). The lock file's content is the owning PID; a stale lock
//! (owner no longer alive) is reclaimed atomically via exclusive-create.

use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use netopt_common::error::{NetoptError, Result};

pub struct TransactionLock {
    path: PathBuf,
}

impl TransactionLock {
    /// Acquire the lock at `path`, reclaiming a stale lock in place if the
    /// recorded PID is no longer alive.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(NetoptError::Io)?;
        }

        match try_create_exclusive(&path) {
            Ok(()) => return Ok(TransactionLock { path }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(NetoptError::Io(e)),
        }

        let owner_pid = read_owner_pid(&path);
        match owner_pid {
            Some(pid) if process_alive(pid) => Err(NetoptError::Locked { pid }),
            _ => {
                // Stale: the recorded owner is gone (or unreadable). Remove
                // and retry exclusive-create once; a racing process that
                // wins the retry correctly takes the lock instead of us.
                let _ = std::fs::remove_file(&path);
                try_create_exclusive(&path).map_err(NetoptError::Io)?;
                Ok(TransactionLock { path })
            }
        }
    }

    pub fn release(self) -> Result<()> {
        std::fs::remove_file(&self.path).map_err(NetoptError::Io)
    }
}

impl Drop for TransactionLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn try_create_exclusive(path: &Path) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    write!(file, "{}", std::process::id())
}

fn read_owner_pid(path: &Path) -> Option<i32> {
    let mut contents = String::new();
    std::fs::File::open(path).ok()?.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}

fn process_alive(pid: i32) -> bool {
    // kill(pid, 0) performs no signal delivery, only existence/permission
    // checks (man 2 kill).
    unsafe { libc::kill(pid, 0) == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_then_release_allows_reacquire() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("netopt.lock");

        let lock = TransactionLock::acquire(&path).unwrap();
        lock.release().unwrap();

        let lock2 = TransactionLock::acquire(&path);
        assert!(lock2.is_ok());
    }

    #[test]
    fn second_acquire_while_held_is_locked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("netopt.lock");

        let _lock = TransactionLock::acquire(&path).unwrap();
        let second = TransactionLock::acquire(&path);
        assert!(matches!(second, Err(NetoptError::Locked { .. })));
    }

    #[test]
    fn stale_lock_with_dead_pid_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("netopt.lock");

        // PID 1 belongs to init in any container this test runs in, so
        // use an implausibly large pid that is very unlikely to be alive
        // rather than assuming a fixed dead pid exists.
        std::fs::write(&path, "999999").unwrap();
        let lock = TransactionLock::acquire(&path);
        assert!(lock.is_ok());
    }

    #[test]
    fn drop_releases_the_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("netopt.lock");
        {
            let _lock = TransactionLock::acquire(&path).unwrap();
        }
        assert!(!path.exists());
    }
}
