// Copyright (c) Meta Platforms, Inc. and affiliates.

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! # Transition lock
//!
//! A named, host wide mutual exclusion used to serialize governor and
//! frequency transitions between cores, threads and processes.
//!
//! The lock is an advisory `flock(2)` on a lock file. Every `TransitionLock`
//! owns its own open file description of that file, so two references
//! exclude each other whether they live in the same process or not. Dropping
//! a reference only closes it: the lock file is never removed, which keeps
//! the name valid for every other holder.

use crate::error::DvfsError;
use crate::error::Result;
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::path::PathBuf;

#[derive(Debug)]
pub struct TransitionLock {
    file: File,
    path: PathBuf,
}

impl TransitionLock {
    /// Open a new reference to the lock named by `path`, creating the lock
    /// file if needed.
    pub fn open(path: &Path) -> Result<TransitionLock> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| DvfsError::file(path, e))?;

        Ok(TransitionLock {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until the lock is held. It is released when the guard drops.
    pub fn acquire(&self) -> Result<TransitionGuard<'_>> {
        loop {
            let ret = unsafe { libc::flock(self.file.as_raw_fd(), libc::LOCK_EX) };
            if ret == 0 {
                return Ok(TransitionGuard { lock: self });
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(DvfsError::Serialization(err));
            }
        }
    }

    fn release(&self) -> Result<()> {
        let ret = unsafe { libc::flock(self.file.as_raw_fd(), libc::LOCK_UN) };
        if ret < 0 {
            return Err(DvfsError::Serialization(io::Error::last_os_error()));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct TransitionGuard<'a> {
    lock: &'a TransitionLock,
}

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.lock.release() {
            log::warn!("Failed to release {:?} ({})", self.lock.path, e);
        }
    }
}

/// Run `f` with `lock` held, or directly when there is no lock.
pub(crate) fn serialized<T>(
    lock: Option<&TransitionLock>,
    f: impl FnOnce() -> Result<T>,
) -> Result<T> {
    let _guard = match lock {
        Some(lock) => Some(lock.acquire()?),
        None => None,
    };
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::Barrier;
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;
    use std::time::Instant;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_lock_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("dvfs.lock");
        let lock = TransitionLock::open(&path).unwrap();
        assert!(path.exists());
        drop(lock);
        assert!(path.exists());
    }

    #[test]
    fn test_open_failure() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("missing/dvfs.lock");
        assert!(TransitionLock::open(&path).is_err());
    }

    #[test]
    fn test_released_on_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("dvfs.lock");
        let a = TransitionLock::open(&path).unwrap();
        let b = TransitionLock::open(&path).unwrap();

        let res: Result<()> = serialized(Some(&a), || {
            Err(DvfsError::InvalidArgument("boom".to_string()))
        });
        assert!(res.is_err());

        // Would block forever if the failed section kept the lock.
        serialized(Some(&b), || Ok(())).unwrap();
    }

    #[test]
    fn test_mutual_exclusion() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("dvfs.lock");
        let intervals = Arc::new(Mutex::new(Vec::new()));
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let path = path.clone();
                let intervals = intervals.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    let lock = TransitionLock::open(&path).unwrap();
                    barrier.wait();
                    for _ in 0..5 {
                        serialized(Some(&lock), || {
                            let start = Instant::now();
                            thread::sleep(Duration::from_millis(5));
                            intervals.lock().unwrap().push((start, Instant::now()));
                            Ok(())
                        })
                        .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut intervals = intervals.lock().unwrap().clone();
        assert_eq!(intervals.len(), 10);
        intervals.sort();
        for pair in intervals.windows(2) {
            assert!(pair[0].1 <= pair[1].0, "overlapping critical sections");
        }
    }
}
