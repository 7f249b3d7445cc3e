// Copyright (c) The testpub Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::replace_file;
use crate::errors::AllocateError;
use camino::{Utf8Path, Utf8PathBuf};
use debug_ignore::DebugIgnore;
use std::{
    fs::{File, TryLockError},
    io,
    thread,
    time::{Duration, Instant},
};
use tracing::debug;

pub(super) static LOCK_FILE_NAME: &str = ".lock";
pub(super) static COUNT_FILE_NAME: &str = "count";

const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// The per-identity index counter.
///
/// Each identity directory holds a `count` file with the next index to hand out, guarded by a
/// `.lock` file. Indexes are allocated under an exclusive lock on `.lock`, so concurrent
/// processes writing into the same directory never see the same index twice.
#[derive(Clone, Debug)]
pub struct IndexCounter {
    dir: Utf8PathBuf,
    lock_timeout: Duration,
}

impl IndexCounter {
    /// Creates a counter for the given identity directory.
    ///
    /// Nothing is touched on disk until [`Self::allocate_next`] is called.
    pub fn new(dir: impl Into<Utf8PathBuf>, lock_timeout: Duration) -> Self {
        Self {
            dir: dir.into(),
            lock_timeout,
        }
    }

    /// The identity directory.
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    /// Returns the next index for this directory and persists the increment.
    ///
    /// The first index handed out for a directory is 0.
    pub fn allocate_next(&self) -> Result<u64, AllocateError> {
        std::fs::create_dir_all(&self.dir).map_err(|error| AllocateError::DirCreate {
            path: self.dir.clone(),
            error,
        })?;

        let locked = self.lock_exclusive()?;
        let index = locked.read()?;
        locked.write(index + 1)?;

        debug!("allocated index {index} in `{}`", self.dir);
        Ok(index)
    }

    fn lock_exclusive(&self) -> Result<LockedCounter<'_>, AllocateError> {
        let lock_file_path = self.dir.join(LOCK_FILE_NAME);
        let file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_file_path)
            .map_err(|error| AllocateError::LockOpen {
                path: lock_file_path.clone(),
                error,
            })?;

        acquire_lock_with_retry(&file, &lock_file_path, self.lock_timeout)?;

        Ok(LockedCounter {
            dir: &self.dir,
            locked_file: DebugIgnore(file),
        })
    }
}

/// A counter whose lock is held.
///
/// The lock is released when this is dropped, including on error paths.
#[derive(Debug)]
struct LockedCounter<'a> {
    dir: &'a Utf8Path,
    // Held for RAII lock semantics.
    #[expect(dead_code)]
    locked_file: DebugIgnore<File>,
}

impl LockedCounter<'_> {
    fn read(&self) -> Result<u64, AllocateError> {
        let path = self.dir.join(COUNT_FILE_NAME);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(error) => return Err(AllocateError::CounterRead { path, error }),
        };

        // Treating garbage as 0 would reuse indexes.
        contents
            .trim()
            .parse::<u64>()
            .map_err(|_| AllocateError::CounterParse { path, contents })
    }

    fn write(&self, next: u64) -> Result<(), AllocateError> {
        let path = self.dir.join(COUNT_FILE_NAME);
        replace_file(&path, next.to_string().as_bytes())
            .map_err(|error| AllocateError::CounterWrite { path, error })
    }
}

/// Acquires an exclusive file lock, polling until `timeout` has elapsed.
///
/// The OS releases advisory locks held by processes that exit, so a timeout here means a live
/// process is holding the lock.
fn acquire_lock_with_retry(
    file: &File,
    lock_file_path: &Utf8Path,
    timeout: Duration,
) -> Result<(), AllocateError> {
    let start = Instant::now();
    let mut logged = false;
    loop {
        match file.try_lock() {
            Ok(()) => return Ok(()),
            Err(TryLockError::WouldBlock) => {
                if start.elapsed() >= timeout {
                    return Err(AllocateError::LockTimeout {
                        path: lock_file_path.to_owned(),
                        timeout,
                    });
                }
                if !logged {
                    debug!("waiting for lock `{lock_file_path}`");
                    logged = true;
                }
                thread::sleep(LOCK_RETRY_INTERVAL);
            }
            Err(TryLockError::Error(error)) => {
                // Some other error (e.g., locking not supported on this filesystem).
                return Err(AllocateError::Lock {
                    path: lock_file_path.to_owned(),
                    error,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use pretty_assertions::assert_eq;
    use std::{collections::BTreeSet, sync::Barrier};

    const TIMEOUT: Duration = Duration::from_secs(30);

    fn read_count(dir: &Utf8Path) -> String {
        std::fs::read_to_string(dir.join(COUNT_FILE_NAME)).unwrap()
    }

    #[test]
    fn allocates_from_zero() {
        let temp = Utf8TempDir::new().unwrap();
        let dir = temp.path().join("nested").join("test_a::test_one");
        let counter = IndexCounter::new(&dir, TIMEOUT);

        assert_eq!(counter.allocate_next().unwrap(), 0);
        assert_eq!(read_count(&dir), "1");
        assert_eq!(counter.allocate_next().unwrap(), 1);
        assert_eq!(counter.allocate_next().unwrap(), 2);
        assert_eq!(read_count(&dir), "3");
        assert!(dir.join(LOCK_FILE_NAME).is_file());
    }

    #[test]
    fn resumes_from_existing_count() {
        let temp = Utf8TempDir::new().unwrap();
        std::fs::write(temp.path().join(COUNT_FILE_NAME), "41\n").unwrap();

        let counter = IndexCounter::new(temp.path(), TIMEOUT);
        assert_eq!(counter.allocate_next().unwrap(), 41);
        assert_eq!(read_count(temp.path()), "42");
    }

    #[test]
    fn corrupt_count_is_an_error() {
        let temp = Utf8TempDir::new().unwrap();
        std::fs::write(temp.path().join(COUNT_FILE_NAME), "not a number").unwrap();

        let counter = IndexCounter::new(temp.path(), TIMEOUT);
        let error = counter.allocate_next().unwrap_err();
        assert!(
            matches!(&error, AllocateError::CounterParse { contents, .. } if contents == "not a number"),
            "unexpected error: {error:?}"
        );
        // The counter is left alone.
        assert_eq!(read_count(temp.path()), "not a number");

        // The lock was released despite the error.
        let lock = File::options()
            .write(true)
            .open(temp.path().join(LOCK_FILE_NAME))
            .unwrap();
        lock.try_lock().expect("lock is free after a failed allocation");
    }

    #[test]
    fn lock_timeout() {
        let temp = Utf8TempDir::new().unwrap();
        let counter = IndexCounter::new(temp.path(), Duration::from_millis(250));

        let held = File::options()
            .create(true)
            .truncate(false)
            .write(true)
            .open(temp.path().join(LOCK_FILE_NAME))
            .unwrap();
        held.lock().unwrap();

        let error = counter.allocate_next().unwrap_err();
        assert!(
            matches!(error, AllocateError::LockTimeout { .. }),
            "unexpected error: {error:?}"
        );
        assert!(!temp.path().join(COUNT_FILE_NAME).exists());

        held.unlock().unwrap();
        assert_eq!(counter.allocate_next().unwrap(), 0);
    }

    #[test]
    fn concurrent_allocations_are_unique() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 25;

        let temp = Utf8TempDir::new().unwrap();
        let dir = temp.path().join("group1").join("test_x");
        let barrier = Barrier::new(THREADS);

        let indexes: Vec<u64> = thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    s.spawn(|| {
                        // Each thread gets its own counter and therefore its own lock file
                        // handle, like separate processes would.
                        let counter = IndexCounter::new(&dir, TIMEOUT);
                        barrier.wait();
                        (0..PER_THREAD)
                            .map(|_| counter.allocate_next().unwrap())
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|handle| handle.join().unwrap())
                .collect()
        });

        let total = (THREADS * PER_THREAD) as u64;
        let unique: BTreeSet<_> = indexes.iter().copied().collect();
        assert_eq!(indexes.len() as u64, total, "no allocation was lost");
        assert_eq!(unique, (0..total).collect(), "indexes are exactly 0..{total}");
        assert_eq!(read_count(&dir), total.to_string());
    }
}
