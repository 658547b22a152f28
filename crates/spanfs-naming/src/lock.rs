//! Per-node reader/writer locks with explicit release.
//!
//! Tree locks outlive the call that takes them: a client locks a path in
//! one RPC and unlocks it in a later one, so the usual RAII guards do
//! not fit. [`PathLock`] keeps the lock state in a fair semaphore
//! instead: a shared holder takes one permit, an exclusive holder takes
//! all of them, and release returns exactly the permits taken.
//!
//! The semaphore admits waiters in FIFO order, so a queued exclusive
//! acquisition blocks later shared ones and writers cannot starve.

use tokio::sync::Semaphore;

/// Permits held by one exclusive acquisition. Shared acquisitions take a
/// single permit, so up to this many readers may hold the lock at once.
const EXCLUSIVE_PERMITS: u32 = u32::MAX >> 3;

/// An asynchronous reader/writer lock whose acquire and release are
/// separate operations, possibly on different tasks.
pub struct PathLock {
    permits: Semaphore,
}

impl PathLock {
    /// Creates an unlocked lock.
    pub fn new() -> Self {
        PathLock {
            permits: Semaphore::new(EXCLUSIVE_PERMITS as usize),
        }
    }

    /// Acquires the lock, waiting for conflicting holders to release.
    pub async fn acquire(&self, exclusive: bool) {
        let n = if exclusive { EXCLUSIVE_PERMITS } else { 1 };
        self.permits
            .acquire_many(n)
            .await
            .expect("path lock semaphore closed")
            .forget();
    }

    /// Acquires without waiting; true on success.
    pub fn try_acquire(&self, exclusive: bool) -> bool {
        let n = if exclusive { EXCLUSIVE_PERMITS } else { 1 };
        match self.permits.try_acquire_many(n) {
            Ok(permit) => {
                permit.forget();
                true
            }
            Err(_) => false,
        }
    }

    /// Releases a lock previously taken in the same mode.
    ///
    /// The caller must pair this with a matching `acquire`; releasing a
    /// lock that is not held corrupts the permit count.
    pub fn release(&self, exclusive: bool) {
        let n = if exclusive { EXCLUSIVE_PERMITS } else { 1 };
        self.permits.add_permits(n as usize);
    }
}

impl Default for PathLock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_many_shared_holders() {
        let lock = PathLock::new();
        lock.acquire(false).await;
        lock.acquire(false).await;
        lock.acquire(false).await;
        lock.release(false);
        lock.release(false);
        lock.release(false);
        assert!(lock.try_acquire(true));
    }

    #[tokio::test]
    async fn test_exclusive_excludes_shared() {
        let lock = PathLock::new();
        lock.acquire(true).await;
        assert!(!lock.try_acquire(false));
        assert!(!lock.try_acquire(true));
        lock.release(true);
        assert!(lock.try_acquire(false));
    }

    #[tokio::test]
    async fn test_shared_excludes_exclusive() {
        let lock = PathLock::new();
        lock.acquire(false).await;
        assert!(!lock.try_acquire(true));
        lock.release(false);
        assert!(lock.try_acquire(true));
    }

    #[tokio::test]
    async fn test_release_wakes_waiter() {
        let lock = Arc::new(PathLock::new());
        lock.acquire(true).await;

        let waiter = {
            let lock = lock.clone();
            tokio::spawn(async move {
                lock.acquire(false).await;
                lock.release(false);
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());
        lock.release(true);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should be woken")
            .unwrap();
    }

    #[tokio::test]
    async fn test_queued_exclusive_blocks_later_shared() {
        let lock = Arc::new(PathLock::new());
        lock.acquire(false).await;

        let writer = {
            let lock = lock.clone();
            tokio::spawn(async move {
                lock.acquire(true).await;
                lock.release(true);
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        // The writer is queued; a new reader must wait behind it.
        assert!(!lock.try_acquire(false));

        lock.release(false);
        tokio::time::timeout(Duration::from_secs(1), writer)
            .await
            .expect("writer should be woken")
            .unwrap();
    }
}
