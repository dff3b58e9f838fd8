//! Lock manager contract and in-process implementation
//!
//! Mutations of a keyspace record happen while holding an exclusive lock on
//! the keyspace. A lock is represented by a [`LockGuard`]; the lock is
//! released when the guard is dropped. Writers present their guard so the
//! topology server can assert the lock is still theirs before writing.

use async_trait::async_trait;
use parking_lot::Mutex;
use shardtopo_common::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, warn};

/// Default time to wait for a contended lock
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(45);

/// Something that can release a lock it granted
pub trait LockRelease: Send + Sync {
    /// Release the lock on `resource` if it is still held under `id`
    fn release(&self, resource: &str, id: u64);
}

/// Proof of holding an exclusive lock on a resource.
///
/// Dropping the guard releases the lock.
pub struct LockGuard {
    resource: String,
    action: String,
    id: u64,
    releaser: Arc<dyn LockRelease>,
}

impl LockGuard {
    /// Create a guard for a lock granted by `releaser`
    pub fn new(
        resource: impl Into<String>,
        action: impl Into<String>,
        id: u64,
        releaser: Arc<dyn LockRelease>,
    ) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
            id,
            releaser,
        }
    }

    /// Locked resource path
    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Description of what the holder is doing
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Lock id assigned by the lock manager
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard")
            .field("resource", &self.resource)
            .field("action", &self.action)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.releaser.release(&self.resource, self.id);
    }
}

/// Lock manager
#[async_trait]
pub trait Locker: Send + Sync {
    /// Acquire the exclusive lock on `resource`, waiting while it is held
    async fn lock(&self, resource: &str, action: &str) -> Result<LockGuard>;

    /// Check that `guard` still holds its lock
    fn check(&self, guard: &LockGuard) -> Result<()>;

    /// Check if anyone holds the lock on `resource`
    fn is_locked(&self, resource: &str) -> bool;
}

#[derive(Debug)]
struct Holder {
    id: u64,
    action: String,
}

#[derive(Default)]
struct LockTable {
    held: Mutex<HashMap<String, Holder>>,
    released: Notify,
    next_id: AtomicU64,
}

impl LockRelease for LockTable {
    fn release(&self, resource: &str, id: u64) {
        {
            let mut held = self.held.lock();
            if held.get(resource).is_some_and(|h| h.id == id) {
                held.remove(resource);
                debug!(resource, id, "lock released");
            }
        }
        self.released.notify_waiters();
    }
}

/// Lock manager for callers sharing one process
pub struct MemoryLocker {
    table: Arc<LockTable>,
    timeout: Duration,
}

impl Default for MemoryLocker {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TIMEOUT)
    }
}

impl MemoryLocker {
    /// Create a lock manager whose `lock` calls give up after `timeout`
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            table: Arc::new(LockTable::default()),
            timeout,
        }
    }

    /// Forcibly release a lock regardless of who holds it.
    ///
    /// The previous holder's guard fails [`Locker::check`] from then on.
    pub fn break_lock(&self, resource: &str) -> bool {
        let removed = self.table.held.lock().remove(resource);
        if let Some(holder) = &removed {
            warn!(resource, id = holder.id, action = %holder.action, "lock broken");
        }
        self.table.released.notify_waiters();
        removed.is_some()
    }

    fn try_acquire(&self, resource: &str, action: &str) -> Option<LockGuard> {
        let mut held = self.table.held.lock();
        if held.contains_key(resource) {
            return None;
        }
        let id = self.table.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        held.insert(
            resource.to_string(),
            Holder {
                id,
                action: action.to_string(),
            },
        );
        drop(held);
        debug!(resource, id, action, "lock acquired");
        Some(LockGuard::new(
            resource,
            action,
            id,
            Arc::clone(&self.table) as Arc<dyn LockRelease>,
        ))
    }
}

#[async_trait]
impl Locker for MemoryLocker {
    async fn lock(&self, resource: &str, action: &str) -> Result<LockGuard> {
        let deadline = tokio::time::Instant::now() + self.timeout;
        loop {
            // register for the wakeup before checking, so a release in between is not missed
            let notified = self.table.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(guard) = self.try_acquire(resource, action) {
                return Ok(guard);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                let holder = self
                    .table
                    .held
                    .lock()
                    .get(resource)
                    .map(|h| h.action.clone())
                    .unwrap_or_default();
                return Err(Error::Timeout(format!(
                    "lock on {resource} for {action:?} (held for {holder:?})"
                )));
            }
        }
    }

    fn check(&self, guard: &LockGuard) -> Result<()> {
        match self.table.held.lock().get(guard.resource()) {
            Some(holder) if holder.id == guard.id() => Ok(()),
            Some(_) => Err(Error::NotLocked {
                resource: guard.resource().to_string(),
                reason: "lock is held by another caller".to_string(),
            }),
            None => Err(Error::NotLocked {
                resource: guard.resource().to_string(),
                reason: "lock was released".to_string(),
            }),
        }
    }

    fn is_locked(&self, resource: &str) -> bool {
        self.table.held.lock().contains_key(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardtopo_common::ErrorCode;

    #[tokio::test]
    async fn test_lock_and_release() {
        let locker = MemoryLocker::default();
        let guard = locker.lock("keyspaces/ks", "resharding").await.unwrap();
        assert!(locker.is_locked("keyspaces/ks"));
        assert!(!locker.is_locked("keyspaces/other"));
        assert!(locker.check(&guard).is_ok());
        assert_eq!(guard.action(), "resharding");

        drop(guard);
        assert!(!locker.is_locked("keyspaces/ks"));
    }

    #[tokio::test]
    async fn test_contended_lock_times_out() {
        let locker = MemoryLocker::new(Duration::from_millis(20));
        let _guard = locker.lock("keyspaces/ks", "first").await.unwrap();
        let err = locker.lock("keyspaces/ks", "second").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unavailable);
        assert!(err.to_string().contains("first"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_waiter_gets_lock_after_release() {
        let locker = Arc::new(MemoryLocker::new(Duration::from_secs(5)));
        let guard = locker.lock("keyspaces/ks", "first").await.unwrap();

        let waiter = {
            let locker = Arc::clone(&locker);
            tokio::spawn(async move {
                let guard = locker.lock("keyspaces/ks", "second").await.unwrap();
                guard.id()
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        let first_id = guard.id();
        drop(guard);

        let second_id = waiter.await.unwrap();
        assert_ne!(first_id, second_id);
    }

    #[tokio::test]
    async fn test_broken_lock_fails_check() {
        let locker = MemoryLocker::default();
        let stale = locker.lock("keyspaces/ks", "first").await.unwrap();
        assert!(locker.break_lock("keyspaces/ks"));

        let err = locker.check(&stale).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotLocked);

        let fresh = locker.lock("keyspaces/ks", "second").await.unwrap();
        let err = locker.check(&stale).unwrap_err();
        assert!(err.to_string().contains("another caller"));

        // dropping the stale guard must not release the new holder's lock
        drop(stale);
        assert!(locker.check(&fresh).is_ok());
    }
}
