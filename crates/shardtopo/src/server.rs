//! Topology server handle
//!
//! A [`TopoServer`] bundles the store connection, the lock manager, the event
//! sink and the configuration. It is cheap to clone and safe to share between
//! tasks; the record operations live in the `keyspace`, `shard` and `vschema`
//! modules as further `impl TopoServer` blocks.

use crate::events::{EventSink, KeyspaceChange, NoopSink};
use crate::paths;
use shardtopo_common::{Error, Result, TopoConfig};
use shardtopo_store::{Conn, LockGuard, Locker, MemoryConn, MemoryLocker};
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Entry point for reading and mutating keyspace and shard records
#[derive(Clone)]
pub struct TopoServer {
    conn: Arc<dyn Conn>,
    locker: Arc<dyn Locker>,
    events: Arc<dyn EventSink>,
    config: TopoConfig,
}

impl TopoServer {
    /// Create a server over the given store and lock manager
    pub fn new(conn: Arc<dyn Conn>, locker: Arc<dyn Locker>, config: TopoConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            conn,
            locker,
            events: Arc::new(NoopSink),
            config,
        })
    }

    /// Create a server over an empty in-memory store with default settings
    #[must_use]
    pub fn in_memory() -> Self {
        let config = TopoConfig::default();
        Self {
            conn: Arc::new(MemoryConn::new()),
            locker: Arc::new(MemoryLocker::new(config.lock_timeout())),
            events: Arc::new(NoopSink),
            config,
        }
    }

    /// Report committed keyspace changes to `events`
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &TopoConfig {
        &self.config
    }

    /// Underlying store connection
    #[must_use]
    pub fn conn(&self) -> &Arc<dyn Conn> {
        &self.conn
    }

    /// Acquire the exclusive lock on a keyspace.
    ///
    /// The guard must be passed to every mutation made under the lock and
    /// releases the lock when dropped.
    pub async fn lock_keyspace(&self, keyspace: &str, action: &str) -> Result<LockGuard> {
        shardtopo_common::validate_keyspace_name(keyspace)?;
        let resource = paths::keyspace_dir(&self.config.root, keyspace);
        let guard = self.locker.lock(&resource, action).await?;
        debug!(keyspace, action, "keyspace locked");
        Ok(guard)
    }

    /// Check that `guard` is a live lock on `keyspace`
    pub fn check_keyspace_locked(&self, guard: &LockGuard, keyspace: &str) -> Result<()> {
        let resource = paths::keyspace_dir(&self.config.root, keyspace);
        if guard.resource() != resource {
            return Err(Error::NotLocked {
                resource,
                reason: format!("guard is for {}", guard.resource()),
            });
        }
        self.locker.check(guard)
    }

    /// Check if anyone holds the lock on `keyspace`
    #[must_use]
    pub fn is_keyspace_locked(&self, keyspace: &str) -> bool {
        self.locker
            .is_locked(&paths::keyspace_dir(&self.config.root, keyspace))
    }

    /// Run a store call under the configured call timeout
    pub(crate) async fn bounded<T, F>(&self, what: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.config.call_timeout(), fut)
            .await
            .unwrap_or_else(|_| {
                Err(Error::Timeout(format!(
                    "{what} after {}ms",
                    self.config.call_timeout_ms
                )))
            })
    }

    pub(crate) fn dispatch(&self, event: &KeyspaceChange) {
        self.events.dispatch(event);
    }

    pub(crate) fn root(&self) -> &str {
        &self.config.root
    }
}
