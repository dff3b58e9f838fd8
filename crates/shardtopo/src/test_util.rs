//! Store wrapper with scripted failures for discovery tests

use async_trait::async_trait;
use parking_lot::Mutex;
use shardtopo_common::{Error, Result, TopoConfig, Version};
use shardtopo_store::{Conn, MemoryConn, MemoryLocker};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::TopoServer;

/// Failure injected on reads of one path; only `Unavailable` also applies to deletes
#[derive(Clone, Copy, Debug)]
pub(crate) enum Fault {
    /// The record is deleted just before it is read
    VanishBeforeGet,
    /// The store answers with an error
    Unavailable,
    /// The read never completes
    Stall,
}

/// Memory store that fails reads of chosen paths and tracks read concurrency
#[derive(Default)]
pub(crate) struct ScriptedConn {
    inner: MemoryConn,
    faults: Mutex<HashMap<String, Fault>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    get_delay: Duration,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScriptedConn {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Make every read take at least `delay`
    pub(crate) fn with_get_delay(mut self, delay: Duration) -> Self {
        self.get_delay = delay;
        self
    }

    pub(crate) fn inject(&self, path: &str, fault: Fault) {
        self.faults.lock().insert(path.to_string(), fault);
    }

    /// Highest number of reads that were running at once
    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Conn for ScriptedConn {
    async fn create(&self, path: &str, contents: &[u8]) -> Result<Version> {
        self.inner.create(path, contents).await
    }

    async fn get(&self, path: &str) -> Result<(Vec<u8>, Version)> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _in_flight = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.get_delay.is_zero() {
            tokio::time::sleep(self.get_delay).await;
        }
        let fault = self.faults.lock().get(path).copied();
        match fault {
            Some(Fault::VanishBeforeGet) => {
                let _ = self.inner.delete(path, None).await;
            }
            Some(Fault::Unavailable) => {
                return Err(Error::storage(format!("{path}: connection refused")));
            }
            Some(Fault::Stall) => std::future::pending::<()>().await,
            None => {}
        }
        self.inner.get(path).await
    }

    async fn update(
        &self,
        path: &str,
        contents: &[u8],
        version: Option<Version>,
    ) -> Result<Version> {
        self.inner.update(path, contents, version).await
    }

    async fn delete(&self, path: &str, version: Option<Version>) -> Result<()> {
        let fault = self.faults.lock().get(path).copied();
        if matches!(fault, Some(Fault::Unavailable)) {
            return Err(Error::storage(format!("{path}: connection refused")));
        }
        self.inner.delete(path, version).await
    }

    async fn list_dir(&self, path: &str) -> Result<Vec<String>> {
        self.inner.list_dir(path).await
    }
}

/// Topology server over `conn` with default settings
pub(crate) fn server_over(conn: &Arc<ScriptedConn>) -> TopoServer {
    TopoServer::new(
        Arc::clone(conn) as Arc<dyn Conn>,
        Arc::new(MemoryLocker::default()),
        TopoConfig::default(),
    )
    .unwrap()
}
