//! Persistent versioned store backed by redb.
//!
//! Every record lives in one table keyed by its full path. Each mutation runs
//! in a single write transaction that checks the expected version, bumps the
//! shared version counter and writes the record, so the check-and-set is
//! atomic. Directory listings scan only the key range under the directory.

use crate::conn::{Conn, child_names};
use crate::tables;
use async_trait::async_trait;
use redb::{Database, ReadableTable, WriteTransaction};
use serde::{Deserialize, Serialize};
use shardtopo_common::{Error, Result, Version};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Error type for redb-level failures
#[derive(Debug, thiserror::Error)]
pub enum RedbError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::DatabaseError),
    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("redb transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Topo(#[from] Error),
}

impl From<redb::TransactionError> for RedbError {
    fn from(e: redb::TransactionError) -> Self {
        Self::Transaction(Box::new(e))
    }
}

impl From<RedbError> for Error {
    fn from(e: RedbError) -> Self {
        match e {
            RedbError::Topo(e) => e,
            RedbError::Bincode(e) => Self::Serialization(e.to_string()),
            other => Self::Storage(other.to_string()),
        }
    }
}

type RedbResult<T> = std::result::Result<T, RedbError>;

/// On-disk shape of a record
#[derive(Debug, Serialize, Deserialize)]
struct StoredNode {
    version: u64,
    contents: Vec<u8>,
}

impl StoredNode {
    fn decode(path: &str, bytes: &[u8]) -> RedbResult<Self> {
        bincode::deserialize(bytes).map_err(|e| {
            RedbError::Topo(Error::Corrupt {
                path: path.to_string(),
                reason: e.to_string(),
            })
        })
    }
}

/// Versioned store persisted in a redb database
#[derive(Clone)]
pub struct RedbConn {
    db: Arc<Database>,
}

impl RedbConn {
    /// Open (or create) the redb database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::open_inner(path.as_ref())?)
    }

    /// Create an ephemeral in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(RedbError::from)?;
        let conn = Self { db: Arc::new(db) };
        conn.ensure_tables()?;
        Ok(conn)
    }

    fn open_inner(path: &Path) -> RedbResult<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;
        let conn = Self { db: Arc::new(db) };
        conn.ensure_tables()?;
        debug!(?path, "topology store opened");
        Ok(conn)
    }

    // Create all tables eagerly so later read txns don't fail
    fn ensure_tables(&self) -> RedbResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let _t = write_txn.open_table(tables::NODES)?;
            let _t = write_txn.open_table(tables::COUNTERS)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn next_version(txn: &WriteTransaction) -> RedbResult<u64> {
        let mut counters = txn.open_table(tables::COUNTERS)?;
        let next = counters
            .get(tables::VERSION_COUNTER)?
            .map_or(0, |v| v.value())
            + 1;
        counters.insert(tables::VERSION_COUNTER, next)?;
        Ok(next)
    }

    fn read_node(txn: &WriteTransaction, path: &str) -> RedbResult<Option<StoredNode>> {
        let nodes = txn.open_table(tables::NODES)?;
        let node = match nodes.get(path)? {
            Some(guard) => Some(StoredNode::decode(path, guard.value())?),
            None => None,
        };
        Ok(node)
    }

    fn write_node(txn: &WriteTransaction, path: &str, contents: &[u8]) -> RedbResult<Version> {
        let version = Self::next_version(txn)?;
        let bytes = bincode::serialize(&StoredNode {
            version,
            contents: contents.to_vec(),
        })?;
        let mut nodes = txn.open_table(tables::NODES)?;
        nodes.insert(path, bytes.as_slice())?;
        Ok(Version::new(version))
    }

    fn create_sync(&self, path: &str, contents: &[u8]) -> RedbResult<Version> {
        let write_txn = self.db.begin_write()?;
        if Self::read_node(&write_txn, path)?.is_some() {
            return Err(Error::AlreadyExists(path.to_string()).into());
        }
        let version = Self::write_node(&write_txn, path, contents)?;
        write_txn.commit()?;
        Ok(version)
    }

    fn get_sync(&self, path: &str) -> RedbResult<(Vec<u8>, Version)> {
        let read_txn = self.db.begin_read()?;
        let nodes = read_txn.open_table(tables::NODES)?;
        let guard = nodes
            .get(path)?
            .ok_or_else(|| Error::NotFound(path.to_string()))?;
        let node = StoredNode::decode(path, guard.value())?;
        Ok((node.contents, Version::new(node.version)))
    }

    fn update_sync(
        &self,
        path: &str,
        contents: &[u8],
        expected: Option<Version>,
    ) -> RedbResult<Version> {
        let write_txn = self.db.begin_write()?;
        let current = Self::read_node(&write_txn, path)?;
        match (current, expected) {
            (Some(node), Some(expected)) if node.version != expected.as_u64() => {
                return Err(Error::Conflict {
                    path: path.to_string(),
                    expected,
                }
                .into());
            }
            (None, Some(_)) => return Err(Error::NotFound(path.to_string()).into()),
            _ => {}
        }
        let version = Self::write_node(&write_txn, path, contents)?;
        write_txn.commit()?;
        Ok(version)
    }

    fn delete_sync(&self, path: &str, expected: Option<Version>) -> RedbResult<()> {
        let write_txn = self.db.begin_write()?;
        let node = Self::read_node(&write_txn, path)?
            .ok_or_else(|| Error::NotFound(path.to_string()))?;
        if let Some(expected) = expected
            && node.version != expected.as_u64()
        {
            return Err(Error::Conflict {
                path: path.to_string(),
                expected,
            }
            .into());
        }
        {
            let mut nodes = write_txn.open_table(tables::NODES)?;
            nodes.remove(path)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn list_dir_sync(&self, path: &str) -> RedbResult<Vec<String>> {
        let read_txn = self.db.begin_read()?;
        let nodes = read_txn.open_table(tables::NODES)?;
        let dir = path.trim_end_matches('/');
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{dir}/")
        };

        // keys are ordered, so everything under the directory is one contiguous range
        let mut keys = Vec::new();
        for entry in nodes.range(prefix.as_str()..)? {
            let (key, _) = entry?;
            let key = key.value();
            if !key.starts_with(prefix.as_str()) {
                break;
            }
            keys.push(key.to_string());
        }
        let children = child_names(keys.iter().map(String::as_str), dir);
        if children.is_empty() {
            return Err(Error::NotFound(path.to_string()).into());
        }
        Ok(children)
    }
}

#[async_trait]
impl Conn for RedbConn {
    async fn create(&self, path: &str, contents: &[u8]) -> Result<Version> {
        Ok(self.create_sync(path, contents)?)
    }

    async fn get(&self, path: &str) -> Result<(Vec<u8>, Version)> {
        Ok(self.get_sync(path)?)
    }

    async fn update(
        &self,
        path: &str,
        contents: &[u8],
        version: Option<Version>,
    ) -> Result<Version> {
        Ok(self.update_sync(path, contents, version)?)
    }

    async fn delete(&self, path: &str, version: Option<Version>) -> Result<()> {
        Ok(self.delete_sync(path, version)?)
    }

    async fn list_dir(&self, path: &str) -> Result<Vec<String>> {
        Ok(self.list_dir_sync(path)?)
    }
}
