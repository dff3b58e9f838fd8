//! In-process versioned store
//!
//! Keeps every record in a single ordered map behind a `parking_lot`
//! lock. Versions come from one counter shared by all paths, so a record that
//! is deleted and recreated never reuses a version a caller may still hold.

use crate::conn::{Conn, child_names};
use async_trait::async_trait;
use parking_lot::RwLock;
use shardtopo_common::{Error, Result, Version};
use std::collections::BTreeMap;
use tracing::trace;

#[derive(Clone, Debug)]
struct Node {
    contents: Vec<u8>,
    version: Version,
}

#[derive(Debug, Default)]
struct Inner {
    nodes: BTreeMap<String, Node>,
    last_version: u64,
}

impl Inner {
    fn next_version(&mut self) -> Version {
        self.last_version += 1;
        Version::new(self.last_version)
    }
}

/// Versioned store held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryConn {
    inner: RwLock<Inner>,
}

impl MemoryConn {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently stored
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().nodes.len()
    }

    /// Check if the store holds no records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().nodes.is_empty()
    }
}

#[async_trait]
impl Conn for MemoryConn {
    async fn create(&self, path: &str, contents: &[u8]) -> Result<Version> {
        let mut inner = self.inner.write();
        if inner.nodes.contains_key(path) {
            return Err(Error::AlreadyExists(path.to_string()));
        }
        let version = inner.next_version();
        inner.nodes.insert(
            path.to_string(),
            Node {
                contents: contents.to_vec(),
                version,
            },
        );
        trace!(path, %version, "created node");
        Ok(version)
    }

    async fn get(&self, path: &str) -> Result<(Vec<u8>, Version)> {
        self.inner
            .read()
            .nodes
            .get(path)
            .map(|node| (node.contents.clone(), node.version))
            .ok_or_else(|| Error::NotFound(path.to_string()))
    }

    async fn update(
        &self,
        path: &str,
        contents: &[u8],
        version: Option<Version>,
    ) -> Result<Version> {
        let mut inner = self.inner.write();
        match (inner.nodes.get(path), version) {
            (Some(node), Some(expected)) if node.version != expected => {
                return Err(Error::Conflict {
                    path: path.to_string(),
                    expected,
                });
            }
            (None, Some(_)) => return Err(Error::NotFound(path.to_string())),
            _ => {}
        }
        let new_version = inner.next_version();
        inner.nodes.insert(
            path.to_string(),
            Node {
                contents: contents.to_vec(),
                version: new_version,
            },
        );
        trace!(path, version = %new_version, "updated node");
        Ok(new_version)
    }

    async fn delete(&self, path: &str, version: Option<Version>) -> Result<()> {
        let mut inner = self.inner.write();
        let node = inner
            .nodes
            .get(path)
            .ok_or_else(|| Error::NotFound(path.to_string()))?;
        if let Some(expected) = version
            && node.version != expected
        {
            return Err(Error::Conflict {
                path: path.to_string(),
                expected,
            });
        }
        inner.nodes.remove(path);
        trace!(path, "deleted node");
        Ok(())
    }

    async fn list_dir(&self, path: &str) -> Result<Vec<String>> {
        let inner = self.inner.read();
        let children = child_names(inner.nodes.keys().map(String::as_str), path);
        if children.is_empty() {
            return Err(Error::NotFound(path.to_string()));
        }
        Ok(children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_get() {
        let conn = MemoryConn::new();
        let v1 = conn.create("a/b", b"one").await.unwrap();
        let (data, version) = conn.get("a/b").await.unwrap();
        assert_eq!(data, b"one");
        assert_eq!(version, v1);

        let err = conn.create("a/b", b"two").await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
        assert!(conn.get("a/c").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_update_checks_version() {
        let conn = MemoryConn::new();
        let v1 = conn.create("k", b"one").await.unwrap();
        let v2 = conn.update("k", b"two", Some(v1)).await.unwrap();
        assert_ne!(v1, v2);

        let err = conn.update("k", b"three", Some(v1)).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(conn.get("k").await.unwrap().0, b"two");

        // unconditional write creates missing records
        conn.update("fresh", b"x", None).await.unwrap();
        assert!(conn.update("missing", b"x", Some(v1)).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_versions_not_reused_after_delete() {
        let conn = MemoryConn::new();
        let v1 = conn.create("k", b"one").await.unwrap();
        conn.delete("k", None).await.unwrap();
        let v2 = conn.create("k", b"one").await.unwrap();
        assert_ne!(v1, v2);
        assert!(conn.update("k", b"two", Some(v1)).await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_delete() {
        let conn = MemoryConn::new();
        let v1 = conn.create("k", b"one").await.unwrap();
        let err = conn.delete("k", Some(Version::new(v1.as_u64() + 10))).await.unwrap_err();
        assert!(err.is_conflict());
        conn.delete("k", Some(v1)).await.unwrap();
        assert!(conn.delete("k", None).await.unwrap_err().is_not_found());
        assert!(conn.is_empty());
    }

    #[tokio::test]
    async fn test_list_dir() {
        let conn = MemoryConn::new();
        conn.create("ks/shards/80-/Shard", b"").await.unwrap();
        conn.create("ks/shards/-80/Shard", b"").await.unwrap();
        conn.create("ks/Keyspace", b"").await.unwrap();

        assert_eq!(conn.list_dir("ks/shards").await.unwrap(), vec!["-80", "80-"]);
        assert_eq!(conn.list_dir("ks").await.unwrap(), vec!["Keyspace", "shards"]);
        assert!(conn.list_dir("other").await.unwrap_err().is_not_found());

        conn.delete("ks/shards/-80/Shard", None).await.unwrap();
        conn.delete("ks/shards/80-/Shard", None).await.unwrap();
        assert!(conn.list_dir("ks/shards").await.unwrap_err().is_not_found());
        assert_eq!(conn.len(), 1);
    }
}
