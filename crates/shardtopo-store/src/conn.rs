//! Versioned store contract
//!
//! A [`Conn`] is a hierarchical key-value store with linearizable per-path
//! operations. Paths are `/`-separated; a directory exists as long as at
//! least one record lives below it.

use async_trait::async_trait;
use shardtopo_common::{Result, Version};
use std::collections::BTreeSet;

/// Connection to a versioned store.
///
/// Implementations report a missing path as `Error::NotFound`, a create on an
/// occupied path as `Error::AlreadyExists` and a version mismatch as
/// `Error::Conflict`.
#[async_trait]
pub trait Conn: Send + Sync {
    /// Create a record at `path`, failing if one already exists
    async fn create(&self, path: &str, contents: &[u8]) -> Result<Version>;

    /// Read a record and the version it is at
    async fn get(&self, path: &str) -> Result<(Vec<u8>, Version)>;

    /// Replace a record.
    ///
    /// With `Some(version)` the write only succeeds if the record is still at
    /// that version. With `None` the write is unconditional and creates the
    /// record if it is missing.
    async fn update(&self, path: &str, contents: &[u8], version: Option<Version>)
    -> Result<Version>;

    /// Delete a record, optionally only if it is at `version`
    async fn delete(&self, path: &str, version: Option<Version>) -> Result<()>;

    /// Names of the immediate children of a directory, sorted
    async fn list_dir(&self, path: &str) -> Result<Vec<String>>;
}

/// Collect the immediate child names of `dir` from a set of record paths
pub(crate) fn child_names<'a>(paths: impl IntoIterator<Item = &'a str>, dir: &str) -> Vec<String> {
    let dir = dir.trim_end_matches('/');
    let prefix = if dir.is_empty() {
        String::new()
    } else {
        format!("{dir}/")
    };

    let children: BTreeSet<&str> = paths
        .into_iter()
        .filter_map(|path| path.strip_prefix(prefix.as_str()))
        .filter_map(|rest| rest.split('/').next())
        .filter(|child| !child.is_empty())
        .collect();
    children.into_iter().map(str::to_string).collect()
}
