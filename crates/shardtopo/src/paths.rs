//! Record layout in the store
//!
//! ```text
//! <root>/keyspaces/<keyspace>/Keyspace
//! <root>/keyspaces/<keyspace>/VSchema
//! <root>/keyspaces/<keyspace>/shards/<shard>/Shard
//! ```

pub const KEYSPACES_PATH: &str = "keyspaces";
pub const SHARDS_PATH: &str = "shards";
pub const KEYSPACE_FILE: &str = "Keyspace";
pub const SHARD_FILE: &str = "Shard";
pub const VSCHEMA_FILE: &str = "VSchema";

/// Join path components under `root`, skipping an empty root
#[must_use]
pub fn join(root: &str, parts: &[&str]) -> String {
    let mut path = String::from(root);
    for part in parts {
        if !path.is_empty() {
            path.push('/');
        }
        path.push_str(part);
    }
    path
}

/// Directory holding every keyspace
#[must_use]
pub fn keyspaces_dir(root: &str) -> String {
    join(root, &[KEYSPACES_PATH])
}

/// Directory of one keyspace; also the resource its lock is taken on
#[must_use]
pub fn keyspace_dir(root: &str, keyspace: &str) -> String {
    join(root, &[KEYSPACES_PATH, keyspace])
}

/// Keyspace record
#[must_use]
pub fn keyspace_file(root: &str, keyspace: &str) -> String {
    join(root, &[KEYSPACES_PATH, keyspace, KEYSPACE_FILE])
}

/// Routing-schema record of a keyspace
#[must_use]
pub fn vschema_file(root: &str, keyspace: &str) -> String {
    join(root, &[KEYSPACES_PATH, keyspace, VSCHEMA_FILE])
}

/// Directory holding a keyspace's shards
#[must_use]
pub fn shards_dir(root: &str, keyspace: &str) -> String {
    join(root, &[KEYSPACES_PATH, keyspace, SHARDS_PATH])
}

/// Shard record
#[must_use]
pub fn shard_file(root: &str, keyspace: &str, shard: &str) -> String {
    join(root, &[KEYSPACES_PATH, keyspace, SHARDS_PATH, shard, SHARD_FILE])
}
