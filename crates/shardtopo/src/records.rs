//! Stored record types.
//!
//! These types are serialized into the store via bincode. The store treats
//! them as opaque bytes; only this crate interprets them.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shardtopo_common::{Error, KeyRange, Result, TabletAlias, TabletType};

/// Kind of keyspace
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyspaceType {
    #[default]
    Normal,
    /// Point-in-time restore of `base_keyspace`
    Snapshot,
}

/// Traffic of `tablet_type` from `cells` is served by `keyspace` instead.
///
/// An empty cell list means every cell.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServedFrom {
    pub tablet_type: TabletType,
    pub cells: Vec<String>,
    pub keyspace: String,
}

/// Replication-lag throttler settings of a keyspace
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ThrottlerConfig {
    pub enabled: bool,
    pub threshold: f64,
    pub custom_query: String,
    pub check_as_check_self: bool,
}

/// Keyspace record
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Keyspace {
    pub keyspace_type: KeyspaceType,
    pub base_keyspace: String,
    /// Unix seconds, snapshot keyspaces only
    pub snapshot_time: Option<u64>,
    pub served_froms: Vec<ServedFrom>,
    /// Empty means the configured default
    pub durability_policy: String,
    pub throttler_config: Option<ThrottlerConfig>,
    /// Empty means the configured default
    pub sidecar_db_name: String,
}

/// Shard record
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shard {
    pub primary_alias: Option<TabletAlias>,
    /// Unix seconds at which the current primary took over
    pub primary_term_start_time: Option<u64>,
    /// `None` for custom-named shards, which cover every key
    pub key_range: Option<KeyRange>,
    pub is_primary_serving: bool,
}

pub(crate) fn encode<T: Serialize>(path: &str, value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| Error::Serialization(format!("{path}: {e}")))
}

pub(crate) fn decode<T: DeserializeOwned>(path: &str, bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| Error::Corrupt {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardtopo_common::ErrorCode;

    #[test]
    fn test_decode_garbage_is_corrupt() {
        let err = decode::<Keyspace>("global/keyspaces/ks/Keyspace", &[0xff, 0xff, 0xff])
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Corrupt);
        assert!(err.to_string().contains("global/keyspaces/ks/Keyspace"));
    }
}
