//! Redb table definitions for the persistent topology store.

use redb::TableDefinition;

// Key: full record path (e.g. "global/keyspaces/ks/Keyspace"), Value: bincode-encoded StoredNode
pub const NODES: TableDefinition<&str, &[u8]> = TableDefinition::new("topo_nodes");

// Key: counter name, Value: last value handed out
pub const COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("counters");

/// Counter backing record versions
pub const VERSION_COUNTER: &str = "version";
