//! shardtopo - keyspace and shard topology records
//!
//! The [`TopoServer`] is the authoritative, versioned record of how each
//! keyspace is split into shards, which shards serve traffic, and which
//! tablet types are temporarily served from another keyspace during a
//! migration. It reads and writes through a [`Conn`] with optimistic
//! concurrency, serialises keyspace mutations through a [`Locker`], and
//! reports every committed change to an [`EventSink`].

pub mod cells;
pub mod events;
pub mod keyspace;
pub mod paths;
pub mod records;
pub mod served_from;
pub mod server;
pub mod shard;
pub mod vschema;

#[cfg(test)]
mod test_util;

// Re-exports
pub use events::{ChangeStatus, EventSink, KeyspaceChange, NoopSink, RecordingSink, TracingSink};
pub use keyspace::KeyspaceInfo;
pub use records::{Keyspace, KeyspaceType, ServedFrom, Shard, ThrottlerConfig};
pub use served_from::CellServedFrom;
pub use server::TopoServer;
pub use shard::{FindAllShardsOptions, ShardInfo};
pub use shardtopo_common::{Error, ErrorCode, Result, TopoConfig, Version};
pub use shardtopo_store::{Conn, LockGuard, Locker, MemoryConn, MemoryLocker, RedbConn};
