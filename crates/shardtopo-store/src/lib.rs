//! shardtopo Store - versioned key-value adapters and lock manager
//!
//! This crate defines the contract the topology server expects from its
//! backing store ([`Conn`]) and from its lock manager ([`Locker`]), and ships
//! two store backends: an in-process map for tests and embedded use, and a
//! persistent redb database.

pub mod conn;
pub mod lock;
pub mod memory;
pub mod redb_conn;
pub mod tables;

// Re-exports
pub use conn::Conn;
pub use lock::{LockGuard, LockRelease, Locker, MemoryLocker};
pub use memory::MemoryConn;
pub use redb_conn::RedbConn;
