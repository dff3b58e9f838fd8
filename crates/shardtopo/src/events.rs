//! Keyspace change notifications
//!
//! The topology server reports each committed create/update/delete to an
//! injected [`EventSink`]. Dispatch happens after the store write succeeded and
//! is fire-and-forget: a sink cannot fail or veto the change.

use crate::records::Keyspace;
use parking_lot::Mutex;
use std::fmt;
use tracing::info;

/// What happened to the keyspace
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeStatus {
    Created,
    Updated,
    Deleted,
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        })
    }
}

/// A committed change to a keyspace record
#[derive(Clone, Debug, PartialEq)]
pub struct KeyspaceChange {
    pub keyspace_name: String,
    /// New value; `None` once deleted
    pub keyspace: Option<Keyspace>,
    pub status: ChangeStatus,
}

/// Receiver of keyspace change events
pub trait EventSink: Send + Sync {
    fn dispatch(&self, event: &KeyspaceChange);
}

/// Sink that drops every event
#[derive(Debug, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn dispatch(&self, _event: &KeyspaceChange) {}
}

/// Sink that logs every event
#[derive(Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn dispatch(&self, event: &KeyspaceChange) {
        info!(
            keyspace = %event.keyspace_name,
            status = %event.status,
            "keyspace changed"
        );
    }
}

/// Sink that keeps every event in memory, in dispatch order
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<KeyspaceChange>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far
    #[must_use]
    pub fn events(&self) -> Vec<KeyspaceChange> {
        self.events.lock().clone()
    }

    /// Statuses received so far
    #[must_use]
    pub fn statuses(&self) -> Vec<ChangeStatus> {
        self.events.lock().iter().map(|e| e.status).collect()
    }
}

impl EventSink for RecordingSink {
    fn dispatch(&self, event: &KeyspaceChange) {
        self.events.lock().push(event.clone());
    }
}
