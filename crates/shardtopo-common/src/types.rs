//! Core type definitions for shardtopo
//!
//! This module defines the identifiers and small value types shared by the
//! store adapters and the topology server: record versions, name validation,
//! tablet types and shard key ranges.

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length of a keyspace or shard name, in bytes
pub const MAX_NAME_LEN: usize = 64;

/// Opaque record version handed out by the store on every read and write.
///
/// Updates must present the version they read; the store rejects the write
/// if the record moved on in the meantime.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, From, Into,
)]
#[display("{_0}")]
pub struct Version(u64);

impl Version {
    /// Create a version from its raw counter value
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw counter value
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({})", self.0)
    }
}

/// Errors that can occur when validating a keyspace or shard name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("empty name")]
    Empty,
    #[error("name {name} length {len} is higher than {max}")]
    TooLong { name: String, len: usize, max: usize },
    #[error("invalid character {ch:?} in name {name:?}")]
    InvalidChar { name: String, ch: char },
    #[error("name {0:?} is reserved")]
    Reserved(String),
    #[error("invalid key range in shard name {name:?}: {reason}")]
    InvalidKeyRange { name: String, reason: String },
}

/// Validate a name used as a path component in the store
pub fn validate_object_name(name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if name.len() > MAX_NAME_LEN {
        return Err(NameError::TooLong {
            name: name.to_string(),
            len: name.len(),
            max: MAX_NAME_LEN,
        });
    }
    if name == "." || name == ".." {
        return Err(NameError::Reserved(name.to_string()));
    }
    if let Some(ch) = name.chars().find(|c| *c == '/' || c.is_control()) {
        return Err(NameError::InvalidChar {
            name: name.to_string(),
            ch,
        });
    }
    Ok(())
}

/// Validate a keyspace name
pub fn validate_keyspace_name(name: &str) -> Result<(), NameError> {
    validate_object_name(name)
}

/// Validate a shard name, returning its key range when it denotes one.
///
/// Names containing `-` are key ranges (`-80`, `40-80`, `80-`, `-`); any other
/// valid object name is a custom shard identifier with no key range.
pub fn validate_shard_name(name: &str) -> Result<Option<KeyRange>, NameError> {
    validate_object_name(name)?;
    if !name.contains('-') {
        return Ok(None);
    }
    KeyRange::parse_shard_name(name).map(Some)
}

/// Role of a tablet, used to scope served-from delegation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TabletType {
    Unknown,
    Primary,
    Replica,
    Rdonly,
    Spare,
    Experimental,
    Backup,
    Restore,
    Drained,
}

impl TabletType {
    /// Upper-case wire name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Primary => "PRIMARY",
            Self::Replica => "REPLICA",
            Self::Rdonly => "RDONLY",
            Self::Spare => "SPARE",
            Self::Experimental => "EXPERIMENTAL",
            Self::Backup => "BACKUP",
            Self::Restore => "RESTORE",
            Self::Drained => "DRAINED",
        }
    }

    /// Check if this is the primary role
    #[must_use]
    pub const fn is_primary(&self) -> bool {
        matches!(self, Self::Primary)
    }
}

impl fmt::Display for TabletType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TabletType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "UNKNOWN" => Ok(Self::Unknown),
            // legacy name
            "PRIMARY" | "MASTER" => Ok(Self::Primary),
            "REPLICA" => Ok(Self::Replica),
            "RDONLY" | "BATCH" => Ok(Self::Rdonly),
            "SPARE" => Ok(Self::Spare),
            "EXPERIMENTAL" => Ok(Self::Experimental),
            "BACKUP" => Ok(Self::Backup),
            "RESTORE" => Ok(Self::Restore),
            "DRAINED" => Ok(Self::Drained),
            other => Err(format!("unknown tablet type: {other}")),
        }
    }
}

/// Half-open range of keyspace ids `[start, end)` covered by a shard.
///
/// An empty `start` is the lowest key, an empty `end` is past the highest.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyRange {
    pub start: Vec<u8>,
    pub end: Vec<u8>,
}

impl KeyRange {
    /// The range covering every key
    #[must_use]
    pub const fn full() -> Self {
        Self {
            start: Vec::new(),
            end: Vec::new(),
        }
    }

    /// Parse a `"<hex>-<hex>"` shard name
    pub fn parse_shard_name(name: &str) -> Result<Self, NameError> {
        let invalid = |reason: &str| NameError::InvalidKeyRange {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        let (start, end) = name
            .split_once('-')
            .ok_or_else(|| invalid("missing '-' separator"))?;
        if end.contains('-') {
            return Err(invalid("more than one '-' separator"));
        }
        let start = hex::decode(start).map_err(|e| invalid(&format!("start: {e}")))?;
        let end = hex::decode(end).map_err(|e| invalid(&format!("end: {e}")))?;
        if !start.is_empty() && !end.is_empty() && start >= end {
            return Err(invalid("start must be lower than end"));
        }
        Ok(Self { start, end })
    }

    /// Check if two ranges share at least one key
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        let below_self_end = self.end.is_empty() || other.start < self.end;
        let below_other_end = other.end.is_empty() || self.start < other.end;
        below_self_end && below_other_end
    }
}

impl fmt::Display for KeyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", hex::encode(&self.start), hex::encode(&self.end))
    }
}

/// Identity of a tablet: the cell it runs in plus a per-cell uid
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TabletAlias {
    pub cell: String,
    pub uid: u32,
}

impl fmt::Display for TabletAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:010}", self.cell, self.uid)
    }
}
