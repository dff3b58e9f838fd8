//! Shard records and shard discovery
//!
//! Discovery reads every shard record of a keyspace. Fetches run with a
//! caller-chosen concurrency bound so that keyspaces with many shards do not
//! overwhelm the store, and a shard deleted between the listing and its read
//! is skipped. Any other failure aborts the whole call and cancels the fetches
//! still in flight.

use crate::paths;
use crate::records::{self, Shard};
use crate::server::TopoServer;
use futures::stream::{self, StreamExt};
use shardtopo_common::{
    Error, KeyRange, Result, ResultExt, Version, validate_keyspace_name, validate_shard_name,
};
use shardtopo_store::LockGuard;
use std::collections::BTreeMap;
use std::ops::Deref;
use tracing::{debug, info, warn};

/// A shard record as read from the store, with the version it was read at
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShardInfo {
    keyspace: String,
    shard_name: String,
    version: Version,
    shard: Shard,
}

impl ShardInfo {
    #[must_use]
    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    #[must_use]
    pub fn shard_name(&self) -> &str {
        &self.shard_name
    }

    #[must_use]
    pub const fn version(&self) -> Version {
        self.version
    }

    /// Mutable access to the record; changes are persisted by
    /// [`TopoServer::update_shard`]
    pub fn shard_mut(&mut self) -> &mut Shard {
        &mut self.shard
    }
}

impl Deref for ShardInfo {
    type Target = Shard;

    fn deref(&self) -> &Shard {
        &self.shard
    }
}

/// Options for [`TopoServer::find_all_shards_in_keyspace`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FindAllShardsOptions {
    /// Maximum number of shard reads in flight; `None` or 0 uses the
    /// configured default
    pub concurrency: Option<usize>,
}

impl FindAllShardsOptions {
    #[must_use]
    pub const fn with_concurrency(concurrency: usize) -> Self {
        Self {
            concurrency: Some(concurrency),
        }
    }

    fn resolve(self, default: usize) -> usize {
        match self.concurrency {
            Some(n) if n > 0 => n,
            _ => default.max(1),
        }
    }
}

// Custom-named shards have no key range and overlap everything
fn ranges_overlap(a: Option<&KeyRange>, b: Option<&KeyRange>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.intersects(b),
        _ => true,
    }
}

impl TopoServer {
    /// Create a shard record in an existing keyspace.
    ///
    /// The primary starts out serving unless the new shard overlaps a shard
    /// that already exists. Takes the keyspace lock, so the caller must not
    /// hold it.
    pub async fn create_shard(&self, keyspace: &str, shard_name: &str) -> Result<ShardInfo> {
        validate_keyspace_name(keyspace)?;
        let key_range = validate_shard_name(shard_name)?;

        // held until the record is written so concurrent creates see each other
        let guard = self
            .lock_keyspace(keyspace, &format!("CreateShard({shard_name})"))
            .await
            .with_context(|| format!("CreateShard({keyspace}, {shard_name})"))?;

        let existing = self
            .find_all_shards_in_keyspace(keyspace, FindAllShardsOptions::default())
            .await
            .with_context(|| format!("CreateShard({keyspace}, {shard_name})"))?;
        let overlapping = existing
            .values()
            .find(|si| ranges_overlap(si.key_range.as_ref(), key_range.as_ref()));
        if let Some(si) = overlapping {
            debug!(keyspace, shard = shard_name, overlaps = si.shard_name(), "new shard not serving");
        }

        let shard = Shard {
            key_range,
            is_primary_serving: overlapping.is_none(),
            ..Shard::default()
        };
        let path = paths::shard_file(self.root(), keyspace, shard_name);
        let data = records::encode(&path, &shard)?;
        let version = self
            .bounded(&path, self.conn().create(&path, &data))
            .await
            .with_context(|| format!("CreateShard({keyspace}, {shard_name})"))?;
        drop(guard);

        info!(keyspace, shard = shard_name, serving = shard.is_primary_serving, "shard created");
        Ok(ShardInfo {
            keyspace: keyspace.to_string(),
            shard_name: shard_name.to_string(),
            version,
            shard,
        })
    }

    /// Read a shard record
    pub async fn get_shard(&self, keyspace: &str, shard_name: &str) -> Result<ShardInfo> {
        validate_keyspace_name(keyspace)?;
        validate_shard_name(shard_name)?;
        let path = paths::shard_file(self.root(), keyspace, shard_name);
        let (data, version) = self.bounded(&path, self.conn().get(&path)).await?;
        let shard = records::decode(&path, &data)?;
        Ok(ShardInfo {
            keyspace: keyspace.to_string(),
            shard_name: shard_name.to_string(),
            version,
            shard,
        })
    }

    /// Write back a shard record read earlier.
    ///
    /// `guard` must be the live lock on the shard's keyspace.
    pub async fn update_shard(&self, guard: &LockGuard, info: &mut ShardInfo) -> Result<()> {
        self.check_keyspace_locked(guard, &info.keyspace)?;

        let path = paths::shard_file(self.root(), &info.keyspace, &info.shard_name);
        let data = records::encode(&path, &info.shard)?;
        let version = self
            .bounded(&path, self.conn().update(&path, &data, Some(info.version)))
            .await
            .with_context(|| format!("UpdateShard({}, {})", info.keyspace, info.shard_name))?;
        info.version = version;
        Ok(())
    }

    pub async fn delete_shard(&self, keyspace: &str, shard_name: &str) -> Result<()> {
        validate_keyspace_name(keyspace)?;
        validate_shard_name(shard_name)?;
        let path = paths::shard_file(self.root(), keyspace, shard_name);
        self.bounded(&path, self.conn().delete(&path, None))
            .await
            .with_context(|| format!("DeleteShard({keyspace}, {shard_name})"))?;
        info!(keyspace, shard = shard_name, "shard deleted");
        Ok(())
    }

    /// Read every shard of a keyspace, keyed by shard name.
    ///
    /// Shards that vanish between the listing and their read are skipped.
    /// Any other read failure fails the call without a partial result.
    pub async fn find_all_shards_in_keyspace(
        &self,
        keyspace: &str,
        options: FindAllShardsOptions,
    ) -> Result<BTreeMap<String, ShardInfo>> {
        let names = self
            .get_shard_names(keyspace)
            .await
            .with_context(|| format!("failed to get list of shards for keyspace '{keyspace}'"))?;
        let concurrency = options.resolve(self.config().default_shard_concurrency);

        let mut fetches = stream::iter(names)
            .map(|shard_name| async move {
                let res = self.get_shard(keyspace, &shard_name).await;
                (shard_name, res)
            })
            .buffer_unordered(concurrency);

        let mut result = BTreeMap::new();
        while let Some((shard_name, res)) = fetches.next().await {
            match res {
                Ok(si) => {
                    result.insert(shard_name, si);
                }
                Err(e) if e.is_not_found() => {
                    warn!(
                        keyspace,
                        shard = %shard_name,
                        "shard listed but its record is missing, consider checking the topology"
                    );
                }
                Err(e) => {
                    // returning drops the stream, cancelling the reads still in flight
                    return Err(e.wrap(format!("GetShard({keyspace}, {shard_name}) failed")));
                }
            }
        }
        Ok(result)
    }

    /// Shards of a keyspace whose primary is serving, in name order.
    ///
    /// Reads are sequential and any read failure fails the call. A keyspace
    /// with no serving shard is a failed precondition.
    pub async fn get_serving_shards(&self, keyspace: &str) -> Result<Vec<ShardInfo>> {
        let names = self
            .get_shard_names(keyspace)
            .await
            .with_context(|| format!("failed to get list of shards for keyspace '{keyspace}'"))?;

        let mut result = Vec::with_capacity(names.len());
        for shard_name in names {
            let si = self
                .get_shard(keyspace, &shard_name)
                .await
                .with_context(|| format!("GetShard({keyspace}, {shard_name}) failed"))?;
            if si.is_primary_serving {
                result.push(si);
            }
        }
        if result.is_empty() {
            return Err(Error::failed_precondition(format!(
                "{keyspace} has no serving shards"
            )));
        }
        Ok(result)
    }

    /// The single shard of an unsharded keyspace
    pub async fn get_only_shard(&self, keyspace: &str) -> Result<ShardInfo> {
        let mut shards = self
            .find_all_shards_in_keyspace(keyspace, FindAllShardsOptions::default())
            .await?;
        if shards.len() == 1
            && let Some((_, si)) = shards.pop_first()
        {
            return Ok(si);
        }
        let names: Vec<&str> = shards.keys().map(String::as_str).collect();
        Err(Error::invalid_argument(format!(
            "keyspace {keyspace} must have one and only one shard: {names:?}"
        )))
    }
}
