//! Keyspace records
//!
//! A keyspace record is created without a lock, mutated only by a caller
//! holding the keyspace lock, and deleted together with its routing schema.
//! Every update carries the version it was read at, so a writer working from
//! a stale copy gets a conflict instead of overwriting someone else's change.

use crate::events::{ChangeStatus, KeyspaceChange};
use crate::paths;
use crate::records::{self, Keyspace, ThrottlerConfig};
use crate::server::TopoServer;
use shardtopo_common::{Result, ResultExt, Version, validate_keyspace_name};
use shardtopo_store::LockGuard;
use std::ops::Deref;
use tracing::{debug, info};

/// A keyspace record as read from the store, with the version it was read at
#[derive(Clone, Debug, PartialEq)]
pub struct KeyspaceInfo {
    pub(crate) name: String,
    pub(crate) version: Version,
    pub(crate) keyspace: Keyspace,
}

impl KeyspaceInfo {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Version the record was read or last written at
    #[must_use]
    pub const fn version(&self) -> Version {
        self.version
    }

    /// Mutable access to the record; changes are persisted by
    /// [`TopoServer::update_keyspace`]
    pub fn keyspace_mut(&mut self) -> &mut Keyspace {
        &mut self.keyspace
    }
}

impl Deref for KeyspaceInfo {
    type Target = Keyspace;

    fn deref(&self) -> &Keyspace {
        &self.keyspace
    }
}

impl TopoServer {
    /// Create a new keyspace record
    pub async fn create_keyspace(&self, name: &str, keyspace: Keyspace) -> Result<()> {
        validate_keyspace_name(name)?;
        let path = paths::keyspace_file(self.root(), name);
        let data = records::encode(&path, &keyspace)?;
        let version = self
            .bounded(&path, self.conn().create(&path, &data))
            .await
            .with_context(|| format!("CreateKeyspace({name})"))?;

        info!(keyspace = name, %version, "keyspace created");
        self.dispatch(&KeyspaceChange {
            keyspace_name: name.to_string(),
            keyspace: Some(keyspace),
            status: ChangeStatus::Created,
        });
        Ok(())
    }

    /// Read a keyspace record
    pub async fn get_keyspace(&self, name: &str) -> Result<KeyspaceInfo> {
        validate_keyspace_name(name)?;
        let path = paths::keyspace_file(self.root(), name);
        let (data, version) = self
            .bounded(&path, self.conn().get(&path))
            .await
            .with_context(|| format!("GetKeyspace({name})"))?;
        let keyspace = records::decode(&path, &data)?;
        Ok(KeyspaceInfo {
            name: name.to_string(),
            version,
            keyspace,
        })
    }

    /// Write back a keyspace record read earlier.
    ///
    /// `guard` must be the live lock on this keyspace. The write only succeeds
    /// if the record is still at the version `info` was read at; on success
    /// `info` moves to the new version.
    pub async fn update_keyspace(&self, guard: &LockGuard, info: &mut KeyspaceInfo) -> Result<()> {
        self.check_keyspace_locked(guard, &info.name)?;

        let path = paths::keyspace_file(self.root(), &info.name);
        let data = records::encode(&path, &info.keyspace)?;
        let version = self
            .bounded(&path, self.conn().update(&path, &data, Some(info.version)))
            .await
            .with_context(|| format!("UpdateKeyspace({})", info.name))?;
        debug!(keyspace = %info.name, from = %info.version, to = %version, "keyspace updated");
        info.version = version;

        self.dispatch(&KeyspaceChange {
            keyspace_name: info.name.clone(),
            keyspace: Some(info.keyspace.clone()),
            status: ChangeStatus::Updated,
        });
        Ok(())
    }

    /// Delete a keyspace record and its routing schema.
    ///
    /// A missing routing schema is not an error. Any other failure deleting
    /// it is returned after the deletion event went out, since the keyspace
    /// record itself is already gone.
    pub async fn delete_keyspace(&self, name: &str) -> Result<()> {
        validate_keyspace_name(name)?;
        let path = paths::keyspace_file(self.root(), name);
        self.bounded(&path, self.conn().delete(&path, None))
            .await
            .with_context(|| format!("DeleteKeyspace({name})"))?;

        let vschema = match self.delete_vschema(name).await {
            Err(e) if e.is_not_found() => Ok(()),
            other => other,
        };

        info!(keyspace = name, "keyspace deleted");
        self.dispatch(&KeyspaceChange {
            keyspace_name: name.to_string(),
            keyspace: None,
            status: ChangeStatus::Deleted,
        });
        vschema
    }

    /// Durability policy of a keyspace, falling back to the configured default
    pub async fn get_keyspace_durability(&self, name: &str) -> Result<String> {
        let info = self.get_keyspace(name).await?;
        if info.durability_policy.is_empty() {
            return Ok(self.config().default_durability_policy.clone());
        }
        Ok(info.keyspace.durability_policy)
    }

    /// Sidecar database name of a keyspace, falling back to the configured default
    pub async fn get_sidecar_db_name(&self, name: &str) -> Result<String> {
        let info = self.get_keyspace(name).await?;
        if info.sidecar_db_name.is_empty() {
            return Ok(self.config().default_sidecar_db_name.clone());
        }
        Ok(info.keyspace.sidecar_db_name)
    }

    pub async fn get_throttler_config(&self, name: &str) -> Result<Option<ThrottlerConfig>> {
        Ok(self.get_keyspace(name).await?.keyspace.throttler_config)
    }

    /// Names of all keyspaces, sorted
    pub async fn get_keyspaces(&self) -> Result<Vec<String>> {
        let dir = paths::keyspaces_dir(self.root());
        match self.bounded(&dir, self.conn().list_dir(&dir)).await {
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            res => res.context("GetKeyspaces"),
        }
    }

    /// Names of the shards of a keyspace, sorted.
    ///
    /// A keyspace without shards has no shard directory; that case yields an
    /// empty list, while a missing keyspace is `NotFound`.
    pub async fn get_shard_names(&self, keyspace: &str) -> Result<Vec<String>> {
        validate_keyspace_name(keyspace)?;
        let dir = paths::shards_dir(self.root(), keyspace);
        match self.bounded(&dir, self.conn().list_dir(&dir)).await {
            Ok(names) => Ok(names),
            Err(e) if e.is_not_found() => match self.get_keyspace(keyspace).await {
                Ok(_) => Ok(Vec::new()),
                Err(ks_err) if ks_err.is_not_found() => Err(e),
                Err(ks_err) => Err(ks_err),
            },
            Err(e) => Err(e),
        }
    }
}
