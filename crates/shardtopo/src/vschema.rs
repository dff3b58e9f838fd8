//! Routing-schema records
//!
//! The routing schema of a keyspace is stored next to the keyspace record as
//! opaque bytes; this crate never interprets it.

use crate::paths;
use crate::server::TopoServer;
use shardtopo_common::{Result, ResultExt, validate_keyspace_name};
use tracing::debug;

impl TopoServer {
    /// Store the routing schema of a keyspace, replacing any previous one
    pub async fn save_vschema(&self, keyspace: &str, vschema: &[u8]) -> Result<()> {
        validate_keyspace_name(keyspace)?;
        let path = paths::vschema_file(self.root(), keyspace);
        let version = self
            .bounded(&path, self.conn().update(&path, vschema, None))
            .await
            .with_context(|| format!("SaveVSchema({keyspace})"))?;
        debug!(keyspace, %version, "vschema saved");
        Ok(())
    }

    pub async fn get_vschema(&self, keyspace: &str) -> Result<Vec<u8>> {
        validate_keyspace_name(keyspace)?;
        let path = paths::vschema_file(self.root(), keyspace);
        let (data, _) = self
            .bounded(&path, self.conn().get(&path))
            .await
            .with_context(|| format!("GetVSchema({keyspace})"))?;
        Ok(data)
    }

    pub async fn delete_vschema(&self, keyspace: &str) -> Result<()> {
        validate_keyspace_name(keyspace)?;
        let path = paths::vschema_file(self.root(), keyspace);
        self.bounded(&path, self.conn().delete(&path, None))
            .await
            .with_context(|| format!("DeleteVSchema({keyspace})"))
    }
}
