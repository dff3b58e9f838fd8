//! Served-from migration bookkeeping
//!
//! While a keyspace is being split off from another one, traffic for some
//! tablet types is still answered by the source keyspace. Each such
//! redirection is a [`ServedFrom`] record on the destination keyspace.
//! Migrations move one tablet type at a time and the primary always moves
//! last, once every other type has been migrated.

use crate::cells::{add_cells, in_cell_list, remove_cells};
use crate::keyspace::KeyspaceInfo;
use crate::records::ServedFrom;
use shardtopo_common::{Error, Result, TabletType};
use tracing::warn;

/// Redirection in effect for one cell
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellServedFrom {
    pub tablet_type: TabletType,
    pub keyspace: String,
}

impl KeyspaceInfo {
    /// Served-from record for `tablet_type`, if any
    #[must_use]
    pub fn get_served_from(&self, tablet_type: TabletType) -> Option<&ServedFrom> {
        self.keyspace
            .served_froms
            .iter()
            .find(|sf| sf.tablet_type == tablet_type)
    }

    /// Check that a served-from migration is allowed.
    ///
    /// `remove` migrates traffic away from `keyspace` for the given cells;
    /// otherwise traffic is sent back to it.
    pub fn check_served_from_migration(
        &self,
        tablet_type: TabletType,
        cells: &[String],
        keyspace: &str,
        remove: bool,
    ) -> Result<()> {
        if tablet_type.is_primary() {
            if !remove {
                return Err(Error::failed_precondition(format!(
                    "cannot add primary back to {}",
                    self.name
                )));
            }
            if !cells.is_empty() {
                return Err(Error::failed_precondition(format!(
                    "cannot migrate only some cells for primary removal in keyspace {}",
                    self.name
                )));
            }
            if self.keyspace.served_froms.len() > 1 {
                return Err(Error::failed_precondition(format!(
                    "cannot migrate primary into {} until everything else is migrated",
                    self.name
                )));
            }
        }

        if remove && self.get_served_from(tablet_type).is_none() {
            return Err(Error::invalid_argument("supplied type cannot be migrated"));
        }

        if let Some(sf) = self
            .keyspace
            .served_froms
            .iter()
            .find(|sf| sf.keyspace != keyspace)
        {
            return Err(Error::invalid_argument(format!(
                "inconsistent keyspace specified in migration: {keyspace} != {} for type {}",
                sf.keyspace, sf.tablet_type
            )));
        }
        Ok(())
    }

    /// Apply a served-from migration to the in-memory record.
    ///
    /// The migration is validated first. `all_cells` is the full cell list,
    /// needed to shrink a record that currently covers every cell. The caller
    /// persists the result with [`crate::TopoServer::update_keyspace`].
    pub fn update_served_from_map(
        &mut self,
        tablet_type: TabletType,
        cells: &[String],
        keyspace: &str,
        remove: bool,
        all_cells: &[String],
    ) -> Result<()> {
        self.check_served_from_migration(tablet_type, cells, keyspace, remove)?;

        let served_froms = &mut self.keyspace.served_froms;
        let Some(idx) = served_froms
            .iter()
            .position(|sf| sf.tablet_type == tablet_type)
        else {
            if remove {
                warn!(
                    keyspace = %self.name,
                    %tablet_type,
                    "removing served-from for a type that has none"
                );
            } else {
                served_froms.push(ServedFrom {
                    tablet_type,
                    cells: cells.to_vec(),
                    keyspace: keyspace.to_string(),
                });
            }
            return Ok(());
        };

        let existing = &mut served_froms[idx];
        if remove {
            let (leftover, empty) = remove_cells(&existing.cells, cells, all_cells);
            if empty {
                served_froms.remove(idx);
            } else {
                existing.cells = leftover;
            }
        } else {
            if existing.keyspace != keyspace {
                return Err(Error::failed_precondition(format!(
                    "cannot update served-from on existing record for keyspace {}, different keyspace: {} != {keyspace}",
                    self.name, existing.keyspace
                )));
            }
            existing.cells = add_cells(&existing.cells, cells);
        }
        Ok(())
    }

    /// Redirections that apply to `cell`
    #[must_use]
    pub fn compute_cell_served_from(&self, cell: &str) -> Vec<CellServedFrom> {
        self.keyspace
            .served_froms
            .iter()
            .filter(|sf| in_cell_list(cell, &sf.cells))
            .map(|sf| CellServedFrom {
                tablet_type: sf.tablet_type,
                keyspace: sf.keyspace.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Keyspace;
    use shardtopo_common::{ErrorCode, Version};

    fn cells(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    fn keyspace_info(served_froms: Vec<ServedFrom>) -> KeyspaceInfo {
        KeyspaceInfo {
            name: "customer".to_string(),
            version: Version::new(1),
            keyspace: Keyspace {
                served_froms,
                ..Keyspace::default()
            },
        }
    }

    fn served_from(tablet_type: TabletType, cell_names: &[&str]) -> ServedFrom {
        ServedFrom {
            tablet_type,
            cells: cells(cell_names),
            keyspace: "source".to_string(),
        }
    }

    #[test]
    fn test_primary_removal_waits_for_other_types() {
        let all = cells(&["zone1", "zone2"]);
        let mut ki = keyspace_info(vec![
            served_from(TabletType::Primary, &[]),
            served_from(TabletType::Replica, &[]),
            served_from(TabletType::Rdonly, &[]),
        ]);

        let err = ki
            .update_served_from_map(TabletType::Primary, &[], "source", true, &all)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::FailedPrecondition);
        assert!(err.to_string().contains("until everything else is migrated"));

        ki.update_served_from_map(TabletType::Rdonly, &[], "source", true, &all)
            .unwrap();
        ki.update_served_from_map(TabletType::Replica, &[], "source", true, &all)
            .unwrap();
        assert_eq!(ki.served_froms.len(), 1);

        ki.update_served_from_map(TabletType::Primary, &[], "source", true, &all)
            .unwrap();
        assert!(ki.served_froms.is_empty());
    }

    #[test]
    fn test_primary_cannot_be_added_back() {
        let with_record = keyspace_info(vec![served_from(TabletType::Primary, &[])]);
        let without = keyspace_info(Vec::new());
        for ki in [with_record, without] {
            let err = ki
                .check_served_from_migration(TabletType::Primary, &[], "source", false)
                .unwrap_err();
            assert_eq!(err.code(), ErrorCode::FailedPrecondition);
        }
    }

    #[test]
    fn test_primary_removal_is_all_cells() {
        let ki = keyspace_info(vec![served_from(TabletType::Primary, &[])]);
        let err = ki
            .check_served_from_migration(TabletType::Primary, &cells(&["zone1"]), "source", true)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::FailedPrecondition);
    }

    #[test]
    fn test_remove_missing_type() {
        let ki = keyspace_info(vec![served_from(TabletType::Replica, &[])]);
        let err = ki
            .check_served_from_migration(TabletType::Rdonly, &[], "source", true)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
        assert!(err.to_string().contains("supplied type cannot be migrated"));
    }

    #[test]
    fn test_inconsistent_keyspace() {
        let ki = keyspace_info(vec![served_from(TabletType::Replica, &[])]);
        let err = ki
            .check_served_from_migration(TabletType::Rdonly, &[], "elsewhere", false)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
        assert!(err.to_string().contains("inconsistent keyspace"));
    }

    #[test]
    fn test_add_is_idempotent() {
        let all = cells(&["zone1", "zone2"]);
        let mut ki = keyspace_info(Vec::new());
        ki.update_served_from_map(TabletType::Rdonly, &cells(&["zone1"]), "source", false, &all)
            .unwrap();
        let once = ki.served_froms.clone();

        ki.update_served_from_map(TabletType::Rdonly, &cells(&["zone1"]), "source", false, &all)
            .unwrap();
        assert_eq!(ki.served_froms, once);

        ki.update_served_from_map(TabletType::Rdonly, &cells(&["zone2"]), "source", false, &all)
            .unwrap();
        assert_eq!(
            ki.get_served_from(TabletType::Rdonly).unwrap().cells,
            cells(&["zone1", "zone2"])
        );
    }

    #[test]
    fn test_partial_removal_expands_all_cells() {
        let all = cells(&["zone1", "zone2", "zone3"]);
        let mut ki = keyspace_info(vec![served_from(TabletType::Replica, &[])]);

        ki.update_served_from_map(TabletType::Replica, &cells(&["zone1"]), "source", true, &all)
            .unwrap();
        assert_eq!(
            ki.get_served_from(TabletType::Replica).unwrap().cells,
            cells(&["zone2", "zone3"])
        );

        ki.update_served_from_map(
            TabletType::Replica,
            &cells(&["zone2", "zone3"]),
            "source",
            true,
            &all,
        )
        .unwrap();
        assert!(ki.get_served_from(TabletType::Replica).is_none());
    }

    #[test]
    fn test_compute_cell_served_from() {
        let ki = keyspace_info(vec![
            served_from(TabletType::Rdonly, &["zone1"]),
            served_from(TabletType::Replica, &[]),
        ]);
        let zone1 = ki.compute_cell_served_from("zone1");
        assert_eq!(zone1.len(), 2);
        let zone2 = ki.compute_cell_served_from("zone2");
        assert_eq!(
            zone2,
            vec![CellServedFrom {
                tablet_type: TabletType::Replica,
                keyspace: "source".to_string(),
            }]
        );
    }
}
