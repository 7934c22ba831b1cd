//! Schema migration. Each numbered upgrade step ships with an expected
//! hash of its DDL so a tampered upgrade file is refused rather than
//! silently applied.

use crate::cds::error::{CdsError, CdsResult};
use crate::cds::object::ResAttr;

/// One "migration command": a one-shot data rewrite that runs before the
/// DDL step that follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationCommand {
    Metadata,
    Resources,
    Location,
}

pub struct MigrationStep {
    pub version: u32,
    pub expected_hash: u64,
    pub commands: &'static [MigrationCommand],
    pub ddl: &'static str,
}

/// Pre-migration-27 location values carried a one-byte discriminator
/// prefix (`D`/`F`/`V`); after 27 the prefix is dropped in favor of the
/// `object_type` column.
pub const LOCATION_PREFIX_DROPPED_AT: u32 = 27;

fn fnv1a(s: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in s.as_bytes() {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

pub fn init_script(dialect_name: &str) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS cds_object (
            id INTEGER PRIMARY KEY,
            parent_id INTEGER NOT NULL,
            ref_id INTEGER,
            object_type INTEGER NOT NULL,
            upnp_class TEXT NOT NULL,
            dc_title TEXT NOT NULL,
            location TEXT,
            location_hash INTEGER,
            mime_type TEXT,
            flags INTEGER NOT NULL DEFAULT 0,
            last_modified INTEGER NOT NULL DEFAULT 0,
            last_updated INTEGER NOT NULL DEFAULT 0,
            service_id TEXT,
            bookmark_pos INTEGER NOT NULL DEFAULT 0,
            part_number INTEGER,
            track_number INTEGER,
            update_id INTEGER NOT NULL DEFAULT 0,
            autoscan_id INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_cds_object_parent ON cds_object(parent_id);
        CREATE INDEX IF NOT EXISTS idx_cds_object_ref ON cds_object(ref_id);
        CREATE INDEX IF NOT EXISTS idx_cds_object_location_hash ON cds_object(location_hash);

        CREATE TABLE IF NOT EXISTS object_metadata (
            item_id INTEGER NOT NULL REFERENCES cds_object(id) ON DELETE CASCADE,
            property_name TEXT NOT NULL,
            property_value TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_object_metadata_item ON object_metadata(item_id);

        CREATE TABLE IF NOT EXISTS object_auxdata (
            item_id INTEGER NOT NULL REFERENCES cds_object(id) ON DELETE CASCADE,
            aux_key TEXT NOT NULL,
            aux_value TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_object_auxdata_item ON object_auxdata(item_id);

        CREATE TABLE IF NOT EXISTS object_resource (
            item_id INTEGER NOT NULL REFERENCES cds_object(id) ON DELETE CASCADE,
            res_id INTEGER NOT NULL,
            handler_type TEXT NOT NULL,
            purpose TEXT NOT NULL,
            options TEXT NOT NULL DEFAULT '',
            parameters TEXT NOT NULL DEFAULT '',
            PRIMARY KEY (item_id, res_id)
        );

        CREATE TABLE IF NOT EXISTS autoscan (
            id INTEGER PRIMARY KEY,
            object_id INTEGER REFERENCES cds_object(id) ON DELETE SET NULL,
            location TEXT,
            mode TEXT NOT NULL,
            recursive INTEGER NOT NULL,
            hidden_files INTEGER NOT NULL,
            interval_secs INTEGER NOT NULL,
            last_modified INTEGER NOT NULL DEFAULT 0,
            ancestor_path TEXT NOT NULL,
            persistent INTEGER NOT NULL,
            touched INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS internal_setting (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS config_value (
            item_xpath TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            status TEXT NOT NULL,
            PRIMARY KEY (item_xpath, key)
        );

        CREATE TABLE IF NOT EXISTS client (
            addr TEXT NOT NULL,
            port INTEGER NOT NULL,
            last_seen INTEGER NOT NULL,
            first_seen INTEGER NOT NULL,
            user_agent TEXT,
            headers TEXT NOT NULL DEFAULT '',
            profile_name TEXT,
            PRIMARY KEY (addr)
        );
        -- dialect: {dialect_name}
        "#
    )
}

/// One registered upgrade step per schema version bump. Kept empty for
/// the initial release; future `db_version` bumps append here with a
/// pinned `expected_hash` of their DDL text.
pub const UPGRADE_STEPS: &[MigrationStep] = &[];

/// Verifies a migration step's DDL hasn't been tampered with before
/// applying it; refuses to proceed on a hash mismatch.
pub fn verify_step(step: &MigrationStep) -> CdsResult<()> {
    let actual = fnv1a(step.ddl);
    if actual != step.expected_hash {
        return Err(CdsError::DatabaseFailure(sqlx::Error::Protocol(format!(
            "migration {} hash mismatch: expected {:#x}, computed {:#x}",
            step.version, step.expected_hash, actual
        ))));
    }
    Ok(())
}

/// The resource-attribute reconciliation pass: adds one typed column per
/// `ResAttr` variant not already present, and returns the set of columns
/// it added.
pub fn resource_attribute_columns_to_add(existing: &[String]) -> Vec<&'static str> {
    ResAttr::ALL
        .iter()
        .map(|a| a.column_name())
        .filter(|name| !existing.iter().any(|e| e == name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_mismatch_is_rejected() {
        let step = MigrationStep { version: 1, expected_hash: 0, commands: &[], ddl: "ALTER TABLE x ADD y" };
        assert!(verify_step(&step).is_err());
    }

    #[test]
    fn reconciliation_only_adds_missing_columns() {
        let existing = vec!["protocol_info".to_string()];
        let to_add = resource_attribute_columns_to_add(&existing);
        assert!(!to_add.contains(&"protocol_info"));
        assert!(to_add.contains(&"bitrate"));
    }
}
