//! Sort-criteria compiler.
//!
//! Accepts a comma-separated `[+|-]key` list. Recognized keys map directly
//! onto `cds_object` columns; anything else is treated as a metadata
//! property name and compiled into a correlated `INNER JOIN` against
//! `object_metadata` with a per-key alias (`meta_prop0`, `meta_prop1`, ...).
//! The caller splices `joins` into the `FROM` clause and `order_by` after
//! `ORDER BY`.

use tracing::warn;

/// Result of compiling a sort-criteria string: the caller splices `joins`
/// into its `FROM` clause and `order_by` after `ORDER BY`.
#[derive(Debug, Clone, Default)]
pub struct CompiledSort {
    pub joins: Vec<String>,
    pub order_by: String,
}

impl CompiledSort {
    pub fn order_by_or_default(&self, default: &str) -> String {
        if self.order_by.is_empty() {
            default.to_string()
        } else {
            self.order_by.clone()
        }
    }
}

fn column_for_key(key: &str) -> Option<&'static str> {
    match key {
        "@id" | "id" => Some("cds_object.id"),
        "@parentID" | "parentID" | "parent_id" => Some("cds_object.parent_id"),
        "@refID" | "refID" | "ref_id" => Some("cds_object.ref_id"),
        "upnp:class" | "class" => Some("cds_object.upnp_class"),
        "dc:title" | "title" => Some("cds_object.dc_title"),
        "last_updated" => Some("cds_object.last_updated"),
        "last_modified" => Some("cds_object.last_modified"),
        "path" | "location" => Some("cds_object.location"),
        _ => None,
    }
}

/// Compiles a sort-criteria string into an `ORDER BY` fragment plus any
/// metadata-key joins it requires. Unknown metadata keys are skipped with
/// a warning rather than failing the query (property B2).
pub fn compile_sort(criteria: &str) -> CompiledSort {
    let mut compiled = CompiledSort::default();
    if criteria.trim().is_empty() {
        return compiled;
    }

    let mut order_parts = Vec::new();
    let mut meta_index = 0usize;

    for raw in criteria.split(',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let (direction, key) = match raw.chars().next() {
            Some('+') => ("ASC", &raw[1..]),
            Some('-') => ("DESC", &raw[1..]),
            _ => ("ASC", raw),
        };
        let key = key.trim();

        if let Some(column) = column_for_key(key) {
            order_parts.push(format!("{column} {direction}"));
            continue;
        }

        if key.is_empty() {
            warn!("sort criteria contained an empty key, skipping");
            continue;
        }

        let alias = format!("meta_prop{meta_index}");
        meta_index += 1;
        let escaped = key.replace('\'', "''");
        compiled.joins.push(format!(
            "LEFT JOIN object_metadata {alias} ON {alias}.item_id = cds_object.id AND {alias}.property_name = '{escaped}'"
        ));
        order_parts.push(format!("{alias}.property_value {direction}"));
    }

    if order_parts.is_empty() {
        warn!("sort criteria {criteria:?} resolved to no usable keys; falling back to default order");
    }

    compiled.order_by = order_parts.join(", ");
    compiled
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_known_columns_without_joins() {
        let compiled = compile_sort("+dc:title,-last_updated");
        assert!(compiled.joins.is_empty());
        assert_eq!(compiled.order_by, "cds_object.dc_title ASC, cds_object.last_updated DESC");
    }

    #[test]
    fn unknown_metadata_key_adds_a_join() {
        let compiled = compile_sort("+upnp:originalTrackNumber");
        assert_eq!(compiled.joins.len(), 1);
        assert!(compiled.order_by.contains("meta_prop0.property_value ASC"));
    }

    #[test]
    fn empty_criteria_compiles_to_nothing() {
        let compiled = compile_sort("  ");
        assert!(compiled.order_by.is_empty());
        assert!(compiled.joins.is_empty());
    }
}
