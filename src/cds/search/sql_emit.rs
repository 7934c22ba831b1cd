//! Compiles a [`SearchExpr`] into a SQL predicate against `cds_object`.
//!
//! Properties resolve through three mappers (spec §4.C): browse columns
//! (`@id`, `@parentID`, `@refID`, `upnp:class`, `last_updated`,
//! `last_modified`, `path`) compare directly against their `cds_object`
//! column; `res@<attr>` resolves through a correlated `EXISTS` against the
//! reconciled typed column on `object_resource`; every other dotted
//! property (`dc:title`, `upnp:artist`, ...) is resolved through a
//! correlated `EXISTS` against `object_metadata`, which keeps the emitted
//! SQL JOIN-free regardless of how many distinct properties a criteria
//! string touches. A join-per-property form would also work but costs
//! more JOINs as criteria grow; the EXISTS form reads less and costs an
//! index-backed subquery per predicate instead, a fair trade at this scale.

use crate::cds::object::ResAttr;

use super::ast::{CompareOp, Property, SearchExpr};
use super::parser::{parse, ParseError};

pub struct CompiledSearch {
    /// Kept for parity with the join-based form other dialects might
    /// choose; always empty for the EXISTS-subquery strategy below.
    pub joins: String,
    pub predicate: String,
}

/// Doubles embedded single quotes — the only special character the
/// emitted literals can contain, since the property grammar that
/// reaches here has already been lexed out of its surrounding quotes.
fn sql_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn numeric_literal(value: &str) -> Result<String, ParseError> {
    value
        .parse::<i64>()
        .map(|n| n.to_string())
        .map_err(|_| ParseError::UnknownOp(format!("non-numeric value {value:?} for an integer property")))
}

/// Recognizes a `@last<N>` relative-date literal (testable property B3).
fn relative_days(value: &str) -> Option<i64> {
    value.strip_prefix("@last").and_then(|n| n.parse::<i64>().ok())
}

/// Renders the right-hand side of a `>`/`>=` comparison, rewriting a
/// `@last<N>` value to "N days before now" per spec §4.C instead of
/// treating it as an ordinary literal.
fn gt_ge_rhs(value: &str, numeric: bool) -> Result<String, ParseError> {
    if let Some(days) = relative_days(value) {
        return Ok(format!("(strftime('%s', 'now') - {})", days * 86_400));
    }
    if numeric {
        numeric_literal(value)
    } else {
        Ok(sql_quote(value))
    }
}

fn column_predicate(column: &str, op: CompareOp, value: &str, numeric: bool) -> Result<String, ParseError> {
    Ok(match op {
        CompareOp::Eq if numeric => format!("{column} = {}", numeric_literal(value)?),
        CompareOp::Eq => format!("LOWER({column}) = LOWER({})", sql_quote(value)),
        CompareOp::Ne if numeric => format!("{column} != {}", numeric_literal(value)?),
        CompareOp::Ne => format!("LOWER({column}) != LOWER({})", sql_quote(value)),
        CompareOp::Lt => format!("{column} < {}", if numeric { numeric_literal(value)? } else { sql_quote(value) }),
        CompareOp::Le => format!("{column} <= {}", if numeric { numeric_literal(value)? } else { sql_quote(value) }),
        CompareOp::Gt => format!("{column} > {}", gt_ge_rhs(value, numeric)?),
        CompareOp::Ge => format!("{column} >= {}", gt_ge_rhs(value, numeric)?),
        CompareOp::Contains => format!("LOWER({column}) LIKE LOWER({})", sql_quote(&format!("%{value}%"))),
        CompareOp::DoesNotContain => format!("LOWER({column}) NOT LIKE LOWER({})", sql_quote(&format!("%{value}%"))),
        CompareOp::StartsWith => format!("LOWER({column}) LIKE LOWER({})", sql_quote(&format!("{value}%"))),
        CompareOp::DerivedFrom => format!(
            "(LOWER({column}) = LOWER({}) OR LOWER({column}) LIKE LOWER({}))",
            sql_quote(value),
            sql_quote(&format!("{value}.%"))
        ),
        CompareOp::Exists(true) => format!("{column} IS NOT NULL"),
        CompareOp::Exists(false) => format!("{column} IS NULL"),
    })
}

fn metadata_predicate(name: &str, op: CompareOp, value: &str) -> Result<String, ParseError> {
    let base = format!(
        "EXISTS (SELECT 1 FROM object_metadata om WHERE om.item_id = cds_object.id AND om.property_name = {}",
        sql_quote(name)
    );
    Ok(match op {
        CompareOp::Exists(true) => format!("{base})"),
        CompareOp::Exists(false) => format!(
            "NOT EXISTS (SELECT 1 FROM object_metadata om WHERE om.item_id = cds_object.id AND om.property_name = {})",
            sql_quote(name)
        ),
        CompareOp::Eq => format!("{base} AND LOWER(om.property_value) = LOWER({}))", sql_quote(value)),
        CompareOp::Ne => format!("{base} AND LOWER(om.property_value) != LOWER({}))", sql_quote(value)),
        CompareOp::Lt => format!("{base} AND om.property_value < {})", sql_quote(value)),
        CompareOp::Le => format!("{base} AND om.property_value <= {})", sql_quote(value)),
        CompareOp::Gt => format!("{base} AND om.property_value > {})", gt_ge_rhs(value, false)?),
        CompareOp::Ge => format!("{base} AND om.property_value >= {})", gt_ge_rhs(value, false)?),
        CompareOp::Contains => {
            format!("{base} AND LOWER(om.property_value) LIKE LOWER({}))", sql_quote(&format!("%{value}%")))
        }
        CompareOp::DoesNotContain => {
            format!("{base} AND LOWER(om.property_value) NOT LIKE LOWER({}))", sql_quote(&format!("%{value}%")))
        }
        CompareOp::StartsWith => {
            format!("{base} AND LOWER(om.property_value) LIKE LOWER({}))", sql_quote(&format!("{value}%")))
        }
        CompareOp::DerivedFrom => format!(
            "{base} AND (LOWER(om.property_value) = LOWER({}) OR LOWER(om.property_value) LIKE LOWER({})))",
            sql_quote(value),
            sql_quote(&format!("{value}.%"))
        ),
    })
}

/// `res@<attr>` resolves to a typed column reconciled onto `object_resource`
/// (see `storage::migration::resource_attribute_columns_to_add`); unlike
/// metadata there is no `property_name` discriminator to match first.
fn resource_predicate(attr: &str, op: CompareOp, value: &str) -> Result<String, ParseError> {
    let column = ResAttr::parse(attr)
        .ok_or_else(|| ParseError::UnknownOp(format!("unknown resource attribute res@{attr}")))?
        .column_name();
    let cond = match op {
        CompareOp::Exists(true) => format!("res.{column} IS NOT NULL"),
        CompareOp::Exists(false) => format!("res.{column} IS NULL"),
        CompareOp::Eq => format!("LOWER(res.{column}) = LOWER({})", sql_quote(value)),
        CompareOp::Ne => format!("LOWER(res.{column}) != LOWER({})", sql_quote(value)),
        CompareOp::Lt => format!("res.{column} < {}", sql_quote(value)),
        CompareOp::Le => format!("res.{column} <= {}", sql_quote(value)),
        CompareOp::Gt => format!("res.{column} > {}", gt_ge_rhs(value, false)?),
        CompareOp::Ge => format!("res.{column} >= {}", gt_ge_rhs(value, false)?),
        CompareOp::Contains => format!("LOWER(res.{column}) LIKE LOWER({})", sql_quote(&format!("%{value}%"))),
        CompareOp::DoesNotContain => {
            format!("LOWER(res.{column}) NOT LIKE LOWER({})", sql_quote(&format!("%{value}%")))
        }
        CompareOp::StartsWith => format!("LOWER(res.{column}) LIKE LOWER({})", sql_quote(&format!("{value}%"))),
        CompareOp::DerivedFrom => format!(
            "(LOWER(res.{column}) = LOWER({}) OR LOWER(res.{column}) LIKE LOWER({}))",
            sql_quote(value),
            sql_quote(&format!("{value}.%"))
        ),
    };
    Ok(format!("EXISTS (SELECT 1 FROM object_resource res WHERE res.item_id = cds_object.id AND {cond})"))
}

fn emit(expr: &SearchExpr) -> Result<String, ParseError> {
    Ok(match expr {
        SearchExpr::Rel { property, op, value } => match property {
            Property::Id => column_predicate("cds_object.id", *op, value, true)?,
            Property::ParentId => column_predicate("cds_object.parent_id", *op, value, true)?,
            Property::RefId => column_predicate("cds_object.ref_id", *op, value, true)?,
            Property::Class => column_predicate("cds_object.upnp_class", *op, value, false)?,
            Property::LastUpdated => column_predicate("cds_object.last_updated", *op, value, true)?,
            Property::LastModified => column_predicate("cds_object.last_modified", *op, value, true)?,
            Property::Path => column_predicate("cds_object.location", *op, value, false)?,
            Property::Resource(attr) => resource_predicate(attr, *op, value)?,
            Property::Metadata(name) => metadata_predicate(name, *op, value)?,
        },
        SearchExpr::And(terms) => {
            let parts = terms.iter().map(emit).collect::<Result<Vec<_>, _>>()?;
            format!("({})", parts.join(" AND "))
        }
        SearchExpr::Or(terms) => {
            let parts = terms.iter().map(emit).collect::<Result<Vec<_>, _>>()?;
            format!("({})", parts.join(" OR "))
        }
    })
}

pub fn compile_search(criteria: &str) -> Result<CompiledSearch, ParseError> {
    let ast = parse(criteria)?;
    let predicate = emit(&ast)?;
    Ok(CompiledSearch { joins: String::new(), predicate })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_metadata_contains_into_exists_subquery() {
        let compiled = compile_search(r#"upnp:artist contains "Bach""#).unwrap();
        assert!(compiled.predicate.contains("EXISTS"));
        assert!(compiled.predicate.contains("property_name = 'upnp:artist'"));
        assert!(compiled.predicate.contains("LIKE LOWER('%Bach%')"));
    }

    #[test]
    fn compiles_title_equality_case_insensitively() {
        let compiled = compile_search(r#"dc:title = "Moby Dick""#).unwrap();
        assert!(compiled.predicate.contains("LOWER(om.property_value) = LOWER('Moby Dick')"));
    }

    #[test]
    fn compiles_class_equality_case_insensitively() {
        let compiled = compile_search(r#"upnp:class = "object.item.audioItem""#).unwrap();
        assert_eq!(
            compiled.predicate,
            "LOWER(cds_object.upnp_class) = LOWER('object.item.audioItem')"
        );
    }

    #[test]
    fn compiles_id_equality_numerically() {
        let compiled = compile_search(r#"@id = "42""#).unwrap();
        assert_eq!(compiled.predicate, "cds_object.id = 42");
    }

    #[test]
    fn rejects_non_numeric_id() {
        assert!(compile_search(r#"@id = "not-a-number""#).is_err());
    }

    #[test]
    fn wildcard_compiles_to_always_true_form() {
        let compiled = compile_search("*").unwrap();
        assert_eq!(compiled.predicate, "cds_object.id IS NOT NULL");
    }

    #[test]
    fn starts_with_compiles_to_prefix_like() {
        let compiled = compile_search(r#"dc:title startsWith "Bach""#).unwrap();
        assert!(compiled.predicate.contains("LIKE LOWER('Bach%')"));
    }

    #[test]
    fn last_n_rewrites_to_relative_date_on_browse_column() {
        let compiled = compile_search(r#"last_updated >= "@last7""#).unwrap();
        assert_eq!(compiled.predicate, "cds_object.last_updated >= (strftime('%s', 'now') - 604800)");
    }

    #[test]
    fn last_n_rewrites_on_metadata_property_too() {
        let compiled = compile_search(r#"dc:date > "@last30""#).unwrap();
        assert!(compiled.predicate.contains("(strftime('%s', 'now') - 2592000)"));
    }

    #[test]
    fn resource_attribute_compiles_to_exists_against_object_resource() {
        let compiled = compile_search(r#"res@size > "1000""#).unwrap();
        assert_eq!(
            compiled.predicate,
            "EXISTS (SELECT 1 FROM object_resource res WHERE res.item_id = cds_object.id AND res.res_size > '1000')"
        );
    }

    #[test]
    fn unknown_resource_attribute_is_rejected() {
        assert!(compile_search(r#"res@unknownAttr = "x""#).is_err());
    }

    #[test]
    fn path_property_maps_to_location_column() {
        let compiled = compile_search(r#"path = "/media/movies""#).unwrap();
        assert_eq!(compiled.predicate, "LOWER(cds_object.location) = LOWER('/media/movies')");
    }
}
