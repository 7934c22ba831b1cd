//! AST for the UPnP `SearchCriteria` grammar.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
    DoesNotContain,
    StartsWith,
    DerivedFrom,
    Exists(bool),
}

/// A UPnP property reference, resolved through one of three mappers
/// (spec §4.C): the browse-column mapper (`@id`/`@parentID`/`@refID`/
/// `upnp:class`/`last_updated`/`last_modified`/`path`, all backed by a
/// `cds_object` column), the resource mapper (`res@<attr>`, backed by a
/// reconciled `object_resource` column), and the metadata mapper
/// (everything else, backed by `object_metadata`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Property {
    Id,
    ParentId,
    RefId,
    Class,
    LastUpdated,
    LastModified,
    Path,
    Resource(String),
    Metadata(String),
}

impl Property {
    pub fn parse(raw: &str) -> Property {
        match raw {
            "@id" => Property::Id,
            "@parentID" => Property::ParentId,
            "@refID" => Property::RefId,
            "upnp:class" => Property::Class,
            "last_updated" => Property::LastUpdated,
            "last_modified" => Property::LastModified,
            "path" => Property::Path,
            other => match other.strip_prefix("res@") {
                Some(attr) => Property::Resource(attr.to_string()),
                None => Property::Metadata(other.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchExpr {
    Rel { property: Property, op: CompareOp, value: String },
    And(Vec<SearchExpr>),
    Or(Vec<SearchExpr>),
}
