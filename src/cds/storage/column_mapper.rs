//! Dialect abstraction for SQL identifiers. No SQL in this crate
//! concatenates a raw identifier — every table/column name is rendered
//! through a `ColumnMapper`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    Sqlite,
    Postgres,
    MySql,
}

impl SqlDialect {
    /// The quote characters bracketing an identifier in this dialect.
    fn quote_pair(self) -> (char, char) {
        match self {
            SqlDialect::Sqlite => ('"', '"'),
            SqlDialect::Postgres => ('"', '"'),
            SqlDialect::MySql => ('`', '`'),
        }
    }

    pub fn quote_ident(self, ident: &str) -> String {
        let (open, close) = self.quote_pair();
        format!("{open}{ident}{close}")
    }
}

/// Logical columns of the `cds_object` table, kept as an enum so the
/// search compiler and the browse/search query builders can't typo a
/// raw string into a WHERE clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectColumn {
    Id,
    ParentId,
    RefId,
    UpnpClass,
    DcTitle,
    Location,
    LocationHash,
    MimeType,
    Flags,
    LastModified,
    LastUpdated,
    ServiceId,
    BookmarkPos,
    PartNumber,
    TrackNumber,
    ObjectType,
    UpdateId,
}

impl ObjectColumn {
    pub fn physical_name(self) -> &'static str {
        match self {
            ObjectColumn::Id => "id",
            ObjectColumn::ParentId => "parent_id",
            ObjectColumn::RefId => "ref_id",
            ObjectColumn::UpnpClass => "upnp_class",
            ObjectColumn::DcTitle => "dc_title",
            ObjectColumn::Location => "location",
            ObjectColumn::LocationHash => "location_hash",
            ObjectColumn::MimeType => "mime_type",
            ObjectColumn::Flags => "flags",
            ObjectColumn::LastModified => "last_modified",
            ObjectColumn::LastUpdated => "last_updated",
            ObjectColumn::ServiceId => "service_id",
            ObjectColumn::BookmarkPos => "bookmark_pos",
            ObjectColumn::PartNumber => "part_number",
            ObjectColumn::TrackNumber => "track_number",
            ObjectColumn::ObjectType => "object_type",
            ObjectColumn::UpdateId => "update_id",
        }
    }
}

/// Renders table/column identifiers for the active dialect, monomorphized
/// over one enum of logical columns (resource/metadata attribute mapping
/// lives in `search::sql_emit`, which composes this mapper).
pub struct ColumnMapper {
    dialect: SqlDialect,
    table: &'static str,
}

impl ColumnMapper {
    pub fn new(dialect: SqlDialect, table: &'static str) -> Self {
        Self { dialect, table }
    }

    pub fn table_ident(&self) -> String {
        self.dialect.quote_ident(self.table)
    }

    pub fn column(&self, col: ObjectColumn) -> String {
        format!("{}.{}", self.table_ident(), self.dialect.quote_ident(col.physical_name()))
    }

    pub fn aliased(&self, alias: &str, col: ObjectColumn) -> String {
        format!("{}.{}", self.dialect.quote_ident(alias), self.dialect.quote_ident(col.physical_name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_and_mysql_quote_differently() {
        assert_eq!(SqlDialect::Sqlite.quote_ident("id"), "\"id\"");
        assert_eq!(SqlDialect::MySql.quote_ident("id"), "`id`");
    }

    #[test]
    fn column_mapper_qualifies_with_table() {
        let mapper = ColumnMapper::new(SqlDialect::Sqlite, "cds_object");
        assert_eq!(mapper.column(ObjectColumn::Id), "\"cds_object\".\"id\"");
    }
}
