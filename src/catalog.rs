//! Type catalog: the cross-format spellings of every supported SQL Server type
//!
//! Each SQL type maps to one [`TypeRepresentationSet`] row holding the host
//! (CLR) type names, the `SqlDbType` binding tag, and the data reader accessors
//! used to materialize values. The catalog is built once on first access and is
//! read-only afterwards, so lookups are safe from any thread.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::Serialize;

/// One axis of a type's cross-target spelling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TypeKind {
    /// SQL Server type name (e.g., "int")
    SourceName,
    /// Host type that can hold NULL (e.g., "Int32?")
    HostNullable,
    /// Host type with the nullable marker removed (e.g., "Int32")
    HostStripped,
    /// `SqlDbType` member used when binding parameters (e.g., "Int")
    BindingTag,
    /// Sequential data reader accessor (e.g., "GetInt32")
    ReaderAccessor,
    /// Legacy `SqlTypes` reader accessor (e.g., "GetSqlInt32")
    LegacyAccessor,
    /// Generic `DbType` member (e.g., "Int32")
    DbType,
}

/// Equivalent spellings of one SQL type across all representation kinds
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeRepresentationSet {
    pub source_name: &'static str,
    pub host_nullable: &'static str,
    pub host_stripped: &'static str,
    pub binding_tag: &'static str,
    pub reader_accessor: Option<&'static str>,
    pub legacy_accessor: Option<&'static str>,
    pub db_type: &'static str,
}

impl TypeRepresentationSet {
    /// Host-opaque representation used when a value's type cannot be traced.
    pub fn unknown() -> &'static TypeRepresentationSet {
        &UNKNOWN
    }

    /// Whether this is the host-opaque fallback row, the only one without a source name
    pub fn is_unknown(&self) -> bool {
        self.source_name.is_empty()
    }

    /// Get the spelling for one representation kind.
    ///
    /// Returns `None` only for accessors that do not exist for this type.
    pub fn get(&self, kind: TypeKind) -> Option<&'static str> {
        match kind {
            TypeKind::SourceName => Some(self.source_name),
            TypeKind::HostNullable => Some(self.host_nullable),
            TypeKind::HostStripped => Some(self.host_stripped),
            TypeKind::BindingTag => Some(self.binding_tag),
            TypeKind::ReaderAccessor => self.reader_accessor,
            TypeKind::LegacyAccessor => self.legacy_accessor,
            TypeKind::DbType => Some(self.db_type),
        }
    }

    /// Host type for a value with the given effective nullability
    pub fn host_type(&self, nullable: bool) -> &'static str {
        if nullable {
            self.host_nullable
        } else {
            self.host_stripped
        }
    }

    /// True when the host type is a value type wrapped to accept NULL ("Int32?").
    pub fn is_nullable_value_type(&self) -> bool {
        self.host_nullable.ends_with('?')
    }

    /// Binary values are read through a byte-buffer helper instead of an accessor.
    pub fn is_binary(&self) -> bool {
        self.reader_accessor == Some("GetBytes")
    }

    /// Record setter matching the reader accessor ("GetInt32" -> "SetInt32").
    pub fn record_setter(&self) -> String {
        match self.reader_accessor.and_then(|a| a.strip_prefix("Get")) {
            Some(suffix) => format!("Set{}", suffix),
            None => "SetValue".to_string(),
        }
    }
}

const fn row(
    source_name: &'static str,
    host_nullable: &'static str,
    host_stripped: &'static str,
    binding_tag: &'static str,
    legacy_accessor: Option<&'static str>,
    db_type: &'static str,
    reader_accessor: Option<&'static str>,
) -> TypeRepresentationSet {
    TypeRepresentationSet {
        source_name,
        host_nullable,
        host_stripped,
        binding_tag,
        reader_accessor,
        legacy_accessor,
        db_type,
    }
}

static UNKNOWN: TypeRepresentationSet = row(
    "",
    "Object",
    "Object",
    "Variant",
    None,
    "Object",
    Some("GetValue"),
);

/// Catalog rows in lookup-priority order
#[rustfmt::skip]
static ROWS: [TypeRepresentationSet; 32] = [
    row("bigint", "Int64?", "Int64", "BigInt", Some("GetSqlInt64"), "Int64", Some("GetInt64")),
    row("binary", "Byte[]", "Byte[]", "VarBinary", Some("GetSqlBinary"), "Binary", Some("GetBytes")),
    row("bit", "Boolean?", "Boolean", "Bit", Some("GetSqlBoolean"), "Boolean", Some("GetBoolean")),
    row("char", "String", "String", "Char", Some("GetSqlString"), "String", Some("GetString")),
    row("date", "DateTime?", "DateTime", "Date", Some("GetSqlDateTime"), "Date", Some("GetDateTime")),
    row("datetime", "DateTime?", "DateTime", "DateTime", Some("GetSqlDateTime"), "DateTime", Some("GetDateTime")),
    row("datetime2", "DateTime?", "DateTime", "DateTime2", None, "DateTime2", Some("GetDateTime")),
    row("datetimeoffset", "DateTimeOffset?", "DateTimeOffset", "DateTimeOffset", None, "DateTimeOffset", Some("GetDateTimeOffset")),
    row("decimal", "Decimal?", "Decimal", "Decimal", Some("GetSqlDecimal"), "Decimal", Some("GetDecimal")),
    row("float", "Double?", "Double", "Float", Some("GetSqlDouble"), "Double", Some("GetDouble")),
    row("image", "Byte[]", "Byte[]", "Binary", Some("GetSqlBinary"), "Binary", Some("GetBytes")),
    row("int", "Int32?", "Int32", "Int", Some("GetSqlInt32"), "Int32", Some("GetInt32")),
    row("money", "Decimal?", "Decimal", "Money", Some("GetSqlMoney"), "Decimal", Some("GetDecimal")),
    row("nchar", "String", "String", "NChar", Some("GetSqlString"), "StringFixedLength", Some("GetString")),
    row("ntext", "String", "String", "NText", Some("GetSqlString"), "String", Some("GetString")),
    row("numeric", "Decimal?", "Decimal", "Decimal", Some("GetSqlDecimal"), "Decimal", Some("GetDecimal")),
    row("nvarchar", "String", "String", "NVarChar", Some("GetSqlString"), "String", Some("GetString")),
    row("real", "Single?", "Single", "Real", Some("GetSqlSingle"), "Single", Some("GetFloat")),
    row("rowversion", "Byte[]", "Byte[]", "Timestamp", Some("GetSqlBinary"), "Binary", Some("GetBytes")),
    row("smalldatetime", "DateTime?", "DateTime", "DateTime", Some("GetSqlDateTime"), "DateTime", Some("GetDateTime")),
    row("smallint", "Int16?", "Int16", "SmallInt", Some("GetSqlInt16"), "Int16", Some("GetInt16")),
    row("smallmoney", "Decimal?", "Decimal", "SmallMoney", Some("GetSqlMoney"), "Decimal", Some("GetDecimal")),
    row("sql_variant", "Object", "Object", "Variant", Some("GetSqlValue"), "Object", Some("GetValue")),
    row("sysname", "String", "String", "NVarChar", Some("GetSqlString"), "String", Some("GetString")),
    row("text", "String", "String", "Text", Some("GetSqlString"), "String", Some("GetString")),
    // time values read as TimeSpan, not DateTime
    row("time", "TimeSpan?", "TimeSpan", "Time", None, "Time", Some("GetTimeSpan")),
    row("timestamp", "Byte[]", "Byte[]", "Timestamp", Some("GetSqlBinary"), "Binary", Some("GetBytes")),
    row("tinyint", "Byte?", "Byte", "TinyInt", Some("GetSqlByte"), "Byte", Some("GetByte")),
    // Guid is a value type and gets the nullable marker
    row("uniqueidentifier", "Guid?", "Guid", "UniqueIdentifier", Some("GetSqlGuid"), "Guid", Some("GetGuid")),
    row("varbinary", "Byte[]", "Byte[]", "VarBinary", Some("GetSqlBinary"), "Binary", Some("GetBytes")),
    row("varchar", "String", "String", "VarChar", Some("GetSqlString"), "String", Some("GetString")),
    row("xml", "Xml", "Xml", "Xml", Some("GetSqlXml"), "Xml", None),
];

const ALL_KINDS: [TypeKind; 7] = [
    TypeKind::SourceName,
    TypeKind::HostNullable,
    TypeKind::HostStripped,
    TypeKind::BindingTag,
    TypeKind::ReaderAccessor,
    TypeKind::LegacyAccessor,
    TypeKind::DbType,
];

/// Keyed index over the catalog rows
pub struct TypeCatalog {
    rows: &'static [TypeRepresentationSet],
    by_source: HashMap<&'static str, usize>,
    by_representation: HashMap<(TypeKind, &'static str), usize>,
}

static CATALOG: Lazy<TypeCatalog> = Lazy::new(|| TypeCatalog::build(&ROWS));

/// The process-wide type catalog
pub fn catalog() -> &'static TypeCatalog {
    &CATALOG
}

/// Look up a SQL type by name (case-insensitive).
pub fn lookup_by_source(source_name: &str) -> Option<&'static TypeRepresentationSet> {
    catalog().lookup_by_source(source_name)
}

/// Look up the first row carrying `value` for the given representation kind.
pub fn lookup_by_representation(
    kind: TypeKind,
    value: &str,
) -> Option<&'static TypeRepresentationSet> {
    catalog().lookup_by_representation(kind, value)
}

impl TypeCatalog {
    fn build(rows: &'static [TypeRepresentationSet]) -> Self {
        let mut by_source = HashMap::with_capacity(rows.len());
        let mut by_representation = HashMap::with_capacity(rows.len() * ALL_KINDS.len());

        for (index, entry) in rows.iter().enumerate() {
            by_source.insert(entry.source_name, index);
            for kind in ALL_KINDS {
                if let Some(value) = entry.get(kind) {
                    // First row wins for shared spellings like "String"
                    by_representation.entry((kind, value)).or_insert(index);
                }
            }
        }

        Self {
            rows,
            by_source,
            by_representation,
        }
    }

    pub fn lookup_by_source(&self, source_name: &str) -> Option<&'static TypeRepresentationSet> {
        let rows = self.rows;
        let key = source_name.trim().to_ascii_lowercase();
        self.by_source.get(key.as_str()).map(|&i| &rows[i])
    }

    pub fn lookup_by_representation(
        &self,
        kind: TypeKind,
        value: &str,
    ) -> Option<&'static TypeRepresentationSet> {
        let rows = self.rows;
        if kind == TypeKind::SourceName {
            return self.lookup_by_source(value);
        }
        self.by_representation
            .get(&(kind, value))
            .map(|&i| &rows[i])
    }

    /// All rows in catalog order
    pub fn rows(&self) -> &'static [TypeRepresentationSet] {
        self.rows
    }
}
