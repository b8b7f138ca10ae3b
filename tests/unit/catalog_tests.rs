//! Unit tests for the type catalog and declared type facets

use sql_sharpen::catalog::{catalog, lookup_by_representation, lookup_by_source, TypeKind};
use sql_sharpen::parser::DeclaredType;

// ============================================================================
// Catalog rows
// ============================================================================

#[test]
fn test_common_rows() {
    let cases = [
        ("bigint", "Int64?", "BigInt", Some("GetInt64")),
        ("bit", "Boolean?", "Bit", Some("GetBoolean")),
        ("datetime2", "DateTime?", "DateTime2", Some("GetDateTime")),
        ("decimal", "Decimal?", "Decimal", Some("GetDecimal")),
        ("nvarchar", "String", "NVarChar", Some("GetString")),
        ("time", "TimeSpan?", "Time", Some("GetTimeSpan")),
        ("uniqueidentifier", "Guid?", "UniqueIdentifier", Some("GetGuid")),
        ("varbinary", "Byte[]", "VarBinary", Some("GetBytes")),
        ("xml", "Xml", "Xml", None),
    ];

    for (source, host, tag, accessor) in cases {
        let row = lookup_by_source(source).unwrap_or_else(|| panic!("{} missing", source));
        assert_eq!(row.host_nullable, host, "{}", source);
        assert_eq!(row.binding_tag, tag, "{}", source);
        assert_eq!(row.reader_accessor, accessor, "{}", source);
    }
}

#[test]
fn test_reference_types_keep_their_host_type_when_not_null() {
    let nvarchar = lookup_by_source("NVARCHAR").unwrap();
    assert_eq!(nvarchar.host_type(false), "String");
    assert_eq!(nvarchar.host_type(true), "String");
    assert!(!nvarchar.is_nullable_value_type());

    let int = lookup_by_source("int").unwrap();
    assert_eq!(int.host_type(false), "Int32");
    assert_eq!(int.host_type(true), "Int32?");
    assert!(int.is_nullable_value_type());

    let guid = lookup_by_source("uniqueidentifier").unwrap();
    assert_eq!(guid.host_type(false), "Guid");
    assert_eq!(guid.host_type(true), "Guid?");
}

#[test]
fn test_binary_rows_use_byte_buffer() {
    for source in ["binary", "varbinary", "image", "timestamp", "rowversion"] {
        assert!(lookup_by_source(source).unwrap().is_binary(), "{}", source);
    }
    assert!(!lookup_by_source("nvarchar").unwrap().is_binary());
}

#[test]
fn test_every_row_round_trips_through_its_source_name() {
    for row in catalog().rows() {
        let found = lookup_by_representation(TypeKind::SourceName, row.source_name).unwrap();
        assert_eq!(found, row);
    }
}

#[test]
fn test_sysname_is_nvarchar() {
    let sysname = lookup_by_source("sysname").unwrap();
    let nvarchar = lookup_by_source("nvarchar").unwrap();
    assert_eq!(sysname.binding_tag, nvarchar.binding_tag);
    assert_eq!(sysname.host_nullable, nvarchar.host_nullable);
}

// ============================================================================
// Declared type facets
// ============================================================================

#[test]
fn test_decimal_defaults_to_18_0() {
    let declared = DeclaredType::parse("DECIMAL").unwrap();
    assert_eq!((declared.precision, declared.scale), (Some(18), Some(0)));

    let declared = DeclaredType::parse("numeric(10)").unwrap();
    assert_eq!((declared.precision, declared.scale), (Some(10), Some(0)));
}

#[test]
fn test_length_and_max() {
    assert_eq!(DeclaredType::parse("nvarchar(50)").unwrap().length, Some(50));
    assert_eq!(DeclaredType::parse("varbinary(max)").unwrap().length, Some(-1));
    assert_eq!(DeclaredType::parse("int").unwrap().length, None);
}

#[test]
fn test_schema_qualified_user_type() {
    let declared = DeclaredType::parse("[dbo].[EmailAddress]").unwrap();
    assert_eq!(declared.schema.as_deref(), Some("dbo"));
    assert_eq!(declared.name, "EmailAddress");
    assert_eq!(declared.to_string(), "dbo.EmailAddress");
}
