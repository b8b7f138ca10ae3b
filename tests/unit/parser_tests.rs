//! Unit tests for T-SQL file parsing through the public API

use std::io::Write;
use std::path::PathBuf;

use sql_sharpen::parser::{
    parse_sql_file, parse_sql_files, ParsedConstraint, SchemaStatement,
};
use sql_sharpen::SqlSharpenError;
use tempfile::NamedTempFile;

/// Helper to create a temp SQL file with content
fn create_sql_file(content: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::with_suffix(".sql").unwrap();
    file.write_all(content).unwrap();
    file.flush().unwrap();
    file
}

// ============================================================================
// Files and batches
// ============================================================================

#[test]
fn test_batches_keep_their_start_line() {
    let file = create_sql_file(b"CREATE TABLE a (id INT)\nGO\n\nCREATE TABLE b (id INT)\nGO\n");
    let statements = parse_sql_file(file.path()).unwrap();

    assert_eq!(statements.len(), 2);
    assert_eq!(statements[0].line, 1);
    assert_eq!(statements[1].line, 3);
    assert_eq!(statements[1].source_file, file.path());
}

#[test]
fn test_windows_1252_fallback() {
    // 0xE9 is 'e' with an acute accent in Windows-1252 and invalid UTF-8 on its own
    let file = create_sql_file(b"CREATE TABLE caf\xE9 (id INT)\n");
    let statements = parse_sql_file(file.path()).unwrap();

    let SchemaStatement::Table(table) = &statements[0].statement else {
        panic!("expected a table");
    };
    assert_eq!(table.name.name, "caf\u{e9}");
}

#[test]
fn test_missing_file_is_a_read_error() {
    let error = parse_sql_file(&PathBuf::from("/no/such/file.sql")).unwrap_err();
    assert!(matches!(
        error.downcast_ref::<SqlSharpenError>(),
        Some(SqlSharpenError::SqlFileReadError { .. })
    ));
}

#[test]
fn test_many_files_keep_file_order() {
    // Enough files to take the parallel path
    let files: Vec<NamedTempFile> = (0..12)
        .map(|i| create_sql_file(format!("CREATE TABLE t{} (id INT)", i).as_bytes()))
        .collect();
    let paths: Vec<PathBuf> = files.iter().map(|f| f.path().to_path_buf()).collect();

    let statements = parse_sql_files(&paths).unwrap();
    let names: Vec<String> = statements
        .iter()
        .filter_map(|s| match &s.statement {
            SchemaStatement::Table(t) => Some(t.name.name.clone()),
            _ => None,
        })
        .collect();
    let expected: Vec<String> = (0..12).map(|i| format!("t{}", i)).collect();
    assert_eq!(names, expected);
}

#[test]
fn test_syntax_error_names_file_and_line() {
    let file = create_sql_file(b"CREATE TABLE ok (id INT)\nGO\nCREATE TABLE (\n");
    let error = parse_sql_file(file.path()).unwrap_err();

    match error.downcast_ref::<SqlSharpenError>() {
        Some(SqlSharpenError::SqlParseError { path, line, .. }) => {
            assert_eq!(path, file.path());
            assert!(*line >= 3, "line {}", line);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

// ============================================================================
// Statement content
// ============================================================================

#[test]
fn test_table_with_named_constraints() {
    let file = create_sql_file(
        br#"CREATE TABLE [sales].[Orders]
(
    [Id] INT NOT NULL,
    [CustomerId] INT NULL,
    CONSTRAINT [PK_Orders] PRIMARY KEY CLUSTERED ([Id] ASC),
    CONSTRAINT [FK_Orders_Customers] FOREIGN KEY ([CustomerId]) REFERENCES [sales].[Customers] ([Id]),
    CONSTRAINT [CK_Orders_Id] CHECK ([Id] > 0)
)"#,
    );
    let statements = parse_sql_file(file.path()).unwrap();
    let SchemaStatement::Table(table) = &statements[0].statement else {
        panic!("expected a table");
    };

    assert_eq!(table.name.schema.as_deref(), Some("sales"));
    assert_eq!(table.columns.len(), 2);
    assert_eq!(table.columns[1].nullability, Some(true));
    assert!(matches!(
        &table.constraints[0],
        ParsedConstraint::PrimaryKey { columns, .. } if columns == &["Id"]
    ));
    assert!(matches!(
        &table.constraints[1],
        ParsedConstraint::ForeignKey { references, .. } if references.table.name == "Customers"
    ));
    assert!(matches!(&table.constraints[2], ParsedConstraint::Other { .. }));
}

#[test]
fn test_procedure_parameters_and_selects() {
    let file = create_sql_file(
        br#"CREATE PROCEDURE dbo.usp_Find
    @Name NVARCHAR(50) = NULL,
    @Rows dbo.IdList READONLY,
    @Count INT OUTPUT
AS
BEGIN
    SET NOCOUNT ON
    DECLARE @x INT = 1
    SELECT @Count = COUNT(*) FROM dbo.People
    SELECT Id, Name FROM dbo.People WHERE Name = @Name
    IF @x = 1
        SELECT 1 AS One
END
"#,
    );
    let statements = parse_sql_file(file.path()).unwrap();
    let SchemaStatement::Procedure(procedure) = &statements[0].statement else {
        panic!("expected a procedure");
    };

    assert_eq!(procedure.name.name, "usp_Find");
    let parameters: Vec<(&str, bool, bool)> = procedure
        .parameters
        .iter()
        .map(|p| (p.name.as_str(), p.is_output, p.is_readonly))
        .collect();
    assert_eq!(
        parameters,
        vec![("Name", false, false), ("Rows", false, true), ("Count", true, false)]
    );
    assert_eq!(procedure.parameters[0].default_value.as_deref(), Some("NULL"));
    assert_eq!(procedure.parameters[1].data_type.schema.as_deref(), Some("dbo"));

    // Every top-level SELECT is kept; the model decides which return rows
    assert_eq!(procedure.selects.len(), 3);
    assert!(procedure.selects.iter().all(|s| s.query.is_ok()));
    assert!(procedure.selects[0].line < procedure.selects[1].line);
}

#[test]
fn test_alias_and_table_types() {
    let file = create_sql_file(
        b"CREATE TYPE dbo.Phone FROM VARCHAR(20) NOT NULL\nGO\nCREATE TYPE dbo.IdList AS TABLE (Id INT NOT NULL)\nGO\n",
    );
    let statements = parse_sql_file(file.path()).unwrap();

    let SchemaStatement::ScalarType(phone) = &statements[0].statement else {
        panic!("expected an alias type");
    };
    assert_eq!(phone.base_type.length, Some(20));
    assert!(!phone.nullable);

    let SchemaStatement::TableType(list) = &statements[1].statement else {
        panic!("expected a table type");
    };
    assert_eq!(list.columns[0].name, "Id");
}

#[test]
fn test_irrelevant_statements_are_kept_as_other() {
    let file = create_sql_file(b"SET ANSI_NULLS ON\nGO\nGRANT SELECT ON dbo.t TO public\nGO\n");
    let statements = parse_sql_file(file.path()).unwrap();
    assert!(statements
        .iter()
        .all(|s| matches!(s.statement, SchemaStatement::Other { .. })));
}
