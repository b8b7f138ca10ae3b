//! T-SQL file parsing: batch splitting, statement dispatch and the parsed statement types

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;
use encoding_rs::WINDOWS_1252;
use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use sqlparser::ast::{
    AlterTableOperation, ColumnDef, ColumnOption, ObjectName, Query, Statement, TableConstraint,
};
use sqlparser::dialect::MsSqlDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Token;

use super::constraint_parser::parse_alter_table_add_constraint_tokens;
use super::identifier_utils::{ident_values, object_name_parts};
use super::procedure_parser::parse_procedure_tokens;
use super::table_parser::parse_create_table_tokens;
use super::table_type_parser::{parse_create_type_tokens, ParsedCreateType};
use super::token_parser_base::TokenParser;
use super::view_parser::parse_create_view_tokens;
use crate::error::SqlSharpenError;

/// A SQL batch with its content and source location
struct Batch<'a> {
    content: &'a str,
    start_line: usize, // 1-based line number
}

static ERROR_LINE_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"Line:\s*(\d+)").ok());

/// Extract line number from sqlparser error message (format: "... at Line: X, Column: Y")
fn extract_line_from_error(error_msg: &str) -> Option<usize> {
    let re = ERROR_LINE_RE.as_ref()?;
    let caps = re.captures(error_msg)?;
    caps.get(1)?.as_str().parse().ok()
}

// ============================================================================
// Parsed names and types
// ============================================================================

/// A dotted object name with up to three meaningful parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedName {
    pub database: Option<String>,
    pub schema: Option<String>,
    pub name: String,
}

impl QualifiedName {
    /// Build from unquoted parts. A four-part name drops the server part.
    pub fn from_parts(mut parts: Vec<String>) -> Option<Self> {
        if parts.is_empty() || parts.len() > 4 {
            return None;
        }
        let name = parts.pop().filter(|n| !n.is_empty())?;
        let schema = parts.pop().filter(|s| !s.is_empty());
        let database = parts.pop().filter(|d| !d.is_empty());
        Some(Self {
            database,
            schema,
            name,
        })
    }

    pub fn from_object_name(name: &ObjectName) -> Option<Self> {
        Self::from_parts(object_name_parts(name))
    }

    pub fn unqualified(name: impl Into<String>) -> Self {
        Self {
            database: None,
            schema: None,
            name: name.into(),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(database) = &self.database {
            write!(f, "[{}].", database)?;
        }
        if let Some(schema) = &self.schema {
            write!(f, "[{}].", schema)?;
        }
        write!(f, "[{}]", self.name)
    }
}

/// One parenthesized argument of a declared type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeArgument {
    Number(u32),
    Max,
}

/// A declared SQL type with its size facets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredType {
    /// Schema for user-defined types (`[dbo].[OrderLines]`)
    pub schema: Option<String>,
    pub name: String,
    /// Character/byte length; -1 for MAX
    pub length: Option<i32>,
    pub precision: Option<u8>,
    pub scale: Option<u8>,
}

impl DeclaredType {
    /// Apply SQL Server's facet rules to the raw type arguments.
    pub fn new(schema: Option<String>, name: String, arguments: &[TypeArgument]) -> Self {
        let builtin = schema
            .as_deref()
            .map_or(true, |s| s.eq_ignore_ascii_case("sys"));
        let lower = name.to_ascii_lowercase();
        let exact = builtin && matches!(lower.as_str(), "decimal" | "numeric");
        let fractional =
            builtin && matches!(lower.as_str(), "datetime2" | "time" | "datetimeoffset");

        let mut declared = Self {
            schema,
            name,
            length: None,
            precision: None,
            scale: None,
        };

        let narrow = |n: u32| u8::try_from(n).ok();
        match arguments {
            [] if exact => {
                declared.precision = Some(18);
                declared.scale = Some(0);
            }
            [] if fractional => declared.scale = Some(7),
            [] => {}
            [TypeArgument::Max, ..] => declared.length = Some(-1),
            [TypeArgument::Number(p)] if exact => {
                declared.precision = narrow(*p);
                declared.scale = Some(0);
            }
            [TypeArgument::Number(s)] if fractional => declared.scale = narrow(*s),
            [TypeArgument::Number(n)] => declared.length = i32::try_from(*n).ok(),
            [TypeArgument::Number(p), TypeArgument::Number(s), ..] => {
                declared.precision = narrow(*p);
                declared.scale = narrow(*s);
            }
            [TypeArgument::Number(n), TypeArgument::Max, ..] => {
                declared.length = i32::try_from(*n).ok()
            }
        }

        declared
    }

    /// Parse type text such as `NVARCHAR(50)` or `[dbo].[Money]`.
    pub fn parse(text: &str) -> Option<Self> {
        let mut parser = TokenParser::new(text)?;
        parser.skip_whitespace();
        parser.parse_declared_type()
    }
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

// ============================================================================
// Parsed schema objects
// ============================================================================

/// The referenced side of a foreign key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReference {
    pub table: QualifiedName,
    pub columns: Vec<String>,
}

/// A column of a table or table type
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedColumn {
    pub name: String,
    /// `None` for computed columns
    pub data_type: Option<DeclaredType>,
    /// Some(true) = explicit NULL, Some(false) = explicit NOT NULL, None = implicit
    pub nullability: Option<bool>,
    pub is_identity: bool,
    pub is_primary_key: bool,
    pub references: Option<ParsedReference>,
}

/// A table-level (or ALTER TABLE) constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedConstraint {
    PrimaryKey {
        name: Option<String>,
        columns: Vec<String>,
    },
    ForeignKey {
        name: Option<String>,
        columns: Vec<String>,
        references: ParsedReference,
    },
    /// UNIQUE, CHECK, DEFAULT, INDEX and the like
    Other { name: Option<String> },
}

/// A table or user-defined table type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTable {
    pub name: QualifiedName,
    pub columns: Vec<ParsedColumn>,
    pub constraints: Vec<ParsedConstraint>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedView {
    pub name: QualifiedName,
    /// Explicit column list (`CREATE VIEW v (a, b) AS ...`), empty when absent
    pub columns: Vec<String>,
    pub query: Box<Query>,
}

/// `CREATE TYPE name FROM base_type [NULL | NOT NULL]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedScalarType {
    pub name: QualifiedName,
    pub base_type: DeclaredType,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedParameter {
    /// Parameter name without the `@` prefix
    pub name: String,
    pub data_type: DeclaredType,
    pub is_output: bool,
    pub is_readonly: bool,
    pub default_value: Option<String>,
}

/// A top-level SELECT from a procedure body, in source order
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSelect {
    pub sql: String,
    /// 1-based line within the batch
    pub line: usize,
    /// The parsed query, or sqlparser's message when the fragment is unreadable
    pub query: std::result::Result<Box<Query>, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedProcedure {
    pub name: QualifiedName,
    pub parameters: Vec<ParsedParameter>,
    pub selects: Vec<ParsedSelect>,
}

/// Schema-relevant content of one statement
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaStatement {
    Table(ParsedTable),
    View(ParsedView),
    TableType(ParsedTable),
    ScalarType(ParsedScalarType),
    AddConstraint {
        table: QualifiedName,
        constraint: ParsedConstraint,
    },
    Procedure(ParsedProcedure),
    /// Recognised but irrelevant to the model (functions, grants, SET options, ...)
    Other { description: String },
}

/// A parsed statement with its source location
#[derive(Debug, Clone)]
pub struct ParsedStatement {
    pub statement: SchemaStatement,
    pub source_file: PathBuf,
    /// 1-based line where the statement's batch starts
    pub line: usize,
    pub sql_text: String,
}

// ============================================================================
// File and batch parsing
// ============================================================================

/// Minimum number of files to benefit from parallel processing.
/// Below this threshold, sequential processing is faster due to rayon overhead.
const PARALLEL_THRESHOLD: usize = 8;

/// Parse multiple SQL files, using parallel processing for larger file sets
pub fn parse_sql_files(files: &[PathBuf]) -> Result<Vec<ParsedStatement>> {
    let mut all_statements = Vec::with_capacity(files.len() * 2);

    if files.len() >= PARALLEL_THRESHOLD {
        let results: Vec<Result<Vec<ParsedStatement>>> =
            files.par_iter().map(|file| parse_sql_file(file)).collect();

        // Combine in file order, propagating the first error if any
        for result in results {
            all_statements.extend(result?);
        }
    } else {
        for file in files {
            all_statements.extend(parse_sql_file(file)?);
        }
    }

    Ok(all_statements)
}

/// Parse a single SQL file
pub fn parse_sql_file(path: &Path) -> Result<Vec<ParsedStatement>> {
    let content =
        read_file_with_encoding_fallback(path).map_err(|e| SqlSharpenError::SqlFileReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

    parse_sql_text(&content, path)
}

/// Parse in-memory SQL text; `source` is only used for locations in errors.
pub fn parse_sql_text(sql: &str, source: &Path) -> Result<Vec<ParsedStatement>> {
    // Strip UTF-8 BOM if present
    let content = sql.strip_prefix('\u{FEFF}').unwrap_or(sql);

    let mut statements = Vec::new();
    for batch in split_batches(content) {
        let trimmed = batch.content.trim();
        if trimmed.is_empty() {
            continue;
        }
        for statement in parse_batch(trimmed, batch.start_line, source)? {
            statements.push(ParsedStatement {
                statement,
                source_file: source.to_path_buf(),
                line: batch.start_line,
                sql_text: trimmed.to_string(),
            });
        }
    }

    Ok(statements)
}

/// Read a file as a string, trying UTF-8 first, then Windows-1252 as fallback
fn read_file_with_encoding_fallback(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, had_errors) = WINDOWS_1252.decode(&bytes);
            if had_errors {
                Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "File contains invalid characters",
                ))
            } else {
                Ok(decoded.into_owned())
            }
        }
    }
}

/// Leading statement forms that bypass sqlparser entirely
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchKind {
    Procedure,
    CreateType,
    General,
}

/// Classify a batch by its first significant words.
fn classify_batch(sql: &str) -> BatchKind {
    let Some(mut parser) = TokenParser::new(sql) else {
        return BatchKind::General;
    };

    let mut words = Vec::with_capacity(4);
    while words.len() < 4 {
        parser.skip_whitespace();
        match parser.current_token().map(|t| &t.token) {
            Some(Token::Word(w)) => words.push(w.value.to_ascii_uppercase()),
            _ => break,
        }
        parser.advance();
    }

    let is_proc = |w: Option<&String>| matches!(w.map(String::as_str), Some("PROC" | "PROCEDURE"));
    match words.first().map(String::as_str) {
        Some("CREATE") if words.get(1).map(String::as_str) == Some("OR") => {
            if is_proc(words.get(3)) {
                BatchKind::Procedure
            } else {
                BatchKind::General
            }
        }
        Some("CREATE") if is_proc(words.get(1)) => BatchKind::Procedure,
        Some("CREATE") if words.get(1).map(String::as_str) == Some("TYPE") => {
            BatchKind::CreateType
        }
        Some("ALTER") if is_proc(words.get(1)) => BatchKind::Procedure,
        _ => BatchKind::General,
    }
}

/// Parse one GO-delimited batch into schema statements.
fn parse_batch(sql: &str, start_line: usize, path: &Path) -> Result<Vec<SchemaStatement>> {
    let parse_error = |line: usize, message: String| SqlSharpenError::SqlParseError {
        path: path.to_path_buf(),
        line: start_line + line.max(1) - 1,
        message,
    };

    match classify_batch(sql) {
        BatchKind::Procedure => {
            let procedure = parse_procedure_tokens(sql)
                .ok_or_else(|| parse_error(1, "unrecognised procedure header".to_string()))?;
            return Ok(vec![SchemaStatement::Procedure(procedure)]);
        }
        BatchKind::CreateType => {
            let statement = match parse_create_type_tokens(sql) {
                Some(ParsedCreateType::Table(table)) => SchemaStatement::TableType(table),
                Some(ParsedCreateType::Scalar(scalar)) => SchemaStatement::ScalarType(scalar),
                None => return Err(parse_error(1, "unrecognised CREATE TYPE".to_string()).into()),
            };
            return Ok(vec![statement]);
        }
        BatchKind::General => {}
    }

    let dialect = MsSqlDialect {};
    match Parser::parse_sql(&dialect, sql) {
        Ok(parsed) => Ok(parsed.into_iter().flat_map(convert_statement).collect()),
        Err(e) => {
            // sqlparser's T-SQL coverage is partial, so try the token parsers
            if let Some(fallback) = try_fallback_parse(sql) {
                return Ok(fallback);
            }
            let error_msg = e.to_string();
            let relative_line = extract_line_from_error(&error_msg).unwrap_or(1);
            Err(parse_error(relative_line, error_msg).into())
        }
    }
}

/// Convert a sqlparser statement into the schema statements it carries.
fn convert_statement(statement: Statement) -> Vec<SchemaStatement> {
    match statement {
        Statement::CreateTable(create_table) => {
            let Some(name) = QualifiedName::from_object_name(&create_table.name) else {
                return Vec::new();
            };
            let columns = create_table.columns.iter().map(column_from_def).collect();
            let constraints = create_table
                .constraints
                .iter()
                .map(constraint_from_table_constraint)
                .collect();
            vec![SchemaStatement::Table(ParsedTable {
                name,
                columns,
                constraints,
            })]
        }
        Statement::CreateView {
            name,
            columns,
            query,
            ..
        } => {
            let Some(name) = QualifiedName::from_object_name(&name) else {
                return Vec::new();
            };
            vec![SchemaStatement::View(ParsedView {
                name,
                columns: columns.iter().map(|c| c.name.value.clone()).collect(),
                query,
            })]
        }
        Statement::AlterTable {
            name, operations, ..
        } => {
            let Some(table) = QualifiedName::from_object_name(&name) else {
                return Vec::new();
            };
            operations
                .iter()
                .filter_map(|op| match op {
                    AlterTableOperation::AddConstraint(constraint) => {
                        Some(SchemaStatement::AddConstraint {
                            table: table.clone(),
                            constraint: constraint_from_table_constraint(constraint),
                        })
                    }
                    _ => None,
                })
                .collect()
        }
        other => vec![SchemaStatement::Other {
            description: statement_description(&other),
        }],
    }
}

/// First few words of a statement, for diagnostics.
fn statement_description(statement: &Statement) -> String {
    statement
        .to_string()
        .split_whitespace()
        .take(3)
        .collect::<Vec<_>>()
        .join(" ")
}

fn column_from_def(col: &ColumnDef) -> ParsedColumn {
    let mut column = ParsedColumn {
        name: col.name.value.clone(),
        data_type: DeclaredType::parse(&col.data_type.to_string()),
        ..Default::default()
    };

    for option in &col.options {
        match &option.option {
            ColumnOption::NotNull => column.nullability = Some(false),
            ColumnOption::Null => column.nullability = Some(true),
            ColumnOption::Identity(_) => column.is_identity = true,
            ColumnOption::Unique { is_primary, .. } if *is_primary => column.is_primary_key = true,
            ColumnOption::ForeignKey {
                foreign_table,
                referred_columns,
                ..
            } => {
                column.references =
                    QualifiedName::from_object_name(foreign_table).map(|table| ParsedReference {
                        table,
                        columns: ident_values(referred_columns),
                    });
            }
            _ => {}
        }
    }

    column
}

fn constraint_from_table_constraint(constraint: &TableConstraint) -> ParsedConstraint {
    match constraint {
        TableConstraint::PrimaryKey { name, columns, .. } => ParsedConstraint::PrimaryKey {
            name: name.as_ref().map(|n| n.value.clone()),
            columns: ident_values(columns),
        },
        TableConstraint::ForeignKey {
            name,
            columns,
            foreign_table,
            referred_columns,
            ..
        } => match QualifiedName::from_object_name(foreign_table) {
            Some(table) => ParsedConstraint::ForeignKey {
                name: name.as_ref().map(|n| n.value.clone()),
                columns: ident_values(columns),
                references: ParsedReference {
                    table,
                    columns: ident_values(referred_columns),
                },
            },
            None => ParsedConstraint::Other {
                name: name.as_ref().map(|n| n.value.clone()),
            },
        },
        TableConstraint::Unique { name, .. } | TableConstraint::Check { name, .. } => {
            ParsedConstraint::Other {
                name: name.as_ref().map(|n| n.value.clone()),
            }
        }
        _ => ParsedConstraint::Other { name: None },
    }
}

/// Statements with no model content that may fail sqlparser, keyed by first word
const IGNORED_LEADING_WORDS: &[&str] = &[
    "CREATE", "ALTER", "DROP", "GRANT", "DENY", "REVOKE", "SET", "PRINT", "EXEC", "EXECUTE",
    "USE", "INSERT", "UPDATE", "DELETE", "MERGE", "IF", "DECLARE", "BEGIN", "ENABLE", "DISABLE",
    "SETUSER", "RAISERROR", "THROW", "TRUNCATE",
];

/// Token-based fallback for statements sqlparser rejects.
fn try_fallback_parse(sql: &str) -> Option<Vec<SchemaStatement>> {
    let mut parser = TokenParser::new(sql)?;
    let mut words = Vec::with_capacity(4);
    while words.len() < 4 {
        parser.skip_whitespace();
        match parser.current_token().map(|t| &t.token) {
            Some(Token::Word(w)) => words.push(w.value.to_ascii_uppercase()),
            _ => break,
        }
        parser.advance();
    }
    let word = |i: usize| words.get(i).map(String::as_str);

    match (word(0), word(1)) {
        (Some("CREATE"), Some("TABLE")) => {
            return parse_create_table_tokens(sql).map(|t| vec![SchemaStatement::Table(t)]);
        }
        (Some("CREATE"), Some("VIEW")) => {
            return parse_create_view_tokens(sql).map(|v| vec![SchemaStatement::View(v)]);
        }
        (Some("CREATE"), Some("OR")) if word(3) == Some("VIEW") => {
            return parse_create_view_tokens(sql).map(|v| vec![SchemaStatement::View(v)]);
        }
        (Some("ALTER"), Some("TABLE")) => {
            if let Some((table, constraints)) = parse_alter_table_add_constraint_tokens(sql) {
                return Some(
                    constraints
                        .into_iter()
                        .map(|constraint| SchemaStatement::AddConstraint {
                            table: table.clone(),
                            constraint,
                        })
                        .collect(),
                );
            }
        }
        _ => {}
    }

    let first = word(0)?;
    IGNORED_LEADING_WORDS.contains(&first).then(|| {
        vec![SchemaStatement::Other {
            description: words.iter().take(3).cloned().collect::<Vec<_>>().join(" "),
        }]
    })
}

/// Split SQL content into batches by GO statement, tracking line numbers
fn split_batches(content: &str) -> Vec<Batch<'_>> {
    let mut batches = Vec::new();
    let mut current_pos = 0;
    let mut batch_start = 0;
    let mut current_line = 1; // 1-based line numbers
    let mut batch_start_line = 1;

    for line in content.lines() {
        // Actual line length in the original content, including the line ending
        let line_end = current_pos + line.len();
        let next_pos = if content[line_end..].starts_with("\r\n") {
            line_end + 2
        } else if content[line_end..].starts_with('\n') {
            line_end + 1
        } else {
            line_end
        };

        if is_batch_separator(line) {
            if current_pos > batch_start {
                batches.push(Batch {
                    content: &content[batch_start..current_pos],
                    start_line: batch_start_line,
                });
            }
            batch_start = next_pos;
            batch_start_line = current_line + 1;
        }

        current_pos = next_pos;
        current_line += 1;
    }

    if batch_start < content.len() {
        batches.push(Batch {
            content: &content[batch_start..],
            start_line: batch_start_line,
        });
    }

    batches
}

/// `GO`, `GO;`, `GO 5` or `GO -- comment` on a line of its own
fn is_batch_separator(line: &str) -> bool {
    let trimmed = line.trim();
    let Some(rest) = trimmed.get(..2) else {
        return false;
    };
    if !rest.eq_ignore_ascii_case("go") {
        return false;
    }
    let tail = trimmed[2..].trim_start();
    tail.is_empty()
        || tail == ";"
        || tail.starts_with("--")
        || (trimmed.len() > 2
            && trimmed[2..].starts_with(char::is_whitespace)
            && tail.chars().all(|c| c.is_ascii_digit()))
}
