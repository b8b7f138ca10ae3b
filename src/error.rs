//! Error types for sql-sharpen

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading a schema and building code plans
#[derive(Error, Debug)]
pub enum SqlSharpenError {
    #[error("Failed to read project file: {path}")]
    ProjectReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse project file: {path}")]
    ProjectParseError {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },

    #[error("SQL path does not exist: {path}")]
    SqlPathNotFound { path: PathBuf },

    #[error("Failed to read SQL file: {path}")]
    SqlFileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("SQL parse error in {path} at line {line}: {message}")]
    SqlParseError {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Column {object}.{column} has type '{data_type}' which is not in the type catalog")]
    UnknownColumnType {
        object: String,
        column: String,
        data_type: String,
    },

    #[error("Schema object {object} is defined more than once")]
    DuplicateObject { object: String },

    #[error("Column {column} is defined more than once in {object}")]
    DuplicateColumn { object: String, column: String },

    #[error("Views reference each other in a cycle: {chain}")]
    ViewCycle { chain: String },

    #[error("Failed to resolve the columns of view {view}")]
    ViewResolution {
        view: String,
        #[source]
        source: ResolveError,
    },

    #[error("Failed to resolve select #{select} of procedure {procedure}")]
    ProcedureResolution {
        procedure: String,
        select: usize,
        #[source]
        source: ResolveError,
    },

    #[error("Failed to write output to {path}")]
    OutputWriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures while resolving a single select against the schema.
///
/// These are scoped: a view wraps them in [`SqlSharpenError::ViewResolution`],
/// a procedure in [`SqlSharpenError::ProcedureResolution`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("alias '{alias}' is used by more than one source")]
    AliasCollision { alias: String },

    #[error("column '{column}' does not match any column of the selected sources")]
    UnresolvedColumn { column: String },

    #[error("column '{column}' is ambiguous between {candidates}")]
    AmbiguousColumn { column: String, candidates: String },

    #[error("'{qualifier}' in '{column}' does not name a source of this select")]
    UnknownQualifier { qualifier: String, column: String },

    #[error("'{wildcard}' cannot be expanded because the source has no known columns")]
    UnexpandableWildcard { wildcard: String },

    #[error("select could not be parsed: {message}")]
    MalformedSelect { message: String },
}
