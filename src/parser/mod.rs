//! T-SQL parsing

mod body_parser;
mod column_parser;
mod constraint_parser;
pub mod identifier_utils;
mod procedure_parser;
mod table_parser;
mod table_type_parser;
mod token_parser_base;
mod tsql_parser;
mod view_parser;

pub use body_parser::{split_body_statements, BodyStatement, StatementKind};
pub use token_parser_base::TokenParser;
pub use tsql_parser::{
    parse_sql_file, parse_sql_files, parse_sql_text, DeclaredType, ParsedColumn,
    ParsedConstraint, ParsedParameter, ParsedProcedure, ParsedReference, ParsedScalarType,
    ParsedSelect, ParsedStatement, ParsedTable, ParsedView, QualifiedName, SchemaStatement,
    TypeArgument,
};
pub use view_parser::parse_query_text;
