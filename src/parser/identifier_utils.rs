//! Identifier handling utilities for T-SQL parsing.
//!
//! ```ignore
//! assert_eq!(normalize_identifier("[MyTable]"), "MyTable");
//! assert_eq!(strip_variable_sigil("@CustomerId"), "CustomerId");
//! assert_eq!(identifier_key("[Sales].[Orders]"), "sales.orders");
//! ```

use sqlparser::ast::{Ident, ObjectName};
use sqlparser::tokenizer::{Token, Word};

/// Strips brackets `[]` and double quotes `""` from an identifier.
pub fn normalize_identifier(ident: &str) -> String {
    ident
        .trim()
        .trim_matches(|c| c == '[' || c == ']' || c == '"')
        .to_string()
}

/// Strips the leading `@` from a parameter or variable name.
pub fn strip_variable_sigil(name: &str) -> &str {
    name.strip_prefix('@').unwrap_or(name)
}

/// Whether an identifier names a local variable or parameter (`@x`).
pub fn is_variable(name: &str) -> bool {
    name.starts_with('@') && !name.starts_with("@@")
}

/// Case-insensitive lookup key for a possibly bracketed, dotted name.
///
/// SQL Server identifiers compare case-insensitively under the default collation.
pub fn identifier_key(name: &str) -> String {
    name.split('.')
        .map(normalize_identifier)
        .collect::<Vec<_>>()
        .join(".")
        .to_lowercase()
}

/// Unquoted values of every part of an `ObjectName`.
pub fn object_name_parts(name: &ObjectName) -> Vec<String> {
    name.0.iter().map(|i| i.value.clone()).collect()
}

/// Unquoted value of an identifier list (used for constraint column lists).
pub fn ident_values(idents: &[Ident]) -> Vec<String> {
    idents.iter().map(|i| i.value.clone()).collect()
}

/// Converts a Word token to text, keeping its original quoting.
pub fn format_word(word: &Word) -> String {
    match word.quote_style {
        Some('[') => format!("[{}]", word.value.replace(']', "]]")),
        Some('"') => format!("\"{}\"", word.value),
        _ => word.value.clone(),
    }
}

/// Converts a token back to SQL text that can be re-parsed.
///
/// String literals have embedded single quotes doubled.
pub fn format_token_sql(token: &Token) -> String {
    match token {
        Token::Word(w) => format_word(w),
        Token::Number(n, _) => n.clone(),
        Token::SingleQuotedString(s) => format!("'{}'", s.replace('\'', "''")),
        Token::NationalStringLiteral(s) => format!("N'{}'", s.replace('\'', "''")),
        Token::DoubleQuotedString(s) => format!("\"{}\"", s),
        Token::HexStringLiteral(s) => format!("0x{}", s),
        Token::Whitespace(ws) => ws.to_string(),
        _ => token.to_string(),
    }
}
