//! Token-based CREATE TABLE parsing, used when sqlparser rejects a table definition
//!
//! ```sql
//! CREATE TABLE [schema].[name] (
//!     column_definition | table_constraint [, ...]
//! ) [ON [filegroup]] [WITH (...)]
//! ```
//!
//! The element splitter is shared with `CREATE TYPE ... AS TABLE`.

use sqlparser::keywords::Keyword;
use sqlparser::tokenizer::Token;

use super::column_parser::parse_column_definition_tokens;
use super::constraint_parser::parse_table_constraint_tokens;
use super::token_parser_base::TokenParser;
use super::tsql_parser::{ParsedColumn, ParsedConstraint, ParsedTable};

/// Words that start a table-level constraint rather than a column
const CONSTRAINT_STARTERS: &[&str] = &[
    "CONSTRAINT",
    "PRIMARY",
    "FOREIGN",
    "UNIQUE",
    "CHECK",
    "INDEX",
    "PERIOD",
];

pub struct TableTokenParser {
    base: TokenParser,
}

impl TableTokenParser {
    pub fn new(sql: &str) -> Option<Self> {
        Some(Self {
            base: TokenParser::new(sql)?,
        })
    }

    pub fn parse_create_table(&mut self) -> Option<ParsedTable> {
        self.base.skip_whitespace();
        self.base.expect_keyword(Keyword::CREATE)?;
        self.base.skip_whitespace();
        self.base.expect_keyword(Keyword::TABLE)?;
        self.base.skip_whitespace();

        let name = self.base.parse_qualified_name()?;
        self.base.skip_whitespace();

        let elements = split_table_body(&mut self.base)?;
        let (columns, constraints) = parse_table_elements(&elements)?;

        Some(ParsedTable {
            name,
            columns,
            constraints,
        })
    }
}

/// Split a parenthesized table body into its top-level elements.
///
/// Position must be at the opening parenthesis; afterwards it is past the closing one.
pub fn split_table_body(base: &mut TokenParser) -> Option<Vec<String>> {
    base.expect_token(&Token::LParen)?;

    let mut elements = Vec::new();
    let mut element_start = base.pos();
    let mut depth = 0usize;

    while let Some(token) = base.current_token() {
        match token.token {
            Token::LParen => depth += 1,
            Token::RParen if depth == 0 => {
                let element = base.tokens_to_sql(element_start, base.pos());
                if !element.is_empty() {
                    elements.push(element);
                }
                base.advance();
                return Some(elements);
            }
            Token::RParen => depth -= 1,
            Token::Comma if depth == 0 => {
                elements.push(base.tokens_to_sql(element_start, base.pos()));
                element_start = base.pos() + 1;
            }
            _ => {}
        }
        base.advance();
    }

    // Unbalanced parentheses
    None
}

/// Parse split table elements into columns and constraints.
///
/// Fails if any element is neither a column nor a recognised constraint.
pub fn parse_table_elements(
    elements: &[String],
) -> Option<(Vec<ParsedColumn>, Vec<ParsedConstraint>)> {
    let mut columns = Vec::new();
    let mut constraints = Vec::new();

    for element in elements {
        if starts_with_constraint(element) {
            constraints.push(parse_table_constraint_tokens(element)?);
        } else {
            columns.push(parse_column_definition_tokens(element)?);
        }
    }

    Some((columns, constraints))
}

fn starts_with_constraint(element: &str) -> bool {
    let Some(mut parser) = TokenParser::new(element) else {
        return false;
    };
    parser.skip_whitespace();
    CONSTRAINT_STARTERS.iter().any(|w| parser.check_word_ci(w))
}

/// Parse CREATE TABLE using tokens
pub fn parse_create_table_tokens(sql: &str) -> Option<ParsedTable> {
    TableTokenParser::new(sql)?.parse_create_table()
}
