//! Token-based user-defined type parsing for T-SQL
//!
//! ## Supported Syntax
//!
//! ```sql
//! CREATE TYPE [schema].[name] AS TABLE (
//!     [Col1] INT NOT NULL,
//!     [Col2] NVARCHAR(50) DEFAULT 'value',
//!     PRIMARY KEY CLUSTERED ([Col1]),
//!     INDEX [IX_Name] NONCLUSTERED ([Col2])
//! ) [WITH (MEMORY_OPTIMIZED = ON)]
//!
//! CREATE TYPE [schema].[name] FROM base_type [NULL | NOT NULL]
//! ```

use sqlparser::keywords::Keyword;

use super::table_parser::{parse_table_elements, split_table_body};
use super::token_parser_base::TokenParser;
use super::tsql_parser::{ParsedScalarType, ParsedTable};

/// Either form of `CREATE TYPE`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCreateType {
    Table(ParsedTable),
    Scalar(ParsedScalarType),
}

/// Token-based CREATE TYPE parser
pub struct TableTypeTokenParser {
    base: TokenParser,
}

impl TableTypeTokenParser {
    pub fn new(sql: &str) -> Option<Self> {
        Some(Self {
            base: TokenParser::new(sql)?,
        })
    }

    pub fn parse_create_type(&mut self) -> Option<ParsedCreateType> {
        self.base.skip_whitespace();
        self.base.expect_keyword(Keyword::CREATE)?;
        self.base.skip_whitespace();
        self.base.expect_keyword(Keyword::TYPE)?;
        self.base.skip_whitespace();

        let name = self.base.parse_qualified_name()?;
        self.base.skip_whitespace();

        if self.base.expect_keyword(Keyword::AS).is_some() {
            self.base.skip_whitespace();
            self.base.expect_keyword(Keyword::TABLE)?;
            self.base.skip_whitespace();

            let elements = split_table_body(&mut self.base)?;
            let (columns, constraints) = parse_table_elements(&elements)?;
            return Some(ParsedCreateType::Table(ParsedTable {
                name,
                columns,
                constraints,
            }));
        }

        self.base.expect_keyword(Keyword::FROM)?;
        self.base.skip_whitespace();
        let base_type = self.base.parse_declared_type()?;
        self.base.skip_whitespace();

        // Alias types allow NULL unless declared otherwise
        let nullable = if self.base.expect_keyword(Keyword::NOT).is_some() {
            self.base.skip_whitespace();
            self.base.expect_keyword(Keyword::NULL)?;
            false
        } else {
            true
        };

        Some(ParsedCreateType::Scalar(ParsedScalarType {
            name,
            base_type,
            nullable,
        }))
    }
}

/// Parse CREATE TYPE (table or alias form) using tokens
pub fn parse_create_type_tokens(sql: &str) -> Option<ParsedCreateType> {
    TableTypeTokenParser::new(sql)?.parse_create_type()
}
