//! Token-based constraint parsing for T-SQL
//!
//! ## Supported Syntax
//!
//! ALTER TABLE constraints:
//! ```sql
//! ALTER TABLE [schema].[table] [WITH CHECK | WITH NOCHECK] ADD CONSTRAINT [name] PRIMARY KEY (columns)
//! ALTER TABLE [schema].[table] ADD CONSTRAINT [name] FOREIGN KEY (columns) REFERENCES [table](columns)
//! ```
//!
//! Table-level constraints:
//! ```sql
//! CONSTRAINT [name] PRIMARY KEY CLUSTERED ([Col1], [Col2] DESC)
//! CONSTRAINT [name] FOREIGN KEY ([Col]) REFERENCES [Table]([Col]) ON DELETE CASCADE
//! PRIMARY KEY ([Col1])  -- unnamed
//! UNIQUE / CHECK / DEFAULT ... FOR / INDEX  -- recognised, carry no keys
//! ```

use sqlparser::keywords::Keyword;
use sqlparser::tokenizer::Token;

use super::token_parser_base::TokenParser;
use super::tsql_parser::{ParsedConstraint, ParsedReference, QualifiedName};

/// Token-based constraint parser
pub struct ConstraintTokenParser {
    base: TokenParser,
}

impl ConstraintTokenParser {
    pub fn new(sql: &str) -> Option<Self> {
        Some(Self {
            base: TokenParser::new(sql)?,
        })
    }

    /// Parse `ALTER TABLE ... ADD constraint [, constraint ...]`
    pub fn parse_alter_table_add_constraint(
        &mut self,
    ) -> Option<(QualifiedName, Vec<ParsedConstraint>)> {
        self.base.skip_whitespace();
        self.base.expect_keyword(Keyword::ALTER)?;
        self.base.skip_whitespace();
        self.base.expect_keyword(Keyword::TABLE)?;
        self.base.skip_whitespace();

        let table = self.base.parse_qualified_name()?;
        self.base.skip_whitespace();

        // WITH CHECK | WITH NOCHECK
        if self.base.expect_keyword(Keyword::WITH).is_some() {
            self.base.skip_whitespace();
            if self.base.check_keyword(Keyword::CHECK) || self.base.check_word_ci("NOCHECK") {
                self.base.advance();
                self.base.skip_whitespace();
            }
        }

        self.base.expect_keyword(Keyword::ADD)?;

        let mut constraints = Vec::new();
        loop {
            constraints.push(self.parse_constraint()?);
            self.base.skip_whitespace();
            if self.base.expect_token(&Token::Comma).is_none() {
                break;
            }
        }

        Some((table, constraints))
    }

    /// Parse one constraint at the current position.
    ///
    /// Stops at the next top-level comma (not consumed).
    pub fn parse_constraint(&mut self) -> Option<ParsedConstraint> {
        self.base.skip_whitespace();

        let name = if self.base.expect_keyword(Keyword::CONSTRAINT).is_some() {
            self.base.skip_whitespace();
            let name = self.base.parse_identifier()?;
            self.base.skip_whitespace();
            Some(name)
        } else {
            None
        };

        let constraint = if self.base.check_keyword(Keyword::PRIMARY) {
            self.parse_primary_key(name)?
        } else if self.base.check_keyword(Keyword::FOREIGN) {
            self.parse_foreign_key(name)?
        } else if self.base.check_keyword(Keyword::UNIQUE)
            || self.base.check_keyword(Keyword::CHECK)
            || self.base.check_keyword(Keyword::DEFAULT)
            || self.base.check_keyword(Keyword::INDEX)
            || self.base.check_word_ci("PERIOD")
        {
            ParsedConstraint::Other { name }
        } else {
            return None;
        };

        // Options after the key list: WITH (...), ON [PRIMARY], ON DELETE ...
        self.base.skip_to_list_delimiter();
        Some(constraint)
    }

    /// `PRIMARY KEY [CLUSTERED | NONCLUSTERED] (columns)`
    fn parse_primary_key(&mut self, name: Option<String>) -> Option<ParsedConstraint> {
        self.base.expect_keyword(Keyword::PRIMARY)?;
        self.base.skip_whitespace();
        self.base.expect_keyword(Keyword::KEY)?;
        self.base.skip_whitespace();

        if self.base.check_keyword(Keyword::CLUSTERED) || self.base.check_word_ci("NONCLUSTERED") {
            self.base.advance();
            self.base.skip_whitespace();
        }

        let columns = self.base.parse_identifier_list()?;
        Some(ParsedConstraint::PrimaryKey { name, columns })
    }

    /// `FOREIGN KEY (columns) REFERENCES [schema].[table] [(columns)]`
    fn parse_foreign_key(&mut self, name: Option<String>) -> Option<ParsedConstraint> {
        self.base.expect_keyword(Keyword::FOREIGN)?;
        self.base.skip_whitespace();
        self.base.expect_keyword(Keyword::KEY)?;
        self.base.skip_whitespace();

        let columns = self.base.parse_identifier_list()?;
        self.base.skip_whitespace();
        self.base.expect_keyword(Keyword::REFERENCES)?;
        self.base.skip_whitespace();

        let table = self.base.parse_qualified_name()?;
        self.base.skip_whitespace();

        // An omitted list references the target's primary key by position
        let referenced_columns = if self.base.check_token(&Token::LParen) {
            self.base.parse_identifier_list()?
        } else {
            Vec::new()
        };

        Some(ParsedConstraint::ForeignKey {
            name,
            columns,
            references: ParsedReference {
                table,
                columns: referenced_columns,
            },
        })
    }
}

/// Parse ALTER TABLE ... ADD CONSTRAINT using tokens
pub fn parse_alter_table_add_constraint_tokens(
    sql: &str,
) -> Option<(QualifiedName, Vec<ParsedConstraint>)> {
    ConstraintTokenParser::new(sql)?.parse_alter_table_add_constraint()
}

/// Parse a table-level constraint element using tokens
pub fn parse_table_constraint_tokens(sql: &str) -> Option<ParsedConstraint> {
    ConstraintTokenParser::new(sql)?.parse_constraint()
}
