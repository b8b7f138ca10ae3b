//! Token-based column definition parsing for T-SQL
//!
//! ## Supported Syntax
//!
//! Regular columns:
//! ```sql
//! [Name] TYPE [COLLATE name] [IDENTITY(seed, increment)] [NOT NULL|NULL]
//!     [CONSTRAINT name DEFAULT (value)] [CHECK (expr)]
//!     [PRIMARY KEY [CLUSTERED|NONCLUSTERED]] [UNIQUE]
//!     [[FOREIGN KEY] REFERENCES [schema].[table] ([column])]
//! ```
//!
//! Computed columns:
//! ```sql
//! [Name] AS (expression) [PERSISTED] [NOT NULL]
//! ```

use sqlparser::keywords::Keyword;
use sqlparser::tokenizer::Token;

use super::token_parser_base::TokenParser;
use super::tsql_parser::{ParsedColumn, ParsedReference};

/// Token-based column definition parser
pub struct ColumnTokenParser {
    base: TokenParser,
}

impl ColumnTokenParser {
    pub fn new(col_def: &str) -> Option<Self> {
        Some(Self {
            base: TokenParser::new(col_def)?,
        })
    }

    /// Parse the column definition and return the result
    pub fn parse(&mut self) -> Option<ParsedColumn> {
        self.base.skip_whitespace();
        if self.base.is_at_end() {
            return None;
        }

        let name = self.base.parse_identifier()?;
        self.base.skip_whitespace();

        // Computed column: [Name] AS (expression)
        if self.base.check_keyword(Keyword::AS) {
            return self.parse_computed_column(name);
        }

        let data_type = self.base.parse_declared_type()?;
        let mut result = ParsedColumn {
            name,
            data_type: Some(data_type),
            ..Default::default()
        };

        self.parse_column_modifiers(&mut result);

        Some(result)
    }

    /// Parse a computed column: [Name] AS (expression) [PERSISTED] [NOT NULL]
    fn parse_computed_column(&mut self, name: String) -> Option<ParsedColumn> {
        self.base.expect_keyword(Keyword::AS)?;
        self.base.skip_whitespace();
        if !self.base.check_token(&Token::LParen) {
            return None;
        }
        self.base.skip_parenthesized();

        let mut result = ParsedColumn {
            name,
            ..Default::default()
        };
        self.parse_column_modifiers(&mut result);
        Some(result)
    }

    /// Parse column modifiers in any order
    fn parse_column_modifiers(&mut self, result: &mut ParsedColumn) {
        loop {
            self.base.skip_whitespace();
            if self.base.is_at_end() {
                break;
            }

            if self.base.check_keyword(Keyword::IDENTITY) {
                self.base.advance();
                result.is_identity = true;
                self.skip_optional_arguments();
                continue;
            }

            if self.base.check_keyword(Keyword::NOT) {
                self.base.advance();
                self.base.skip_whitespace();
                if self.base.expect_keyword(Keyword::NULL).is_some() {
                    result.nullability = Some(false);
                }
                continue;
            }

            if self.base.check_keyword(Keyword::NULL) {
                self.base.advance();
                if result.nullability.is_none() {
                    result.nullability = Some(true);
                }
                continue;
            }

            // CONSTRAINT [name] only names what follows
            if self.base.check_keyword(Keyword::CONSTRAINT) {
                self.base.advance();
                self.base.skip_whitespace();
                self.base.parse_identifier();
                continue;
            }

            if self.base.check_keyword(Keyword::DEFAULT) {
                self.base.advance();
                self.skip_default_value();
                continue;
            }

            if self.base.check_keyword(Keyword::CHECK) {
                self.base.advance();
                self.skip_optional_arguments();
                continue;
            }

            if self.base.check_keyword(Keyword::COLLATE) {
                self.base.advance();
                self.base.skip_whitespace();
                self.base.parse_identifier();
                continue;
            }

            if self.base.check_keyword(Keyword::PRIMARY) {
                self.base.advance();
                self.base.skip_whitespace();
                self.base.expect_keyword(Keyword::KEY);
                result.is_primary_key = true;
                self.skip_clustering();
                continue;
            }

            if self.base.check_keyword(Keyword::UNIQUE) {
                self.base.advance();
                self.skip_clustering();
                continue;
            }

            if self.base.check_keyword(Keyword::FOREIGN) {
                self.base.advance();
                self.base.skip_whitespace();
                self.base.expect_keyword(Keyword::KEY);
                continue;
            }

            if self.base.check_keyword(Keyword::REFERENCES) {
                self.base.advance();
                result.references = self.parse_reference();
                continue;
            }

            // ON DELETE / ON UPDATE actions of an inline reference
            if self.base.check_keyword(Keyword::ON) {
                self.base.advance();
                self.skip_referential_action();
                continue;
            }

            if self.base.check_keyword(Keyword::WITH) {
                self.base.advance();
                self.skip_optional_arguments();
                continue;
            }

            // ROWGUIDCOL, SPARSE, FILESTREAM, PERSISTED, HIDDEN, GENERATED ALWAYS AS ROW START ...
            if matches!(self.base.current_token().map(|t| &t.token), Some(Token::Word(_))) {
                self.base.advance();
                continue;
            }

            // Unknown token - stop to avoid misreading
            break;
        }
    }

    /// `REFERENCES [schema].[table] [(col, ...)]`
    fn parse_reference(&mut self) -> Option<ParsedReference> {
        self.base.skip_whitespace();
        let table = self.base.parse_qualified_name()?;
        self.base.skip_whitespace();
        let columns = if self.base.check_token(&Token::LParen) {
            self.base.parse_identifier_list()?
        } else {
            Vec::new()
        };
        Some(ParsedReference { table, columns })
    }

    /// `DELETE|UPDATE CASCADE | NO ACTION | SET NULL | SET DEFAULT`
    fn skip_referential_action(&mut self) {
        self.base.skip_whitespace();
        if self.base.check_keyword(Keyword::DELETE) || self.base.check_keyword(Keyword::UPDATE) {
            self.base.advance();
            self.base.skip_whitespace();
        }
        if self.base.expect_keyword(Keyword::NO).is_some()
            || self.base.expect_keyword(Keyword::SET).is_some()
        {
            self.base.skip_whitespace();
        }
        self.base.advance();
    }

    fn skip_clustering(&mut self) {
        self.base.skip_whitespace();
        if self.base.check_keyword(Keyword::CLUSTERED) || self.base.check_word_ci("NONCLUSTERED") {
            self.base.advance();
        }
        self.skip_optional_arguments();
    }

    fn skip_optional_arguments(&mut self) {
        self.base.skip_whitespace();
        if self.base.check_token(&Token::LParen) {
            self.base.skip_parenthesized();
        }
    }

    /// Skip a DEFAULT expression: a parenthesized expression, `NULL`, a literal or a call.
    fn skip_default_value(&mut self) {
        self.base.skip_whitespace();
        if self.base.check_token(&Token::LParen) {
            self.base.skip_parenthesized();
            return;
        }
        if self.base.check_token(&Token::Minus) || self.base.check_token(&Token::Plus) {
            self.base.advance();
            self.base.skip_whitespace();
        }
        self.base.advance();
        // Function call without outer parentheses: DEFAULT getdate()
        self.skip_optional_arguments();
    }
}

/// Parse one column definition from a table or table type body.
pub fn parse_column_definition_tokens(col_def: &str) -> Option<ParsedColumn> {
    ColumnTokenParser::new(col_def)?.parse()
}
