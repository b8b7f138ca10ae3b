//! Token-based procedure definition parsing for T-SQL
//!
//! ## Supported Syntax
//!
//! ```sql
//! CREATE [OR ALTER] PROC[EDURE] [schema].[name] [;number]
//!     [(] @param [AS] type [VARYING] [= default] [READONLY] [OUT[PUT]] [, ...] [)]
//!     [WITH RECOMPILE | ENCRYPTION | EXECUTE AS principal | NATIVE_COMPILATION | SCHEMABINDING [, ...]]
//!     [FOR REPLICATION]
//! AS
//!     body
//!
//! ALTER PROC[EDURE] ...
//! ```
//!
//! The body is cut into statements by the body splitter; each top-level
//! SELECT (including CTE-prefixed ones) is parsed as a query.

use sqlparser::keywords::Keyword;
use sqlparser::tokenizer::Token;

use super::body_parser::{split_body_statements, StatementKind};
use super::identifier_utils::strip_variable_sigil;
use super::token_parser_base::TokenParser;
use super::tsql_parser::{ParsedParameter, ParsedProcedure, ParsedSelect, QualifiedName};
use super::view_parser::parse_query_text;

/// Token-based procedure definition parser
pub struct ProcedureTokenParser {
    base: TokenParser,
}

impl ProcedureTokenParser {
    pub fn new(sql: &str) -> Option<Self> {
        Some(Self {
            base: TokenParser::new(sql)?,
        })
    }

    /// Parse the full procedure: header, parameters and body selects
    pub fn parse_procedure(&mut self) -> Option<ParsedProcedure> {
        let name = self.parse_header()?;
        let parameters = self.parse_parameters()?;
        self.skip_procedure_options()?;

        self.base.skip_whitespace();
        self.base.expect_keyword(Keyword::AS)?;

        let selects = self.parse_body_selects();
        Some(ParsedProcedure {
            name,
            parameters,
            selects,
        })
    }

    /// `CREATE [OR ALTER] PROC name [;n]` or `ALTER PROC name [;n]`
    fn parse_header(&mut self) -> Option<QualifiedName> {
        self.base.skip_whitespace();
        if self.base.expect_keyword(Keyword::CREATE).is_some() {
            self.base.skip_whitespace();
            if self.base.expect_keyword(Keyword::OR).is_some() {
                self.base.skip_whitespace();
                self.base.expect_keyword(Keyword::ALTER)?;
                self.base.skip_whitespace();
            }
        } else {
            self.base.expect_keyword(Keyword::ALTER)?;
            self.base.skip_whitespace();
        }

        if self.base.expect_keyword(Keyword::PROCEDURE).is_none() {
            self.base.expect_word_ci("PROC")?;
        }
        self.base.skip_whitespace();

        let name = self.base.parse_qualified_name()?;

        // Numbered procedure group: name;2
        let checkpoint = self.base.pos();
        self.base.skip_whitespace();
        if self.base.expect_token(&Token::SemiColon).is_some() {
            self.base.skip_whitespace();
            self.base.parse_positive_integer()?;
        } else {
            self.base.set_pos(checkpoint);
        }

        Some(name)
    }

    /// Parameter list, optionally wrapped in parentheses
    fn parse_parameters(&mut self) -> Option<Vec<ParsedParameter>> {
        self.base.skip_whitespace();
        let parenthesized = self.base.expect_token(&Token::LParen).is_some();

        let mut parameters = Vec::new();
        loop {
            self.base.skip_whitespace();
            if !self.at_variable() {
                break;
            }
            parameters.push(self.parse_parameter()?);
            self.base.skip_whitespace();
            if self.base.expect_token(&Token::Comma).is_none() {
                break;
            }
        }

        if parenthesized {
            self.base.skip_whitespace();
            self.base.expect_token(&Token::RParen)?;
        }

        Some(parameters)
    }

    fn at_variable(&self) -> bool {
        matches!(
            self.base.current_token().map(|t| &t.token),
            Some(Token::Word(w)) if w.quote_style.is_none() && w.value.starts_with('@')
        )
    }

    /// `@name [AS] type [VARYING] [NULL | NOT NULL] [= default] [READONLY] [OUT | OUTPUT]`
    fn parse_parameter(&mut self) -> Option<ParsedParameter> {
        let raw_name = self.base.parse_identifier()?;
        let name = strip_variable_sigil(&raw_name).to_string();
        self.base.skip_whitespace();

        if self.base.expect_keyword(Keyword::AS).is_some() {
            self.base.skip_whitespace();
        }

        let data_type = self.base.parse_declared_type()?;
        let mut parameter = ParsedParameter {
            name,
            data_type,
            is_output: false,
            is_readonly: false,
            default_value: None,
        };

        loop {
            self.base.skip_whitespace();
            if self.base.expect_token(&Token::Eq).is_some() {
                self.base.skip_whitespace();
                parameter.default_value = self.parse_default_value();
            } else if self.base.expect_word_ci("READONLY").is_some() {
                parameter.is_readonly = true;
            } else if self.base.expect_word_ci("OUTPUT").is_some()
                || self.base.expect_word_ci("OUT").is_some()
            {
                parameter.is_output = true;
            } else if self.base.expect_word_ci("VARYING").is_some()
                || self.base.expect_keyword(Keyword::NULL).is_some()
            {
                continue;
            } else if self.base.expect_keyword(Keyword::NOT).is_some() {
                self.base.skip_whitespace();
                self.base.expect_keyword(Keyword::NULL)?;
            } else {
                break;
            }
        }

        Some(parameter)
    }

    /// Default value text up to the next parameter or the end of the header
    fn parse_default_value(&mut self) -> Option<String> {
        let start = self.base.pos();
        while let Some(token) = self.base.current_token() {
            match &token.token {
                Token::Comma | Token::RParen => break,
                Token::LParen => {
                    self.base.skip_parenthesized();
                    continue;
                }
                Token::Word(w)
                    if w.quote_style.is_none()
                        && ["OUTPUT", "OUT", "READONLY", "AS", "WITH", "FOR"]
                            .iter()
                            .any(|k| w.value.eq_ignore_ascii_case(k)) =>
                {
                    break
                }
                _ => self.base.advance(),
            }
        }
        let value = self.base.tokens_to_sql(start, self.base.pos());
        (!value.is_empty()).then_some(value)
    }

    /// `WITH option [, ...]` and `FOR REPLICATION`
    fn skip_procedure_options(&mut self) -> Option<()> {
        self.base.skip_whitespace();
        if self.base.expect_keyword(Keyword::WITH).is_some() {
            loop {
                self.base.skip_whitespace();
                if self.base.expect_word_ci("EXECUTE").is_some()
                    || self.base.expect_word_ci("EXEC").is_some()
                {
                    self.base.skip_whitespace();
                    self.base.expect_keyword(Keyword::AS)?;
                    self.base.skip_whitespace();
                    // CALLER | SELF | OWNER | 'user_name'
                    self.base.advance();
                } else {
                    self.base.parse_identifier()?;
                }
                self.base.skip_whitespace();
                if self.base.expect_token(&Token::Comma).is_none() {
                    break;
                }
            }
        }

        self.base.skip_whitespace();
        if self.base.expect_keyword(Keyword::FOR).is_some() {
            self.base.skip_whitespace();
            self.base.expect_word_ci("REPLICATION")?;
        }
        Some(())
    }

    /// Every top-level SELECT statement of the body, in source order
    fn parse_body_selects(&self) -> Vec<ParsedSelect> {
        split_body_statements(&self.base, self.base.pos())
            .into_iter()
            .filter(|statement| statement.kind == StatementKind::Select)
            .map(|statement| {
                let sql = self.base.tokens_to_sql(statement.start, statement.end);
                let query = parse_query_text(&sql);
                ParsedSelect {
                    line: self.base.line_at(statement.start),
                    sql,
                    query,
                }
            })
            .collect()
    }
}

/// Parse CREATE/ALTER PROCEDURE using tokens
pub fn parse_procedure_tokens(sql: &str) -> Option<ParsedProcedure> {
    ProcedureTokenParser::new(sql)?.parse_procedure()
}
