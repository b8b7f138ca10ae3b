//! Token-based CREATE VIEW parsing
//!
//! ```sql
//! CREATE [OR ALTER] VIEW [schema].[name] [(col, ...)]
//!     [WITH SCHEMABINDING | ENCRYPTION | VIEW_METADATA [, ...]]
//! AS select_statement [WITH CHECK OPTION] [;]
//! ```
//!
//! The header is read with tokens; the query itself goes back to sqlparser.

use sqlparser::ast::Query;
use sqlparser::dialect::MsSqlDialect;
use sqlparser::keywords::Keyword;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Token;

use super::token_parser_base::TokenParser;
use super::tsql_parser::ParsedView;

pub struct ViewTokenParser {
    base: TokenParser,
}

impl ViewTokenParser {
    pub fn new(sql: &str) -> Option<Self> {
        Some(Self {
            base: TokenParser::new(sql)?,
        })
    }

    pub fn parse_create_view(&mut self) -> Option<ParsedView> {
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
        self.base.expect_keyword(Keyword::VIEW)?;
        self.base.skip_whitespace();

        let name = self.base.parse_qualified_name()?;
        self.base.skip_whitespace();

        let columns = if self.base.check_token(&Token::LParen) {
            let columns = self.base.parse_identifier_list()?;
            self.base.skip_whitespace();
            columns
        } else {
            Vec::new()
        };

        // View attributes
        if self.base.expect_keyword(Keyword::WITH).is_some() {
            loop {
                self.base.skip_whitespace();
                self.base.parse_identifier()?;
                self.base.skip_whitespace();
                if self.base.expect_token(&Token::Comma).is_none() {
                    break;
                }
            }
        }

        self.base.expect_keyword(Keyword::AS)?;
        let query_start = self.base.pos();
        let query_end = self.query_end();
        let query_sql = self.base.tokens_to_sql(query_start, query_end);

        let query = parse_query_text(&query_sql).ok()?;
        Some(ParsedView {
            name,
            columns,
            query,
        })
    }

    /// End of the view query, excluding a trailing `WITH CHECK OPTION` and `;`.
    fn query_end(&self) -> usize {
        let tokens = self.base.tokens();
        let significant: Vec<usize> = (self.base.pos()..tokens.len())
            .filter(|&i| !matches!(tokens[i].token, Token::Whitespace(_)))
            .collect();

        let mut end = significant.len();
        if end > 0 && matches!(tokens[significant[end - 1]].token, Token::SemiColon) {
            end -= 1;
        }

        let is_word = |i: usize, word: &str| {
            matches!(&tokens[significant[i]].token, Token::Word(w) if w.value.eq_ignore_ascii_case(word))
        };
        if end >= 3 && is_word(end - 3, "WITH") && is_word(end - 2, "CHECK") && is_word(end - 1, "OPTION")
        {
            end -= 3;
        }

        if end == significant.len() {
            tokens.len()
        } else {
            significant[end]
        }
    }
}

/// Parse a stand-alone query with the MS SQL dialect.
pub fn parse_query_text(sql: &str) -> std::result::Result<Box<Query>, String> {
    let dialect = MsSqlDialect {};
    let mut parser = Parser::new(&dialect)
        .try_with_sql(sql)
        .map_err(|e| e.to_string())?;
    parser.parse_query().map_err(|e| e.to_string())
}

/// Parse CREATE [OR ALTER] VIEW using tokens
pub fn parse_create_view_tokens(sql: &str) -> Option<ParsedView> {
    ViewTokenParser::new(sql)?.parse_create_view()
}
