//! Base token parser shared by the T-SQL token parsers.
//!
//! Each specialized parser (procedures, table types, columns, constraints,
//! views) wraps a `TokenParser` and delegates navigation to it:
//!
//! ```ignore
//! pub struct ProcedureTokenParser {
//!     base: TokenParser,
//! }
//!
//! impl ProcedureTokenParser {
//!     pub fn new(sql: &str) -> Option<Self> {
//!         Some(Self { base: TokenParser::new(sql)? })
//!     }
//! }
//! ```

use sqlparser::dialect::MsSqlDialect;
use sqlparser::keywords::Keyword;
use sqlparser::tokenizer::{Token, TokenWithSpan, Tokenizer, Whitespace};

use super::identifier_utils::format_token_sql;
use super::tsql_parser::{DeclaredType, QualifiedName, TypeArgument};

/// Token stream plus cursor, tokenized with `MsSqlDialect`.
pub struct TokenParser {
    tokens: Vec<TokenWithSpan>,
    pos: usize,
}

impl TokenParser {
    /// Create a new TokenParser from a SQL string.
    ///
    /// Returns `None` if tokenization fails (e.g., an unterminated string).
    pub fn new(sql: &str) -> Option<Self> {
        let dialect = MsSqlDialect {};
        let tokens = Tokenizer::new(&dialect, sql)
            .tokenize_with_location()
            .ok()?;

        Some(Self { tokens, pos: 0 })
    }

    // ========================================================================
    // Position and state
    // ========================================================================

    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.tokens.len());
    }

    #[inline]
    pub fn tokens(&self) -> &[TokenWithSpan] {
        &self.tokens
    }

    // ========================================================================
    // Token access
    // ========================================================================

    /// Get current token without consuming.
    #[inline]
    pub fn current_token(&self) -> Option<&TokenWithSpan> {
        self.tokens.get(self.pos)
    }

    /// Advance to next token.
    #[inline]
    pub fn advance(&mut self) {
        if !self.is_at_end() {
            self.pos += 1;
        }
    }

    // ========================================================================
    // Whitespace handling
    // ========================================================================

    /// Skip whitespace tokens, including comments.
    pub fn skip_whitespace(&mut self) {
        while let Some(token) = self.current_token() {
            match &token.token {
                Token::Whitespace(_) => self.advance(),
                _ => break,
            }
        }
    }

    // ========================================================================
    // Token type checks
    // ========================================================================

    /// Check if current token is a specific keyword.
    #[inline]
    pub fn check_keyword(&self, keyword: Keyword) -> bool {
        matches!(self.current_token(), Some(t) if matches!(&t.token, Token::Word(w) if w.keyword == keyword))
    }

    /// Check if current token is an unquoted word matching (case-insensitive).
    ///
    /// Used for T-SQL words sqlparser does not treat as keywords
    /// (e.g., "PROC", "READONLY", "OUTPUT").
    #[inline]
    pub fn check_word_ci(&self, word: &str) -> bool {
        matches!(
            self.current_token(),
            Some(t) if matches!(&t.token, Token::Word(w) if w.quote_style.is_none() && w.value.eq_ignore_ascii_case(word))
        )
    }

    /// Check if current token matches a specific token type (by discriminant).
    #[inline]
    pub fn check_token(&self, expected: &Token) -> bool {
        matches!(self.current_token(), Some(t) if std::mem::discriminant(&t.token) == std::mem::discriminant(expected))
    }

    // ========================================================================
    // Expect methods (check and advance)
    // ========================================================================

    /// Expect a specific keyword, advancing if found.
    pub fn expect_keyword(&mut self, keyword: Keyword) -> Option<()> {
        if self.check_keyword(keyword) {
            self.advance();
            Some(())
        } else {
            None
        }
    }

    /// Expect a specific word (case-insensitive), advancing if found.
    pub fn expect_word_ci(&mut self, word: &str) -> Option<()> {
        if self.check_word_ci(word) {
            self.advance();
            Some(())
        } else {
            None
        }
    }

    /// Expect a specific token type, advancing if found.
    pub fn expect_token(&mut self, expected: &Token) -> Option<()> {
        if self.check_token(expected) {
            self.advance();
            Some(())
        } else {
            None
        }
    }

    // ========================================================================
    // Identifier parsing
    // ========================================================================

    /// Parse an identifier (bracketed, quoted or bare).
    ///
    /// Returns the identifier value without brackets/quotes.
    pub fn parse_identifier(&mut self) -> Option<String> {
        let token = self.current_token()?;
        match &token.token {
            Token::Word(w) => {
                let name = w.value.clone();
                self.advance();
                Some(name)
            }
            _ => None,
        }
    }

    /// Parse a dotted name of one to four parts: `[db].[schema].[name]`, `schema.name`, `name`.
    pub fn parse_qualified_name(&mut self) -> Option<QualifiedName> {
        let mut parts = vec![self.parse_identifier()?];

        loop {
            let checkpoint = self.pos;
            self.skip_whitespace();
            if !self.check_token(&Token::Period) {
                self.pos = checkpoint;
                break;
            }
            self.advance();
            self.skip_whitespace();
            match self.parse_identifier() {
                Some(part) => parts.push(part),
                None => {
                    // `db..name` skips the schema part
                    if self.check_token(&Token::Period) {
                        parts.push(String::new());
                        continue;
                    }
                    return None;
                }
            }
        }

        QualifiedName::from_parts(parts)
    }

    /// Parse a parenthesized identifier list: `([a], b DESC, c)`.
    ///
    /// Sort direction markers are dropped. Position must be at `(`.
    pub fn parse_identifier_list(&mut self) -> Option<Vec<String>> {
        self.expect_token(&Token::LParen)?;
        let mut names = Vec::new();

        loop {
            self.skip_whitespace();
            if self.expect_token(&Token::RParen).is_some() {
                return Some(names);
            }
            names.push(self.parse_identifier()?);
            self.skip_whitespace();
            if self.check_keyword(Keyword::ASC) || self.check_keyword(Keyword::DESC) {
                self.advance();
                self.skip_whitespace();
            }
            if self.expect_token(&Token::Comma).is_none() && !self.check_token(&Token::RParen) {
                return None;
            }
        }
    }

    // ========================================================================
    // Data type parsing
    // ========================================================================

    /// Parse a declared type such as `INT`, `NVARCHAR(MAX)`, `DECIMAL(18, 2)`
    /// or `[dbo].[OrderLines]`.
    pub fn parse_declared_type(&mut self) -> Option<DeclaredType> {
        let name = self.parse_qualified_name()?;
        let checkpoint = self.pos;
        self.skip_whitespace();

        let mut arguments = Vec::new();
        if self.expect_token(&Token::LParen).is_some() {
            loop {
                self.skip_whitespace();
                match self.current_token().map(|t| &t.token) {
                    Some(Token::Number(n, _)) => {
                        arguments.push(TypeArgument::Number(n.parse().ok()?));
                        self.advance();
                    }
                    Some(Token::Word(w)) if w.value.eq_ignore_ascii_case("MAX") => {
                        arguments.push(TypeArgument::Max);
                        self.advance();
                    }
                    _ => return None,
                }
                self.skip_whitespace();
                if self.expect_token(&Token::RParen).is_some() {
                    break;
                }
                self.expect_token(&Token::Comma)?;
            }
        } else {
            self.pos = checkpoint;
        }

        Some(DeclaredType::new(name.schema, name.name, &arguments))
    }

    // ========================================================================
    // Numeric parsing
    // ========================================================================

    /// Parse a positive integer only.
    pub fn parse_positive_integer(&mut self) -> Option<u64> {
        let token = self.current_token()?;
        match &token.token {
            Token::Number(n, _) => {
                let value = n.parse::<u64>().ok()?;
                self.advance();
                Some(value)
            }
            _ => None,
        }
    }

    // ========================================================================
    // Token string conversion
    // ========================================================================

    /// Rebuild SQL text from tokens `start..end`, with comments collapsed to a space.
    pub fn tokens_to_sql(&self, start: usize, end: usize) -> String {
        let end = end.min(self.tokens.len());
        let start = start.min(end);
        self.tokens[start..end]
            .iter()
            .map(|t| match &t.token {
                Token::Whitespace(Whitespace::SingleLineComment { .. })
                | Token::Whitespace(Whitespace::MultiLineComment(_)) => " ".to_string(),
                other => format_token_sql(other),
            })
            .collect::<String>()
            .trim()
            .to_string()
    }

    /// 1-based source line of the token at `pos`.
    pub fn line_at(&self, pos: usize) -> usize {
        self.tokens
            .get(pos)
            .map(|t| t.span.start.line as usize)
            .unwrap_or(1)
            .max(1)
    }

    // ========================================================================
    // Utility methods
    // ========================================================================

    /// Skip a parenthesized expression, handling nested parentheses.
    ///
    /// Position should be at the opening parenthesis. Afterwards it is just
    /// past the matching closing parenthesis.
    pub fn skip_parenthesized(&mut self) {
        if !self.check_token(&Token::LParen) {
            return;
        }

        let mut depth = 0;
        while let Some(token) = self.current_token() {
            match token.token {
                Token::LParen => depth += 1,
                Token::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        return;
                    }
                }
                _ => {}
            }
            self.advance();
        }
    }

    /// Skip to the next comma or closing parenthesis at the current nesting level.
    ///
    /// The delimiter is not consumed.
    pub fn skip_to_list_delimiter(&mut self) {
        while let Some(token) = self.current_token() {
            match token.token {
                Token::Comma | Token::RParen => return,
                Token::LParen => self.skip_parenthesized(),
                _ => self.advance(),
            }
        }
    }
}
