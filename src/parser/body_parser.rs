//! Procedure body statement splitter
//!
//! T-SQL statements need no terminator, so a body is cut into top-level
//! statements by recognising the keywords that start one. Only tokens at
//! parenthesis depth 0 are considered; subqueries never start a statement.
//!
//! ```sql
//! DECLARE @id INT = SCOPE_IDENTITY()      -- Declare
//! INSERT INTO t (a) SELECT a FROM s       -- Insert (SELECT is its source)
//! ;WITH c AS (SELECT 1 AS x) SELECT * FROM c  -- Select
//! IF @id > 0 SELECT 1 ELSE SELECT 2       -- If, Select, Else, Select
//! ```

use sqlparser::tokenizer::{Token, TokenWithSpan};

use super::token_parser_base::TokenParser;

/// What a top-level body statement does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Merge,
    /// A CTE prefix whose DML keyword has not been seen yet
    With,
    Declare,
    Set,
    Exec,
    ControlFlow,
    Other,
}

/// A statement's token range `start..end` within the procedure's tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyStatement {
    pub kind: StatementKind,
    pub start: usize,
    pub end: usize,
}

const CONTROL_FLOW_STARTERS: &[&str] = &[
    "IF", "ELSE", "WHILE", "BEGIN", "END", "RETURN", "BREAK", "CONTINUE", "GOTO", "WAITFOR",
];

const OTHER_STARTERS: &[&str] = &[
    "PRINT", "RAISERROR", "THROW", "TRUNCATE", "CREATE", "DROP", "ALTER", "OPEN", "CLOSE",
    "FETCH", "DEALLOCATE", "COMMIT", "ROLLBACK", "SAVE", "USE", "GRANT", "DENY", "REVOKE",
];

fn starter_kind(word: &str) -> Option<StatementKind> {
    let kind = match word {
        "SELECT" => StatementKind::Select,
        "INSERT" => StatementKind::Insert,
        "UPDATE" => StatementKind::Update,
        "DELETE" => StatementKind::Delete,
        "MERGE" => StatementKind::Merge,
        "DECLARE" => StatementKind::Declare,
        "SET" => StatementKind::Set,
        "EXEC" | "EXECUTE" => StatementKind::Exec,
        w if CONTROL_FLOW_STARTERS.contains(&w) => StatementKind::ControlFlow,
        w if OTHER_STARTERS.contains(&w) => StatementKind::Other,
        _ => return None,
    };
    Some(kind)
}

struct OpenStatement {
    kind: StatementKind,
    start: usize,
    /// INSERT has taken its row source (VALUES, SELECT or EXEC)
    has_source: bool,
    /// UPDATE has seen its SET clause
    has_set: bool,
}

impl OpenStatement {
    fn new(kind: StatementKind, start: usize) -> Self {
        Self {
            kind,
            start,
            has_source: false,
            has_set: false,
        }
    }

    /// Whether a starter keyword belongs to this statement instead of opening a new one.
    fn absorbs(&mut self, word: &str, previous: Option<&str>) -> bool {
        // Set operators and cursor declarations: UNION ALL SELECT, CURSOR FOR SELECT
        if matches!(
            previous,
            Some("UNION" | "ALL" | "EXCEPT" | "INTERSECT" | "FOR")
        ) {
            return true;
        }

        match (self.kind, word) {
            // MERGE must be terminated with a semicolon
            (StatementKind::Merge, _) => true,
            (StatementKind::With, "SELECT" | "INSERT" | "UPDATE" | "DELETE" | "MERGE") => {
                if let Some(kind) = starter_kind(word) {
                    self.kind = kind;
                }
                true
            }
            (StatementKind::Insert, "SELECT" | "EXEC" | "EXECUTE") if !self.has_source => {
                self.has_source = true;
                true
            }
            (StatementKind::Update, "SET") if !self.has_set => {
                self.has_set = true;
                true
            }
            _ => false,
        }
    }
}

/// Splits procedure body tokens into top-level statements.
pub struct BodySplitter<'a> {
    tokens: &'a [TokenWithSpan],
    statements: Vec<BodyStatement>,
    current: Option<OpenStatement>,
    depth: usize,
    case_depth: usize,
    previous_word: Option<String>,
}

impl<'a> BodySplitter<'a> {
    pub fn new(parser: &'a TokenParser) -> Self {
        Self {
            tokens: parser.tokens(),
            statements: Vec::new(),
            current: None,
            depth: 0,
            case_depth: 0,
            previous_word: None,
        }
    }

    /// Split the tokens from `start` to the end of the stream.
    pub fn split(mut self, start: usize) -> Vec<BodyStatement> {
        let tokens = self.tokens;
        for pos in start..tokens.len() {
            match &tokens[pos].token {
                Token::Whitespace(_) => continue,
                Token::SemiColon if self.depth == 0 => {
                    self.close(pos);
                }
                Token::Word(w) if self.depth == 0 && w.quote_style.is_none() => {
                    let upper = w.value.to_ascii_uppercase();
                    self.visit_word(&upper, pos);
                    self.previous_word = Some(upper);
                    continue;
                }
                Token::LParen => {
                    if self.depth == 0 {
                        self.ensure_open(pos);
                    }
                    self.depth += 1;
                }
                Token::RParen => self.depth = self.depth.saturating_sub(1),
                _ => {
                    if self.depth == 0 {
                        self.ensure_open(pos);
                    }
                }
            }
            self.previous_word = None;
        }

        self.close(tokens.len());
        self.statements
    }

    fn visit_word(&mut self, word: &str, pos: usize) {
        if word == "CASE" {
            self.case_depth += 1;
            self.ensure_open(pos);
            return;
        }
        if self.case_depth > 0 {
            if word == "END" {
                self.case_depth -= 1;
            }
            return;
        }

        if word == "VALUES" {
            if let Some(open) = self.current.as_mut() {
                open.has_source = true;
            }
            return;
        }

        let kind = if word == "WITH" {
            if !self.is_cte_start(pos) {
                self.ensure_open(pos);
                return;
            }
            StatementKind::With
        } else {
            match starter_kind(word) {
                Some(kind) => kind,
                None => {
                    self.ensure_open(pos);
                    return;
                }
            }
        };

        let previous = self.previous_word.as_deref();
        if let Some(open) = self.current.as_mut() {
            if open.absorbs(word, previous) {
                return;
            }
        }

        self.close(pos);
        self.current = Some(OpenStatement::new(kind, pos));
    }

    /// `WITH name AS (` or `WITH name (cols) AS (`; table hints and `WITH TIES` do not match.
    fn is_cte_start(&self, pos: usize) -> bool {
        let mut significant = self.tokens[pos + 1..]
            .iter()
            .map(|t| &t.token)
            .filter(|t| !matches!(t, Token::Whitespace(_)));

        if !matches!(significant.next(), Some(Token::Word(_))) {
            return false;
        }

        let mut next = significant.next();
        if matches!(next, Some(Token::LParen)) {
            let mut depth = 1usize;
            for token in significant.by_ref() {
                match token {
                    Token::LParen => depth += 1,
                    Token::RParen => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    _ => {}
                }
            }
            next = significant.next();
        }

        let is_as = matches!(next, Some(Token::Word(w)) if w.quote_style.is_none() && w.value.eq_ignore_ascii_case("AS"));
        is_as && matches!(significant.next(), Some(Token::LParen))
    }

    fn ensure_open(&mut self, pos: usize) {
        if self.current.is_none() {
            self.current = Some(OpenStatement::new(StatementKind::Other, pos));
        }
    }

    fn close(&mut self, end: usize) {
        if let Some(open) = self.current.take() {
            self.statements.push(BodyStatement {
                kind: open.kind,
                start: open.start,
                end,
            });
        }
    }
}

/// Split the body that starts at token `start` into top-level statements.
pub fn split_body_statements(parser: &TokenParser, start: usize) -> Vec<BodyStatement> {
    BodySplitter::new(parser).split(start)
}
