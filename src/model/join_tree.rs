//! Join tree: the FROM clause of one select as a tagged union
//!
//! Comma-separated sources become cross joins, explicit joins fold
//! left-deep, and parenthesised joins keep their nesting:
//!
//! ```text
//! FROM a LEFT JOIN (b JOIN c ON ..) ON ..
//!
//!        Join(LeftOuter)
//!        /            \
//!   Source(a)      Join(Inner)
//!                  /        \
//!             Source(b)   Source(c)
//! ```

use sqlparser::ast::{
    Join, JoinConstraint, JoinOperator, Query, TableFactor, TableWithJoins,
};
use sqlparser::dialect::MsSqlDialect;
use sqlparser::tokenizer::{Token, Tokenizer};

use crate::error::ResolveError;
use crate::parser::identifier_utils::{normalize_identifier, object_name_parts};
use crate::parser::QualifiedName;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Cross,
    LeftOuter,
    RightOuter,
    FullOuter,
    CrossApply,
    OuterApply,
}

impl JoinKind {
    /// Whether the (left, right) sides may be absent from a result row
    pub fn optional_sides(self) -> (bool, bool) {
        match self {
            JoinKind::LeftOuter | JoinKind::OuterApply => (false, true),
            JoinKind::RightOuter => (true, false),
            JoinKind::FullOuter => (true, true),
            JoinKind::Inner | JoinKind::Cross | JoinKind::CrossApply => (false, false),
        }
    }

    /// Joins whose right side only has rows when the sources it references do
    pub fn follows_referenced_sources(self) -> bool {
        matches!(self, JoinKind::Inner | JoinKind::CrossApply)
    }

    fn from_operator(join: &Join) -> Self {
        match &join.join_operator {
            JoinOperator::Inner(_) => JoinKind::Inner,
            JoinOperator::LeftOuter(_) => JoinKind::LeftOuter,
            JoinOperator::RightOuter(_) => JoinKind::RightOuter,
            JoinOperator::FullOuter(_) => JoinKind::FullOuter,
            JoinOperator::CrossApply => JoinKind::CrossApply,
            JoinOperator::OuterApply => JoinKind::OuterApply,
            // Remaining operators are classified by their rendered keywords
            _ => {
                let rendered = join.to_string().trim_start().to_ascii_uppercase();
                if rendered.starts_with("LEFT") {
                    JoinKind::LeftOuter
                } else if rendered.starts_with("RIGHT") {
                    JoinKind::RightOuter
                } else if rendered.starts_with("FULL") {
                    JoinKind::FullOuter
                } else if rendered.starts_with("OUTER APPLY") {
                    JoinKind::OuterApply
                } else if rendered.starts_with("CROSS APPLY") {
                    JoinKind::CrossApply
                } else if rendered.starts_with("CROSS") {
                    JoinKind::Cross
                } else {
                    JoinKind::Inner
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinTree {
    /// A table, view, CTE, table variable or temp table
    Source {
        object: QualifiedName,
        alias: Option<String>,
    },
    /// A parenthesised subquery, with its optional `d(a, b)` column list
    Derived {
        alias: Option<String>,
        columns: Vec<String>,
        query: Box<Query>,
    },
    /// A table-valued function or other source with no declared columns
    Function { name: String, alias: Option<String> },
    Join {
        kind: JoinKind,
        left: Box<JoinTree>,
        right: Box<JoinTree>,
        /// Lowercase qualifiers the join condition (or APPLY arguments) names
        on_references: Vec<String>,
    },
}

impl JoinTree {
    /// Build the tree for a FROM clause; `None` when there is no FROM.
    pub fn from_clause(from: &[TableWithJoins]) -> Result<Option<JoinTree>, ResolveError> {
        let mut tree: Option<JoinTree> = None;
        for table in from {
            let next = Self::from_table_with_joins(table)?;
            tree = Some(match tree {
                None => next,
                Some(left) => JoinTree::Join {
                    kind: JoinKind::Cross,
                    left: Box::new(left),
                    right: Box::new(next),
                    on_references: Vec::new(),
                },
            });
        }
        Ok(tree)
    }

    fn from_table_with_joins(table: &TableWithJoins) -> Result<JoinTree, ResolveError> {
        let mut tree = Self::from_factor(&table.relation)?;
        for join in &table.joins {
            let kind = JoinKind::from_operator(join);
            tree = JoinTree::Join {
                kind,
                left: Box::new(tree),
                right: Box::new(Self::from_factor(&join.relation)?),
                on_references: join_references(join, kind),
            };
        }
        Ok(tree)
    }

    fn from_factor(factor: &TableFactor) -> Result<JoinTree, ResolveError> {
        match factor {
            TableFactor::Table {
                name, alias, args, ..
            } => {
                let alias = alias.as_ref().map(|a| a.name.value.clone());
                if args.is_some() {
                    return Ok(JoinTree::Function {
                        name: object_name_parts(name).join("."),
                        alias,
                    });
                }
                let object = QualifiedName::from_parts(object_name_parts(name)).ok_or_else(|| {
                    ResolveError::MalformedSelect {
                        message: format!("invalid source name '{}'", name),
                    }
                })?;
                Ok(JoinTree::Source { object, alias })
            }
            TableFactor::Derived {
                subquery, alias, ..
            } => Ok(JoinTree::Derived {
                alias: alias.as_ref().map(|a| a.name.value.clone()),
                columns: alias
                    .as_ref()
                    .map(|a| a.columns.iter().map(|c| alias_column_name(&c.to_string())).collect())
                    .unwrap_or_default(),
                query: subquery.clone(),
            }),
            TableFactor::NestedJoin {
                table_with_joins, ..
            } => Self::from_table_with_joins(table_with_joins),
            other => Ok(JoinTree::Function {
                name: other.to_string(),
                alias: None,
            }),
        }
    }

    /// Name other parts of the select use for this leaf: its alias, else its object name
    pub fn exposed_name(&self) -> Option<&str> {
        match self {
            JoinTree::Source { object, alias } => {
                Some(alias.as_deref().unwrap_or(object.name.as_str()))
            }
            JoinTree::Derived { alias, .. } | JoinTree::Function { alias, .. } => alias.as_deref(),
            JoinTree::Join { .. } => None,
        }
    }

    /// Leaves in left-to-right order
    pub fn leaves(&self) -> Vec<&JoinTree> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_leaves<'a>(&'a self, leaves: &mut Vec<&'a JoinTree>) {
        match self {
            JoinTree::Join { left, right, .. } => {
                left.collect_leaves(leaves);
                right.collect_leaves(leaves);
            }
            leaf => leaves.push(leaf),
        }
    }
}

/// Column name from a rendered alias column (`[name]` or `name type`)
pub(crate) fn alias_column_name(rendered: &str) -> String {
    let first = rendered.split_whitespace().next().unwrap_or(rendered);
    normalize_identifier(first)
}

fn join_references(join: &Join, kind: JoinKind) -> Vec<String> {
    let constraint = match &join.join_operator {
        JoinOperator::Inner(c)
        | JoinOperator::LeftOuter(c)
        | JoinOperator::RightOuter(c)
        | JoinOperator::FullOuter(c) => Some(c),
        _ => None,
    };
    match constraint {
        Some(JoinConstraint::On(expr)) => qualifiers_in(&expr.to_string(), 0),
        // An applied function or subquery names outer sources inside its parentheses
        _ if kind == JoinKind::CrossApply || kind == JoinKind::OuterApply => {
            qualifiers_in(&join.relation.to_string(), 1)
        }
        _ => Vec::new(),
    }
}

/// Qualifiers of the multi-part names in `sql` nested at least `min_depth`
/// parentheses deep: `t.id` and `dbo.t.id` both yield `t`.
fn qualifiers_in(sql: &str, min_depth: usize) -> Vec<String> {
    let Ok(tokens) = Tokenizer::new(&MsSqlDialect {}, sql).tokenize() else {
        return Vec::new();
    };

    let mut qualifiers = Vec::new();
    let mut run: Vec<String> = Vec::new();
    let mut after_period = false;
    let mut depth = 0usize;

    let mut flush = |run: &mut Vec<String>, depth: usize| {
        if depth >= min_depth && run.len() >= 2 {
            let qualifier = run[run.len() - 2].to_lowercase();
            if !qualifiers.contains(&qualifier) {
                qualifiers.push(qualifier);
            }
        }
        run.clear();
    };

    for token in &tokens {
        match token {
            Token::Word(word) if after_period => {
                run.push(word.value.clone());
                after_period = false;
            }
            Token::Period if !run.is_empty() && !after_period => after_period = true,
            _ => {
                flush(&mut run, depth);
                after_period = false;
                match token {
                    Token::Word(word) => run.push(word.value.clone()),
                    Token::LParen => depth += 1,
                    Token::RParen => depth = depth.saturating_sub(1),
                    _ => {}
                }
            }
        }
    }
    flush(&mut run, depth);
    qualifiers
}
