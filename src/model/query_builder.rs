//! Query model: resolve the result columns of a select against the schema
//!
//! Each column is traced to its source through the alias map, and its
//! nullability combines the declared value with outer-join forcing. Values
//! that cannot be traced (variables, calls, literals, columns of opaque
//! sources) are typed unknown and treated as nullable.

use std::collections::{BTreeMap, HashSet};

use sqlparser::ast::{
    BinaryOperator, Expr, GroupByExpr, Ident, Query, Select as SelectNode, SelectItem, SetExpr,
    TopQuantity,
};

use super::aliases::{base_identifier, resolve_aliases, AliasResolution};
use super::elements::{Column, Parameter, Provenance, Select, SelectColumn};
use super::join_tree::{alias_column_name, JoinTree};
use super::nullability::{propagate_nullability, NullabilityResolution};
use crate::catalog::TypeRepresentationSet;
use crate::error::ResolveError;
use crate::parser::identifier_utils::{
    is_variable, normalize_identifier, object_name_parts, strip_variable_sigil,
};
use crate::parser::QualifiedName;

/// Aggregates that collapse an ungrouped select to one row
const AGGREGATES: &[&str] = &["COUNT", "COUNT_BIG", "SUM", "AVG", "MIN", "MAX"];

/// Read access to the schema objects a select can name
pub trait SourceCatalog {
    fn default_schema(&self) -> &str;

    /// Columns of the table or view `schema.name`, if it exists
    fn object_columns(&self, schema: &str, name: &str) -> Option<&[Column]>;
}

#[derive(Debug, Clone)]
struct SourceColumn {
    name: String,
    data_type: &'static TypeRepresentationSet,
    is_nullable: bool,
}

impl From<&Column> for SourceColumn {
    fn from(column: &Column) -> Self {
        Self {
            name: column.name.clone(),
            data_type: column.data_type,
            is_nullable: column.is_nullable,
        }
    }
}

impl From<SelectColumn> for SourceColumn {
    fn from(column: SelectColumn) -> Self {
        Self {
            name: column.name,
            data_type: column.data_type,
            is_nullable: column.is_nullable,
        }
    }
}

#[derive(Debug, Clone)]
struct Cte {
    name: String,
    columns: Vec<SourceColumn>,
}

/// One leaf of the join tree with its columns
#[derive(Debug)]
struct ScopeSource {
    identifier: String,
    /// `None` for opaque sources
    columns: Option<Vec<SourceColumn>>,
    forced_nullable: bool,
}

impl ScopeSource {
    fn column(&self, name: &str) -> Option<&SourceColumn> {
        self.columns
            .as_ref()?
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

enum ColumnMatch<'s> {
    Known {
        source: &'s ScopeSource,
        column: &'s SourceColumn,
    },
    Opaque {
        source: Option<&'s ScopeSource>,
    },
}

/// Sources visible to one select
struct Scope {
    sources: Vec<ScopeSource>,
    aliases: AliasResolution,
}

impl Scope {
    fn source_for_qualifier(&self, qualifier: &str, display: &str) -> Result<&ScopeSource, ResolveError> {
        self.aliases
            .source_index(qualifier)
            .or_else(|| {
                // Qualified by the full object name: dbo.tb1.col
                self.sources
                    .iter()
                    .position(|s| last_segment(&s.identifier).eq_ignore_ascii_case(qualifier))
            })
            .map(|i| &self.sources[i])
            .ok_or_else(|| ResolveError::UnknownQualifier {
                qualifier: qualifier.to_string(),
                column: display.to_string(),
            })
    }

    fn lookup(
        &self,
        qualifier: Option<&str>,
        column: &str,
        display: &str,
    ) -> Result<ColumnMatch<'_>, ResolveError> {
        if let Some(qualifier) = qualifier {
            let source = self.source_for_qualifier(qualifier, display)?;
            if source.columns.is_none() {
                return Ok(ColumnMatch::Opaque {
                    source: Some(source),
                });
            }
            return source
                .column(column)
                .map(|c| ColumnMatch::Known { source, column: c })
                .ok_or_else(|| ResolveError::UnresolvedColumn {
                    column: display.to_string(),
                });
        }

        let matches: Vec<(&ScopeSource, &SourceColumn)> = self
            .sources
            .iter()
            .filter_map(|s| s.column(column).map(|c| (s, c)))
            .collect();
        let opaque: Vec<&ScopeSource> = self
            .sources
            .iter()
            .filter(|s| s.columns.is_none())
            .collect();

        match matches.as_slice() {
            [(source, column)] => Ok(ColumnMatch::Known {
                source: *source,
                column: *column,
            }),
            [] if !opaque.is_empty() => Ok(ColumnMatch::Opaque {
                source: (opaque.len() == 1).then(|| opaque[0]),
            }),
            [] => Err(ResolveError::UnresolvedColumn {
                column: display.to_string(),
            }),
            many => Err(ResolveError::AmbiguousColumn {
                column: display.to_string(),
                candidates: many
                    .iter()
                    .map(|(s, _)| s.identifier.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }

    fn expand_wildcard(&self, qualifier: Option<&str>) -> Result<Vec<SelectColumn>, ResolveError> {
        let display = qualifier.map_or_else(|| "*".to_string(), |q| format!("{}.*", q));
        let sources: Vec<&ScopeSource> = match qualifier {
            Some(q) => vec![self.source_for_qualifier(q, &display)?],
            None => self.sources.iter().collect(),
        };
        if sources.is_empty() {
            return Err(ResolveError::UnexpandableWildcard { wildcard: display });
        }

        let mut columns = Vec::new();
        for source in sources {
            let source_columns = source
                .columns
                .as_ref()
                .ok_or_else(|| ResolveError::UnexpandableWildcard {
                    wildcard: display.clone(),
                })?;
            columns.extend(
                source_columns
                    .iter()
                    .map(|column| known_column(column.name.clone(), source, column)),
            );
        }
        Ok(columns)
    }
}

fn known_column(name: String, source: &ScopeSource, column: &SourceColumn) -> SelectColumn {
    SelectColumn {
        name,
        data_type: column.data_type,
        is_nullable: column.is_nullable || source.forced_nullable,
        provenance: Provenance::Column {
            source: source.identifier.clone(),
            column: column.name.clone(),
        },
    }
}

fn unknown_column(name: String, provenance: Provenance) -> SelectColumn {
    SelectColumn {
        name,
        data_type: TypeRepresentationSet::unknown(),
        is_nullable: true,
        provenance,
    }
}

fn last_segment(identifier: &str) -> &str {
    identifier.rsplit('.').next().unwrap_or(identifier)
}

/// Result shape of the first arm of a query
#[derive(Debug, Clone)]
pub struct ResolvedQuery {
    pub columns: Vec<SelectColumn>,
    pub is_single_row: bool,
    pub table_aliases: BTreeMap<String, String>,
    /// False for variable-assignment selects and SELECT ... INTO
    pub returns_rows: bool,
}

/// Resolves selects against a schema, with the parameters of the enclosing procedure.
pub struct QueryResolver<'a, C: SourceCatalog + ?Sized> {
    catalog: &'a C,
    parameters: &'a [Parameter],
}

impl<'a, C: SourceCatalog + ?Sized> QueryResolver<'a, C> {
    pub fn new(catalog: &'a C, parameters: &'a [Parameter]) -> Self {
        Self {
            catalog,
            parameters,
        }
    }

    /// Resolve a top-level select; `None` when it returns no rows to the caller.
    pub fn resolve_select(&self, query: &Query) -> Result<Option<Select>, ResolveError> {
        let resolved = self.resolve_query(query, &[])?;
        if !resolved.returns_rows {
            return Ok(None);
        }
        Ok(Some(Select {
            columns: resolved.columns,
            is_single_row: resolved.is_single_row,
            table_aliases: resolved.table_aliases,
        }))
    }

    /// Resolve the columns a query produces (used for views).
    pub fn resolve_columns(&self, query: &Query) -> Result<Vec<SelectColumn>, ResolveError> {
        Ok(self.resolve_query(query, &[])?.columns)
    }

    fn resolve_query(&self, query: &Query, outer_ctes: &[Cte]) -> Result<ResolvedQuery, ResolveError> {
        let mut ctes = outer_ctes.to_vec();
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                let resolved = self.resolve_query(&cte.query, &ctes)?;
                let renames: Vec<String> = cte
                    .alias
                    .columns
                    .iter()
                    .map(|c| alias_column_name(&c.to_string()))
                    .collect();
                let columns = resolved
                    .columns
                    .into_iter()
                    .enumerate()
                    .map(|(i, column)| {
                        let mut column = SourceColumn::from(column);
                        if let Some(rename) = renames.get(i) {
                            column.name = rename.clone();
                        }
                        column
                    })
                    .collect();
                ctes.push(Cte {
                    name: cte.alias.name.value.clone(),
                    columns,
                });
            }
        }
        self.resolve_set_expr(&query.body, &ctes)
    }

    fn resolve_set_expr(&self, body: &SetExpr, ctes: &[Cte]) -> Result<ResolvedQuery, ResolveError> {
        match body {
            SetExpr::Select(select) => self.resolve_select_node(select, ctes),
            SetExpr::Query(query) => self.resolve_query(query, ctes),
            // The output shape of a set operation is defined by its first arm
            SetExpr::SetOperation { left, .. } => {
                let mut resolved = self.resolve_set_expr(left, ctes)?;
                resolved.is_single_row = false;
                Ok(resolved)
            }
            // Literal rows: positional names, nothing to trace
            SetExpr::Values(values) => {
                let width = values.rows.first().map_or(0, Vec::len);
                Ok(ResolvedQuery {
                    columns: (1..=width)
                        .map(|i| unknown_column(format!("Column{}", i), Provenance::Expression))
                        .collect(),
                    is_single_row: values.rows.len() == 1,
                    table_aliases: BTreeMap::new(),
                    returns_rows: true,
                })
            }
            other => Err(ResolveError::MalformedSelect {
                message: format!("unsupported query body: {}", other),
            }),
        }
    }

    /// Columns of a derived table, renamed by its column list. A body that
    /// yields no row shape (DML with OUTPUT, `TABLE t`) is opaque unless the
    /// column list names its columns.
    fn derived_columns(
        &self,
        query: &Query,
        renames: &[String],
        ctes: &[Cte],
    ) -> Result<Option<Vec<SourceColumn>>, ResolveError> {
        if !yields_rows(&query.body) {
            if renames.is_empty() {
                return Ok(None);
            }
            return Ok(Some(
                renames
                    .iter()
                    .map(|name| SourceColumn {
                        name: name.clone(),
                        data_type: TypeRepresentationSet::unknown(),
                        is_nullable: true,
                    })
                    .collect(),
            ));
        }

        let resolved = self.resolve_query(query, ctes)?;
        Ok(Some(
            resolved
                .columns
                .into_iter()
                .enumerate()
                .map(|(i, column)| {
                    let mut column = SourceColumn::from(column);
                    if let Some(rename) = renames.get(i) {
                        column.name = rename.clone();
                    }
                    column
                })
                .collect(),
        ))
    }

    fn resolve_select_node(&self, select: &SelectNode, ctes: &[Cte]) -> Result<ResolvedQuery, ResolveError> {
        let returns_rows =
            select.into.is_none() && !select.projection.iter().any(is_variable_assignment);

        let tree = JoinTree::from_clause(&select.from)?;
        let aliases = resolve_aliases(tree.as_ref())?;
        let nullability = propagate_nullability(tree.as_ref());

        let mut sources = Vec::new();
        if let Some(tree) = &tree {
            for leaf in tree.leaves() {
                sources.push(self.scope_source(leaf, &nullability, ctes)?);
            }
        }
        let scope = Scope { sources, aliases };

        let mut columns = Vec::with_capacity(select.projection.len());
        for item in &select.projection {
            match item {
                SelectItem::UnnamedExpr(expr) => {
                    let ordinal = columns.len() + 1;
                    columns.push(self.resolve_projection(expr, None, ordinal, &scope)?);
                }
                SelectItem::ExprWithAlias { expr, alias } => {
                    let ordinal = columns.len() + 1;
                    columns.push(self.resolve_projection(
                        expr,
                        Some(alias.value.clone()),
                        ordinal,
                        &scope,
                    )?);
                }
                SelectItem::Wildcard(_) => columns.extend(scope.expand_wildcard(None)?),
                SelectItem::QualifiedWildcard(kind, _) => {
                    let rendered = kind.to_string();
                    let qualifier = normalize_identifier(last_segment(&rendered));
                    columns.extend(scope.expand_wildcard(Some(&qualifier))?);
                }
            }
        }

        disambiguate_names(&mut columns);

        let is_single_row = is_top_one(select)
            || (columns.len() == 1 && (select.from.is_empty() || is_ungrouped_aggregate(select)));

        Ok(ResolvedQuery {
            columns,
            is_single_row,
            table_aliases: scope.aliases.aliases,
            returns_rows,
        })
    }

    fn scope_source(
        &self,
        leaf: &JoinTree,
        nullability: &NullabilityResolution,
        ctes: &[Cte],
    ) -> Result<ScopeSource, ResolveError> {
        let forced_nullable = leaf
            .exposed_name()
            .is_some_and(|name| nullability.is_forced(name));

        let (identifier, columns) = match leaf {
            JoinTree::Source { object, .. } => {
                (base_identifier(object), self.source_columns(object, ctes))
            }
            JoinTree::Derived {
                alias,
                columns,
                query,
            } => (
                alias.clone().unwrap_or_default(),
                self.derived_columns(query, columns, ctes)?,
            ),
            JoinTree::Function { name, .. } => (name.clone(), None),
            JoinTree::Join { .. } => (String::new(), None),
        };

        Ok(ScopeSource {
            identifier,
            columns,
            forced_nullable,
        })
    }

    /// Columns of a named source; `None` marks it opaque.
    fn source_columns(&self, object: &QualifiedName, ctes: &[Cte]) -> Option<Vec<SourceColumn>> {
        let name = object.name.as_str();

        // Table-valued parameter, or a table variable declared in the body
        if name.starts_with('@') {
            let shape = self
                .parameters
                .iter()
                .find(|p| p.name.eq_ignore_ascii_case(strip_variable_sigil(name)))
                .and_then(Parameter::table_value)?;
            return Some(shape.columns.iter().map(SourceColumn::from).collect());
        }

        if name.starts_with('#') {
            return None;
        }

        if object.schema.is_none() && object.database.is_none() {
            if let Some(cte) = ctes.iter().rev().find(|c| c.name.eq_ignore_ascii_case(name)) {
                return Some(cte.columns.clone());
            }
        }

        let schema = object
            .schema
            .as_deref()
            .unwrap_or_else(|| self.catalog.default_schema());
        self.catalog
            .object_columns(schema, name)
            .map(|columns| columns.iter().map(SourceColumn::from).collect())
    }

    fn resolve_projection(
        &self,
        expr: &Expr,
        alias: Option<String>,
        ordinal: usize,
        scope: &Scope,
    ) -> Result<SelectColumn, ResolveError> {
        let (expr, alias) = match (expr, alias) {
            // T-SQL alias form: [Name] = expr
            (
                Expr::BinaryOp {
                    left,
                    op: BinaryOperator::Eq,
                    right,
                },
                None,
            ) if matches!(left.as_ref(), Expr::Identifier(id) if !id.value.starts_with('@')) => {
                let name = match left.as_ref() {
                    Expr::Identifier(id) => Some(id.value.clone()),
                    _ => None,
                };
                (right.as_ref(), name)
            }
            (expr, alias) => (expr, alias),
        };
        let expr = strip_nesting(expr);
        let fallback_name = || format!("Column{}", ordinal);

        match expr {
            Expr::Identifier(ident) if ident.value.starts_with("@@") => Ok(unknown_column(
                alias.unwrap_or_else(fallback_name),
                Provenance::Expression,
            )),
            Expr::Identifier(ident) if is_variable(&ident.value) => {
                let name = strip_variable_sigil(&ident.value).to_string();
                Ok(unknown_column(
                    alias.unwrap_or_else(|| name.clone()),
                    Provenance::Variable { name },
                ))
            }
            Expr::Identifier(ident) => {
                self.resolve_reference(scope, None, ident, alias, &ident.value)
            }
            Expr::CompoundIdentifier(parts) if parts.len() >= 2 => {
                let column = &parts[parts.len() - 1];
                let qualifier = &parts[parts.len() - 2];
                let display = parts
                    .iter()
                    .map(|p| p.value.as_str())
                    .collect::<Vec<_>>()
                    .join(".");
                self.resolve_reference(scope, Some(&qualifier.value), column, alias, &display)
            }
            _ => Ok(unknown_column(
                alias.unwrap_or_else(fallback_name),
                Provenance::Expression,
            )),
        }
    }

    fn resolve_reference(
        &self,
        scope: &Scope,
        qualifier: Option<&str>,
        column: &Ident,
        alias: Option<String>,
        display: &str,
    ) -> Result<SelectColumn, ResolveError> {
        let name = alias.unwrap_or_else(|| column.value.clone());
        match scope.lookup(qualifier, &column.value, display)? {
            ColumnMatch::Known { source, column } => Ok(known_column(name, source, column)),
            ColumnMatch::Opaque { source } => Ok(unknown_column(
                name,
                Provenance::OpaqueSource {
                    source: source.map(|s| s.identifier.clone()),
                },
            )),
        }
    }
}

/// Suffix repeated names (`id`, `id2`, `id3`) so each result column is distinct.
fn disambiguate_names(columns: &mut [SelectColumn]) {
    let mut taken = HashSet::new();
    for column in columns.iter_mut() {
        let base = column.name.clone();
        let mut n = 1;
        while !taken.insert(column.name.to_lowercase()) {
            n += 1;
            column.name = format!("{}{}", base, n);
        }
    }
}

/// Bodies with a row shape of their own
fn yields_rows(body: &SetExpr) -> bool {
    match body {
        SetExpr::Select(_) | SetExpr::Values(_) => true,
        SetExpr::Query(query) => yields_rows(&query.body),
        SetExpr::SetOperation { left, .. } => yields_rows(left),
        _ => false,
    }
}

fn strip_nesting(mut expr: &Expr) -> &Expr {
    while let Expr::Nested(inner) = expr {
        expr = inner;
    }
    expr
}

/// `SELECT @v = ...` assigns instead of returning rows
fn is_variable_assignment(item: &SelectItem) -> bool {
    match item {
        SelectItem::ExprWithAlias { alias, .. } => is_variable(&alias.value),
        SelectItem::UnnamedExpr(Expr::BinaryOp {
            left,
            op: BinaryOperator::Eq,
            ..
        }) => matches!(left.as_ref(), Expr::Identifier(id) if is_variable(&id.value)),
        _ => false,
    }
}

/// `TOP 1` or `TOP (1)` without PERCENT
fn is_top_one(select: &SelectNode) -> bool {
    let Some(top) = &select.top else {
        return false;
    };
    if top.percent {
        return false;
    }
    match &top.quantity {
        Some(TopQuantity::Constant(n)) => *n == 1,
        Some(TopQuantity::Expr(expr)) => {
            expr.to_string()
                .trim_matches(|c: char| c == '(' || c == ')' || c.is_whitespace())
                == "1"
        }
        None => false,
    }
}

/// One projected aggregate call with no GROUP BY
fn is_ungrouped_aggregate(select: &SelectNode) -> bool {
    let grouped = match &select.group_by {
        GroupByExpr::All(_) => true,
        GroupByExpr::Expressions(exprs, _) => !exprs.is_empty(),
    };
    if grouped {
        return false;
    }

    let expr = match select.projection.as_slice() {
        [SelectItem::UnnamedExpr(expr)] | [SelectItem::ExprWithAlias { expr, .. }] => expr,
        _ => return false,
    };
    let expr = match strip_nesting(expr) {
        Expr::BinaryOp {
            op: BinaryOperator::Eq,
            right,
            ..
        } => strip_nesting(right),
        other => other,
    };
    match expr {
        Expr::Function(function) => object_name_parts(&function.name)
            .last()
            .is_some_and(|name| AGGREGATES.iter().any(|a| a.eq_ignore_ascii_case(name))),
        _ => false,
    }
}
