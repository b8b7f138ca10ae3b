//! Build the schema and query model from parsed statements
//!
//! The schema part (types, tables, relationships, views) is all-or-nothing:
//! any integrity failure aborts the load. Procedures are then resolved
//! independently against the finished schema, and a procedure that fails is
//! reported without stopping the others.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use rayon::prelude::*;
use sqlparser::ast::{Query, SetExpr, TableFactor, TableWithJoins};

use super::elements::{
    find_column, AliasType, Column, Parameter, ParameterKind, Procedure, RelationshipIdentifier,
    SelectColumn, Table, TableValueShape, View,
};
use super::query_builder::{QueryResolver, SourceCatalog};
use super::relationships::{ForeignKey, RelationshipIndex};
use super::schema_model::SchemaModel;
use crate::catalog::{lookup_by_source, TypeRepresentationSet};
use crate::error::{ResolveError, SqlSharpenError};
use crate::parser::identifier_utils::object_name_parts;
use crate::parser::{
    DeclaredType, ParsedColumn, ParsedConstraint, ParsedParameter, ParsedProcedure,
    ParsedReference, ParsedScalarType, ParsedStatement, ParsedTable, ParsedView, QualifiedName,
    SchemaStatement,
};

/// Minimum number of procedures to benefit from parallel resolution
const PARALLEL_THRESHOLD: usize = 8;

/// Settings that shape the model
#[derive(Debug, Clone)]
pub struct ModelOptions {
    /// Schema assumed for unqualified names
    pub default_schema: String,
    /// Stripped from procedure names to form method-facing names
    pub procedure_prefix: String,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            default_schema: "dbo".to_string(),
            procedure_prefix: String::new(),
        }
    }
}

/// A built model plus the procedures that failed to resolve
#[derive(Debug)]
pub struct BuiltModel {
    pub model: SchemaModel,
    /// One [`SqlSharpenError::ProcedureResolution`] per failed procedure
    pub failures: Vec<SqlSharpenError>,
}

fn object_key(schema: &str, name: &str) -> String {
    format!("{}.{}", schema, name).to_lowercase()
}

fn full_name(schema: &str, name: &str) -> String {
    format!("[{}].[{}]", schema, name)
}

fn schema_of(name: &QualifiedName, default_schema: &str) -> String {
    name.schema
        .clone()
        .unwrap_or_else(|| default_schema.to_string())
}

fn is_builtin(declared: &DeclaredType) -> bool {
    declared
        .schema
        .as_deref()
        .map_or(true, |s| s.eq_ignore_ascii_case("sys"))
}

/// Statements grouped by kind, in source order
#[derive(Default)]
struct Collected<'a> {
    tables: Vec<&'a ParsedTable>,
    views: Vec<&'a ParsedView>,
    table_types: Vec<&'a ParsedTable>,
    scalar_types: Vec<&'a ParsedScalarType>,
    added_constraints: Vec<(&'a QualifiedName, &'a ParsedConstraint)>,
    procedures: Vec<&'a ParsedProcedure>,
}

impl<'a> Collected<'a> {
    fn from_statements(statements: &'a [ParsedStatement]) -> Self {
        let mut collected = Self::default();
        for parsed in statements {
            match &parsed.statement {
                SchemaStatement::Table(table) => collected.tables.push(table),
                SchemaStatement::View(view) => collected.views.push(view),
                SchemaStatement::TableType(table) => collected.table_types.push(table),
                SchemaStatement::ScalarType(scalar) => collected.scalar_types.push(scalar),
                SchemaStatement::AddConstraint { table, constraint } => {
                    collected.added_constraints.push((table, constraint))
                }
                SchemaStatement::Procedure(procedure) => collected.procedures.push(procedure),
                SchemaStatement::Other { .. } => {}
            }
        }
        collected
    }
}

/// Build the model from every parsed statement of a project.
pub fn build_model(statements: &[ParsedStatement], options: &ModelOptions) -> Result<BuiltModel> {
    let collected = Collected::from_statements(statements);
    let default_schema = options.default_schema.as_str();
    check_unique_names(&collected, default_schema)?;

    let mut model = SchemaModel::new(default_schema);
    model.alias_types = collected
        .scalar_types
        .iter()
        .map(|scalar| build_alias_type(scalar, default_schema))
        .collect::<Result<Vec<_>, _>>()?;

    for parsed in &collected.table_types {
        let schema = schema_of(&parsed.name, default_schema);
        let columns = build_columns(&schema, parsed, &[], &model.alias_types, default_schema)?;
        model.table_types.push(TableValueShape {
            schema,
            name: parsed.name.name.clone(),
            columns,
        });
    }

    let primary_keys = collect_primary_keys(&collected, default_schema);
    for parsed in &collected.tables {
        let schema = schema_of(&parsed.name, default_schema);
        let key_columns = primary_keys
            .get(&object_key(&schema, &parsed.name.name))
            .map(Vec::as_slice)
            .unwrap_or_default();
        let columns = build_columns(&schema, parsed, key_columns, &model.alias_types, default_schema)?;
        model.tables.push(Table {
            schema,
            name: parsed.name.name.clone(),
            columns,
        });
    }

    // Relationships need every table, so they are attached after all tables exist
    model.relationships = RelationshipIndex::build(collect_foreign_keys(
        &collected,
        &primary_keys,
        default_schema,
    ));
    for table in &mut model.tables {
        for column in &mut table.columns {
            let parents = model
                .relationships
                .parent_relationships(&table.schema, &table.name, &column.name);
            let children = model
                .relationships
                .child_relationships(&table.schema, &table.name, &column.name);
            column.set_relationships(parents, children);
        }
    }

    model.views = ViewResolver::new(&model, &collected.views).resolve_all()?;

    let (procedures, failures) = build_procedures(&collected.procedures, &model, options);
    model.procedures = procedures;

    Ok(BuiltModel { model, failures })
}

/// Tables, views and procedures share one namespace; table and alias types another.
fn check_unique_names(collected: &Collected<'_>, default_schema: &str) -> Result<(), SqlSharpenError> {
    fn check<'n>(
        names: impl Iterator<Item = &'n QualifiedName>,
        default_schema: &str,
    ) -> Result<(), SqlSharpenError> {
        let mut seen = HashSet::new();
        for name in names {
            let schema = schema_of(name, default_schema);
            if !seen.insert(object_key(&schema, &name.name)) {
                return Err(SqlSharpenError::DuplicateObject {
                    object: full_name(&schema, &name.name),
                });
            }
        }
        Ok(())
    }

    check(
        collected
            .tables
            .iter()
            .map(|t| &t.name)
            .chain(collected.views.iter().map(|v| &v.name))
            .chain(collected.procedures.iter().map(|p| &p.name)),
        default_schema,
    )?;
    check(
        collected
            .table_types
            .iter()
            .map(|t| &t.name)
            .chain(collected.scalar_types.iter().map(|s| &s.name)),
        default_schema,
    )
}

fn build_alias_type(scalar: &ParsedScalarType, default_schema: &str) -> Result<AliasType, SqlSharpenError> {
    let schema = schema_of(&scalar.name, default_schema);
    let base = &scalar.base_type;
    let data_type = is_builtin(base)
        .then(|| lookup_by_source(&base.name))
        .flatten()
        .ok_or_else(|| SqlSharpenError::UnknownColumnType {
            object: full_name(&schema, &scalar.name.name),
            column: "FROM".to_string(),
            data_type: base.to_string(),
        })?;

    Ok(AliasType {
        schema,
        name: scalar.name.name.clone(),
        data_type,
        nullable: scalar.nullable,
        precision: base.precision,
        scale: base.scale,
        length: base.length,
    })
}

/// Catalog row for a declared type: built-in types first, then alias types.
fn resolve_declared_type<'m>(
    declared: &DeclaredType,
    alias_types: &'m [AliasType],
    default_schema: &str,
) -> Option<(&'static TypeRepresentationSet, Option<&'m AliasType>)> {
    if is_builtin(declared) {
        if let Some(row) = lookup_by_source(&declared.name) {
            return Some((row, None));
        }
    }
    let schema = declared.schema.as_deref().unwrap_or(default_schema);
    alias_types
        .iter()
        .find(|a| a.schema.eq_ignore_ascii_case(schema) && a.name.eq_ignore_ascii_case(&declared.name))
        .map(|alias| (alias.data_type, Some(alias)))
}

fn build_columns(
    schema: &str,
    parsed: &ParsedTable,
    key_columns: &[String],
    alias_types: &[AliasType],
    default_schema: &str,
) -> Result<Vec<Column>, SqlSharpenError> {
    let object = full_name(schema, &parsed.name.name);
    let mut columns: Vec<Column> = Vec::with_capacity(parsed.columns.len());

    for parsed_column in &parsed.columns {
        if find_column(&columns, &parsed_column.name).is_some() {
            return Err(SqlSharpenError::DuplicateColumn {
                object,
                column: parsed_column.name.clone(),
            });
        }
        let is_primary_key = parsed_column.is_primary_key
            || key_columns
                .iter()
                .any(|k| k.eq_ignore_ascii_case(&parsed_column.name));
        columns.push(build_column(
            &object,
            parsed_column,
            is_primary_key,
            alias_types,
            default_schema,
        )?);
    }

    Ok(columns)
}

fn build_column(
    object: &str,
    parsed: &ParsedColumn,
    is_primary_key: bool,
    alias_types: &[AliasType],
    default_schema: &str,
) -> Result<Column, SqlSharpenError> {
    let Some(declared) = &parsed.data_type else {
        // Computed column
        let mut column = Column::bare(parsed.name.clone(), TypeRepresentationSet::unknown(), true);
        column.is_primary_key = is_primary_key;
        return Ok(column);
    };

    let (data_type, alias) = resolve_declared_type(declared, alias_types, default_schema)
        .ok_or_else(|| SqlSharpenError::UnknownColumnType {
            object: object.to_string(),
            column: parsed.name.clone(),
            data_type: declared.to_string(),
        })?;

    // Key and identity columns are implicitly NOT NULL
    let is_nullable = parsed
        .nullability
        .or_else(|| alias.map(|a| a.nullable))
        .unwrap_or(!(is_primary_key || parsed.is_identity));

    Ok(Column {
        name: parsed.name.clone(),
        data_type,
        is_identity: parsed.is_identity,
        is_nullable,
        precision: declared.precision.or_else(|| alias.and_then(|a| a.precision)),
        scale: declared.scale.or_else(|| alias.and_then(|a| a.scale)),
        length: declared.length.or_else(|| alias.and_then(|a| a.length)),
        is_primary_key,
        is_foreign_key: false,
        parent_relationships: Vec::new(),
        child_relationships: Vec::new(),
    })
}

/// Primary key columns per table key, from inline, table-level and ALTER TABLE constraints
fn collect_primary_keys(collected: &Collected<'_>, default_schema: &str) -> HashMap<String, Vec<String>> {
    let mut keys: HashMap<String, Vec<String>> = HashMap::new();
    let mut add = |table: &QualifiedName, columns: &[String]| {
        let key = object_key(&schema_of(table, default_schema), &table.name);
        let entry = keys.entry(key).or_default();
        for column in columns {
            if !entry.iter().any(|c| c.eq_ignore_ascii_case(column)) {
                entry.push(column.clone());
            }
        }
    };

    for table in &collected.tables {
        for column in table.columns.iter().filter(|c| c.is_primary_key) {
            add(&table.name, std::slice::from_ref(&column.name));
        }
        for constraint in &table.constraints {
            if let ParsedConstraint::PrimaryKey { columns, .. } = constraint {
                add(&table.name, columns);
            }
        }
    }
    for (table, constraint) in &collected.added_constraints {
        if let ParsedConstraint::PrimaryKey { columns, .. } = constraint {
            add(table, columns);
        }
    }

    keys
}

fn collect_foreign_keys(
    collected: &Collected<'_>,
    primary_keys: &HashMap<String, Vec<String>>,
    default_schema: &str,
) -> Vec<ForeignKey> {
    let make = |owner: &QualifiedName,
                name: Option<&String>,
                columns: Vec<String>,
                reference: &ParsedReference| {
        let referenced_schema = schema_of(&reference.table, default_schema);
        // An omitted column list references the target's primary key
        let referenced_columns = if reference.columns.is_empty() {
            primary_keys
                .get(&object_key(&referenced_schema, &reference.table.name))
                .cloned()
                .unwrap_or_default()
        } else {
            reference.columns.clone()
        };
        ForeignKey {
            name: name.cloned(),
            schema: schema_of(owner, default_schema),
            table: owner.name.clone(),
            columns,
            referenced: RelationshipIdentifier {
                database: reference.table.database.clone(),
                schema: Some(referenced_schema),
                table_or_view: reference.table.name.clone(),
                columns: referenced_columns,
            },
        }
    };

    let mut foreign_keys = Vec::new();
    for table in &collected.tables {
        for column in &table.columns {
            if let Some(reference) = &column.references {
                foreign_keys.push(make(&table.name, None, vec![column.name.clone()], reference));
            }
        }
        for constraint in &table.constraints {
            if let ParsedConstraint::ForeignKey {
                name,
                columns,
                references,
            } = constraint
            {
                foreign_keys.push(make(&table.name, name.as_ref(), columns.clone(), references));
            }
        }
    }
    for (table, constraint) in &collected.added_constraints {
        if let ParsedConstraint::ForeignKey {
            name,
            columns,
            references,
        } = constraint
        {
            foreign_keys.push(make(table, name.as_ref(), columns.clone(), references));
        }
    }

    foreign_keys
}

// ============================================================================
// Views
// ============================================================================

/// Objects named in the FROM clauses of a query, excluding its CTEs
fn view_dependencies(query: &Query) -> Vec<QualifiedName> {
    fn walk_query(query: &Query, ctes: &mut Vec<String>, out: &mut Vec<QualifiedName>) {
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                walk_query(&cte.query, ctes, out);
                ctes.push(cte.alias.name.value.to_lowercase());
            }
        }
        walk_set_expr(&query.body, ctes, out);
    }

    fn walk_set_expr(body: &SetExpr, ctes: &mut Vec<String>, out: &mut Vec<QualifiedName>) {
        match body {
            SetExpr::Select(select) => {
                for table in &select.from {
                    walk_table(table, ctes, out);
                }
            }
            SetExpr::Query(query) => walk_query(query, ctes, out),
            SetExpr::SetOperation { left, right, .. } => {
                walk_set_expr(left, ctes, out);
                walk_set_expr(right, ctes, out);
            }
            _ => {}
        }
    }

    fn walk_table(table: &TableWithJoins, ctes: &mut Vec<String>, out: &mut Vec<QualifiedName>) {
        walk_factor(&table.relation, ctes, out);
        for join in &table.joins {
            walk_factor(&join.relation, ctes, out);
        }
    }

    fn walk_factor(factor: &TableFactor, ctes: &mut Vec<String>, out: &mut Vec<QualifiedName>) {
        match factor {
            TableFactor::Table { name, args: None, .. } => {
                if let Some(object) = QualifiedName::from_parts(object_name_parts(name)) {
                    let is_cte = object.schema.is_none()
                        && ctes.contains(&object.name.to_lowercase());
                    if !is_cte {
                        out.push(object);
                    }
                }
            }
            TableFactor::Derived { subquery, .. } => walk_query(subquery, ctes, out),
            TableFactor::NestedJoin {
                table_with_joins, ..
            } => walk_table(table_with_joins, ctes, out),
            _ => {}
        }
    }

    let mut out = Vec::new();
    walk_query(query, &mut Vec::new(), &mut out);
    out
}

/// Tables of the model plus the views resolved so far
struct ViewCatalog<'a> {
    model: &'a SchemaModel,
    resolved: &'a HashMap<String, View>,
}

impl SourceCatalog for ViewCatalog<'_> {
    fn default_schema(&self) -> &str {
        &self.model.default_schema
    }

    fn object_columns(&self, schema: &str, name: &str) -> Option<&[Column]> {
        self.model.object_columns(schema, name).or_else(|| {
            self.resolved
                .get(&object_key(schema, name))
                .map(|v| v.columns.as_slice())
        })
    }
}

/// Resolves views depth-first so each view sees the views it selects from.
struct ViewResolver<'a> {
    model: &'a SchemaModel,
    views: Vec<(String, String, &'a ParsedView)>,
    resolved: HashMap<String, View>,
    in_progress: Vec<String>,
}

impl<'a> ViewResolver<'a> {
    fn new(model: &'a SchemaModel, parsed: &[&'a ParsedView]) -> Self {
        let views = parsed
            .iter()
            .map(|view| {
                let schema = schema_of(&view.name, &model.default_schema);
                (object_key(&schema, &view.name.name), schema, *view)
            })
            .collect();
        Self {
            model,
            views,
            resolved: HashMap::new(),
            in_progress: Vec::new(),
        }
    }

    /// Resolve every view; results keep source order.
    fn resolve_all(mut self) -> Result<Vec<View>, SqlSharpenError> {
        for index in 0..self.views.len() {
            self.resolve(index)?;
        }
        let mut resolved = self.resolved;
        Ok(self
            .views
            .iter()
            .filter_map(|(key, _, _)| resolved.remove(key))
            .collect())
    }

    fn resolve(&mut self, index: usize) -> Result<(), SqlSharpenError> {
        let (key, schema, view) = self.views[index].clone();
        if self.resolved.contains_key(&key) {
            return Ok(());
        }
        if let Some(start) = self.in_progress.iter().position(|k| *k == key) {
            let mut chain = self.in_progress[start..].to_vec();
            chain.push(key);
            return Err(SqlSharpenError::ViewCycle {
                chain: chain.join(" -> "),
            });
        }

        self.in_progress.push(key.clone());
        for dependency in view_dependencies(&view.query) {
            let dependency_key = object_key(
                dependency
                    .schema
                    .as_deref()
                    .unwrap_or(&self.model.default_schema),
                &dependency.name,
            );
            if let Some(position) = self.views.iter().position(|(k, _, _)| *k == dependency_key) {
                self.resolve(position)?;
            }
        }
        self.in_progress.pop();

        let catalog = ViewCatalog {
            model: self.model,
            resolved: &self.resolved,
        };
        let mut selected = QueryResolver::new(&catalog, &[])
            .resolve_columns(&view.query)
            .map_err(|source| SqlSharpenError::ViewResolution {
                view: full_name(&schema, &view.name.name),
                source,
            })?;
        for (column, rename) in selected.iter_mut().zip(&view.columns) {
            column.name = rename.clone();
        }

        let columns = selected.into_iter().map(view_column).collect();
        self.resolved.insert(
            key,
            View {
                schema,
                name: view.name.name.clone(),
                columns,
            },
        );
        Ok(())
    }
}

fn view_column(selected: SelectColumn) -> Column {
    Column::bare(selected.name, selected.data_type, selected.is_nullable)
}

// ============================================================================
// Procedures
// ============================================================================

fn build_procedures(
    parsed: &[&ParsedProcedure],
    model: &SchemaModel,
    options: &ModelOptions,
) -> (Vec<Procedure>, Vec<SqlSharpenError>) {
    let results: Vec<Result<Procedure, SqlSharpenError>> = if parsed.len() >= PARALLEL_THRESHOLD {
        parsed
            .par_iter()
            .map(|p| build_procedure(p, model, options))
            .collect()
    } else {
        parsed
            .iter()
            .map(|p| build_procedure(p, model, options))
            .collect()
    };

    let mut procedures = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(procedure) => procedures.push(procedure),
            Err(error) => failures.push(error),
        }
    }
    (procedures, failures)
}

/// Method-facing name: the declared name with the prefix stripped
fn method_name(raw_name: &str, prefix: &str) -> String {
    match raw_name.strip_prefix(prefix) {
        Some(stripped) if !prefix.is_empty() && !stripped.is_empty() => stripped.to_string(),
        _ => raw_name.to_string(),
    }
}

fn build_procedure(
    parsed: &ParsedProcedure,
    model: &SchemaModel,
    options: &ModelOptions,
) -> Result<Procedure, SqlSharpenError> {
    let schema = schema_of(&parsed.name, &model.default_schema);
    let raw_name = parsed.name.name.clone();
    let parameters: Vec<Parameter> = parsed
        .parameters
        .iter()
        .map(|p| resolve_parameter(p, model))
        .collect();

    let resolver = QueryResolver::new(model, &parameters);
    let mut selects = Vec::new();
    for (index, select) in parsed.selects.iter().enumerate() {
        let resolved = match &select.query {
            Ok(query) => resolver.resolve_select(query),
            Err(message) => Err(ResolveError::MalformedSelect {
                message: message.clone(),
            }),
        }
        .map_err(|source| SqlSharpenError::ProcedureResolution {
            procedure: full_name(&schema, &raw_name),
            select: index + 1,
            source,
        })?;
        selects.extend(resolved);
    }

    Ok(Procedure {
        name: method_name(&raw_name, &options.procedure_prefix),
        schema,
        raw_name,
        parameters,
        selects,
    })
}

/// Table types win over scalar types; unknown scalar types degrade to the opaque row.
fn resolve_parameter(parsed: &ParsedParameter, model: &SchemaModel) -> Parameter {
    let declared = &parsed.data_type;
    let type_schema = declared.schema.as_deref().unwrap_or(&model.default_schema);

    let kind = match model.table_type(type_schema, &declared.name) {
        Some(shape) => ParameterKind::TableValue {
            shape: shape.clone(),
        },
        None => ParameterKind::Scalar {
            data_type: resolve_declared_type(declared, &model.alias_types, &model.default_schema)
                .map(|(row, _)| row)
                .unwrap_or_else(TypeRepresentationSet::unknown),
        },
    };

    Parameter {
        name: parsed.name.clone(),
        is_output: parsed.is_output,
        default_value: parsed.default_value.clone(),
        kind,
    }
}
