//! Schema and query model element types

use std::collections::BTreeMap;

use serde::Serialize;

use crate::catalog::TypeRepresentationSet;

/// One side of a foreign-key edge
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RelationshipIdentifier {
    pub database: Option<String>,
    pub schema: Option<String>,
    pub table_or_view: String,
    pub columns: Vec<String>,
}

/// A column of a table, view or table type
#[derive(Debug, Clone, Serialize)]
pub struct Column {
    pub name: String,
    /// Catalog row, or [`TypeRepresentationSet::unknown`] for computed and view expression columns
    #[serde(rename = "type")]
    pub data_type: &'static TypeRepresentationSet,
    pub is_identity: bool,
    /// Declared nullability, before any join-based override
    pub is_nullable: bool,
    pub precision: Option<u8>,
    pub scale: Option<u8>,
    /// Character/byte length; -1 for MAX
    pub length: Option<i32>,
    pub is_primary_key: bool,
    pub is_foreign_key: bool,
    /// Relationships where this column references a parent
    pub parent_relationships: Vec<RelationshipIdentifier>,
    /// Relationships where this column is referenced by a child
    pub child_relationships: Vec<RelationshipIdentifier>,
}

impl Column {
    /// A column with only a name, type and nullability (view and derived columns)
    pub fn bare(
        name: impl Into<String>,
        data_type: &'static TypeRepresentationSet,
        is_nullable: bool,
    ) -> Self {
        Self {
            name: name.into(),
            data_type,
            is_identity: false,
            is_nullable,
            precision: None,
            scale: None,
            length: None,
            is_primary_key: false,
            is_foreign_key: false,
            parent_relationships: Vec::new(),
            child_relationships: Vec::new(),
        }
    }

    /// Attach relationships; the foreign-key flag follows the parent list.
    pub fn set_relationships(
        &mut self,
        parents: Vec<RelationshipIdentifier>,
        children: Vec<RelationshipIdentifier>,
    ) {
        self.is_foreign_key = !parents.is_empty();
        self.parent_relationships = parents;
        self.child_relationships = children;
    }
}

/// Find a column by name (case-insensitive)
pub fn find_column<'a>(columns: &'a [Column], name: &str) -> Option<&'a Column> {
    columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
}

#[derive(Debug, Clone, Serialize)]
pub struct Table {
    pub schema: String,
    pub name: String,
    pub columns: Vec<Column>,
}

impl Table {
    pub fn full_name(&self) -> String {
        format!("[{}].[{}]", self.schema, self.name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        find_column(&self.columns, name)
    }

    pub fn primary_key(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct View {
    pub schema: String,
    pub name: String,
    pub columns: Vec<Column>,
}

impl View {
    pub fn full_name(&self) -> String {
        format!("[{}].[{}]", self.schema, self.name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        find_column(&self.columns, name)
    }
}

/// Row shape of a user-defined table type, and of parameters declared with it
#[derive(Debug, Clone, Serialize)]
pub struct TableValueShape {
    pub schema: String,
    pub name: String,
    pub columns: Vec<Column>,
}

impl TableValueShape {
    pub fn full_name(&self) -> String {
        format!("[{}].[{}]", self.schema, self.name)
    }
}

/// `CREATE TYPE name FROM base` resolved to its catalog row
#[derive(Debug, Clone, Serialize)]
pub struct AliasType {
    pub schema: String,
    pub name: String,
    #[serde(rename = "base_type")]
    pub data_type: &'static TypeRepresentationSet,
    pub nullable: bool,
    pub precision: Option<u8>,
    pub scale: Option<u8>,
    pub length: Option<i32>,
}

/// Either a scalar type or a table-valued row shape, never both
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParameterKind {
    Scalar {
        #[serde(rename = "type")]
        data_type: &'static TypeRepresentationSet,
    },
    TableValue { shape: TableValueShape },
}

#[derive(Debug, Clone, Serialize)]
pub struct Parameter {
    /// Name without the `@` sigil
    pub name: String,
    pub is_output: bool,
    pub default_value: Option<String>,
    #[serde(flatten)]
    pub kind: ParameterKind,
}

impl Parameter {
    pub fn scalar_type(&self) -> Option<&'static TypeRepresentationSet> {
        match &self.kind {
            ParameterKind::Scalar { data_type } => Some(data_type),
            ParameterKind::TableValue { .. } => None,
        }
    }

    pub fn table_value(&self) -> Option<&TableValueShape> {
        match &self.kind {
            ParameterKind::TableValue { shape } => Some(shape),
            ParameterKind::Scalar { .. } => None,
        }
    }
}

/// Where a select column's value comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Provenance {
    /// A column of a table, view, table-valued parameter, CTE or derived table
    Column { source: String, column: String },
    /// A local variable or parameter
    Variable { name: String },
    /// A literal, call, cast or other computed expression
    Expression,
    /// A column of a source whose columns are not known (temp table, function, ...)
    OpaqueSource { source: Option<String> },
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: &'static TypeRepresentationSet,
    /// Effective nullability: declared, forced by an outer join, or unknown
    pub is_nullable: bool,
    pub provenance: Provenance,
}

#[derive(Debug, Clone, Serialize)]
pub struct Select {
    pub columns: Vec<SelectColumn>,
    pub is_single_row: bool,
    /// Alias -> base table/view identifier, only for aliased sources
    pub table_aliases: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Procedure {
    pub schema: String,
    /// Method-facing name, with the configured prefix stripped
    pub name: String,
    /// Name as declared
    pub raw_name: String,
    pub parameters: Vec<Parameter>,
    /// One per result-producing select, in execution order
    pub selects: Vec<Select>,
}

impl Procedure {
    pub fn full_name(&self) -> String {
        format!("[{}].[{}]", self.schema, self.raw_name)
    }
}
