//! The assembled schema and query model

use serde::Serialize;

use super::elements::{AliasType, Column, Procedure, Table, TableValueShape, View};
use super::query_builder::SourceCatalog;
use super::relationships::RelationshipIndex;

/// Whether `(schema, name)` identifies the object `(other_schema, other_name)`
pub(crate) fn same_object(schema: &str, name: &str, other_schema: &str, other_name: &str) -> bool {
    schema.eq_ignore_ascii_case(other_schema) && name.eq_ignore_ascii_case(other_name)
}

/// Tables, views, user-defined types and procedures of one database project.
///
/// Built once by [`super::build_model`] and read-only afterwards.
#[derive(Debug, Serialize)]
pub struct SchemaModel {
    pub default_schema: String,
    pub tables: Vec<Table>,
    pub views: Vec<View>,
    pub table_types: Vec<TableValueShape>,
    pub alias_types: Vec<AliasType>,
    /// Columns already carry their relationship lists
    #[serde(skip)]
    pub relationships: RelationshipIndex,
    pub procedures: Vec<Procedure>,
}

impl SchemaModel {
    pub fn new(default_schema: impl Into<String>) -> Self {
        Self {
            default_schema: default_schema.into(),
            tables: Vec::new(),
            views: Vec::new(),
            table_types: Vec::new(),
            alias_types: Vec::new(),
            relationships: RelationshipIndex::default(),
            procedures: Vec::new(),
        }
    }

    pub fn table(&self, schema: &str, name: &str) -> Option<&Table> {
        self.tables
            .iter()
            .find(|t| same_object(&t.schema, &t.name, schema, name))
    }

    pub fn view(&self, schema: &str, name: &str) -> Option<&View> {
        self.views
            .iter()
            .find(|v| same_object(&v.schema, &v.name, schema, name))
    }

    pub fn table_type(&self, schema: &str, name: &str) -> Option<&TableValueShape> {
        self.table_types
            .iter()
            .find(|t| same_object(&t.schema, &t.name, schema, name))
    }

    pub fn alias_type(&self, schema: &str, name: &str) -> Option<&AliasType> {
        self.alias_types
            .iter()
            .find(|t| same_object(&t.schema, &t.name, schema, name))
    }

    /// Find a procedure by its method-facing or declared name
    pub fn procedure(&self, name: &str) -> Option<&Procedure> {
        self.procedures
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name) || p.raw_name.eq_ignore_ascii_case(name))
    }
}

impl SourceCatalog for SchemaModel {
    fn default_schema(&self) -> &str {
        &self.default_schema
    }

    fn object_columns(&self, schema: &str, name: &str) -> Option<&[Column]> {
        self.table(schema, name)
            .map(|t| t.columns.as_slice())
            .or_else(|| self.view(schema, name).map(|v| v.columns.as_slice()))
    }
}
