//! Schema-wide foreign-key relationship index
//!
//! Built once from every foreign key in the schema, then queried per column.
//! Child relationships need a global view (any table may reference any other),
//! so the reverse direction is indexed up front by referenced table.

use std::collections::HashMap;

use super::elements::RelationshipIdentifier;
use crate::parser::identifier_utils::identifier_key;

/// A foreign key owned by one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub name: Option<String>,
    /// Owning (referencing) table
    pub schema: String,
    pub table: String,
    /// Referencing columns, in key order
    pub columns: Vec<String>,
    /// Referenced table and columns, in key order
    pub referenced: RelationshipIdentifier,
}

impl ForeignKey {
    fn referencing_side(&self) -> RelationshipIdentifier {
        RelationshipIdentifier {
            database: None,
            schema: Some(self.schema.clone()),
            table_or_view: self.table.clone(),
            columns: self.columns.clone(),
        }
    }
}

fn table_key(schema: &str, table: &str) -> String {
    identifier_key(&format!("{}.{}", schema, table))
}

fn contains_column(columns: &[String], column: &str) -> bool {
    columns.iter().any(|c| c.eq_ignore_ascii_case(column))
}

/// Foreign keys grouped by owning table and by referenced table
#[derive(Debug, Default)]
pub struct RelationshipIndex {
    foreign_keys: Vec<ForeignKey>,
    by_owner: HashMap<String, Vec<usize>>,
    by_referenced: HashMap<String, Vec<usize>>,
}

impl RelationshipIndex {
    /// Index every foreign key of the schema in one pass.
    pub fn build(foreign_keys: Vec<ForeignKey>) -> Self {
        let mut by_owner: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_referenced: HashMap<String, Vec<usize>> = HashMap::new();

        for (i, fk) in foreign_keys.iter().enumerate() {
            by_owner
                .entry(table_key(&fk.schema, &fk.table))
                .or_default()
                .push(i);
            let referenced_schema = fk.referenced.schema.as_deref().unwrap_or_default();
            by_referenced
                .entry(table_key(referenced_schema, &fk.referenced.table_or_view))
                .or_default()
                .push(i);
        }

        Self {
            foreign_keys,
            by_owner,
            by_referenced,
        }
    }

    pub fn len(&self) -> usize {
        self.foreign_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.foreign_keys.is_empty()
    }

    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    /// Relationships where `schema.table.column` is the referencing side.
    ///
    /// Each entry identifies the referenced table and its key columns.
    pub fn parent_relationships(
        &self,
        schema: &str,
        table: &str,
        column: &str,
    ) -> Vec<RelationshipIdentifier> {
        self.by_owner
            .get(&table_key(schema, table))
            .into_iter()
            .flatten()
            .map(|&i| &self.foreign_keys[i])
            .filter(|fk| contains_column(&fk.columns, column))
            .map(|fk| fk.referenced.clone())
            .collect()
    }

    /// Relationships where `schema.table.column` is referenced by another table.
    ///
    /// Each entry identifies the referencing table and its columns.
    pub fn child_relationships(
        &self,
        schema: &str,
        table: &str,
        column: &str,
    ) -> Vec<RelationshipIdentifier> {
        self.by_referenced
            .get(&table_key(schema, table))
            .into_iter()
            .flatten()
            .map(|&i| &self.foreign_keys[i])
            .filter(|fk| contains_column(&fk.referenced.columns, column))
            .map(ForeignKey::referencing_side)
            .collect()
    }
}
