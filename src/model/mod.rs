//! Schema and query model building

mod aliases;
mod builder;
mod elements;
mod join_tree;
mod nullability;
mod query_builder;
mod relationships;
mod schema_model;

pub use aliases::{base_identifier, resolve_aliases, AliasResolution};
pub use builder::{build_model, BuiltModel, ModelOptions};
pub use elements::*;
pub use join_tree::{JoinKind, JoinTree};
pub use nullability::{propagate_nullability, NullabilityResolution};
pub use query_builder::{QueryResolver, ResolvedQuery, SourceCatalog};
pub use relationships::{ForeignKey, RelationshipIndex};
pub use schema_model::SchemaModel;
