//! Alias resolution for the sources of one select

use std::collections::{BTreeMap, HashMap};

use super::join_tree::JoinTree;
use crate::error::ResolveError;
use crate::parser::QualifiedName;

/// Dotted identifier as written, without brackets (`dbo.tb1`)
pub fn base_identifier(object: &QualifiedName) -> String {
    [object.database.as_deref(), object.schema.as_deref(), Some(object.name.as_str())]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(".")
}

/// Alias map plus the exposed name of every leaf
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasResolution {
    /// alias -> base table/view identifier; unaliased sources have no entry
    pub aliases: BTreeMap<String, String>,
    /// lowercase exposed name -> index into [`JoinTree::leaves`]
    exposed: HashMap<String, usize>,
}

impl AliasResolution {
    /// Leaf index of the source exposed as `name`
    pub fn source_index(&self, name: &str) -> Option<usize> {
        self.exposed.get(&name.to_lowercase()).copied()
    }
}

/// Collect aliases and exposed names from a join tree.
///
/// Two sources exposed under the same name is an error.
pub fn resolve_aliases(tree: Option<&JoinTree>) -> Result<AliasResolution, ResolveError> {
    let mut resolution = AliasResolution::default();
    let Some(tree) = tree else {
        return Ok(resolution);
    };

    for (index, leaf) in tree.leaves().into_iter().enumerate() {
        let Some(exposed) = leaf.exposed_name() else {
            continue;
        };
        if resolution
            .exposed
            .insert(exposed.to_lowercase(), index)
            .is_some()
        {
            return Err(ResolveError::AliasCollision {
                alias: exposed.to_string(),
            });
        }

        if let JoinTree::Source {
            object,
            alias: Some(alias),
        } = leaf
        {
            resolution
                .aliases
                .insert(alias.clone(), base_identifier(object));
        }
    }

    Ok(resolution)
}
