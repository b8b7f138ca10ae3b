//! Join-driven nullability propagation
//!
//! A source reachable only through the optional side of an outer join may be
//! absent from a row, so all of its columns are nullable there. The forcing is
//! inherited by every leaf below the optional side, including leaves joined to
//! it with an inner join. An inner join or CROSS APPLY whose condition names
//! only already-optional sources makes its right side optional as well:
//! `a LEFT JOIN b ON .. JOIN c ON c.x = b.x` leaves `c` absent whenever `b` is.

use std::collections::HashSet;

use super::join_tree::JoinTree;

/// Exposed names (lowercase) of the sources forced nullable by outer joins
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NullabilityResolution {
    forced: HashSet<String>,
}

impl NullabilityResolution {
    pub fn is_forced(&self, exposed_name: &str) -> bool {
        self.forced.contains(&exposed_name.to_lowercase())
    }

    pub fn forced_count(&self) -> usize {
        self.forced.len()
    }
}

pub fn propagate_nullability(tree: Option<&JoinTree>) -> NullabilityResolution {
    let mut resolution = NullabilityResolution::default();
    if let Some(tree) = tree {
        mark(tree, false, &mut resolution.forced);
    }
    resolution
}

fn mark(tree: &JoinTree, optional: bool, forced: &mut HashSet<String>) {
    match tree {
        JoinTree::Join {
            kind,
            left,
            right,
            on_references,
        } => {
            let (left_optional, right_optional) = kind.optional_sides();
            mark(left, optional || left_optional, forced);
            let chained = kind.follows_referenced_sources()
                && references_only_forced(left, on_references, forced);
            mark(right, optional || right_optional || chained, forced);
        }
        leaf => {
            if optional {
                if let Some(name) = leaf.exposed_name() {
                    forced.insert(name.to_lowercase());
                }
            }
        }
    }
}

/// The condition names at least one source from `left`, and every such source is forced.
fn references_only_forced(left: &JoinTree, references: &[String], forced: &HashSet<String>) -> bool {
    let named: Vec<String> = left
        .leaves()
        .into_iter()
        .filter_map(JoinTree::exposed_name)
        .map(str::to_lowercase)
        .filter(|name| references.contains(name))
        .collect();
    !named.is_empty() && named.iter().all(|name| forced.contains(name))
}
