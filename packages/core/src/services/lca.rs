//! Lowest Common Ancestor Input
//!
//! The resolver accepts either literal paths or a scope whose path column is
//! read first. The aggregate itself is `MaterializedPath::lowest_common_ancestor`.

use crate::models::MaterializedPath;
use crate::services::scope::NodeScope;

/// Paths to find the lowest common ancestor of
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LcaInput {
    Paths(Vec<MaterializedPath>),
    /// Paths of the nodes matched by a scope
    Scope(NodeScope),
}

impl From<Vec<MaterializedPath>> for LcaInput {
    fn from(paths: Vec<MaterializedPath>) -> Self {
        Self::Paths(paths)
    }
}

impl From<NodeScope> for LcaInput {
    fn from(scope: NodeScope) -> Self {
        Self::Scope(scope)
    }
}

/// Deepest path that is an ancestor of every path, as a zero- or one-element list
pub fn common_ancestor_paths(paths: &[MaterializedPath]) -> Vec<MaterializedPath> {
    MaterializedPath::lowest_common_ancestor(paths)
        .into_iter()
        .collect()
}
