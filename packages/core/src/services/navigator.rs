//! Hierarchy Navigator
//!
//! Scope constructors for every relative of a node. Each one is a single
//! predicate on the path or parent column; nothing walks the tree.

use crate::models::{Fragment, MaterializedPath, Node};
use crate::services::scope::{Condition, NodeScope};

impl NodeScope {
    /// Nodes without a parent reference
    pub fn roots() -> Self {
        Self::with_condition(Condition::Roots)
    }

    /// Strict ancestors of `node`, root first
    pub fn ancestors(node: &Node) -> Self {
        Self::with_condition(Condition::AncestorsOf {
            path: node.path.clone(),
            include_self: false,
        })
    }

    /// The chain from the root down to `node`, inclusive
    pub fn self_and_ancestors(node: &Node) -> Self {
        Self::with_condition(Condition::AncestorsOf {
            path: node.path.clone(),
            include_self: true,
        })
    }

    /// The root of `node`'s tree, looked up by the first path segment
    pub fn root_of(node: &Node) -> Self {
        Self::with_paths(vec![node.path.root_path()])
    }

    /// Nodes sharing `node`'s parent reference, excluding `node`
    ///
    /// For a root these are the other roots. Roots share the `NULL` reference
    /// and are matched with `IS NULL`; a plain `parent = NULL` comparison
    /// matches nothing and would leave a root without siblings.
    pub fn siblings(node: &Node) -> Self {
        Self::self_and_siblings(node).and(Condition::ExcludeFragment(node.fragment.clone()))
    }

    pub fn self_and_siblings(node: &Node) -> Self {
        Self::with_condition(Condition::ParentIs(node.parent_fragment.clone()))
    }

    /// Direct children of `node`
    pub fn children(node: &Node) -> Self {
        Self::children_of(&node.fragment)
    }

    /// Direct children of the node with `fragment`
    pub fn children_of(fragment: &Fragment) -> Self {
        Self::with_condition(Condition::ParentIs(Some(fragment.clone())))
    }

    pub fn self_and_children(node: &Node) -> Self {
        Self::with_condition(Condition::FragmentOrParentIs(node.fragment.clone()))
    }

    /// Every node below `node`
    pub fn descendants(node: &Node) -> Self {
        Self::with_condition(Condition::DescendantsOf {
            path: node.path.clone(),
            include_self: false,
        })
    }

    pub fn self_and_descendants(node: &Node) -> Self {
        Self::with_condition(Condition::DescendantsOf {
            path: node.path.clone(),
            include_self: true,
        })
    }

    /// Descendants of `node` that have no children
    pub fn leaves_of(node: &Node) -> Self {
        Self::descendants(node).leaves()
    }

    /// Nodes stored at exactly these paths
    pub fn with_paths(paths: Vec<MaterializedPath>) -> Self {
        Self::with_condition(Condition::PathIn(paths))
    }
}
