//! Hierarchy Engine Operations
//!
//! The write-side rules of a materialized-path collection:
//!
//! - `compute_path` - a node's path from its parent's path and its fragment
//! - `guard_against_cycle` - refuse a parent that lies inside the node's subtree
//! - `lifecycle` - two-phase create and reparent-with-cascade over a `Collection`
//!
//! None of these open transactions. `HierarchyService` wraps each host write
//! in one; hosts with their own transaction call the `lifecycle` functions
//! directly on a borrowed connection.

pub mod lifecycle;

pub use lifecycle::{
    allocate_identity, apply_parent_change, assign_path, resolve_parent, AllocatedNode,
    ReparentOutcome,
};

use crate::config::HierarchyConfig;
use crate::models::{Fragment, MaterializedPath, Node, ValidationError};

/// Path of a node with `fragment` under a parent at `parent_path`
///
/// A node without a parent path is a root and its path is its fragment alone.
pub fn compute_path(
    fragment: &Fragment,
    parent_path: Option<&MaterializedPath>,
) -> MaterializedPath {
    match parent_path {
        Some(parent_path) => parent_path.child(fragment),
        None => MaterializedPath::root(fragment),
    }
}

/// Parent reference before and after a proposed update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentChange {
    pub old: Option<Fragment>,
    pub new: Option<Fragment>,
}

impl ParentChange {
    pub fn new(old: Option<Fragment>, new: Option<Fragment>) -> Self {
        Self { old, new }
    }

    /// Whether the reference value actually differs
    pub fn is_change(&self) -> bool {
        self.old != self.new
    }
}

/// Reject `prospective_parent` if its path already contains `fragment`
///
/// Paths are consistent before the write, so a parent whose path holds the
/// node's fragment is the node itself or one of its descendants.
pub fn guard_against_cycle(
    config: &HierarchyConfig,
    fragment: &Fragment,
    prospective_parent: Option<&Node>,
) -> Result<(), ValidationError> {
    match prospective_parent {
        Some(parent) if parent.path.contains_segment(fragment) => {
            Err(ValidationError::circular_reference(
                &config.parent_fragment,
                fragment,
                &parent.fragment,
            ))
        }
        _ => Ok(()),
    }
}
