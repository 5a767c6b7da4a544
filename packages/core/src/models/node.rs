//! Node Data Structures
//!
//! This module defines the hierarchy-facing view of a collection row:
//!
//! - `Node` - a persisted row with its fragment, parent reference, and path
//! - `NewNode` - parameters for creating a row
//! - `DraftNode` - a node that has not been persisted yet (no path assigned)
//! - `Hierarchical` - depth and root detection shared by both
//!
//! # Examples
//!
//! ```rust
//! use arbor_core::models::{DraftNode, Hierarchical};
//!
//! let root = DraftNode::new();
//! let child = DraftNode::new().with_draft_parent(root);
//! let grandchild = DraftNode::new().with_draft_parent(child);
//!
//! assert_eq!(grandchild.depth(), 3);
//! assert!(!grandchild.is_root());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::path::{Fragment, MaterializedPath};

/// Validation errors for hierarchy values and writes
///
/// Field-level variants carry the name of the column the failure is attached
/// to, so hosts can surface them next to the offending input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} is invalid: {fragment} cannot be moved under {parent}, which is its own descendant")]
    CircularReference {
        field: String,
        fragment: Fragment,
        parent: Fragment,
    },

    #[error("{field} is invalid: parent {parent} does not exist")]
    InvalidParent { field: String, parent: Fragment },

    #[error("Invalid fragment: {0}")]
    InvalidFragment(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

impl ValidationError {
    /// Create a circular reference error attached to the parent-reference column
    pub fn circular_reference(
        field: impl Into<String>,
        fragment: &Fragment,
        parent: &Fragment,
    ) -> Self {
        Self::CircularReference {
            field: field.into(),
            fragment: fragment.clone(),
            parent: parent.clone(),
        }
    }

    /// Create an invalid parent error attached to the parent-reference column
    pub fn invalid_parent(field: impl Into<String>, parent: &Fragment) -> Self {
        Self::InvalidParent {
            field: field.into(),
            parent: parent.clone(),
        }
    }

    /// Column the failure is attached to, if it is a field-level failure
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::CircularReference { field, .. } | Self::InvalidParent { field, .. } => {
                Some(field)
            }
            _ => None,
        }
    }
}

/// Depth and root detection for persisted and unpersisted nodes
///
/// Implementors only expose what they know; `is_root` and `depth` are derived.
pub trait Hierarchical {
    /// Fragment, if already known
    fn fragment(&self) -> Option<&Fragment>;

    /// Parent reference value, if any
    fn parent_fragment(&self) -> Option<&Fragment>;

    /// Persisted path, if assigned
    fn known_path(&self) -> Option<&MaterializedPath>;

    /// Parent object held in memory, if any
    fn attached_parent(&self) -> Option<&dyn Hierarchical>;

    /// True iff there is neither a parent reference nor an attached parent
    fn is_root(&self) -> bool {
        self.parent_fragment().is_none() && self.attached_parent().is_none()
    }

    /// 1-based depth
    ///
    /// A root is at depth 1. A node with a known path is at its path level.
    /// Otherwise the attached parent chain is walked until a root or a node
    /// with a known path is reached.
    fn depth(&self) -> usize {
        if self.is_root() {
            return 1;
        }
        if let Some(path) = self.known_path() {
            return path.level();
        }
        match self.attached_parent() {
            Some(parent) => parent.depth() + 1,
            None => 1,
        }
    }
}

/// A persisted node of a hierarchical collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Identifying segment; immutable once assigned
    pub fragment: Fragment,

    /// Parent reference (None means root)
    pub parent_fragment: Option<Fragment>,

    /// Materialized path from the root to this node, inclusive
    pub path: MaterializedPath,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Hierarchical for Node {
    fn fragment(&self) -> Option<&Fragment> {
        Some(&self.fragment)
    }

    fn parent_fragment(&self) -> Option<&Fragment> {
        self.parent_fragment.as_ref()
    }

    fn known_path(&self) -> Option<&MaterializedPath> {
        Some(&self.path)
    }

    fn attached_parent(&self) -> Option<&dyn Hierarchical> {
        None
    }
}

/// Parameters for node creation
///
/// The fragment is normally allocated by the store or the configured
/// [`FragmentStrategy`](crate::config::FragmentStrategy); set `fragment` only
/// when the host owns identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewNode {
    pub fragment: Option<Fragment>,
    pub parent: Option<Fragment>,
}

impl NewNode {
    /// A new root node
    pub fn root() -> Self {
        Self::default()
    }

    /// A new child of `parent`
    pub fn child_of(parent: &Fragment) -> Self {
        Self {
            fragment: None,
            parent: Some(parent.clone()),
        }
    }

    /// Use a host-supplied fragment instead of allocating one
    pub fn with_fragment(mut self, fragment: Fragment) -> Self {
        self.fragment = Some(fragment);
        self
    }
}

/// In-memory parent of a [`DraftNode`]
#[derive(Debug, Clone)]
pub enum DraftParent {
    Persisted(Node),
    Draft(Box<DraftNode>),
}

impl DraftParent {
    fn as_hierarchical(&self) -> &dyn Hierarchical {
        match self {
            Self::Persisted(node) => node as &dyn Hierarchical,
            Self::Draft(draft) => draft.as_ref(),
        }
    }
}

/// A node that has not been persisted yet
///
/// Has no path. Its parent, if any, is held as an object rather than a
/// reference value; the reference value is only known once that parent has a
/// fragment.
#[derive(Debug, Clone, Default)]
pub struct DraftNode {
    pub fragment: Option<Fragment>,
    pub parent: Option<DraftParent>,
}

impl DraftNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fragment(mut self, fragment: Fragment) -> Self {
        self.fragment = Some(fragment);
        self
    }

    pub fn with_parent(mut self, parent: Node) -> Self {
        self.parent = Some(DraftParent::Persisted(parent));
        self
    }

    pub fn with_draft_parent(mut self, parent: DraftNode) -> Self {
        self.parent = Some(DraftParent::Draft(Box::new(parent)));
        self
    }

    /// Path this node would receive if persisted now
    ///
    /// `None` until the fragments of this node and every draft ancestor are known.
    pub fn prospective_path(&self) -> Option<MaterializedPath> {
        let fragment = self.fragment.as_ref()?;
        match &self.parent {
            None => Some(MaterializedPath::root(fragment)),
            Some(DraftParent::Persisted(parent)) => Some(parent.path.child(fragment)),
            Some(DraftParent::Draft(parent)) => {
                Some(parent.prospective_path()?.child(fragment))
            }
        }
    }
}

impl Hierarchical for DraftNode {
    fn fragment(&self) -> Option<&Fragment> {
        self.fragment.as_ref()
    }

    fn parent_fragment(&self) -> Option<&Fragment> {
        match &self.parent {
            Some(DraftParent::Persisted(parent)) => Some(&parent.fragment),
            Some(DraftParent::Draft(parent)) => parent.fragment.as_ref(),
            None => None,
        }
    }

    fn known_path(&self) -> Option<&MaterializedPath> {
        None
    }

    fn attached_parent(&self) -> Option<&dyn Hierarchical> {
        self.parent.as_ref().map(DraftParent::as_hierarchical)
    }
}
