//! Create and Reparent Lifecycle
//!
//! Node creation is two explicit phases:
//!
//! 1. `allocate_identity` inserts the row without a path and learns its
//!    fragment (store-assigned, generated, or host-supplied)
//! 2. `assign_path` computes the path from the parent and writes it
//!
//! A parent change runs the cycle guard, the node's own path update, and the
//! descendant cascade, in that order, through `apply_parent_change`.
//!
//! Every function here runs on the caller's connection and inside the
//! caller's transaction. The own-path update and the cascade are only atomic
//! if that transaction is committed or rolled back as a unit.

use uuid::Uuid;

use crate::config::FragmentStrategy;
use crate::db::Collection;
use crate::models::{Fragment, MaterializedPath, NewNode, Node, ValidationError};
use crate::operations::{compute_path, guard_against_cycle, ParentChange};
use crate::services::HierarchyError;

/// A row whose identity is known but whose path has not been written yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatedNode {
    pub fragment: Fragment,

    /// Parent reference as stored on the row
    pub parent_fragment: Option<Fragment>,

    /// Path of the resolved parent; `None` places the node at root level
    pub parent_path: Option<MaterializedPath>,
}

/// Result of a parent change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReparentOutcome {
    /// The node as stored after the change
    pub node: Node,

    /// Number of descendant rows whose paths were rewritten
    pub descendants_rewritten: u64,
}

/// Look up the node a parent reference points at
///
/// A dangling reference is a validation failure unless the collection is
/// configured with `optional = true`, in which case it resolves to `None`.
pub async fn resolve_parent(
    collection: &Collection<'_>,
    parent: Option<&Fragment>,
) -> Result<Option<Node>, HierarchyError> {
    let Some(parent) = parent else {
        return Ok(None);
    };

    match collection.find(parent).await? {
        Some(node) => Ok(Some(node)),
        None if collection.config().optional => {
            tracing::debug!(
                "Parent {} not found in {}, treating as root",
                parent,
                collection.config().table
            );
            Ok(None)
        }
        None => Err(ValidationError::invalid_parent(
            &collection.config().parent_fragment,
            parent,
        )
        .into()),
    }
}

/// Phase one of creation: insert the row and learn its fragment
pub async fn allocate_identity(
    collection: &Collection<'_>,
    new_node: &NewNode,
) -> Result<AllocatedNode, HierarchyError> {
    let parent = resolve_parent(collection, new_node.parent.as_ref()).await?;

    let requested = match (&new_node.fragment, collection.config().fragment_strategy) {
        (Some(fragment), _) => Some(fragment.clone()),
        (None, FragmentStrategy::Uuid) => {
            Some(Fragment::new(Uuid::new_v4().simple().to_string())?)
        }
        (None, FragmentStrategy::AutoIncrement) => None,
    };

    let fragment = collection
        .insert_identity(requested.as_ref(), new_node.parent.as_ref())
        .await?
        .ok_or_else(|| {
            HierarchyError::precondition(format!(
                "no fragment was assigned to the new row in {}",
                collection.config().table
            ))
        })?;

    Ok(AllocatedNode {
        fragment,
        parent_fragment: new_node.parent.clone(),
        parent_path: parent.map(|p| p.path),
    })
}

/// Phase two of creation: compute the path and write it to the row
pub async fn assign_path(
    collection: &Collection<'_>,
    allocated: AllocatedNode,
) -> Result<Node, HierarchyError> {
    let path = compute_path(&allocated.fragment, allocated.parent_path.as_ref());

    let updated = collection.write_path(&allocated.fragment, &path).await?;
    if updated == 0 {
        return Err(HierarchyError::node_not_found(&allocated.fragment));
    }

    tracing::debug!("Assigned path {} to node {}", path, allocated.fragment);

    collection
        .find(&allocated.fragment)
        .await?
        .ok_or_else(|| HierarchyError::node_not_found(&allocated.fragment))
}

/// Apply a parent change to `node`, cascading the new path to its subtree
///
/// `node` must be read inside the same transaction. Does nothing when the
/// change leaves the reference as it was. A cycle or a dangling parent is
/// refused before any write; a failing write is reported as `CascadeFailed`
/// and the caller must roll back.
pub async fn apply_parent_change(
    collection: &Collection<'_>,
    node: &Node,
    change: &ParentChange,
) -> Result<ReparentOutcome, HierarchyError> {
    if !change.is_change() {
        return Ok(ReparentOutcome {
            node: node.clone(),
            descendants_rewritten: 0,
        });
    }

    let parent = resolve_parent(collection, change.new.as_ref()).await?;
    guard_against_cycle(collection.config(), &node.fragment, parent.as_ref())?;

    let new_path = compute_path(&node.fragment, parent.as_ref().map(|p| &p.path));

    collection
        .write_parent_and_path(&node.fragment, change.new.as_ref(), &new_path)
        .await
        .map_err(|e| {
            HierarchyError::cascade_failed(format!(
                "failed to update node {}: {}",
                node.fragment, e
            ))
        })?;

    let descendants_rewritten = collection
        .rewrite_descendant_paths(&node.fragment, &node.path, &new_path)
        .await
        .map_err(|e| {
            HierarchyError::cascade_failed(format!(
                "failed to rewrite descendants of {}: {}",
                node.fragment, e
            ))
        })?;

    tracing::info!(
        "Moved node {} from {} to {} ({} descendants rewritten)",
        node.fragment,
        node.path,
        new_path,
        descendants_rewritten
    );

    let node = collection
        .find(&node.fragment)
        .await?
        .ok_or_else(|| HierarchyError::node_not_found(&node.fragment))?;

    Ok(ReparentOutcome {
        node,
        descendants_rewritten,
    })
}
