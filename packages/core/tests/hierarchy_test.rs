//! Integration tests for HierarchyService
//!
//! Tests cover:
//! - Path assignment on create
//! - Reparenting with descendant cascade
//! - Cycle rejection
//! - Navigation scopes (ancestors, siblings, children, descendants, leaves, depth)
//! - Lowest common ancestor resolution

use anyhow::Result;
use arbor_core::{
    config::HierarchyConfig,
    db::DatabaseService,
    models::{DraftNode, Fragment, Hierarchical, MaterializedPath, NewNode, Node, ValidationError},
    services::{HierarchyError, HierarchyService, NodeOrder, NodeScope},
};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

/// Test helper: Create a test environment with the default collection
async fn create_test_env() -> Result<(HierarchyService, TempDir)> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let db = Arc::new(DatabaseService::new(db_path).await?);

    let config = HierarchyConfig::default();
    db.ensure_collection(&config).await?;
    let service = HierarchyService::new(db, config).await?;

    Ok((service, temp_dir))
}

fn frag(value: i64) -> Fragment {
    Fragment::from(value)
}

fn path(value: &str) -> MaterializedPath {
    MaterializedPath::parse(value).unwrap()
}

/// Create a node with a fixed fragment under an optional parent
async fn add(service: &HierarchyService, fragment: i64, parent: Option<i64>) -> Result<Node> {
    let new_node = match parent {
        Some(parent) => NewNode::child_of(&frag(parent)),
        None => NewNode::root(),
    };
    Ok(service.create_node(new_node.with_fragment(frag(fragment))).await?)
}

async fn reload(service: &HierarchyService, fragment: i64) -> Result<Node> {
    service
        .get_node(&frag(fragment))
        .await?
        .ok_or_else(|| anyhow::anyhow!("node {} not found", fragment))
}

fn fragments(nodes: &[Node]) -> Vec<String> {
    nodes.iter().map(|n| n.fragment.to_string()).collect()
}

/// Every node's path is its parent's path plus its own fragment
async fn assert_paths_consistent(service: &HierarchyService) -> Result<()> {
    let nodes = service.fetch(&NodeScope::all()).await?;
    let by_fragment: HashMap<_, _> = nodes.iter().map(|n| (n.fragment.clone(), n)).collect();

    for node in &nodes {
        let expected = match &node.parent_fragment {
            Some(parent) => by_fragment[parent].path.child(&node.fragment),
            None => MaterializedPath::root(&node.fragment),
        };
        assert_eq!(node.path, expected, "inconsistent path for {}", node.fragment);
        assert_eq!(
            node.path.segments().filter(|s| *s == node.fragment.as_str()).count(),
            1,
            "{} appears more than once in {}",
            node.fragment,
            node.path
        );
    }
    Ok(())
}

// =========================================================================
// Create Tests
// =========================================================================

#[tokio::test]
async fn test_child_path_extends_parent_path() -> Result<()> {
    let (service, _temp_dir) = create_test_env().await?;

    add(&service, 1, None).await?;
    let child = add(&service, 2, Some(1)).await?;

    assert_eq!(child.path.as_str(), "1.2");
    assert_eq!(child.parent_fragment, Some(frag(1)));
    assert_eq!(child.depth(), 2);
    Ok(())
}

#[tokio::test]
async fn test_store_assigned_fragments() -> Result<()> {
    let (service, _temp_dir) = create_test_env().await?;

    let root = service.create_node(NewNode::root()).await?;
    let child = service.create_node(NewNode::child_of(&root.fragment)).await?;
    let grandchild = service.create_node(NewNode::child_of(&child.fragment)).await?;

    assert_eq!(root.path.as_str(), "1");
    assert_eq!(child.path.as_str(), "1.2");
    assert_eq!(grandchild.path.as_str(), "1.2.3");
    Ok(())
}

// =========================================================================
// Reparent Tests
// =========================================================================

#[tokio::test]
async fn test_move_cascades_to_descendants() -> Result<()> {
    let (service, _temp_dir) = create_test_env().await?;

    add(&service, 1, None).await?;
    add(&service, 2, Some(1)).await?;
    add(&service, 3, Some(2)).await?;
    add(&service, 4, Some(1)).await?;

    let outcome = service.move_node(&frag(2), Some(&frag(4))).await?;

    assert_eq!(outcome.node.path.as_str(), "1.4.2");
    assert_eq!(outcome.node.parent_fragment, Some(frag(4)));
    assert_eq!(outcome.descendants_rewritten, 1);
    assert_eq!(reload(&service, 3).await?.path.as_str(), "1.4.2.3");
    assert_paths_consistent(&service).await?;
    Ok(())
}

#[tokio::test]
async fn test_move_preserves_deep_suffixes() -> Result<()> {
    let (service, _temp_dir) = create_test_env().await?;

    add(&service, 1, None).await?;
    add(&service, 2, Some(1)).await?;
    add(&service, 3, Some(2)).await?;
    add(&service, 4, Some(3)).await?;
    add(&service, 5, Some(4)).await?;
    add(&service, 6, Some(3)).await?;
    add(&service, 7, None).await?;

    let outcome = service.move_node(&frag(2), Some(&frag(7))).await?;

    assert_eq!(outcome.descendants_rewritten, 4);
    assert_eq!(reload(&service, 5).await?.path.as_str(), "7.2.3.4.5");
    assert_eq!(reload(&service, 6).await?.path.as_str(), "7.2.3.6");
    assert_eq!(reload(&service, 1).await?.path.as_str(), "1");
    assert_paths_consistent(&service).await?;
    Ok(())
}

#[tokio::test]
async fn test_move_leaves_lookalike_prefixes_alone() -> Result<()> {
    let (service, _temp_dir) = create_test_env().await?;

    add(&service, 1, None).await?;
    add(&service, 2, Some(1)).await?;
    add(&service, 20, Some(1)).await?;
    add(&service, 21, Some(20)).await?;
    add(&service, 3, Some(2)).await?;
    add(&service, 9, None).await?;

    // "1.20" and "1.20.21" share characters with "1.2" but are not below it
    let outcome = service.move_node(&frag(2), Some(&frag(9))).await?;

    assert_eq!(outcome.descendants_rewritten, 1);
    assert_eq!(reload(&service, 3).await?.path.as_str(), "9.2.3");
    assert_eq!(reload(&service, 20).await?.path.as_str(), "1.20");
    assert_eq!(reload(&service, 21).await?.path.as_str(), "1.20.21");
    Ok(())
}

#[tokio::test]
async fn test_move_to_root() -> Result<()> {
    let (service, _temp_dir) = create_test_env().await?;

    add(&service, 1, None).await?;
    add(&service, 2, Some(1)).await?;
    add(&service, 3, Some(2)).await?;

    let outcome = service.move_node(&frag(2), None).await?;

    assert!(outcome.node.is_root());
    assert_eq!(outcome.node.path.as_str(), "2");
    assert_eq!(reload(&service, 3).await?.path.as_str(), "2.3");
    assert_eq!(service.count(&NodeScope::roots()).await?, 2);
    Ok(())
}

#[tokio::test]
async fn test_leaf_move_rewrites_nothing_else() -> Result<()> {
    let (service, _temp_dir) = create_test_env().await?;

    add(&service, 1, None).await?;
    add(&service, 2, Some(1)).await?;
    add(&service, 3, Some(1)).await?;

    let outcome = service.move_node(&frag(3), Some(&frag(2))).await?;

    assert_eq!(outcome.descendants_rewritten, 0);
    assert_eq!(outcome.node.path.as_str(), "1.2.3");
    Ok(())
}

#[tokio::test]
async fn test_move_does_not_touch_descendant_timestamps() -> Result<()> {
    let (service, _temp_dir) = create_test_env().await?;

    add(&service, 1, None).await?;
    add(&service, 2, Some(1)).await?;
    let before = add(&service, 3, Some(2)).await?;
    add(&service, 4, None).await?;

    service.move_node(&frag(2), Some(&frag(4))).await?;

    let after = reload(&service, 3).await?;
    assert_eq!(after.updated_at, before.updated_at);
    assert_eq!(after.created_at, before.created_at);
    Ok(())
}

// =========================================================================
// Cycle Rejection Tests
// =========================================================================

#[tokio::test]
async fn test_move_under_own_child_is_rejected() -> Result<()> {
    let (service, _temp_dir) = create_test_env().await?;

    add(&service, 1, None).await?;
    add(&service, 2, Some(1)).await?;

    let err = service.move_node(&frag(1), Some(&frag(2))).await.unwrap_err();

    match err.as_validation() {
        Some(ValidationError::CircularReference {
            field,
            fragment,
            parent,
        }) => {
            assert_eq!(field, "parent_id");
            assert_eq!(fragment, &frag(1));
            assert_eq!(parent, &frag(2));
        }
        other => panic!("expected circular reference, got {:?}", other),
    }

    let root = reload(&service, 1).await?;
    assert_eq!(root.path.as_str(), "1");
    assert!(root.parent_fragment.is_none());
    Ok(())
}

#[tokio::test]
async fn test_move_under_deep_descendant_leaves_tree_unchanged() -> Result<()> {
    let (service, _temp_dir) = create_test_env().await?;

    add(&service, 1, None).await?;
    add(&service, 2, Some(1)).await?;
    add(&service, 3, Some(2)).await?;
    add(&service, 4, Some(3)).await?;

    let before = service.fetch(&NodeScope::all()).await?;

    let result = service.move_node(&frag(2), Some(&frag(4))).await;
    assert!(matches!(result, Err(HierarchyError::Validation(_))));

    let after = service.fetch(&NodeScope::all()).await?;
    assert_eq!(before, after);
    Ok(())
}

#[tokio::test]
async fn test_move_under_itself_is_rejected() -> Result<()> {
    let (service, _temp_dir) = create_test_env().await?;

    add(&service, 1, None).await?;
    add(&service, 2, Some(1)).await?;

    let err = service.move_node(&frag(2), Some(&frag(2))).await.unwrap_err();
    assert!(matches!(
        err.as_validation(),
        Some(ValidationError::CircularReference { .. })
    ));
    assert_eq!(reload(&service, 2).await?.path.as_str(), "1.2");
    Ok(())
}

#[tokio::test]
async fn test_move_to_missing_parent_is_rejected() -> Result<()> {
    let (service, _temp_dir) = create_test_env().await?;

    add(&service, 1, None).await?;
    add(&service, 2, Some(1)).await?;

    let err = service.move_node(&frag(2), Some(&frag(99))).await.unwrap_err();
    assert!(matches!(
        err.as_validation(),
        Some(ValidationError::InvalidParent { .. })
    ));
    assert_eq!(reload(&service, 2).await?.path.as_str(), "1.2");
    Ok(())
}

// =========================================================================
// Navigation Tests
// =========================================================================

/// R(1) -> C1(2) -> G(5); R -> C2(3); R -> C3(4); S(6) is a second root
async fn build_family(service: &HierarchyService) -> Result<()> {
    add(service, 1, None).await?;
    add(service, 2, Some(1)).await?;
    add(service, 3, Some(1)).await?;
    add(service, 4, Some(1)).await?;
    add(service, 5, Some(2)).await?;
    add(service, 6, None).await?;
    Ok(())
}

#[tokio::test]
async fn test_leaves_and_depth_of_subtree() -> Result<()> {
    let (service, _temp_dir) = create_test_env().await?;
    build_family(&service).await?;

    let root = reload(&service, 1).await?;

    let mut leaves = fragments(&service.fetch(&NodeScope::leaves_of(&root)).await?);
    leaves.sort();
    assert_eq!(leaves, vec!["3", "4", "5"]);

    let deepest = service.fetch(&NodeScope::descendants(&root).at_depth(3)).await?;
    assert_eq!(fragments(&deepest), vec!["5"]);
    Ok(())
}

#[tokio::test]
async fn test_collection_leaves_and_roots() -> Result<()> {
    let (service, _temp_dir) = create_test_env().await?;
    build_family(&service).await?;

    let leaves = service.fetch(&NodeScope::all().leaves()).await?;
    // Path order: 1.2.5, 1.3, 1.4, 6
    assert_eq!(fragments(&leaves), vec!["5", "3", "4", "6"]);

    let roots = service.fetch(&NodeScope::roots()).await?;
    assert_eq!(fragments(&roots), vec!["1", "6"]);

    let depth_two = service.fetch(&NodeScope::all().at_depth(2)).await?;
    assert_eq!(fragments(&depth_two), vec!["2", "3", "4"]);
    Ok(())
}

#[tokio::test]
async fn test_ancestors_are_ordered_root_first() -> Result<()> {
    let (service, _temp_dir) = create_test_env().await?;
    build_family(&service).await?;

    let grandchild = reload(&service, 5).await?;

    let ancestors = service.fetch(&NodeScope::ancestors(&grandchild)).await?;
    assert_eq!(fragments(&ancestors), vec!["1", "2"]);

    let chain = service.fetch(&NodeScope::self_and_ancestors(&grandchild)).await?;
    assert_eq!(fragments(&chain), vec!["1", "2", "5"]);

    let root = service.fetch(&NodeScope::root_of(&grandchild)).await?;
    assert_eq!(fragments(&root), vec!["1"]);
    Ok(())
}

#[tokio::test]
async fn test_siblings_and_children() -> Result<()> {
    let (service, _temp_dir) = create_test_env().await?;
    build_family(&service).await?;

    let root = reload(&service, 1).await?;
    let middle = reload(&service, 3).await?;

    let siblings = service.fetch(&NodeScope::siblings(&middle)).await?;
    assert_eq!(fragments(&siblings), vec!["2", "4"]);

    let with_self = service.fetch(&NodeScope::self_and_siblings(&middle)).await?;
    assert_eq!(fragments(&with_self), vec!["2", "3", "4"]);

    // Roots are siblings of each other
    let root_siblings = service.fetch(&NodeScope::siblings(&root)).await?;
    assert_eq!(fragments(&root_siblings), vec!["6"]);

    let children = service.fetch(&NodeScope::children(&root)).await?;
    assert_eq!(fragments(&children), vec!["2", "3", "4"]);

    let family = service.fetch(&NodeScope::self_and_children(&root)).await?;
    assert_eq!(fragments(&family), vec!["1", "2", "3", "4"]);
    Ok(())
}

#[tokio::test]
async fn test_descendants() -> Result<()> {
    let (service, _temp_dir) = create_test_env().await?;
    build_family(&service).await?;

    let root = reload(&service, 1).await?;

    let descendants = service.fetch(&NodeScope::descendants(&root)).await?;
    assert_eq!(fragments(&descendants), vec!["2", "5", "3", "4"]);

    let subtree = service.fetch(&NodeScope::self_and_descendants(&root)).await?;
    assert_eq!(subtree.len(), 5);
    assert_eq!(subtree[0].fragment, frag(1));

    assert_eq!(service.count(&NodeScope::descendants(&root)).await?, 4);
    assert!(!service.exists(&NodeScope::descendants(&reload(&service, 6).await?)).await?);
    Ok(())
}

#[tokio::test]
async fn test_ordering_and_limit() -> Result<()> {
    let (service, _temp_dir) = create_test_env().await?;
    build_family(&service).await?;

    let by_level = service
        .fetch(&NodeScope::all().order_by(NodeOrder::Level))
        .await?;
    assert_eq!(fragments(&by_level), vec!["1", "6", "2", "3", "4", "5"]);

    let newest = service
        .first(&NodeScope::all().order_by(NodeOrder::CreatedAt).descending())
        .await?;
    assert_eq!(newest.map(|n| n.fragment), Some(frag(6)));

    let limited = service.fetch(&NodeScope::all().limit(2)).await?;
    assert_eq!(fragments(&limited), vec!["1", "2"]);
    Ok(())
}

#[tokio::test]
async fn test_depth_of_unsaved_nodes() -> Result<()> {
    let (service, _temp_dir) = create_test_env().await?;
    build_family(&service).await?;

    let grandchild = reload(&service, 5).await?;
    assert_eq!(grandchild.depth(), 3);

    let draft = DraftNode::new().with_parent(grandchild);
    let nested = DraftNode::new().with_draft_parent(draft);
    assert_eq!(nested.depth(), 5);
    assert!(!nested.is_root());
    Ok(())
}

#[tokio::test]
async fn test_is_leaf_tracks_moves() -> Result<()> {
    let (service, _temp_dir) = create_test_env().await?;
    build_family(&service).await?;

    assert!(!service.is_leaf(&reload(&service, 2).await?).await?);

    service.move_node(&frag(5), Some(&frag(3))).await?;

    assert!(service.is_leaf(&reload(&service, 2).await?).await?);
    assert!(!service.is_leaf(&reload(&service, 3).await?).await?);
    Ok(())
}

// =========================================================================
// Lowest Common Ancestor Tests
// =========================================================================

/// R(1) -> C1(2) -> {G1(3), G2(4) -> GG(5)}
async fn build_lca_tree(service: &HierarchyService) -> Result<()> {
    add(service, 1, None).await?;
    add(service, 2, Some(1)).await?;
    add(service, 3, Some(2)).await?;
    add(service, 4, Some(2)).await?;
    add(service, 5, Some(4)).await?;
    Ok(())
}

#[tokio::test]
async fn test_lca_of_leaf_scope() -> Result<()> {
    let (service, _temp_dir) = create_test_env().await?;
    build_lca_tree(&service).await?;

    let root = reload(&service, 1).await?;
    let leaves = NodeScope::leaves_of(&root);
    assert_eq!(service.paths(&leaves).await?, vec![path("1.2.3"), path("1.2.4.5")]);

    let paths = service.lowest_common_ancestor_paths(leaves.clone()).await?;
    assert_eq!(paths, vec![path("1.2")]);

    let nodes = service.lowest_common_ancestors(leaves).await?;
    assert_eq!(fragments(&nodes), vec!["2"]);
    Ok(())
}

#[tokio::test]
async fn test_lca_of_literal_paths() -> Result<()> {
    let (service, _temp_dir) = create_test_env().await?;
    build_lca_tree(&service).await?;

    let paths = service
        .lowest_common_ancestor_paths(vec![path("1.2.3"), path("1.2.4")])
        .await?;
    assert_eq!(paths, vec![path("1.2")]);

    // An ancestor of its own descendant resolves to its parent
    let paths = service
        .lowest_common_ancestor_paths(vec![path("1.2"), path("1.2.4.5")])
        .await?;
    assert_eq!(paths, vec![path("1")]);
    Ok(())
}

#[tokio::test]
async fn test_lca_of_empty_input() -> Result<()> {
    let (service, _temp_dir) = create_test_env().await?;
    build_lca_tree(&service).await?;

    let empty: Vec<MaterializedPath> = Vec::new();
    assert!(service.lowest_common_ancestor_paths(empty).await?.is_empty());

    let no_match = NodeScope::descendants(&reload(&service, 5).await?);
    assert!(service.lowest_common_ancestors(no_match).await?.is_empty());
    Ok(())
}
