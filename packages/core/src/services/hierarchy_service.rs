//! Hierarchy Service
//!
//! Host-facing entry point for one hierarchical collection. Write operations
//! each run in a single `BEGIN IMMEDIATE` transaction so the cycle guard, the
//! node's own update, and the descendant cascade see one consistent snapshot
//! and commit together. Reads run on a fresh connection without a transaction.
//!
//! # Examples
//!
//! ```rust,no_run
//! use arbor_core::config::HierarchyConfig;
//! use arbor_core::db::DatabaseService;
//! use arbor_core::models::NewNode;
//! use arbor_core::services::{HierarchyService, NodeScope};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Arc::new(DatabaseService::new(PathBuf::from("./data/tree.db")).await?);
//! let config = HierarchyConfig::default();
//! db.ensure_collection(&config).await?;
//!
//! let service = HierarchyService::new(db, config).await?;
//! let root = service.create_node(NewNode::root()).await?;
//! let child = service.create_node(NewNode::child_of(&root.fragment)).await?;
//!
//! let descendants = service.fetch(&NodeScope::descendants(&root)).await?;
//! assert_eq!(descendants, vec![child]);
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;

use libsql::Connection;

use crate::config::HierarchyConfig;
use crate::db::{Collection, DatabaseService};
use crate::models::{CommonAncestor, Fragment, MaterializedPath, NewNode, Node};
use crate::operations::{self, ParentChange, ReparentOutcome};
use crate::services::error::HierarchyError;
use crate::services::lca::{common_ancestor_paths, LcaInput};
use crate::services::scope::NodeScope;

/// Hierarchy operations over one configured collection
#[derive(Debug, Clone)]
pub struct HierarchyService {
    db: Arc<DatabaseService>,
    config: HierarchyConfig,
}

impl HierarchyService {
    /// Open a collection, checking its configuration against the live table
    ///
    /// # Errors
    ///
    /// `Precondition` if a name is not a plain identifier, the table does not
    /// exist, or a configured column is missing from it.
    pub async fn new(
        db: Arc<DatabaseService>,
        config: HierarchyConfig,
    ) -> Result<Self, HierarchyError> {
        config.validate().map_err(HierarchyError::precondition)?;

        let columns = db.table_columns(&config.table).await?;
        if columns.is_empty() {
            return Err(HierarchyError::precondition(format!(
                "table '{}' does not exist",
                config.table
            )));
        }

        for column in config.columns() {
            if !columns.iter().any(|c| c == column) {
                return Err(HierarchyError::precondition(format!(
                    "column '{}' does not exist in table '{}'",
                    column, config.table
                )));
            }
        }

        tracing::debug!("Opened hierarchical collection {}", config.table);

        Ok(Self { db, config })
    }

    pub fn config(&self) -> &HierarchyConfig {
        &self.config
    }

    /// Run `work` inside one immediate transaction, committing on success
    async fn in_transaction<'c, T, F, Fut>(
        &'c self,
        conn: &'c Connection,
        work: F,
    ) -> Result<T, HierarchyError>
    where
        F: FnOnce(Collection<'c>) -> Fut,
        Fut: Future<Output = Result<T, HierarchyError>> + 'c,
    {
        self.db.begin_immediate(conn).await?;

        match work(Collection::new(conn, &self.config)).await {
            Ok(value) => {
                self.db.commit(conn).await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = self.db.rollback(conn).await {
                    tracing::warn!(
                        "Failed to roll back {} transaction after '{}': {}",
                        self.config.table,
                        e,
                        rollback_err
                    );
                }
                Err(e)
            }
        }
    }

    /// Create a node, allocating its identity and then assigning its path
    pub async fn create_node(&self, new_node: NewNode) -> Result<Node, HierarchyError> {
        let conn = self.db.connect_with_timeout().await?;

        self.in_transaction(&conn, |collection| async move {
            let allocated = operations::allocate_identity(&collection, &new_node).await?;
            operations::assign_path(&collection, allocated).await
        })
        .await
    }

    /// Change a node's parent (`None` makes it a root), cascading to its subtree
    ///
    /// Moving a node under itself or one of its descendants fails with a
    /// circular reference validation error and changes nothing.
    pub async fn move_node(
        &self,
        fragment: &Fragment,
        new_parent: Option<&Fragment>,
    ) -> Result<ReparentOutcome, HierarchyError> {
        let conn = self.db.connect_with_timeout().await?;
        let fragment = fragment.clone();
        let new_parent = new_parent.cloned();

        self.in_transaction(&conn, |collection| async move {
            let node = collection
                .find(&fragment)
                .await?
                .ok_or_else(|| HierarchyError::node_not_found(&fragment))?;

            let change = ParentChange::new(node.parent_fragment.clone(), new_parent);
            operations::apply_parent_change(&collection, &node, &change).await
        })
        .await
    }

    pub async fn get_node(&self, fragment: &Fragment) -> Result<Option<Node>, HierarchyError> {
        let conn = self.db.connect_with_timeout().await?;
        Ok(Collection::new(&conn, &self.config).find(fragment).await?)
    }

    /// Delete a single node
    ///
    /// Children are left to the table's foreign key policy; with the default
    /// schema a node that still has children cannot be deleted.
    pub async fn delete_node(&self, fragment: &Fragment) -> Result<bool, HierarchyError> {
        let conn = self.db.connect_with_timeout().await?;
        let deleted = Collection::new(&conn, &self.config).delete(fragment).await?;
        Ok(deleted > 0)
    }

    /// Execute a scope
    pub async fn fetch(&self, scope: &NodeScope) -> Result<Vec<Node>, HierarchyError> {
        let conn = self.db.connect_with_timeout().await?;
        let query = scope.compile(&self.config);
        Ok(Collection::new(&conn, &self.config)
            .select_nodes(&query)
            .await?)
    }

    /// First node of a scope in its ordering
    pub async fn first(&self, scope: &NodeScope) -> Result<Option<Node>, HierarchyError> {
        let nodes = self.fetch(&scope.clone().limit(1)).await?;
        Ok(nodes.into_iter().next())
    }

    pub async fn count(&self, scope: &NodeScope) -> Result<u64, HierarchyError> {
        let conn = self.db.connect_with_timeout().await?;
        let query = scope.compile(&self.config);
        Ok(Collection::new(&conn, &self.config).count(&query).await?)
    }

    pub async fn exists(&self, scope: &NodeScope) -> Result<bool, HierarchyError> {
        Ok(self.count(scope).await? > 0)
    }

    /// Paths of the nodes in a scope, without loading the rows
    pub async fn paths(&self, scope: &NodeScope) -> Result<Vec<MaterializedPath>, HierarchyError> {
        let conn = self.db.connect_with_timeout().await?;
        let query = scope.compile(&self.config);
        Ok(Collection::new(&conn, &self.config)
            .select_paths(&query)
            .await?)
    }

    /// The root of `node`'s tree
    pub async fn root_of(&self, node: &Node) -> Result<Option<Node>, HierarchyError> {
        self.first(&NodeScope::root_of(node)).await
    }

    /// Whether `node` currently has no children
    pub async fn is_leaf(&self, node: &Node) -> Result<bool, HierarchyError> {
        Ok(!self.exists(&NodeScope::children(node)).await?)
    }

    /// Lowest common ancestor path of the input, or nothing for an empty input
    pub async fn lowest_common_ancestor_paths(
        &self,
        input: impl Into<LcaInput>,
    ) -> Result<Vec<MaterializedPath>, HierarchyError> {
        let scope = match input.into() {
            LcaInput::Paths(paths) => return Ok(common_ancestor_paths(&paths)),
            LcaInput::Scope(scope) => scope,
        };

        let conn = self.db.connect_with_timeout().await?;
        let query = scope.compile(&self.config);
        let ancestor = Collection::new(&conn, &self.config)
            .fold_paths(&query, CommonAncestor::new(), |mut acc, path| {
                acc.push(&path);
                acc
            })
            .await?;
        Ok(ancestor.finish().into_iter().collect())
    }

    /// Nodes at the lowest common ancestor path(s) of the input
    pub async fn lowest_common_ancestors(
        &self,
        input: impl Into<LcaInput>,
    ) -> Result<Vec<Node>, HierarchyError> {
        let paths = self.lowest_common_ancestor_paths(input).await?;
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        self.fetch(&NodeScope::with_paths(paths)).await
    }
}
