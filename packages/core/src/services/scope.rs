//! Node Scopes - Lazy Hierarchy Queries
//!
//! A `NodeScope` describes a set of nodes without touching the database. It is
//! a conjunction of conditions plus an ordering and an optional limit, and is
//! only executed when handed to `HierarchyService::{fetch, first, count,
//! exists, paths}`. Scopes compose by adding conditions:
//!
//! ```rust
//! use arbor_core::models::{Fragment, MaterializedPath, Node};
//! use arbor_core::services::NodeScope;
//! # use chrono::Utc;
//! # let root = Node {
//! #     fragment: Fragment::from(1),
//! #     parent_fragment: None,
//! #     path: MaterializedPath::root(&Fragment::from(1)),
//! #     created_at: Utc::now(),
//! #     updated_at: Utc::now(),
//! # };
//!
//! let grandchildren = NodeScope::descendants(&root).at_depth(3);
//! let leaves = NodeScope::descendants(&root).leaves();
//! # let _ = (grandchildren, leaves);
//! ```
//!
//! Results are ordered by path unless another `NodeOrder` is chosen.

use libsql::Value;

use crate::config::HierarchyConfig;
use crate::db::{CompiledQuery, PathColumn, SqlFragment};
use crate::models::{Fragment, MaterializedPath};

/// One filter of a scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// No parent reference
    Roots,
    /// Path is a prefix of `path`
    AncestorsOf {
        path: MaterializedPath,
        include_self: bool,
    },
    /// Path extends `path`
    DescendantsOf {
        path: MaterializedPath,
        include_self: bool,
    },
    /// Parent reference equals the value (`None` matches roots)
    ParentIs(Option<Fragment>),
    ExcludeFragment(Fragment),
    /// The node itself or its direct children
    FragmentOrParentIs(Fragment),
    /// Path equals one of the listed paths
    PathIn(Vec<MaterializedPath>),
    /// Path has exactly this many segments
    AtDepth(usize),
    /// Fragment never appears as a parent reference
    Leaves,
}

/// Result ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeOrder {
    /// Lexicographic path order; every node precedes its descendants
    #[default]
    Path,
    /// Shallowest first, then by path
    Level,
    /// Creation time, ties broken by fragment
    CreatedAt,
    Fragment,
}

/// Lazily evaluated set of nodes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeScope {
    conditions: Vec<Condition>,
    order: NodeOrder,
    descending: bool,
    limit: Option<u64>,
}

impl NodeScope {
    pub(crate) fn with_condition(condition: Condition) -> Self {
        Self {
            conditions: vec![condition],
            ..Self::default()
        }
    }

    /// Every node in the collection
    pub fn all() -> Self {
        Self::default()
    }

    /// Add a condition to this scope
    pub fn and(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Narrow to nodes at 1-based depth `depth`
    pub fn at_depth(self, depth: usize) -> Self {
        self.and(Condition::AtDepth(depth))
    }

    /// Narrow to nodes without children
    pub fn leaves(self) -> Self {
        self.and(Condition::Leaves)
    }

    pub fn order_by(mut self, order: NodeOrder) -> Self {
        self.order = order;
        self
    }

    /// Reverse the ordering
    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Render this scope against a collection's columns
    pub fn compile(&self, config: &HierarchyConfig) -> CompiledQuery {
        let mut clauses = Vec::new();
        let mut params = Vec::new();

        for condition in &self.conditions {
            let fragment = compile_condition(condition, config);
            clauses.push(fragment.sql);
            params.extend(fragment.params);
        }

        let sql = if clauses.is_empty() {
            "1".to_string()
        } else {
            clauses.join(" AND ")
        };

        CompiledQuery {
            filter: SqlFragment::new(sql, params),
            order_by: self.compile_order(config),
            limit: self.limit,
        }
    }

    fn compile_order(&self, config: &HierarchyConfig) -> String {
        let direction = if self.descending { "DESC" } else { "ASC" };
        match self.order {
            NodeOrder::Path => format!("{} {}", config.path, direction),
            NodeOrder::Level => format!(
                "{} {}, {} {}",
                PathColumn::new(&config.path).level(),
                direction,
                config.path,
                direction
            ),
            NodeOrder::CreatedAt => format!(
                "{} {}, {} {}",
                config.created_at, direction, config.fragment, direction
            ),
            NodeOrder::Fragment => format!("{} {}", config.fragment, direction),
        }
    }
}

fn fragment_value(fragment: &Fragment) -> Value {
    Value::Text(fragment.as_str().to_string())
}

fn compile_condition(condition: &Condition, config: &HierarchyConfig) -> SqlFragment {
    let column = PathColumn::new(&config.path);

    match condition {
        Condition::Roots | Condition::ParentIs(None) => {
            SqlFragment::new(format!("{} IS NULL", config.parent_fragment), Vec::new())
        }
        Condition::AncestorsOf { path, include_self } => {
            if *include_self {
                column.ancestor_or_self_of(path)
            } else {
                column.ancestor_of(path)
            }
        }
        Condition::DescendantsOf { path, include_self } => {
            if *include_self {
                column.descendant_or_self_of(path)
            } else {
                column.descendant_of(path)
            }
        }
        Condition::ParentIs(Some(parent)) => SqlFragment::new(
            format!("{} = ?", config.parent_fragment),
            vec![fragment_value(parent)],
        ),
        Condition::ExcludeFragment(fragment) => SqlFragment::new(
            format!("{} <> ?", config.fragment),
            vec![fragment_value(fragment)],
        ),
        Condition::FragmentOrParentIs(fragment) => SqlFragment::new(
            format!("({} = ? OR {} = ?)", config.fragment, config.parent_fragment),
            vec![fragment_value(fragment), fragment_value(fragment)],
        ),
        Condition::PathIn(paths) => column.any_of(paths),
        Condition::AtDepth(depth) => column.at_level(*depth),
        Condition::Leaves => SqlFragment::new(
            format!(
                "{frag} NOT IN (SELECT {parent} FROM {table} WHERE {parent} IS NOT NULL)",
                frag = config.fragment,
                parent = config.parent_fragment,
                table = config.table
            ),
            Vec::new(),
        ),
    }
}
