//! Collection Configuration
//!
//! Each hierarchical collection is described by an explicit `HierarchyConfig`
//! value that is handed to the service and engine operations. Column and table
//! names are interpolated into SQL, so they are validated as plain identifiers.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// How a node's fragment is allocated when the caller does not supply one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentStrategy {
    /// The store assigns an integer identifier on insert
    #[default]
    AutoIncrement,
    /// A v4 UUID in simple (hyphen-free) form is generated before insert
    Uuid,
}

/// Configuration of one hierarchical collection
///
/// Defaults describe a `nodes` table keyed by `id`, with `parent_id` and `path`
/// columns. Collections that use the `fragment` / `parent_fragment` /
/// `materialized_path` naming override the column names rather than switching
/// behavior.
///
/// # Examples
///
/// ```rust
/// use arbor_core::config::HierarchyConfig;
///
/// let config = HierarchyConfig::default()
///     .with_table("tree_nodes")
///     .with_columns("fragment", "parent_fragment", "materialized_path");
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.path, "materialized_path");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchyConfig {
    /// Table holding the collection
    pub table: String,

    /// Column supplying a node's path segment
    pub fragment: String,

    /// Column holding the parent reference
    pub parent_fragment: String,

    /// Column storing the materialized path
    pub path: String,

    /// When false, a non-null parent reference must resolve to an existing node.
    /// Root nodes are allowed either way.
    pub optional: bool,

    /// Creation timestamp column (ordering only)
    pub created_at: String,

    /// Last-update timestamp column (ordering only)
    pub updated_at: String,

    pub fragment_strategy: FragmentStrategy,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            table: "nodes".to_string(),
            fragment: "id".to_string(),
            parent_fragment: "parent_id".to_string(),
            path: "path".to_string(),
            optional: false,
            created_at: "created_at".to_string(),
            updated_at: "updated_at".to_string(),
            fragment_strategy: FragmentStrategy::AutoIncrement,
        }
    }
}

/// Plain SQL identifier (letters, digits, underscore; no leading digit)
const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

fn identifier_pattern() -> &'static Regex {
    static IDENTIFIER_REGEX: OnceLock<Regex> = OnceLock::new();
    IDENTIFIER_REGEX.get_or_init(|| Regex::new(IDENTIFIER_PATTERN).unwrap())
}

impl HierarchyConfig {
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Override the fragment, parent reference, and path column names
    pub fn with_columns(
        mut self,
        fragment: impl Into<String>,
        parent_fragment: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        self.fragment = fragment.into();
        self.parent_fragment = parent_fragment.into();
        self.path = path.into();
        self
    }

    pub fn with_optional_parent(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn with_fragment_strategy(mut self, strategy: FragmentStrategy) -> Self {
        self.fragment_strategy = strategy;
        self
    }

    /// All configured column names, in table order
    pub fn columns(&self) -> [&str; 5] {
        [
            self.fragment.as_str(),
            self.parent_fragment.as_str(),
            self.path.as_str(),
            self.created_at.as_str(),
            self.updated_at.as_str(),
        ]
    }

    /// Validate configuration
    ///
    /// Every name must be a plain SQL identifier and the five columns must be
    /// distinct.
    pub fn validate(&self) -> Result<(), String> {
        let pattern = identifier_pattern();

        if !pattern.is_match(&self.table) {
            return Err(format!("table '{}' is not a valid identifier", self.table));
        }

        let columns = self.columns();
        for column in columns {
            if !pattern.is_match(column) {
                return Err(format!("column '{}' is not a valid identifier", column));
            }
        }

        for (i, column) in columns.iter().enumerate() {
            if columns[i + 1..].contains(column) {
                return Err(format!("column '{}' is configured more than once", column));
            }
        }

        Ok(())
    }
}
