//! Collection - Row Access for One Hierarchical Table
//!
//! `Collection` binds a borrowed connection to a `HierarchyConfig` and exposes
//! the primitive statements the hierarchy engine is built from. It never opens
//! or closes transactions: callers (the service, or a host running its own
//! transaction) decide the boundary.
//!
//! # Row Format
//!
//! Every node query selects, in order:
//! - fragment (INTEGER or TEXT)
//! - parent reference (INTEGER or TEXT, nullable)
//! - path (TEXT)
//! - created_at (TEXT, RFC 3339 or SQLite timestamp)
//! - updated_at (TEXT, RFC 3339 or SQLite timestamp)

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use libsql::params::Params;
use libsql::{Connection, Row, Value};

use crate::config::HierarchyConfig;
use crate::db::error::DatabaseError;
use crate::db::path_column::{PathColumn, SqlFragment};
use crate::models::{Fragment, MaterializedPath, Node};

fn optional_text(value: Value) -> Option<String> {
    match value {
        Value::Text(s) => Some(s),
        _ => None,
    }
}

/// Compiled WHERE / ORDER BY / LIMIT for a node query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledQuery {
    /// Predicate without the `WHERE` keyword (`"1"` for no filter)
    pub filter: SqlFragment,
    /// Ordering without the `ORDER BY` keyword (empty for none)
    pub order_by: String,
    pub limit: Option<u64>,
}

/// Primitive statements over one hierarchical table
pub struct Collection<'a> {
    conn: &'a Connection,
    config: &'a HierarchyConfig,
}

impl<'a> Collection<'a> {
    pub fn new(conn: &'a Connection, config: &'a HierarchyConfig) -> Self {
        Self { conn, config }
    }

    pub fn config(&self) -> &HierarchyConfig {
        self.config
    }

    /// Path expression builder for this collection's path column
    pub fn path_column(&self) -> PathColumn<'a> {
        PathColumn::new(&self.config.path)
    }

    /// Current time in the format written to the timestamp columns
    pub fn timestamp() -> String {
        Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn node_columns(&self) -> String {
        format!(
            "{}, {}, {}, {}, {}",
            self.config.fragment,
            self.config.parent_fragment,
            self.config.path,
            self.config.created_at,
            self.config.updated_at
        )
    }

    /// Parse timestamp from database - handles both RFC3339 and SQLite formats
    ///
    /// Rows written by this crate use RFC3339 with microseconds.
    /// Host-written rows may use SQLite CURRENT_TIMESTAMP: "YYYY-MM-DD HH:MM:SS"
    fn parse_timestamp(&self, s: &str) -> Result<DateTime<Utc>, DatabaseError> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc));
        }

        if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
            return Ok(naive.and_utc());
        }

        Err(DatabaseError::invalid_row(
            &self.config.table,
            format!("unable to parse timestamp '{}'", s),
        ))
    }

    fn fragment_from_value(&self, value: Value) -> Result<Option<Fragment>, DatabaseError> {
        match value {
            Value::Null => Ok(None),
            Value::Integer(i) => Ok(Some(Fragment::from(i))),
            Value::Text(s) => Fragment::new(s)
                .map(Some)
                .map_err(|e| DatabaseError::invalid_row(&self.config.table, e.to_string())),
            other => Err(DatabaseError::invalid_row(
                &self.config.table,
                format!("unsupported fragment value {:?}", other),
            )),
        }
    }

    /// Convert a row selected with `node_columns()` into a Node
    fn row_to_node(&self, row: &Row) -> Result<Node, DatabaseError> {
        let fragment = self.fragment_from_value(row.get_value(0)?)?.ok_or_else(|| {
            DatabaseError::invalid_row(&self.config.table, "row has no fragment")
        })?;
        let parent_fragment = self.fragment_from_value(row.get_value(1)?)?;

        let path = optional_text(row.get_value(2)?).ok_or_else(|| {
            DatabaseError::invalid_row(
                &self.config.table,
                format!("node {} has no path", fragment),
            )
        })?;
        let path = MaterializedPath::parse(&path)
            .map_err(|e| DatabaseError::invalid_row(&self.config.table, e.to_string()))?;

        let created_at: String = row.get(3)?;
        let updated_at: String = row.get(4)?;

        Ok(Node {
            fragment,
            parent_fragment,
            path,
            created_at: self.parse_timestamp(&created_at)?,
            updated_at: self.parse_timestamp(&updated_at)?,
        })
    }

    fn fragment_value(fragment: &Fragment) -> Value {
        Value::Text(fragment.as_str().to_string())
    }

    fn optional_fragment_value(fragment: Option<&Fragment>) -> Value {
        fragment.map(Self::fragment_value).unwrap_or(Value::Null)
    }

    /// Fetch a single node by fragment
    pub async fn find(&self, fragment: &Fragment) -> Result<Option<Node>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?",
            self.node_columns(),
            self.config.table,
            self.config.fragment
        );

        let mut rows = self
            .conn
            .query(&sql, Params::Positional(vec![Self::fragment_value(fragment)]))
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to execute find query: {}", e))
            })?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            Some(row) => Ok(Some(self.row_to_node(&row)?)),
            None => Ok(None),
        }
    }

    /// Insert a row without a path and return its fragment
    ///
    /// When `fragment` is `None` the store assigns it. Returns `None` if the
    /// store did not assign one either (the fragment column has no default).
    pub async fn insert_identity(
        &self,
        fragment: Option<&Fragment>,
        parent: Option<&Fragment>,
    ) -> Result<Option<Fragment>, DatabaseError> {
        let now = Self::timestamp();

        let (sql, params) = match fragment {
            Some(fragment) => (
                format!(
                    "INSERT INTO {} ({}, {}, {}, {}) VALUES (?, ?, ?, ?) RETURNING {}",
                    self.config.table,
                    self.config.fragment,
                    self.config.parent_fragment,
                    self.config.created_at,
                    self.config.updated_at,
                    self.config.fragment
                ),
                vec![
                    Self::fragment_value(fragment),
                    Self::optional_fragment_value(parent),
                    Value::Text(now.clone()),
                    Value::Text(now),
                ],
            ),
            None => (
                format!(
                    "INSERT INTO {} ({}, {}, {}) VALUES (?, ?, ?) RETURNING {}",
                    self.config.table,
                    self.config.parent_fragment,
                    self.config.created_at,
                    self.config.updated_at,
                    self.config.fragment
                ),
                vec![
                    Self::optional_fragment_value(parent),
                    Value::Text(now.clone()),
                    Value::Text(now),
                ],
            ),
        };

        let mut rows = self
            .conn
            .query(&sql, Params::Positional(params))
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to insert node: {}", e)))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            Some(row) => self.fragment_from_value(row.get_value(0)?),
            None => Ok(None),
        }
    }

    /// Write the path of a freshly inserted row
    pub async fn write_path(
        &self,
        fragment: &Fragment,
        path: &MaterializedPath,
    ) -> Result<u64, DatabaseError> {
        let sql = format!(
            "UPDATE {} SET {} = ? WHERE {} = ?",
            self.config.table, self.config.path, self.config.fragment
        );

        self.conn
            .execute(
                &sql,
                Params::Positional(vec![
                    Value::Text(path.as_str().to_string()),
                    Self::fragment_value(fragment),
                ]),
            )
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to write path: {}", e)))
    }

    /// Write a new parent reference together with the recomputed path
    pub async fn write_parent_and_path(
        &self,
        fragment: &Fragment,
        parent: Option<&Fragment>,
        path: &MaterializedPath,
    ) -> Result<u64, DatabaseError> {
        let sql = format!(
            "UPDATE {} SET {} = ?, {} = ?, {} = ? WHERE {} = ?",
            self.config.table,
            self.config.parent_fragment,
            self.config.path,
            self.config.updated_at,
            self.config.fragment
        );

        self.conn
            .execute(
                &sql,
                Params::Positional(vec![
                    Self::optional_fragment_value(parent),
                    Value::Text(path.as_str().to_string()),
                    Value::Text(Self::timestamp()),
                    Self::fragment_value(fragment),
                ]),
            )
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to move node: {}", e)))
    }

    /// Re-root every strict descendant of `old` at `new` in one statement
    ///
    /// `fragment` (the moved node) is excluded explicitly; it already holds
    /// its new path. Returns the number of rewritten rows.
    pub async fn rewrite_descendant_paths(
        &self,
        fragment: &Fragment,
        old: &MaterializedPath,
        new: &MaterializedPath,
    ) -> Result<u64, DatabaseError> {
        let column = self.path_column();
        let rewrite = column.rewrite_prefix(old, new);
        let within = column.descendant_of(old);

        let sql = format!(
            "UPDATE {table} SET {path} = {rewrite} WHERE {within} AND {fragment} <> ?",
            table = self.config.table,
            path = self.config.path,
            rewrite = rewrite.sql,
            within = within.sql,
            fragment = self.config.fragment,
        );

        let mut params = rewrite.params;
        params.extend(within.params);
        params.push(Self::fragment_value(fragment));

        self.conn
            .execute(&sql, Params::Positional(params))
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!(
                    "Failed to rewrite descendant paths of {}: {}",
                    old, e
                ))
            })
    }

    /// Delete a single row; what happens to its children is up to the schema
    pub async fn delete(&self, fragment: &Fragment) -> Result<u64, DatabaseError> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            self.config.table, self.config.fragment
        );

        self.conn
            .execute(&sql, Params::Positional(vec![Self::fragment_value(fragment)]))
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to delete node: {}", e)))
    }

    fn select_sql(&self, columns: &str, query: &CompiledQuery) -> String {
        let mut sql = format!(
            "SELECT {} FROM {} WHERE {}",
            columns, self.config.table, query.filter.sql
        );
        if !query.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&query.order_by);
        }
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        sql
    }

    /// Run a compiled node query
    pub async fn select_nodes(&self, query: &CompiledQuery) -> Result<Vec<Node>, DatabaseError> {
        let sql = self.select_sql(&self.node_columns(), query);
        tracing::debug!("select_nodes: {}", sql);

        let mut rows = self
            .conn
            .query(&sql, Params::Positional(query.filter.params.clone()))
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to execute node query: {}", e))
            })?;

        let mut nodes = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            nodes.push(self.row_to_node(&row)?);
        }

        Ok(nodes)
    }

    /// Run a compiled node query, reading only the path column
    pub async fn select_paths(
        &self,
        query: &CompiledQuery,
    ) -> Result<Vec<MaterializedPath>, DatabaseError> {
        self.fold_paths(query, Vec::new(), |mut paths, path| {
            paths.push(path);
            paths
        })
        .await
    }

    /// Fold the path column of a compiled node query row by row
    ///
    /// A row whose path is NULL is an `InvalidRow` error, as in `select_nodes`.
    pub async fn fold_paths<T, F>(
        &self,
        query: &CompiledQuery,
        init: T,
        mut f: F,
    ) -> Result<T, DatabaseError>
    where
        F: FnMut(T, MaterializedPath) -> T,
    {
        let sql = self.select_sql(&self.config.path, query);

        let mut rows = self
            .conn
            .query(&sql, Params::Positional(query.filter.params.clone()))
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to execute path query: {}", e))
            })?;

        let mut acc = init;
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            let path = optional_text(row.get_value(0)?)
                .ok_or_else(|| DatabaseError::invalid_row(&self.config.table, "row has no path"))?;
            let path = MaterializedPath::parse(&path)
                .map_err(|e| DatabaseError::invalid_row(&self.config.table, e.to_string()))?;
            acc = f(acc, path);
        }

        Ok(acc)
    }

    /// Count the rows matching a compiled query (ordering and limit ignored)
    pub async fn count(&self, query: &CompiledQuery) -> Result<u64, DatabaseError> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {}",
            self.config.table, query.filter.sql
        );

        let mut rows = self
            .conn
            .query(&sql, Params::Positional(query.filter.params.clone()))
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to execute count query: {}", e))
            })?;

        let count: i64 = match rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            Some(row) => row.get(0)?,
            None => 0,
        };

        Ok(count.max(0) as u64)
    }
}
