//! Database Connection Management
//!
//! This module provides the libsql connection handling the hierarchy engine
//! runs on.
//!
//! # Architecture
//!
//! - **Path-agnostic**: Accepts any valid PathBuf
//! - **WAL mode**: Write-Ahead Logging so readers never block the writer
//! - **Foreign keys**: Enabled per connection for parent-reference integrity
//! - **Immediate transactions**: Hierarchy writes take the write lock up front
//!
//! # Database Connection Patterns
//!
//! **ALWAYS use `connect_with_timeout()` in async functions.** The 5-second busy
//! timeout lets a second writer wait for the first reparent to commit instead of
//! failing immediately with `SQLITE_BUSY`.
//!
//! ```no_run
//! # use arbor_core::db::DatabaseService;
//! # use std::path::PathBuf;
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let db_service = DatabaseService::new(PathBuf::from("./data/arbor.db")).await?;
//! let conn = db_service.connect_with_timeout().await?;
//! # Ok(())
//! # }
//! ```

use crate::config::{FragmentStrategy, HierarchyConfig};
use crate::db::error::DatabaseError;
use libsql::{Builder, Database};
use std::path::PathBuf;
use std::sync::Arc;

/// Database service for managing the libsql connection
///
/// # Examples
///
/// ```no_run
/// use arbor_core::config::HierarchyConfig;
/// use arbor_core::db::DatabaseService;
/// use std::path::PathBuf;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db_service = DatabaseService::new(PathBuf::from("/path/to/arbor.db")).await?;
///     db_service.ensure_collection(&HierarchyConfig::default()).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseService {
    /// libsql database (wrapped in Arc for sharing)
    pub db: Arc<Database>,

    /// Path to the database file
    pub db_path: PathBuf,
}

impl DatabaseService {
    /// Create a new DatabaseService with the specified database path
    ///
    /// This will:
    /// 1. Ensure the parent directory exists (create if needed)
    /// 2. Open/create the database file
    /// 3. Switch the database to WAL mode
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if:
    /// - Parent directory cannot be created
    /// - Database connection fails
    /// - The journal mode cannot be set
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::PermissionDenied {
                        DatabaseError::permission_denied(db_path.clone())
                    } else {
                        DatabaseError::DirectoryCreationFailed(e)
                    }
                })?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
        };

        // Journal mode is persistent, so setting it once per database is enough
        let conn = service.connect_with_timeout().await?;
        service
            .execute_pragma(&conn, "PRAGMA journal_mode = WAL")
            .await?;

        tracing::debug!("Opened database at {}", service.db_path.display());
        Ok(service)
    }

    /// Execute a PRAGMA statement
    ///
    /// PRAGMA statements return rows, so we must use query() instead of execute().
    async fn execute_pragma(
        &self,
        conn: &libsql::Connection,
        pragma: &str,
    ) -> Result<(), DatabaseError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let mut rows = stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        // Step once so the pragma runs even when it returns no rows
        rows.next().await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Get a synchronous connection to the database
    ///
    /// Only use this in synchronous, single-threaded contexts. Async code should
    /// use `connect_with_timeout()`.
    pub fn connect(&self) -> Result<libsql::Connection, DatabaseError> {
        self.db.connect().map_err(DatabaseError::LibsqlError)
    }

    /// Get an async connection with busy timeout and foreign keys configured
    ///
    /// Both settings are per-connection in SQLite, so they are applied every time.
    pub async fn connect_with_timeout(&self) -> Result<libsql::Connection, DatabaseError> {
        let conn = self.connect()?;

        self.execute_pragma(&conn, "PRAGMA busy_timeout = 5000")
            .await?;
        self.execute_pragma(&conn, "PRAGMA foreign_keys = ON")
            .await?;

        Ok(conn)
    }

    /// Create the table and indexes for a collection if they do not exist
    ///
    /// Hosts that manage their own schema can skip this; the service only
    /// requires that the configured columns exist.
    ///
    /// # Layout
    ///
    /// - fragment: `INTEGER PRIMARY KEY AUTOINCREMENT` or `TEXT PRIMARY KEY`,
    ///   depending on the fragment strategy
    /// - parent reference: same type, with a foreign key to the fragment column
    ///   unless the parent reference is optional
    /// - path: nullable `TEXT` (it is written after the row exists)
    /// - created/updated timestamps: RFC 3339 `TEXT`
    /// - indexes on the path column and the parent reference column
    pub async fn ensure_collection(&self, config: &HierarchyConfig) -> Result<(), DatabaseError> {
        config
            .validate()
            .map_err(DatabaseError::initialization_failed)?;

        let conn = self.connect_with_timeout().await?;

        let (fragment_type, parent_type) = match config.fragment_strategy {
            FragmentStrategy::AutoIncrement => ("INTEGER PRIMARY KEY AUTOINCREMENT", "INTEGER"),
            FragmentStrategy::Uuid => ("TEXT PRIMARY KEY NOT NULL", "TEXT"),
        };

        let parent_constraint = if config.optional {
            String::new()
        } else {
            format!(" REFERENCES {}({})", config.table, config.fragment)
        };

        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                {fragment} {fragment_type},
                {parent} {parent_type}{parent_constraint},
                {path} TEXT,
                {created_at} TEXT NOT NULL,
                {updated_at} TEXT NOT NULL
            )",
            table = config.table,
            fragment = config.fragment,
            parent = config.parent_fragment,
            path = config.path,
            created_at = config.created_at,
            updated_at = config.updated_at,
        );

        conn.execute(&ddl, ()).await.map_err(|e| {
            DatabaseError::sql_execution(format!(
                "Failed to create table '{}': {}",
                config.table, e
            ))
        })?;

        for column in [&config.path, &config.parent_fragment] {
            let index = format!("idx_{}_{}", config.table, column);
            conn.execute(
                &format!(
                    "CREATE INDEX IF NOT EXISTS {} ON {}({})",
                    index, config.table, column
                ),
                (),
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to create index '{}': {}", index, e))
            })?;
        }

        tracing::debug!("Collection '{}' is ready", config.table);
        Ok(())
    }

    /// Column names of a table, in declaration order (empty if the table does not exist)
    pub async fn table_columns(&self, table: &str) -> Result<Vec<String>, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut rows = conn
            .query(&format!("PRAGMA table_info({})", table), ())
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!(
                    "Failed to read columns of '{}': {}",
                    table, e
                ))
            })?;

        let mut columns = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            // table_info columns: cid, name, type, notnull, dflt_value, pk
            let name: String = row.get(1)?;
            columns.push(name);
        }

        Ok(columns)
    }

    /// Begin a write transaction that takes the write lock immediately
    ///
    /// Reads inside the transaction (the prospective parent's path in
    /// particular) cannot be invalidated by another writer before commit.
    pub async fn begin_immediate(&self, conn: &libsql::Connection) -> Result<(), DatabaseError> {
        conn.execute("BEGIN IMMEDIATE", ()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to begin transaction: {}", e))
        })?;
        Ok(())
    }

    /// Commit the open transaction, rolling back if the commit itself fails
    pub async fn commit(&self, conn: &libsql::Connection) -> Result<(), DatabaseError> {
        if let Err(e) = conn.execute("COMMIT", ()).await {
            let _rollback = conn.execute("ROLLBACK", ()).await;
            return Err(DatabaseError::sql_execution(format!(
                "Failed to commit transaction: {}",
                e
            )));
        }
        Ok(())
    }

    /// Roll back the open transaction
    pub async fn rollback(&self, conn: &libsql::Connection) -> Result<(), DatabaseError> {
        conn.execute("ROLLBACK", ()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to roll back transaction: {}", e))
        })?;
        Ok(())
    }
}
