//! Database Layer
//!
//! This module handles all database interactions using libsql (embedded SQLite):
//!
//! - `DatabaseService` - connection management, pragmas, transactions, and
//!   the convenience DDL for a hierarchical collection
//! - `Collection` - the primitive statements over one configured table
//! - `PathColumn` - path containment, level, and rewrite rendered as SQL
//!
//! SQLite has no native tree type, so the path column is plain `TEXT` and
//! every hierarchy predicate is an equality, `IN`, or range test on it. The
//! path index serves all of them.

mod collection;
mod database;
mod error;
mod path_column;

pub use collection::{Collection, CompiledQuery};
pub use database::DatabaseService;
pub use error::DatabaseError;
pub use path_column::{PathColumn, SqlFragment};
