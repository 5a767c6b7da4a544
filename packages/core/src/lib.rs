//! Arbor Core - Materialized-Path Hierarchies
//!
//! This crate maintains tree-shaped relationships among rows of a libsql
//! table by storing each row's materialized path (`"1.4.2"`), so that
//! ancestor, descendant, and sibling queries are single indexed predicates.
//!
//! # Architecture
//!
//! - **Explicit configuration**: each collection is described by a `HierarchyConfig` value
//! - **Two-phase create**: identity is allocated first, the path is written second
//! - **Set-based cascade**: a move rewrites the whole subtree in one `UPDATE`
//! - **Lazy scopes**: navigation returns `NodeScope` descriptions executed on demand
//!
//! # Modules
//!
//! - [`config`] - Collection configuration
//! - [`models`] - Fragments, paths, and nodes
//! - [`operations`] - Path computation, cycle guard, and the create/reparent lifecycle
//! - [`services`] - `HierarchyService`, scopes, and the LCA resolver
//! - [`db`] - Database layer with libsql integration

pub mod config;
pub mod db;
pub mod models;
pub mod operations;
pub mod services;

// Re-export commonly used types
pub use config::{FragmentStrategy, HierarchyConfig};
pub use models::*;
pub use services::*;
