//! Hierarchy Services
//!
//! This module contains the read and write surface of a hierarchical collection:
//!
//! - `HierarchyService` - create, move, delete, and query nodes of one collection
//! - `NodeScope` - lazy, composable description of a set of nodes
//! - `LcaInput` - literal paths or a scope for the lowest common ancestor resolver
//!
//! Services coordinate between the database layer and the engine operations,
//! owning the transaction boundary of each host write.

pub mod error;
pub mod hierarchy_service;
pub mod lca;
mod navigator;
pub mod scope;


pub use error::HierarchyError;
pub use hierarchy_service::HierarchyService;
pub use lca::LcaInput;
pub use scope::{Condition, NodeOrder, NodeScope};
