//! Data Models
//!
//! This module contains the value types the hierarchy engine works with:
//!
//! - `Fragment` / `MaterializedPath` - the path encoding
//! - `Node` / `NewNode` / `DraftNode` - persisted, to-be-created, and unsaved nodes
//! - `Hierarchical` - depth and root detection shared by nodes

mod node;
mod path;

pub use node::{DraftNode, DraftParent, Hierarchical, NewNode, Node, ValidationError};
pub use path::{CommonAncestor, Fragment, MaterializedPath, PATH_SEPARATOR};
