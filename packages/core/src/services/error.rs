//! Service Layer Error Types
//!
//! This module defines error types for hierarchy operations, providing
//! detailed error handling for rule violations and storage failures.

use crate::db::DatabaseError;
use crate::models::{Fragment, ValidationError};
use thiserror::Error;

/// Hierarchy operation errors
///
/// Validation failures refuse the write before anything is changed. A
/// `CascadeFailed` error means the write was attempted and rolled back.
#[derive(Error, Debug)]
pub enum HierarchyError {
    /// Field-level validation failed (cycle, dangling parent, malformed value)
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Misconfiguration or an identity the store should have produced
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Node not found by fragment
    #[error("Node not found: {fragment}")]
    NodeNotFound { fragment: String },

    /// Own-path or descendant rewrite failed; the transaction was rolled back
    #[error("Cascade failed: {context}")]
    CascadeFailed { context: String },

    /// Database operation failed
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),
}

impl HierarchyError {
    /// Create a precondition error
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Create a node not found error
    pub fn node_not_found(fragment: &Fragment) -> Self {
        Self::NodeNotFound {
            fragment: fragment.to_string(),
        }
    }

    /// Create a cascade failed error
    pub fn cascade_failed(context: impl Into<String>) -> Self {
        Self::CascadeFailed {
            context: context.into(),
        }
    }

    /// The validation failure, if this is one
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(e) => Some(e),
            _ => None,
        }
    }
}
