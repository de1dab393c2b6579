//! Domain error types
//!
//! Errors raised while constructing domain values. These are configuration
//! class errors: the offending input is rejected, never repaired.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A directory resource was given a path that does not start at the store root
    #[error("Invalid resource path for directory '{name}': {path:?} must begin with '/'")]
    InvalidResourcePath {
        /// Leaf name of the offending resource
        name: String,
        /// The rejected path
        path: String,
    },

    /// A resource was given an empty leaf name
    #[error("Resource name must not be empty (path {0:?})")]
    EmptyName(String),
}
