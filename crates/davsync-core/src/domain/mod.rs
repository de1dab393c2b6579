//! Domain values
//!
//! - [`Resource`] - immutable description of one file or directory entry
//! - [`DomainError`] - construction failures for domain values

pub mod errors;
pub mod resource;

pub use errors::DomainError;
pub use resource::{child_path, path_segments, Resource, PATH_SEPARATOR};
