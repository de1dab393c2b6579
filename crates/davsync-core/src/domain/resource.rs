//! Resource value type
//!
//! A [`Resource`] describes one file or directory entry on either side of a
//! sync. It is created fresh by every listing call and lives for a single
//! diff step; nothing about it is cached or persisted.
//!
//! Paths are relative to the store root and use `/` as separator. The root
//! itself is the empty path, and every entry below it begins with `/`
//! (`/docs`, `/docs/a.txt`).

use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Separator used in root-relative resource paths, independent of the OS.
pub const PATH_SEPARATOR: char = '/';

/// One file or directory entry of a store
///
/// ## Invariants
///
/// - A directory path always begins with [`PATH_SEPARATOR`]; violating input
///   is a construction error.
/// - `modified` is epoch milliseconds and is only ever compared against the
///   counterpart entry of the other store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    name: String,
    path: String,
    modified: i64,
    is_directory: bool,
    size: u64,
}

impl Resource {
    /// Creates a new resource, validating the path invariant
    ///
    /// # Arguments
    /// * `name` - Leaf display name
    /// * `path` - Root-relative path (e.g. `/docs/a.txt`)
    /// * `modified` - Last modification time in epoch milliseconds
    /// * `is_directory` - Whether the entry is a directory
    /// * `size` - Byte length (ignored for directories)
    ///
    /// # Errors
    /// Returns [`DomainError::InvalidResourcePath`] when a directory path does
    /// not begin with `/`, and [`DomainError::EmptyName`] for an empty name.
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        modified: i64,
        is_directory: bool,
        size: u64,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        let path = path.into();

        if name.is_empty() {
            return Err(DomainError::EmptyName(path));
        }
        if is_directory && !path.starts_with(PATH_SEPARATOR) {
            return Err(DomainError::InvalidResourcePath { name, path });
        }

        Ok(Self {
            name,
            path,
            modified,
            is_directory,
            size,
        })
    }

    /// Creates a file resource
    pub fn file(
        name: impl Into<String>,
        path: impl Into<String>,
        modified: i64,
        size: u64,
    ) -> Result<Self, DomainError> {
        Self::new(name, path, modified, false, size)
    }

    /// Creates a directory resource (size is always 0)
    pub fn directory(
        name: impl Into<String>,
        path: impl Into<String>,
        modified: i64,
    ) -> Result<Self, DomainError> {
        Self::new(name, path, modified, true, 0)
    }

    /// Leaf display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Root-relative path, the identity of the entry within one listing
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last modification time in epoch milliseconds
    pub fn modified(&self) -> i64 {
        self.modified
    }

    /// Last modification time as a UTC timestamp, if representable
    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.modified)
    }

    /// Whether this entry is a directory
    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    /// Byte length of a file entry
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Iterates the non-empty path segments (`/docs/a.txt` yields `docs`, `a.txt`)
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        path_segments(&self.path)
    }

    /// Returns true when `self` is strictly older than `other`
    ///
    /// Equal timestamps count as in sync.
    pub fn is_older_than(&self, other: &Resource) -> bool {
        self.modified < other.modified
    }

    /// Like [`Resource::is_older_than`], with both times truncated to
    /// multiples of `resolution_ms` first
    pub fn is_older_than_at(&self, other: &Resource, resolution_ms: i64) -> bool {
        let step = resolution_ms.max(1);
        self.modified.div_euclid(step) < other.modified.div_euclid(step)
    }
}

impl Display for Resource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_directory {
            write!(f, "{}/", self.path)
        } else {
            write!(f, "{} ({} bytes)", self.path, self.size)
        }
    }
}

/// Joins a parent path and a leaf name into a child path
///
/// The store root is the empty path, so `child_path("", "docs")` is `/docs`.
pub fn child_path(parent: &str, name: &str) -> String {
    let parent = parent.trim_end_matches(PATH_SEPARATOR);
    format!("{parent}{PATH_SEPARATOR}{name}")
}

/// Iterates the non-empty segments of a root-relative path
pub fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(PATH_SEPARATOR).filter(|s| !s.is_empty())
}
