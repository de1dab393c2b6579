//! Exclusion rules
//!
//! Decides whether a [`Resource`] participates in a sync pass. A resource is
//! excluded when it is larger than [`MAX_FILE_SIZE`] or when its leaf name
//! fully matches one of the regular expressions of the effective
//! [`ExclusionSet`]. A pattern is anchored at both ends, so `.*\.bak` matches
//! `notes.bak` and `\.git` matches only `.git`.
//!
//! The effective set is the union of the built-in global list and the
//! user's exclusion file. Because the engine only descends into a directory
//! after it passes this check, an excluded directory hides its whole subtree.
//!
//! ## Exclusion file format
//!
//! ```text
//! # comment
//! .*\.bak,Editor backups
//! node_modules,Dependency folders
//! ```
//!
//! One `pattern,description` record per line, split at the first comma.
//! A record without a comma fails the whole load; the set is never built
//! from a partial file.

use std::collections::BTreeMap;
use std::path::Path;

use regex::Regex;
use tracing::{debug, warn};

use crate::config::ConfigError;
use crate::domain::Resource;

/// Files strictly larger than this many bytes (1 GiB) never take part in sync.
pub const MAX_FILE_SIZE: u64 = 1_073_741_824;

/// Suffix of the temporary file a local write goes through before its rename.
pub const PARTIAL_SUFFIX: &str = ".davsync-part";

/// Built-in exclusions shipped with the engine, as `(pattern, reason)`.
pub const GLOBAL_EXCLUSIONS: &[(&str, &str)] = &[
    (r"\.git", "Git repository metadata"),
    (r"\.svn", "Subversion working copy metadata"),
    (r"\.hg", "Mercurial repository metadata"),
    (r"\.DS_Store", "macOS Finder metadata"),
    (r"\._.*", "macOS resource fork"),
    (r"Thumbs\.db", "Windows thumbnail cache"),
    (r"desktop\.ini", "Windows folder settings"),
    (r"~\$.*", "Microsoft Office lock file"),
    (r"\.~lock\..*#", "LibreOffice lock file"),
    (r".*\.swp", "Vim swap file"),
    (r".*\.tmp", "Temporary file"),
    (r".*\.davsync-part", "Partial davsync transfer"),
];

// ============================================================================
// Exclusion verdict
// ============================================================================

/// Why a resource was excluded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exclusion {
    /// The resource is larger than [`MAX_FILE_SIZE`]
    TooLarge {
        /// Size of the resource in bytes
        size: u64,
    },
    /// The resource name matched an exclusion pattern
    Pattern {
        /// The matching pattern key
        pattern: String,
        /// Human-readable reason attached to the pattern
        reason: String,
    },
}

impl std::fmt::Display for Exclusion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Exclusion::TooLarge { size } => {
                write!(f, "size {size} exceeds limit of {MAX_FILE_SIZE} bytes")
            }
            Exclusion::Pattern { pattern, reason } => {
                write!(f, "matches '{pattern}' ({reason})")
            }
        }
    }
}

// ============================================================================
// ExclusionSet
// ============================================================================

#[derive(Debug, Clone)]
struct Entry {
    regex: Regex,
    reason: String,
}

/// Mapping from name pattern to the reason it is excluded
///
/// Keys are the pattern source text, so duplicate patterns coalesce.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    entries: BTreeMap<String, Entry>,
}

impl ExclusionSet {
    /// Creates an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in global set
    pub fn global() -> Self {
        let mut set = Self::new();
        for (pattern, reason) in GLOBAL_EXCLUSIONS {
            if let Err(e) = set.insert(pattern, reason) {
                warn!(pattern, error = %e, "Skipping invalid built-in exclusion");
            }
        }
        set
    }

    /// Compiles and inserts one pattern, replacing the reason of an existing key
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidPattern`] when `pattern` is empty or not a
    /// valid regular expression.
    pub fn insert(&mut self, pattern: &str, reason: &str) -> Result<(), ConfigError> {
        if pattern.is_empty() {
            return Err(ConfigError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "pattern is empty".to_string(),
            });
        }

        let compiled = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
            ConfigError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            }
        })?;

        self.entries.insert(
            pattern.to_string(),
            Entry {
                regex: compiled,
                reason: reason.to_string(),
            },
        );
        Ok(())
    }

    /// Parses the contents of an exclusion file
    ///
    /// # Errors
    /// Returns [`ConfigError::MalformedExclusion`] for the first bad record,
    /// with its 1-based line number.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut set = Self::new();

        for (index, raw) in content.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim_end_matches('\r');
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let (pattern, reason) =
                trimmed
                    .split_once(',')
                    .ok_or_else(|| ConfigError::MalformedExclusion {
                        line: line_no,
                        content: line.to_string(),
                        reason: "expected 'pattern,description'".to_string(),
                    })?;

            set.insert(pattern.trim(), reason.trim())
                .map_err(|e| ConfigError::MalformedExclusion {
                    line: line_no,
                    content: line.to_string(),
                    reason: e.to_string(),
                })?;
        }

        debug!(count = set.len(), "Exclusions parsed");
        Ok(set)
    }

    /// Loads an exclusion file
    ///
    /// # Errors
    /// Fails when the file cannot be read or any record is malformed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Loads an exclusion file that may legitimately be absent
    ///
    /// Returns `Ok(None)` when the file does not exist.
    pub fn load_optional(path: &Path) -> Result<Option<Self>, ConfigError> {
        match Self::load(path) {
            Ok(set) => Ok(Some(set)),
            Err(ConfigError::Io { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                debug!(path = %path.display(), "No local exclusion file");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Builds the effective set for a run: the union of `global` and `local`
    ///
    /// On a duplicate key the global reason is kept; the reason carries no
    /// matching semantics.
    pub fn merged(global: &ExclusionSet, local: Option<&ExclusionSet>) -> ExclusionSet {
        let mut merged = local.cloned().unwrap_or_default();
        for (key, entry) in &global.entries {
            merged.entries.insert(key.clone(), entry.clone());
        }
        merged
    }

    /// Returns the first pattern that fully matches `name`
    pub fn matching_pattern(&self, name: &str) -> Option<(&str, &str)> {
        self.entries
            .iter()
            .find(|(_, entry)| entry.regex.is_match(name))
            .map(|(key, entry)| (key.as_str(), entry.reason.as_str()))
    }

    /// Checks a resource against the size ceiling and the name patterns
    pub fn check(&self, resource: &Resource) -> Option<Exclusion> {
        if resource.size() > MAX_FILE_SIZE {
            return Some(Exclusion::TooLarge {
                size: resource.size(),
            });
        }

        self.matching_pattern(resource.name())
            .map(|(pattern, reason)| Exclusion::Pattern {
                pattern: pattern.to_string(),
                reason: reason.to_string(),
            })
    }

    /// Returns true when the resource must be skipped
    pub fn excludes(&self, resource: &Resource) -> bool {
        self.check(resource).is_some()
    }

    /// Iterates `(pattern, reason)` pairs in pattern order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, entry)| (key.as_str(), entry.reason.as_str()))
    }

    /// Number of patterns
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no patterns
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Returns true if `resource` is excluded by `set`
pub fn is_excluded(resource: &Resource, set: &ExclusionSet) -> bool {
    set.excludes(resource)
}
