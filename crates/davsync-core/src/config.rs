//! Configuration module for davsync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable that overrides `remote.password`.
pub const PASSWORD_ENV: &str = "DAVSYNC_PASSWORD";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures loading the configuration file or the exclusion list
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] serde_yaml::Error),

    #[error("Invalid exclusion pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Malformed exclusion at line {line}: {reason} ({content:?})")]
    MalformedExclusion {
        line: usize,
        content: String,
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for davsync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub remote: RemoteConfig,
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

/// WebDAV server and account settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// `http` or `https`.
    pub protocol: String,
    /// Server host name, optionally with `:port`.
    pub host: String,
    /// Tenant segment of the remote root. Derived from the email when empty.
    pub tenant: String,
    /// Site segment of the remote root. Derived from the email when empty.
    pub site: String,
    /// Account email, also the basic-auth user name.
    pub email: String,
    /// Account secret. [`PASSWORD_ENV`] takes precedence when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Root directory of the local mirror.
    pub root: PathBuf,
    /// Seconds between scheduled sync cycles.
    pub interval_secs: u64,
    /// User exclusion list; may be absent on disk.
    pub exclusions_file: PathBuf,
    /// Whether the daemon watches the local root for changes.
    pub watch: bool,
    /// Milliseconds a local change must settle before it triggers a cycle.
    pub debounce_ms: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Loading and saving
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Write the configuration as YAML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let yaml = serde_yaml::to_string(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, yaml).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/davsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        config_dir().join("config.yaml")
    }

    /// Copy of the configuration safe to print (the secret is masked).
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.remote.password.is_some() {
            copy.remote.password = Some("********".to_string());
        }
        copy
    }
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("davsync")
}

/// Expands a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            protocol: "https".to_string(),
            host: "my.alfresco.com".to_string(),
            tenant: String::new(),
            site: String::new(),
            email: String::new(),
            password: None,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("~/myCloud"),
            interval_secs: 300,
            exclusions_file: config_dir().join("exclusions.txt"),
            watch: true,
            debounce_ms: 2000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Derived values
// ---------------------------------------------------------------------------

impl RemoteConfig {
    /// Tenant to use: the configured one, else the domain part of the email.
    pub fn effective_tenant(&self) -> Option<String> {
        if !self.tenant.is_empty() {
            return Some(self.tenant.clone());
        }
        self.email
            .split_once('@')
            .map(|(_, domain)| domain.to_string())
            .filter(|domain| !domain.is_empty())
    }

    /// Site to use: the configured one, else `first-last-domain-tld` built
    /// from an email shaped like `first.last@domain.tld`.
    pub fn effective_site(&self) -> Option<String> {
        if !self.site.is_empty() {
            return Some(self.site.clone());
        }
        let (user, domain) = self.email.split_once('@')?;
        let user: Vec<&str> = user.split('.').collect();
        let domain: Vec<&str> = domain.split('.').collect();
        if user.len() < 2 || domain.len() < 2 {
            return None;
        }
        let parts = [user[0], user[1], domain[0], domain[1]];
        if parts.iter().any(|p| p.is_empty()) {
            return None;
        }
        Some(parts.join("-"))
    }

    /// Remote root path, `/<tenant>/<site>`.
    pub fn root_path(&self) -> Option<String> {
        Some(format!(
            "/{}/{}",
            self.effective_tenant()?,
            self.effective_site()?
        ))
    }

    /// `protocol://host` of the server.
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.host)
    }

    /// Account secret, preferring the [`PASSWORD_ENV`] environment variable.
    pub fn secret(&self) -> Option<String> {
        self.secret_with(std::env::var(PASSWORD_ENV).ok())
    }

    fn secret_with(&self, from_env: Option<String>) -> Option<String> {
        from_env
            .filter(|s| !s.is_empty())
            .or_else(|| self.password.clone())
    }
}

impl SyncConfig {
    /// Local root with `~` expanded.
    pub fn root_dir(&self) -> PathBuf {
        expand_tilde(&self.root)
    }

    /// Exclusion file path with `~` expanded.
    pub fn exclusions_path(&self) -> PathBuf {
        expand_tilde(&self.exclusions_file)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.interval_secs"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
pub const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `remote.protocol`.
const VALID_PROTOCOLS: &[&str] = &["http", "https"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- remote ---
        if !VALID_PROTOCOLS.contains(&self.remote.protocol.as_str()) {
            errors.push(ValidationError {
                field: "remote.protocol".into(),
                message: format!(
                    "invalid protocol '{}'; valid options: {}",
                    self.remote.protocol,
                    VALID_PROTOCOLS.join(", ")
                ),
            });
        }
        if self.remote.host.trim().is_empty() {
            errors.push(ValidationError {
                field: "remote.host".into(),
                message: "must not be empty".into(),
            });
        }
        if !self.remote.email.contains('@') {
            errors.push(ValidationError {
                field: "remote.email".into(),
                message: "must be an email address".into(),
            });
        } else {
            if self.remote.effective_tenant().is_none() {
                errors.push(ValidationError {
                    field: "remote.tenant".into(),
                    message: "cannot be derived from the email; set it explicitly".into(),
                });
            }
            if self.remote.effective_site().is_none() {
                errors.push(ValidationError {
                    field: "remote.site".into(),
                    message: "cannot be derived from the email; set it explicitly".into(),
                });
            }
        }

        // --- sync ---
        if self.sync.interval_secs == 0 {
            errors.push(ValidationError {
                field: "sync.interval_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.sync.debounce_ms == 0 {
            errors.push(ValidationError {
                field: "sync.debounce_ms".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use davsync_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .remote_email("jane.doe@example.com")
///     .sync_root(PathBuf::from("/home/jane/myCloud"))
///     .sync_interval_secs(60)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- remote ---

    pub fn remote_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.config.remote.protocol = protocol.into();
        self
    }

    pub fn remote_host(mut self, host: impl Into<String>) -> Self {
        self.config.remote.host = host.into();
        self
    }

    pub fn remote_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.config.remote.tenant = tenant.into();
        self
    }

    pub fn remote_site(mut self, site: impl Into<String>) -> Self {
        self.config.remote.site = site.into();
        self
    }

    pub fn remote_email(mut self, email: impl Into<String>) -> Self {
        self.config.remote.email = email.into();
        self
    }

    pub fn remote_password(mut self, password: impl Into<String>) -> Self {
        self.config.remote.password = Some(password.into());
        self
    }

    // --- sync ---

    pub fn sync_root(mut self, root: PathBuf) -> Self {
        self.config.sync.root = root;
        self
    }

    pub fn sync_interval_secs(mut self, seconds: u64) -> Self {
        self.config.sync.interval_secs = seconds;
        self
    }

    pub fn sync_exclusions_file(mut self, path: PathBuf) -> Self {
        self.config.sync.exclusions_file = path;
        self
    }

    pub fn sync_watch(mut self, watch: bool) -> Self {
        self.config.sync.watch = watch;
        self
    }

    pub fn sync_debounce_ms(mut self, millis: u64) -> Self {
        self.config.sync.debounce_ms = millis;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
