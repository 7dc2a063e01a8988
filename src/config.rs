//! Configuration for PathKV
//!
//! Centralized server-side configuration with sensible defaults, an
//! environment overlay, and a builder. Client settings live in
//! [`crate::client::ClientConfig`].

use std::time::Duration;

use crate::error::{PathKvError, Result};
use crate::path::{PathValidationConfig, WorkspaceConstraints};

// =============================================================================
// Environment Variables
// =============================================================================

/// Backing table name
pub const ENV_TABLE_NAME: &str = "PATHKV_TABLE_NAME";

/// `true`/`1` enables debug logging
pub const ENV_VERBOSE_LOGGING: &str = "PATHKV_VERBOSE_LOGGING";

/// TCP listen address
pub const ENV_LISTEN_ADDR: &str = "PATHKV_LISTEN_ADDR";

/// `false`/`0` allows shared prefixes next to workspace roots
pub const ENV_STRICT_WORKSPACES: &str = "PATHKV_STRICT_WORKSPACES";

/// Main configuration for a PathKV server
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Environment
    // -------------------------------------------------------------------------
    /// Name of the backing table/collection
    pub table_name: String,

    /// Log every request at debug level
    pub verbose_logging: bool,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Connection read timeout (milliseconds)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds)
    pub write_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Path and Workspace Policy
    // -------------------------------------------------------------------------
    /// Path validation rules
    pub path: PathValidationConfig,

    /// Only the caller's own workspace root is reachable
    pub strict_workspaces: bool,

    /// Shared prefixes reachable when `strict_workspaces` is off
    pub allowed_prefixes: Vec<String>,

    // -------------------------------------------------------------------------
    // Store and Query Configuration
    // -------------------------------------------------------------------------
    /// Engine connection pool and retry
    pub store: StoreConfig,

    /// Tree query limits and latency budget
    pub tree: TreeConfig,
}

/// Store adapter settings
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Max pooled engine connections
    pub pool_size: usize,

    /// How long to wait for a pooled connection
    pub acquire_timeout: Duration,

    /// Retries for throttled or failed engine calls
    pub max_retries: u32,

    /// First backoff delay
    pub base_delay: Duration,

    /// Backoff cap
    pub max_delay: Duration,

    /// Randomize backoff delays
    pub jitter: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            pool_size: 16,
            acquire_timeout: Duration::from_secs(5),
            max_retries: 3,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
            jitter: true,
        }
    }
}

/// Tree (prefix query) settings
#[derive(Debug, Clone)]
pub struct TreeConfig {
    /// Limit used when the request has none
    pub default_limit: usize,

    /// Larger limits are clamped to this
    pub max_limit: usize,

    /// Items requested from the engine per scan call
    pub page_size: usize,

    /// Internal scan budget; the scan stops early once it is spent
    pub time_budget: Duration,

    /// Soft SLA; exceeding it only logs a warning
    pub sla: Duration,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            default_limit: 100,
            max_limit: 1000,
            page_size: 100,
            time_budget: Duration::from_millis(450),
            sla: Duration::from_millis(500),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            table_name: "pathkv-data".to_string(),
            verbose_logging: false,
            listen_addr: "127.0.0.1:7878".to_string(),
            max_connections: 1024,
            read_timeout_ms: 30_000,
            write_timeout_ms: 30_000,
            path: PathValidationConfig::default(),
            strict_workspaces: true,
            allowed_prefixes: vec!["/global/".to_string()],
            store: StoreConfig::default(),
            tree: TreeConfig::default(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Defaults overlaid with the process environment
    pub fn from_env() -> Result<Self> {
        Self::default().with_env(|name| std::env::var(name).ok())
    }

    /// Overlay values from `lookup` (an environment accessor)
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(table) = lookup(ENV_TABLE_NAME).filter(|t| !t.trim().is_empty()) {
            self.table_name = table.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_VERBOSE_LOGGING) {
            self.verbose_logging = parse_flag(ENV_VERBOSE_LOGGING, &raw)?;
        }
        if let Some(addr) = lookup(ENV_LISTEN_ADDR).filter(|a| !a.trim().is_empty()) {
            self.listen_addr = addr.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_STRICT_WORKSPACES) {
            self.strict_workspaces = parse_flag(ENV_STRICT_WORKSPACES, &raw)?;
        }
        Ok(self)
    }

    /// Boundary constraints for one caller
    pub fn workspace_constraints(&self, workspace_id: &str, user_id: Option<&str>) -> WorkspaceConstraints {
        WorkspaceConstraints {
            workspace_id: workspace_id.to_string(),
            user_id: user_id.map(str::to_string),
            strict_mode: self.strict_workspaces,
            allowed_prefixes: self.allowed_prefixes.clone(),
        }
    }
}

fn parse_flag(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(PathKvError::Config(format!(
            "{} must be a boolean, got '{}'",
            name, other
        ))),
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the backing table name
    pub fn table_name(mut self, name: impl Into<String>) -> Self {
        self.config.table_name = name.into();
        self
    }

    /// Enable or disable verbose logging
    pub fn verbose_logging(mut self, verbose: bool) -> Self {
        self.config.verbose_logging = verbose;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Replace the path validation rules
    pub fn path_validation(mut self, path: PathValidationConfig) -> Self {
        self.config.path = path;
        self
    }

    /// Enable or disable strict workspace isolation
    pub fn strict_workspaces(mut self, strict: bool) -> Self {
        self.config.strict_workspaces = strict;
        self
    }

    /// Set the shared prefixes allowed in non-strict mode
    pub fn allowed_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.allowed_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the store adapter settings
    pub fn store(mut self, store: StoreConfig) -> Self {
        self.config.store = store;
        self
    }

    /// Replace the tree query settings
    pub fn tree(mut self, tree: TreeConfig) -> Self {
        self.config.tree = tree;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
