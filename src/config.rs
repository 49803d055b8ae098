use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::lineage::{EngineSettings, DEFAULT_MAX_DEPTH};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub lineage: LineageConfig,
    #[serde(default)]
    pub traversal: TraversalConfig,
    #[serde(default)]
    pub http_server: HttpServerConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Reference store location and logging
#[derive(Debug, Clone, Deserialize)]
pub struct LineageConfig {
    /// SQLite database holding material_transactions and item_master.
    pub db_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Closure traversal limits
#[derive(Debug, Clone, Deserialize)]
pub struct TraversalConfig {
    /// Depth used when a request does not name one.
    #[serde(default = "default_max_depth")]
    pub default_max_depth: u32,
    /// Largest depth a request may ask for.
    #[serde(default = "default_max_depth")]
    pub max_depth_limit: u32,
    /// Enter a batch on a consumption cycle at most once per root.
    #[serde(default = "default_cycle_guard")]
    pub cycle_guard: bool,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            default_max_depth: default_max_depth(),
            max_depth_limit: default_max_depth(),
            cycle_guard: default_cycle_guard(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_http_port")]
    pub port: u16,
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            port: default_http_port(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

/// Result table settings
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Name of the trailing row-count column for aggregated projections.
    #[serde(default = "default_count_column")]
    pub count_column: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            count_column: default_count_column(),
        }
    }
}

fn default_max_depth() -> u32 {
    DEFAULT_MAX_DEPTH
}

fn default_cycle_guard() -> bool {
    true
}

fn default_http_port() -> u16 {
    8080
}

fn default_allowed_origins() -> Vec<String> {
    // Empty means any origin (local dashboards)
    vec![]
}

fn default_count_column() -> String {
    "CntRecs".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

const LOG_LEVELS: &[&str] = &["off", "error", "warn", "info", "debug", "trace"];

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in LINEAGE_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        let config_path = std::env::var("LINEAGE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        Self::from_file(&config_path)
    }

    /// Load and validate a specific config file
    pub fn from_file(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.lineage.db_path.as_os_str().is_empty() {
            anyhow::bail!("lineage.db_path must not be empty");
        }

        if !LOG_LEVELS.contains(&self.lineage.log_level.to_lowercase().as_str()) {
            anyhow::bail!(
                "lineage.log_level must be one of {}, got '{}'",
                LOG_LEVELS.join(", "),
                self.lineage.log_level
            );
        }

        if self.traversal.default_max_depth == 0 {
            anyhow::bail!("traversal.default_max_depth must be greater than 0");
        }

        if self.traversal.default_max_depth > self.traversal.max_depth_limit {
            anyhow::bail!(
                "traversal.default_max_depth ({}) must not exceed traversal.max_depth_limit ({})",
                self.traversal.default_max_depth,
                self.traversal.max_depth_limit
            );
        }

        if self.output.count_column.trim().is_empty() {
            anyhow::bail!("output.count_column must not be empty");
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.lineage.db_path
    }

    /// Engine settings derived from the traversal and output sections
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            default_max_depth: self.traversal.default_max_depth,
            max_depth_limit: self.traversal.max_depth_limit,
            cycle_guard: self.traversal.cycle_guard,
            count_column: self.output.count_column.clone(),
        }
    }
}
