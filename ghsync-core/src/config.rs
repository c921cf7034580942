//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/ghsync/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/ghsync/` (~/.config/ghsync/)
//! - Data: `$XDG_DATA_HOME/ghsync/` (~/.local/share/ghsync/)
//! - State/Logs: `$XDG_STATE_HOME/ghsync/` (~/.local/state/ghsync/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// GitHub account and endpoint configuration
    #[serde(default)]
    pub github: GithubConfig,

    /// Sync tuning knobs
    #[serde(default)]
    pub sync: SyncConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// GitHub account and endpoint configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GithubConfig {
    /// Account login whose activity is synced
    pub username: Option<String>,

    /// Personal access token; the `GITHUB_TOKEN` env var takes precedence
    pub token: Option<String>,

    /// REST API base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// GraphQL endpoint URL
    #[serde(default = "default_graphql_url")]
    pub graphql_url: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            username: None,
            token: None,
            api_url: default_api_url(),
            graphql_url: default_graphql_url(),
        }
    }
}

impl GithubConfig {
    /// Resolve the token from the environment or the config file.
    pub fn resolved_token(&self) -> Option<String> {
        std::env::var("GITHUB_TOKEN").ok().or_else(|| self.token.clone())
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.username.as_deref().map(str::is_empty).unwrap_or(true) {
            return Err(Error::Config(
                "github.username is required".to_string(),
            ));
        }
        if self.resolved_token().is_none() {
            return Err(Error::Config(
                "github.token (or GITHUB_TOKEN) is required".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_graphql_url() -> String {
    "https://api.github.com/graphql".to_string()
}

/// Sync tuning knobs
#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    /// Events per feed page (fixed at 100 by contract with the API)
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Push events selected per enrichment cycle (max 50)
    #[serde(default = "default_enrich_batch_size")]
    pub enrich_batch_size: usize,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            enrich_batch_size: default_enrich_batch_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_page_size() -> u32 {
    100
}

fn default_enrich_batch_size() -> usize {
    50
}

fn default_timeout_secs() -> u64 {
    10
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/ghsync/config.toml` (~/.config/ghsync/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("ghsync").join("config.toml")
    }

    /// Returns the data directory path (for the SQLite database)
    ///
    /// `$XDG_DATA_HOME/ghsync/` (~/.local/share/ghsync/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("ghsync")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/ghsync/` (~/.local/state/ghsync/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("ghsync")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/ghsync/data.db` (~/.local/share/ghsync/data.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("data.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/ghsync/ghsync.log` (~/.local/state/ghsync/ghsync.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("ghsync.log")
    }
}
