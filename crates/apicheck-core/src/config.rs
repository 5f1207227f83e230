//! Configuration management for apicheck.
//!
//! This module defines the `Config` struct that controls how documents are
//! fetched and how converted output is written. The configuration can be
//! loaded from a YAML (or `.toml`) file, created programmatically, or
//! assembled from command-line arguments.
//!
//! # Examples
//!
//! ```no_run
//! use apicheck_core::config::Config;
//!
//! # #[tokio::main]
//! # async fn main() -> apicheck_core::Result<()> {
//! // Create a new config programmatically
//! let mut config = Config::default();
//! config.fetch_timeout_secs = 5;
//! config.allow_remote_refs = false;
//!
//! // Or load from a config file
//! let config = Config::from_file("apicheck.yaml").await?;
//! # Ok(())
//! # }
//! ```

// Internal imports (std, crate)
use std::path::{Path, PathBuf};
use std::time::Duration;

// External imports (alphabetized)
use serde::{Deserialize, Serialize};
use tokio::fs;

/// Configuration for document loading, dereferencing and conversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Upper bound, in seconds, for every external fetch
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Whether `http://`/`https://` references may be fetched
    #[serde(default = "default_true")]
    pub allow_remote_refs: bool,

    /// Whether file-path references may be read
    #[serde(default = "default_true")]
    pub allow_file_refs: bool,

    /// Base directory for relative references in inline documents
    #[serde(default)]
    pub base_dir: Option<PathBuf>,

    /// `User-Agent` header sent with HTTP requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Indentation width of converted JSON
    #[serde(default = "default_json_indent")]
    pub json_indent: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_fetch_timeout_secs(),
            allow_remote_refs: true,
            allow_file_refs: true,
            base_dir: None,
            user_agent: default_user_agent(),
            json_indent: default_json_indent(),
        }
    }
}

impl Config {
    /// Fetch timeout as a [`Duration`]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Location of the per-user configuration file, if the platform has one
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("apicheck").join("config.yaml"))
    }

    /// Load configuration from a file (`.toml` or YAML)
    pub async fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await?;
        let config = if is_toml(path) {
            toml::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };
        Ok(config)
    }

    /// Load the per-user configuration when it exists, defaults otherwise
    pub async fn load_default() -> crate::Result<Self> {
        match Self::default_path() {
            Some(path) if fs::try_exists(&path).await? => Self::from_file(path).await,
            _ => Ok(Self::default()),
        }
    }

    /// Save configuration to a file (`.toml` or YAML)
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let path = path.as_ref();
        let content = if is_toml(path) {
            toml::to_string(self)?
        } else {
            serde_yaml::to_string(self)?
        };
        fs::write(path, content).await?;
        Ok(())
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("toml")
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_user_agent() -> String {
    format!("apicheck/{}", env!("CARGO_PKG_VERSION"))
}

fn default_json_indent() -> usize {
    2
}
