//! # Configuration
//!
//! Server and API defaults, loaded from a JSON file. Every field has a
//! default so an empty object is a valid configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failed to read or parse a configuration file
#[derive(Debug, Error)]
#[error("Failed to load config {path}: {reason}")]
pub struct ConfigError {
    pub path: String,
    pub reason: String,
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestlessConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub api: ApiDefaults,
}

impl RestlessConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| ConfigError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to (default: "0.0.0.0")
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to (default: 5000)
    #[serde(default = "default_port")]
    pub port: u16,

    /// CORS allowed origins; empty allows any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Create a new config with specified port
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Defaults applied to every model API unless overridden per model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiDefaults {
    /// Route prefix (default: "/api")
    #[serde(default = "default_url_prefix")]
    pub url_prefix: String,

    #[serde(default = "default_results_per_page")]
    pub results_per_page: u64,

    #[serde(default = "default_max_results_per_page")]
    pub max_results_per_page: u64,

    /// Relation levels expanded in responses
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_url_prefix() -> String {
    "/api".to_string()
}

fn default_results_per_page() -> u64 {
    10
}

fn default_max_results_per_page() -> u64 {
    100
}

fn default_max_depth() -> usize {
    1
}

impl Default for ApiDefaults {
    fn default() -> Self {
        Self {
            url_prefix: default_url_prefix(),
            results_per_page: default_results_per_page(),
            max_results_per_page: default_max_results_per_page(),
            max_depth: default_max_depth(),
        }
    }
}
