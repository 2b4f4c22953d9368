//! Configuration loading and backend endpoint resolution
//!
//! Resolution follows a fixed priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (backend URL only; the auth token has no default)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// Environment variable holding the backend base URL
pub const BACKEND_URL_ENV: &str = "DQP_BACKEND_URL";

/// Environment variable holding the bearer auth token
pub const AUTH_TOKEN_ENV: &str = "DQP_AUTH_TOKEN";

/// Compiled default backend URL (local development pipeline)
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8800";

/// TOML configuration file contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Base URL of the DQ pipeline backend
    pub backend_url: Option<String>,

    /// Bearer token sent with every backend request
    pub auth_token: Option<String>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Get default configuration file path for the platform
///
/// Linux tries `~/.config/dqpilot/config.toml` then `/etc/dqpilot/config.toml`;
/// macOS and Windows use the platform config directory.
pub fn default_config_path() -> Result<PathBuf> {
    if cfg!(target_os = "linux") {
        let user_config = dirs::config_dir().map(|d| d.join("dqpilot").join("config.toml"));
        let system_config = PathBuf::from("/etc/dqpilot/config.toml");

        if let Some(path) = user_config {
            if path.exists() {
                return Ok(path);
            }
        }
        if system_config.exists() {
            return Ok(system_config);
        }
        Err(Error::Config("No config file found".to_string()))
    } else {
        let path = dirs::config_dir()
            .map(|d| d.join("dqpilot").join("config.toml"))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

        if path.exists() {
            Ok(path)
        } else {
            Err(Error::Config(format!("Config file not found: {:?}", path)))
        }
    }
}

/// Load TOML configuration from an explicit path
pub fn load_toml_config(path: &PathBuf) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read config failed ({}): {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse config failed ({}): {}", path.display(), e)))
}

/// Load TOML configuration from the default path, or defaults when absent
pub fn load_default_config() -> TomlConfig {
    match default_config_path() {
        Ok(path) => load_toml_config(&path).unwrap_or_else(|e| {
            warn!("Config file unreadable, using defaults: {}", e);
            TomlConfig::default()
        }),
        Err(_) => TomlConfig::default(),
    }
}

/// Resolve backend base URL following the priority order
pub fn resolve_backend_url(cli_arg: Option<&str>, config: &TomlConfig) -> String {
    // Priority 1: Command-line argument
    if let Some(url) = cli_arg {
        return url.trim_end_matches('/').to_string();
    }

    // Priority 2: Environment variable
    if let Ok(url) = std::env::var(BACKEND_URL_ENV) {
        if !url.trim().is_empty() {
            return url.trim_end_matches('/').to_string();
        }
    }

    // Priority 3: TOML config file
    if let Some(url) = &config.backend_url {
        if !url.trim().is_empty() {
            return url.trim_end_matches('/').to_string();
        }
    }

    // Priority 4: Compiled default
    DEFAULT_BACKEND_URL.to_string()
}

/// Resolve auth token following the priority order; None when unconfigured
pub fn resolve_auth_token(cli_arg: Option<&str>, config: &TomlConfig) -> Option<String> {
    let mut sources = Vec::new();

    if cli_arg.map(|t| !t.trim().is_empty()).unwrap_or(false) {
        sources.push("command line");
    }
    let env_token = std::env::var(AUTH_TOKEN_ENV).ok().filter(|t| !t.trim().is_empty());
    if env_token.is_some() {
        sources.push("environment");
    }
    let toml_token = config.auth_token.clone().filter(|t| !t.trim().is_empty());
    if toml_token.is_some() {
        sources.push("TOML");
    }

    // Warn if multiple sources (potential misconfiguration)
    if sources.len() > 1 {
        warn!(
            "Auth token found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    cli_arg
        .map(|t| t.to_string())
        .filter(|t| !t.trim().is_empty())
        .or(env_token)
        .or(toml_token)
}
