use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use validator::Validate;

/// Connect timeout used when neither the backend nor the global config sets one
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    #[validate(nested)]
    pub servers: Vec<BackendConfig>,
    /// Tools whose qualified name matches are omitted from listings
    #[serde(default, alias = "excludePatterns")]
    pub exclude_patterns: Vec<String>,
    /// Tools whose qualified name matches always show their original description
    #[serde(default, alias = "noCompressPatterns")]
    pub no_compress_patterns: Vec<String>,
    /// Global connect timeout in seconds
    #[serde(default, alias = "timeout", alias = "defaultTimeout")]
    #[validate(range(min = 1))]
    pub default_timeout_secs: Option<u64>,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    #[validate(nested)]
    pub sessions: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Backends that should be connected at startup
    pub fn enabled_servers(&self) -> Vec<BackendConfig> {
        self.servers
            .iter()
            .filter(|s| s.is_enabled())
            .cloned()
            .collect()
    }
}

/// Listen address for the HTTP front
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// How a backend is reached
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransportType {
    /// Child process speaking newline-delimited JSON-RPC
    #[default]
    Stdio,
    /// JSON-RPC over HTTP POST
    Http,
}

impl std::str::FromStr for TransportType {
    type Err = crate::utils::errors::McpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stdio" => Ok(TransportType::Stdio),
            "http" | "streamable-http" | "streamable_http" => Ok(TransportType::Http),
            _ => Err(crate::utils::errors::McpError::ConfigError(format!(
                "Unknown transport type: {}",
                s
            ))),
        }
    }
}

/// One configured backend tool server
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate, Default)]
#[serde(default)]
pub struct BackendConfig {
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(alias = "type")]
    pub transport: TransportType,
    /// Command to run for stdio backends
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    /// Endpoint for http backends
    pub url: Option<String>,
    pub enabled: Option<bool>,
    pub disabled: Option<bool>,
    /// Connect timeout override in seconds
    #[validate(range(min = 1))]
    pub timeout: Option<u64>,
}

impl BackendConfig {
    /// Convenience constructor for a stdio backend
    pub fn stdio(name: impl Into<String>, command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args,
            ..Default::default()
        }
    }

    /// Convenience constructor for an http backend
    pub fn http(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transport: TransportType::Http,
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// `disabled = true` always wins; otherwise `enabled` defaults to true
    pub fn is_enabled(&self) -> bool {
        if self.disabled == Some(true) {
            return false;
        }
        self.enabled.unwrap_or(true)
    }

    /// Per-backend timeout, then the global default, then 30 seconds
    pub fn effective_timeout(&self, default_secs: Option<u64>) -> Duration {
        let secs = self
            .timeout
            .or(default_secs)
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }
}

/// What to show when no compressed description exists
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DescriptionFallback {
    /// Show the backend's live description
    #[default]
    Original,
    /// Show an empty description
    Blank,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CacheConfig {
    /// Snapshot file for compressed descriptions
    pub path: String,
    pub fallback: DescriptionFallback,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: "~/.cache/mcp-compress-proxy/compressions.json".to_string(),
            fallback: DescriptionFallback::Original,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(default)]
pub struct SessionConfig {
    #[validate(range(min = 1))]
    pub inactivity_timeout_secs: u64,
    #[validate(range(min = 1))]
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout_secs: 30 * 60,
            sweep_interval_secs: 5 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_disabled_always_wins() {
        let mut config = BackendConfig::stdio("a", "echo", vec![]);
        assert!(config.is_enabled());

        config.enabled = Some(true);
        config.disabled = Some(true);
        assert!(!config.is_enabled());

        config.disabled = Some(false);
        config.enabled = Some(false);
        assert!(!config.is_enabled());
    }

    #[test]
    fn test_effective_timeout_fallbacks() {
        let mut config = BackendConfig::stdio("a", "echo", vec![]);
        assert_eq!(config.effective_timeout(None), Duration::from_secs(30));
        assert_eq!(config.effective_timeout(Some(10)), Duration::from_secs(10));

        config.timeout = Some(2);
        assert_eq!(config.effective_timeout(Some(10)), Duration::from_secs(2));
    }

    #[test]
    fn test_transport_type_from_str() {
        assert_eq!(TransportType::from_str("stdio").unwrap(), TransportType::Stdio);
        assert_eq!(TransportType::from_str("HTTP").unwrap(), TransportType::Http);
        assert!(TransportType::from_str("carrier-pigeon").is_err());
    }

    #[test]
    fn test_enabled_servers_filters() {
        let mut off = BackendConfig::stdio("off", "echo", vec![]);
        off.disabled = Some(true);
        let config = Config {
            servers: vec![BackendConfig::stdio("on", "echo", vec![]), off],
            ..Default::default()
        };

        let enabled = config.enabled_servers();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].name, "on");
    }
}
