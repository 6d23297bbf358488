use crate::config::validation::ConfigValidator;
use crate::config::{BackendConfig, Config, TransportType};
use crate::utils::errors::{McpError, McpResult};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Supported config file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// Detect format from file extension, falling back to content sniffing
    pub fn detect(path: &Path, content: &str) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => ConfigFormat::Json,
            Some("yml") | Some("yaml") => ConfigFormat::Yaml,
            Some("toml") => ConfigFormat::Toml,
            _ => {
                let trimmed = content.trim_start();
                if trimmed.starts_with('{') {
                    ConfigFormat::Json
                } else if trimmed.starts_with('[') {
                    ConfigFormat::Toml
                } else {
                    ConfigFormat::Yaml
                }
            }
        }
    }
}

/// The `mcpServers` map layout used by most MCP clients
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct McpServersFile {
    mcp_servers: BTreeMap<String, McpServersEntry>,
    #[serde(flatten)]
    rest: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct McpServersEntry {
    command: Option<String>,
    args: Vec<String>,
    env: HashMap<String, String>,
    url: Option<String>,
    enabled: Option<bool>,
    disabled: Option<bool>,
    timeout: Option<u64>,
}

impl McpServersEntry {
    fn into_backend(self, name: String) -> BackendConfig {
        let transport = if self.command.is_none() && self.url.is_some() {
            TransportType::Http
        } else {
            TransportType::Stdio
        };
        BackendConfig {
            name,
            transport,
            command: self.command.unwrap_or_default(),
            args: self.args,
            env: self.env,
            url: self.url,
            enabled: self.enabled,
            disabled: self.disabled,
            timeout: self.timeout,
        }
    }
}

/// Loads and validates the proxy configuration file
pub struct ConfigManager {
    path: PathBuf,
    format: ConfigFormat,
    config: Config,
}

impl ConfigManager {
    /// Load a configuration file. Parse and validation failures are fatal.
    pub async fn load(path: impl AsRef<str>) -> McpResult<Self> {
        let path = PathBuf::from(shellexpand::tilde(path.as_ref()).to_string());
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            McpError::ConfigError(format!("Failed to read config {}: {}", path.display(), e))
        })?;

        let format = ConfigFormat::detect(&path, &content);
        debug!("Detected config format: {:?}", format);

        let config = Self::parse_content(&content, format)?;
        Self::check(&config)?;

        info!(
            "Loaded config from {} ({} servers)",
            path.display(),
            config.servers.len()
        );

        Ok(Self {
            path,
            format,
            config,
        })
    }

    /// Parse configuration text in the given format
    pub fn parse_content(content: &str, format: ConfigFormat) -> McpResult<Config> {
        match format {
            ConfigFormat::Json => {
                if content.contains("\"mcpServers\"") {
                    let file: McpServersFile = serde_json::from_str(content).map_err(|e| {
                        McpError::ConfigError(format!("Failed to parse mcpServers config: {}", e))
                    })?;
                    Self::convert_mcp_servers(file)
                } else {
                    serde_json::from_str(content)
                        .map_err(|e| McpError::ConfigError(format!("Failed to parse JSON config: {}", e)))
                }
            }
            ConfigFormat::Yaml => serde_yaml::from_str(content)
                .map_err(|e| McpError::ConfigError(format!("Failed to parse YAML config: {}", e))),
            ConfigFormat::Toml => toml::from_str(content)
                .map_err(|e| McpError::ConfigError(format!("Failed to parse TOML config: {}", e))),
        }
    }

    fn convert_mcp_servers(file: McpServersFile) -> McpResult<Config> {
        let mut config: Config = serde_json::from_value(serde_json::Value::Object(file.rest))
            .map_err(|e| McpError::ConfigError(format!("Failed to parse config: {}", e)))?;

        config.servers.extend(
            file.mcp_servers
                .into_iter()
                .map(|(name, entry)| entry.into_backend(name)),
        );
        Ok(config)
    }

    fn check(config: &Config) -> McpResult<()> {
        ConfigValidator::new().validate(config).map_err(|errors| {
            let joined = errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            McpError::ConfigError(format!("Invalid configuration: {}", joined))
        })
    }

    pub fn get_config(&self) -> Config {
        self.config.clone()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> ConfigFormat {
        self.format
    }
}
