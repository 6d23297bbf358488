//! Configuration loading and validation tests

use mcp_compress_proxy::config::{
    BackendConfig, Config, ConfigFormat, ConfigManager, ConfigValidator, DescriptionFallback,
    LogFormat, TransportType,
};
use mcp_compress_proxy::utils::errors::McpError;
use std::time::Duration;
use tempfile::TempDir;

async fn write(dir: &TempDir, name: &str, content: &str) -> String {
    let path = dir.path().join(name);
    tokio::fs::write(&path, content).await.unwrap();
    path.to_str().unwrap().to_string()
}

#[tokio::test]
async fn test_load_yaml() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "config.yaml",
        r#"
servers:
  - name: fs
    command: npx
    args: ["-y", "@modelcontextprotocol/server-filesystem"]
  - name: remote
    transport: http
    url: http://localhost:9000/mcp
    timeout: 5
exclude_patterns: ["*__delete_*"]
cache:
  path: /tmp/compressions.json
  fallback: blank
logging:
  level: debug
  format: json
"#,
    )
    .await;

    let manager = ConfigManager::load(&path).await.unwrap();
    assert_eq!(manager.format(), ConfigFormat::Yaml);

    let config = manager.get_config();
    assert_eq!(config.servers.len(), 2);
    assert_eq!(config.servers[1].transport, TransportType::Http);
    assert_eq!(config.cache.fallback, DescriptionFallback::Blank);
    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(config.sessions.inactivity_timeout_secs, 1800);
    assert_eq!(config.cache.path, "/tmp/compressions.json");
}

#[tokio::test]
async fn test_load_toml() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "config.toml",
        r#"
default_timeout_secs = 10
no_compress_patterns = ["docs__*"]

[server]
host = "0.0.0.0"
port = 8080

[[servers]]
name = "git"
command = "mcp-git"
"#,
    )
    .await;

    let config = ConfigManager::load(&path).await.unwrap().get_config();
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.default_timeout_secs, Some(10));
    assert_eq!(
        config.servers[0].effective_timeout(config.default_timeout_secs),
        Duration::from_secs(10)
    );
}

#[tokio::test]
async fn test_load_mcp_servers_json() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "mcp.json",
        r#"{
  "mcpServers": {
    "github": { "command": "gh-mcp", "env": { "TOKEN": "x" } },
    "remote": { "url": "https://example.com/mcp", "disabled": true }
  },
  "excludePatterns": ["github__delete_*"],
  "timeout": 20
}"#,
    )
    .await;

    let config = ConfigManager::load(&path).await.unwrap().get_config();
    assert_eq!(config.servers.len(), 2);
    assert_eq!(config.exclude_patterns, vec!["github__delete_*".to_string()]);
    assert_eq!(config.default_timeout_secs, Some(20));

    let remote = config.servers.iter().find(|s| s.name == "remote").unwrap();
    assert_eq!(remote.transport, TransportType::Http);
    assert!(!remote.is_enabled());

    let enabled: Vec<String> = config.enabled_servers().into_iter().map(|s| s.name).collect();
    assert_eq!(enabled, vec!["github".to_string()]);
}

#[tokio::test]
async fn test_invalid_config_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "config.json",
        r#"{"servers": [{"name": "a", "command": "x"}, {"name": "a", "command": "y"}]}"#,
    )
    .await;

    let err = ConfigManager::load(&path).await.err().unwrap();
    assert!(matches!(err, McpError::ConfigError(_)));
    assert!(err.to_string().contains("Duplicate server name"));
}

#[tokio::test]
async fn test_unparseable_config_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "config.json", "{ nope").await;
    assert!(matches!(
        ConfigManager::load(&path).await,
        Err(McpError::ConfigError(_))
    ));
}

#[tokio::test]
async fn test_missing_file_is_fatal() {
    assert!(matches!(
        ConfigManager::load("/nonexistent/mcp-compress-proxy.json").await,
        Err(McpError::ConfigError(_))
    ));
}

#[test]
fn test_validator_reports_every_problem() {
    let mut config = Config::default();
    config.servers = vec![
        BackendConfig::stdio("", "x", vec![]),
        BackendConfig::stdio("no-command", "", vec![]),
        BackendConfig::http("bad-url", "not a url"),
    ];
    config.exclude_patterns = vec!["  ".to_string()];
    config.sessions.sweep_interval_secs = 0;

    let errors = ConfigValidator::new().validate(&config).unwrap_err();
    let paths: Vec<&str> = errors.iter().map(|e| e.path.as_str()).collect();

    assert!(paths.contains(&"servers[0].name"));
    assert!(paths.contains(&"servers[1].command"));
    assert!(paths.contains(&"servers[2].url"));
    assert!(paths.contains(&"exclude_patterns[0]"));
    assert!(paths.contains(&"sessions"));
}

#[test]
fn test_validator_accepts_default() {
    assert!(ConfigValidator::new().validate(&Config::default()).is_ok());
}

#[test]
fn test_schema_export() {
    let schema = ConfigValidator::new().export_schema();
    assert!(schema.contains("no_compress_patterns"));
    assert!(schema.contains("servers"));
}
