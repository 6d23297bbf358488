//! CLI command implementations

pub mod args;
pub mod commands;

use std::path::PathBuf;

/// Get the default config path
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|p| p.join("mcp-compress-proxy/config.json"))
        .unwrap_or_else(|| PathBuf::from("~/.config/mcp-compress-proxy/config.json"))
}

/// Expand tilde in path
pub fn expand_path(path: &str) -> String {
    shellexpand::tilde(path).to_string()
}
