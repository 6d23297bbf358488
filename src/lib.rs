//! mcp-compress-proxy: MCP tool aggregator with compressed descriptions

pub mod cache;
pub mod cli;
pub mod config;
pub mod core;
pub mod http_server;
pub mod transport;
pub mod utils;

pub use config::Config;
