//! Command implementations behind the CLI

use crate::cache::{CompressionCache, FileCachePersistence};
use crate::cli::expand_path;
use crate::config::{Config, ConfigManager, ConfigValidator};
use crate::core::{CompressionEntry, ConnectionManager, SessionStore, SessionStoreConfig, ToolAggregator};
use crate::http_server::HttpServer;
use crate::utils::errors::{McpError, McpResult};
use crate::utils::ShutdownCoordinator;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

/// Build the compression cache for `config` with its on-disk snapshot loaded
pub async fn open_cache(config: &Config) -> Arc<CompressionCache> {
    let path = expand_path(&config.cache.path);
    let persistence = Arc::new(FileCachePersistence::new(path));
    let cache = CompressionCache::new(&config.no_compress_patterns, config.cache.fallback)
        .with_persistence(persistence);
    cache.load_from_disk().await;
    Arc::new(cache)
}

/// Wire cache, backends and sessions into an aggregator
pub async fn build_aggregator(config: &Config) -> Arc<ToolAggregator> {
    let cache = open_cache(config).await;

    let connections = Arc::new(ConnectionManager::new());
    connections
        .initialize(&config.servers, config.default_timeout_secs)
        .await;

    let sessions = Arc::new(SessionStore::with_config(SessionStoreConfig::from(
        &config.sessions,
    )));

    Arc::new(ToolAggregator::new(
        connections,
        cache,
        sessions,
        &config.exclude_patterns,
    ))
}

fn print_json<T: Serialize>(value: &T) -> McpResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run the HTTP front until SIGINT/SIGTERM, then tear down
pub async fn serve(mut config: Config, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let aggregator = build_aggregator(&config).await;
    if !aggregator.connections().has_connected_servers() {
        info!("No backends connected, serving built-in tools only");
    }

    let coordinator = ShutdownCoordinator::new();
    let mut shutdown_rx = coordinator.subscribe();
    let signals = coordinator.clone();
    tokio::spawn(async move {
        signals.wait_for_shutdown_signal().await;
    });

    let server = HttpServer::new(config.server.clone(), aggregator.clone());
    let result = server
        .run(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await;

    aggregator.shutdown().await;
    if let Err(e) = aggregator.cache().save_to_disk().await {
        error!("Failed to flush compression cache: {}", e);
    }

    result
}

pub async fn status(config: &Config) -> McpResult<()> {
    let aggregator = build_aggregator(config).await;
    let result = print_json(&aggregator.stats());
    aggregator.shutdown().await;
    result
}

pub async fn pending(config: &Config) -> McpResult<()> {
    let aggregator = build_aggregator(config).await;
    let pending = aggregator.pending_compressions().await;
    info!("{} tools pending compression", pending.len());
    let result = print_json(&pending);
    aggregator.shutdown().await;
    result
}

/// Merge a file of compressed descriptions into the cache
pub async fn import(config: &Config, file: &str) -> McpResult<usize> {
    let path = expand_path(file);
    let content = tokio::fs::read_to_string(&path).await?;
    let entries: Vec<CompressionEntry> = serde_json::from_str(&content)
        .map_err(|e| McpError::InvalidRequest(format!("Invalid compression file {}: {}", path, e)))?;

    let cache = open_cache(config).await;
    let count = entries.len();
    for entry in entries {
        cache.save_compressed(
            &entry.server_name,
            &entry.tool_name,
            entry.compressed_description,
            entry.original_description,
        );
    }
    cache.save_to_disk().await?;

    println!("Imported {} compressions", count);
    Ok(count)
}

pub async fn cache_stats(config: &Config) -> McpResult<()> {
    let cache = open_cache(config).await;
    let metrics = cache.get_cache_metrics();
    print_json(&metrics)?;
    println!("Savings: {:.1}%", metrics.savings_percent());
    Ok(())
}

pub async fn cache_clear(config: &Config) -> McpResult<()> {
    let cache = open_cache(config).await;
    cache.clear_all().await?;
    println!("Compression cache cleared");
    Ok(())
}

/// Load and validate the config file, reporting the result
pub async fn validate(config_path: &str) -> McpResult<()> {
    let manager = ConfigManager::load(config_path).await?;
    let config = manager.get_config();
    println!(
        "✓ {} is valid ({:?}, {} servers, {} enabled)",
        manager.path().display(),
        manager.format(),
        config.servers.len(),
        config.enabled_servers().len()
    );
    Ok(())
}

pub fn print_schema() {
    println!("{}", ConfigValidator::new().export_schema());
}
