//! On-disk snapshot of compressed descriptions
//!
//! The snapshot is a single JSON document:
//! `{ version, lastUpdated, compressions: [CompressionRecord...] }`.
//! A version mismatch discards the whole file.

use crate::cache::compression_cache::CompressionRecord;
use crate::utils::errors::{McpError, McpResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Snapshot format version written and accepted by this build
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// Serialized form of the whole cache
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSnapshot {
    pub version: u32,
    pub last_updated: DateTime<Utc>,
    pub compressions: Vec<CompressionRecord>,
}

impl CacheSnapshot {
    /// Build a snapshot with records in stable `(server, tool)` order
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a CompressionRecord>) -> Self {
        let mut compressions: Vec<CompressionRecord> = records.into_iter().cloned().collect();
        compressions.sort_by(|a, b| {
            (a.server_name.as_str(), a.tool_name.as_str())
                .cmp(&(b.server_name.as_str(), b.tool_name.as_str()))
        });
        Self {
            version: CACHE_FORMAT_VERSION,
            last_updated: Utc::now(),
            compressions,
        }
    }
}

/// Storage backend for the compression cache
#[async_trait]
pub trait CachePersistence: Send + Sync {
    /// Read every stored record.
    /// Never fails: any read problem yields no records.
    async fn load(&self) -> Vec<CompressionRecord>;

    /// Replace the stored snapshot with `records`
    async fn save(&self, records: &[CompressionRecord]) -> McpResult<()>;

    /// Delete the stored snapshot. Succeeds when there is nothing to delete.
    async fn clear(&self) -> McpResult<()>;
}

/// JSON file persistence
#[derive(Debug, Clone)]
pub struct FileCachePersistence {
    path: PathBuf,
}

impl FileCachePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse(content: &str) -> Result<Option<CacheSnapshot>, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        let version = value.get("version").and_then(|v| v.as_u64());
        if version != Some(u64::from(CACHE_FORMAT_VERSION)) {
            return Ok(None);
        }
        serde_json::from_value(value).map(Some)
    }
}

#[async_trait]
impl CachePersistence for FileCachePersistence {
    async fn load(&self) -> Vec<CompressionRecord> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No cache snapshot at {}", self.path.display());
                return Vec::new();
            }
            Err(e) => {
                warn!("Failed to read cache snapshot {}: {}", self.path.display(), e);
                return Vec::new();
            }
        };

        let snapshot = match Self::parse(&content) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                warn!(
                    "Ignoring cache snapshot {}: expected version {}",
                    self.path.display(),
                    CACHE_FORMAT_VERSION
                );
                return Vec::new();
            }
            Err(e) => {
                warn!("Ignoring unreadable cache snapshot {}: {}", self.path.display(), e);
                return Vec::new();
            }
        };

        snapshot.compressions
    }

    async fn save(&self, records: &[CompressionRecord]) -> McpResult<()> {
        let snapshot = CacheSnapshot::from_records(records);
        let json = serde_json::to_string_pretty(&snapshot)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    McpError::CachePersist(format!(
                        "Failed to create cache dir {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        // Write beside the target, then rename over it
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(|e| {
            McpError::CachePersist(format!("Failed to write {}: {}", tmp.display(), e))
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            McpError::CachePersist(format!("Failed to replace {}: {}", self.path.display(), e))
        })?;

        info!(
            "Saved {} compressions to {}",
            snapshot.compressions.len(),
            self.path.display()
        );
        Ok(())
    }

    async fn clear(&self) -> McpResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!("Removed cache snapshot {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(McpError::CachePersist(format!(
                "Failed to remove {}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(server: &str, tool: &str) -> CompressionRecord {
        CompressionRecord {
            server_name: server.to_string(),
            tool_name: tool.to_string(),
            original_description: Some(format!("The long description of {}", tool)),
            compressed_description: format!("{} short", tool),
            compressed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let persistence = FileCachePersistence::new(dir.path().join("none.json"));
        assert!(persistence.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let persistence = FileCachePersistence::new(dir.path().join("nested/cache.json"));
        let records = vec![record("fs", "write"), record("fs", "read")];

        persistence.save(&records).await.unwrap();
        let loaded = persistence.load().await;

        // Snapshot order is (server, tool)
        assert_eq!(loaded, vec![records[1].clone(), records[0].clone()]);
    }

    #[tokio::test]
    async fn test_version_mismatch_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let content = serde_json::json!({
            "version": CACHE_FORMAT_VERSION + 1,
            "lastUpdated": Utc::now(),
            "compressions": [record("fs", "read")]
        });
        tokio::fs::write(&path, content.to_string()).await.unwrap();

        assert!(FileCachePersistence::new(&path).load().await.is_empty());
    }

    #[tokio::test]
    async fn test_garbage_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        assert!(FileCachePersistence::new(&path).load().await.is_empty());
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let persistence = FileCachePersistence::new(dir.path().join("cache.json"));
        persistence.save(&[record("fs", "read")]).await.unwrap();

        persistence.clear().await.unwrap();
        persistence.clear().await.unwrap();
        assert!(!persistence.path().exists());
    }

    #[tokio::test]
    async fn test_save_failure_propagates() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        tokio::fs::write(&blocker, "x").await.unwrap();
        let persistence = FileCachePersistence::new(blocker.join("cache.json"));

        let result = persistence.save(&[record("fs", "read")]).await;
        assert!(matches!(result, Err(McpError::CachePersist(_))));
    }
}
