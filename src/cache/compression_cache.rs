//! In-memory authority for compressed tool descriptions
//!
//! Records are keyed by `(backend, tool)` and always replaced whole. The
//! cache also decides which description a listing should show, in this
//! order: bypass pattern, session expansion, compressed text, fallback.

use crate::cache::persistence::{CachePersistence, CacheSnapshot};
use crate::config::DescriptionFallback;
use crate::core::pattern::{qualified_name, PatternSet};
use crate::utils::errors::McpResult;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

/// One cached description pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionRecord {
    pub server_name: String,
    pub tool_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_description: Option<String>,
    pub compressed_description: String,
    pub compressed_at: DateTime<Utc>,
}

impl CompressionRecord {
    /// Empty compressed text does not count as compressed
    pub fn is_compressed(&self) -> bool {
        !self.compressed_description.is_empty()
    }
}

/// Per-backend slice of the cache metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendCacheMetrics {
    pub records: usize,
    pub original_chars: usize,
    pub compressed_chars: usize,
    pub missing_original: usize,
    pub last_compressed_at: Option<DateTime<Utc>>,
}

impl BackendCacheMetrics {
    fn add(&mut self, record: &CompressionRecord) {
        self.records += 1;
        self.compressed_chars += record.compressed_description.chars().count();
        match &record.original_description {
            Some(original) => self.original_chars += original.chars().count(),
            None => self.missing_original += 1,
        }
        if self.last_compressed_at.map_or(true, |t| record.compressed_at > t) {
            self.last_compressed_at = Some(record.compressed_at);
        }
    }
}

/// Aggregate view of the cache
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetrics {
    pub total_records: usize,
    pub total_original_chars: usize,
    pub total_compressed_chars: usize,
    pub missing_original: usize,
    pub last_compressed_at: Option<DateTime<Utc>>,
    pub by_backend: BTreeMap<String, BackendCacheMetrics>,
    /// Size of the cache serialized as a snapshot
    pub serialized_bytes: usize,
}

impl CacheMetrics {
    /// Characters saved relative to the originals, as a percentage
    pub fn savings_percent(&self) -> f64 {
        if self.total_original_chars == 0 {
            0.0
        } else {
            let saved = self.total_original_chars as f64 - self.total_compressed_chars as f64;
            saved / self.total_original_chars as f64 * 100.0
        }
    }
}

/// Cache of compressed descriptions plus the description resolver
pub struct CompressionCache {
    records: RwLock<HashMap<(String, String), CompressionRecord>>,
    bypass: PatternSet,
    fallback: DescriptionFallback,
    persistence: Option<Arc<dyn CachePersistence>>,
}

impl CompressionCache {
    /// Create an in-memory cache with the given bypass patterns
    pub fn new<S: AsRef<str>>(no_compress_patterns: &[S], fallback: DescriptionFallback) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            bypass: PatternSet::new(no_compress_patterns),
            fallback,
            persistence: None,
        }
    }

    /// Attach a persistence adapter for `load_from_disk`/`save_to_disk`
    pub fn with_persistence(mut self, persistence: Arc<dyn CachePersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    fn key(backend: &str, tool: &str) -> (String, String) {
        (backend.to_string(), tool.to_string())
    }

    /// Store a compressed description, replacing any existing record
    pub fn save_compressed(
        &self,
        backend: &str,
        tool: &str,
        compressed: impl Into<String>,
        original: Option<String>,
    ) {
        let record = CompressionRecord {
            server_name: backend.to_string(),
            tool_name: tool.to_string(),
            original_description: original,
            compressed_description: compressed.into(),
            compressed_at: Utc::now(),
        };
        debug!("Saved compression for {}:{}", backend, tool);
        self.records.write().insert(Self::key(backend, tool), record);
    }

    /// True only when a record exists with non-empty compressed text
    pub fn has_compressed(&self, backend: &str, tool: &str) -> bool {
        self.records
            .read()
            .get(&Self::key(backend, tool))
            .map_or(false, CompressionRecord::is_compressed)
    }

    pub fn get_record(&self, backend: &str, tool: &str) -> Option<CompressionRecord> {
        self.records.read().get(&Self::key(backend, tool)).cloned()
    }

    pub fn get_original_description(&self, backend: &str, tool: &str) -> Option<String> {
        self.records
            .read()
            .get(&Self::key(backend, tool))
            .and_then(|r| r.original_description.clone())
    }

    pub fn get_compressed_description(&self, backend: &str, tool: &str) -> Option<String> {
        self.records
            .read()
            .get(&Self::key(backend, tool))
            .map(|r| r.compressed_description.clone())
    }

    /// Whether the tool matches the no-compress patterns
    pub fn is_bypassed(&self, backend: &str, tool: &str) -> bool {
        self.bypass.matches(&qualified_name(backend, tool))
    }

    /// Resolve the description a listing should show for one tool
    pub fn get_description(
        &self,
        backend: &str,
        tool: &str,
        live_original: Option<&str>,
        expanded_in_session: bool,
    ) -> Option<String> {
        if self.is_bypassed(backend, tool) {
            return live_original.map(str::to_string);
        }

        let records = self.records.read();
        let record = records.get(&Self::key(backend, tool));

        if expanded_in_session {
            return record
                .and_then(|r| r.original_description.clone())
                .or_else(|| live_original.map(str::to_string));
        }

        if let Some(record) = record.filter(|r| r.is_compressed()) {
            return Some(record.compressed_description.clone());
        }

        match self.fallback {
            DescriptionFallback::Original => live_original.map(str::to_string),
            DescriptionFallback::Blank => Some(String::new()),
        }
    }

    /// All records in `(backend, tool)` order
    pub fn records(&self) -> Vec<CompressionRecord> {
        let mut records: Vec<_> = self.records.read().values().cloned().collect();
        records.sort_by(|a, b| {
            (a.server_name.as_str(), a.tool_name.as_str())
                .cmp(&(b.server_name.as_str(), b.tool_name.as_str()))
        });
        records
    }

    /// Derived metrics, overall and per backend
    pub fn get_cache_metrics(&self) -> CacheMetrics {
        let records = self.records.read();
        let mut metrics = CacheMetrics::default();

        for record in records.values() {
            metrics
                .by_backend
                .entry(record.server_name.clone())
                .or_default()
                .add(record);
        }

        for backend in metrics.by_backend.values() {
            metrics.total_records += backend.records;
            metrics.total_original_chars += backend.original_chars;
            metrics.total_compressed_chars += backend.compressed_chars;
            metrics.missing_original += backend.missing_original;
            if backend.last_compressed_at > metrics.last_compressed_at {
                metrics.last_compressed_at = backend.last_compressed_at;
            }
        }

        metrics.serialized_bytes = serde_json::to_vec(&CacheSnapshot::from_records(records.values()))
            .map(|bytes| bytes.len())
            .unwrap_or(0);

        metrics
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Drop every in-memory record
    pub fn clear(&self) {
        self.records.write().clear();
    }

    /// Drop every record and delete the persisted snapshot
    pub async fn clear_all(&self) -> McpResult<()> {
        self.clear();
        if let Some(persistence) = &self.persistence {
            persistence.clear().await?;
        }
        info!("Compression cache cleared");
        Ok(())
    }

    /// Merge the persisted snapshot into memory. Returns the number of
    /// records imported; read problems yield zero.
    pub async fn load_from_disk(&self) -> usize {
        let Some(persistence) = &self.persistence else {
            return 0;
        };

        let loaded = persistence.load().await;
        let count = loaded.len();
        {
            let mut records = self.records.write();
            for record in loaded {
                records.insert(
                    Self::key(&record.server_name, &record.tool_name),
                    record,
                );
            }
        }

        info!("Loaded {} compressions from disk", count);
        count
    }

    /// Write the current records through the persistence adapter
    pub async fn save_to_disk(&self) -> McpResult<()> {
        let Some(persistence) = &self.persistence else {
            debug!("No cache persistence configured, skipping save");
            return Ok(());
        };

        let records = self.records();
        persistence.save(&records).await
    }
}
