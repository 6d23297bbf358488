pub mod compression_cache;
pub mod persistence;

pub use compression_cache::{
    BackendCacheMetrics, CacheMetrics, CompressionCache, CompressionRecord,
};
pub use persistence::{CachePersistence, CacheSnapshot, FileCachePersistence, CACHE_FORMAT_VERSION};
