pub mod aggregator;
pub mod client;
pub mod connection;
pub mod pattern;
pub mod protocol;
pub mod request_id;
pub mod session;

pub use aggregator::{CompressionEntry, PendingCompression, ProxyStats, ToolAggregator};
pub use client::McpClient;
pub use connection::{
    BackendClient, BackendConnector, ConnectedClient, ConnectionManager, ServerStatus,
    TransportConnector,
};
pub use pattern::{matches, qualified_name, PatternSet};
pub use session::{Session, SessionStore, SessionStoreConfig};
