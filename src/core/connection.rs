//! Backend connection manager
//!
//! Brings every enabled backend up concurrently, each racing its own
//! deadline, and records the outcome per backend. A backend that fails or
//! times out stays failed for the life of the manager.

use crate::config::{BackendConfig, TransportType};
use crate::core::client::McpClient;
use crate::core::protocol::{CallToolResult, ToolDefinition};
use crate::transport::{HttpTransport, StdioTransport, Transport};
use crate::utils::errors::{McpError, McpResult};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// A live, initialized backend
#[async_trait]
pub trait BackendClient: Send + Sync {
    async fn list_tools(&self) -> McpResult<Vec<ToolDefinition>>;

    /// Forward a call; `arguments` is passed through untouched
    async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<CallToolResult>;

    async fn close(&self) -> McpResult<()>;
}

/// Establishes backend connections.
///
/// `cancel` fires if the attempt outlives its deadline; the attempt future
/// is also dropped at that point, so implementations must release anything
/// they started when either happens.
#[async_trait]
pub trait BackendConnector: Send + Sync {
    async fn connect(
        &self,
        config: &BackendConfig,
        cancel: CancellationToken,
    ) -> McpResult<Arc<dyn BackendClient>>;
}

/// Production connector: stdio or HTTP transport plus the MCP handshake
#[derive(Debug, Clone, Default)]
pub struct TransportConnector;

#[async_trait]
impl BackendConnector for TransportConnector {
    async fn connect(
        &self,
        config: &BackendConfig,
        cancel: CancellationToken,
    ) -> McpResult<Arc<dyn BackendClient>> {
        let handshake = async {
            let transport: Box<dyn Transport> = match config.transport {
                TransportType::Stdio => Box::new(StdioTransport::spawn(config).await?),
                TransportType::Http => {
                    let url = config.url.as_deref().ok_or_else(|| {
                        McpError::ConfigError(format!("HTTP server '{}' has no url", config.name))
                    })?;
                    Box::new(HttpTransport::new(url)?)
                }
            };
            let client = McpClient::initialize(config.name.clone(), transport).await?;
            Ok::<Arc<dyn BackendClient>, McpError>(Arc::new(client))
        };

        tokio::select! {
            _ = cancel.cancelled() => Err(McpError::TransportError(format!(
                "Connection to '{}' cancelled",
                config.name
            ))),
            result = handshake => result,
        }
    }
}

/// Per-backend state
#[derive(Clone)]
pub struct BackendConnection {
    pub name: String,
    pub connected: bool,
    pub last_error: Option<String>,
    client: Option<Arc<dyn BackendClient>>,
}

/// Health snapshot for one configured backend
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    pub name: String,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// A connected backend handle
#[derive(Clone)]
pub struct ConnectedClient {
    pub name: String,
    pub client: Arc<dyn BackendClient>,
}

/// Owns every backend connection, keyed by backend name
pub struct ConnectionManager {
    connector: Arc<dyn BackendConnector>,
    connections: DashMap<String, BackendConnection>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::with_connector(Arc::new(TransportConnector))
    }

    pub fn with_connector(connector: Arc<dyn BackendConnector>) -> Self {
        Self {
            connector,
            connections: DashMap::new(),
        }
    }

    /// Connect every enabled backend concurrently. Returns once every
    /// attempt has succeeded, failed or timed out.
    pub async fn initialize(&self, configs: &[BackendConfig], default_timeout_secs: Option<u64>) {
        let mut seen = HashSet::new();
        let configs: Vec<&BackendConfig> = configs
            .iter()
            .filter(|c| c.is_enabled())
            .filter(|c| {
                let first = seen.insert(c.name.as_str());
                if !first {
                    warn!("Ignoring duplicate backend '{}'", c.name);
                }
                first
            })
            .collect();

        info!("Connecting to {} backends", configs.len());

        let attempts = configs.into_iter().map(|config| {
            let timeout = config.effective_timeout(default_timeout_secs);
            self.attempt(config, timeout)
        });
        let outcomes = join_all(attempts).await;

        for (name, outcome) in outcomes {
            if let Some((_, previous)) = self.connections.remove(&name) {
                if let Some(client) = previous.client {
                    if let Err(e) = client.close().await {
                        warn!("Failed to close previous connection to {}: {}", name, e);
                    }
                }
            }

            let connection = match outcome {
                Ok(client) => BackendConnection {
                    name: name.clone(),
                    connected: true,
                    last_error: None,
                    client: Some(client),
                },
                Err(message) => BackendConnection {
                    name: name.clone(),
                    connected: false,
                    last_error: Some(message),
                    client: None,
                },
            };
            self.connections.insert(name, connection);
        }

        let connected = self.connections.iter().filter(|c| c.connected).count();
        info!(
            "Connected to {}/{} backends",
            connected,
            self.connections.len()
        );
    }

    async fn attempt(
        &self,
        config: &BackendConfig,
        timeout: Duration,
    ) -> (String, Result<Arc<dyn BackendClient>, String>) {
        let cancel = CancellationToken::new();
        let connect = self.connector.connect(config, cancel.clone());

        let outcome = match tokio::time::timeout(timeout, connect).await {
            Ok(Ok(client)) => {
                info!("Connected to backend {}", config.name);
                Ok(client)
            }
            Ok(Err(e)) => {
                warn!("Failed to connect to backend {}: {}", config.name, e);
                Err(e.to_string())
            }
            Err(_) => {
                cancel.cancel();
                warn!(
                    "Connection to backend {} timed out after {}s",
                    config.name,
                    timeout.as_secs_f64()
                );
                Err(format!(
                    "Connection timeout after {}s",
                    timeout.as_secs_f64()
                ))
            }
        };

        (config.name.clone(), outcome)
    }

    /// Handle for a connected backend
    pub fn get_client(&self, name: &str) -> Option<Arc<dyn BackendClient>> {
        self.connections
            .get(name)
            .filter(|c| c.connected)
            .and_then(|c| c.client.clone())
    }

    /// Every connected backend, ordered by name
    pub fn get_connected_clients(&self) -> Vec<ConnectedClient> {
        let mut clients: Vec<ConnectedClient> = self
            .connections
            .iter()
            .filter(|c| c.connected)
            .filter_map(|c| {
                c.client.clone().map(|client| ConnectedClient {
                    name: c.name.clone(),
                    client,
                })
            })
            .collect();
        clients.sort_by(|a, b| a.name.cmp(&b.name));
        clients
    }

    /// Status of every attempted backend, ordered by name
    pub fn get_server_statuses(&self) -> Vec<ServerStatus> {
        let mut statuses: Vec<ServerStatus> = self
            .connections
            .iter()
            .map(|c| ServerStatus {
                name: c.name.clone(),
                connected: c.connected,
                last_error: c.last_error.clone(),
            })
            .collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }

    pub fn has_connected_servers(&self) -> bool {
        self.connections.iter().any(|c| c.connected)
    }

    /// Close every live handle. One failure does not stop the others.
    pub async fn disconnect_all(&self) {
        let clients: Vec<(String, Arc<dyn BackendClient>)> = self
            .connections
            .iter_mut()
            .filter_map(|mut c| {
                c.connected = false;
                c.client.take().map(|client| (c.name.clone(), client))
            })
            .collect();

        for (name, client) in clients {
            match client.close().await {
                Ok(()) => info!("Disconnected from backend {}", name),
                Err(e) => error!("Failed to disconnect from backend {}: {}", name, e),
            }
        }
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
