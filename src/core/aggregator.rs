//! Tool aggregation across backends
//!
//! Merges every connected backend's catalog under qualified
//! `backend__tool` names, resolves each description through the
//! compression cache, and forwards calls to the owning backend.

use crate::cache::{CacheMetrics, CompressionCache};
use crate::core::connection::{ConnectedClient, ConnectionManager, ServerStatus};
use crate::core::pattern::{qualified_name, PatternSet, QUALIFIED_SEPARATOR};
use crate::core::protocol::{CallToolResult, ToolDefinition};
use crate::core::session::SessionStore;
use crate::utils::errors::{McpError, McpResult};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Built-in tool that shows a tool's original description for the session
pub const EXPAND_TOOL: &str = "expand_tool_description";
/// Built-in tool that reverts an expansion
pub const COLLAPSE_TOOL: &str = "collapse_tool_description";

/// A live tool still waiting for a compressed description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingCompression {
    pub server_name: String,
    pub tool_name: String,
    pub original_description: Option<String>,
}

/// Compressed text supplied by an external compressor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionEntry {
    pub server_name: String,
    pub tool_name: String,
    pub compressed_description: String,
    #[serde(default)]
    pub original_description: Option<String>,
}

/// Numbers reported by the stats endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyStats {
    pub servers: Vec<ServerStatus>,
    pub active_sessions: usize,
    pub cache: CacheMetrics,
}

pub struct ToolAggregator {
    connections: Arc<ConnectionManager>,
    cache: Arc<CompressionCache>,
    sessions: Arc<SessionStore>,
    exclude: PatternSet,
}

impl ToolAggregator {
    pub fn new<S: AsRef<str>>(
        connections: Arc<ConnectionManager>,
        cache: Arc<CompressionCache>,
        sessions: Arc<SessionStore>,
        exclude_patterns: &[S],
    ) -> Self {
        Self {
            connections,
            cache,
            sessions,
            exclude: PatternSet::new(exclude_patterns),
        }
    }

    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.connections
    }

    pub fn cache(&self) -> &Arc<CompressionCache> {
        &self.cache
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    fn is_excluded(&self, backend: &str, tool: &str) -> bool {
        self.exclude.matches(&qualified_name(backend, tool))
    }

    /// Fetch every connected backend's catalog concurrently.
    /// A backend whose listing fails contributes nothing.
    async fn live_catalogs(&self) -> Vec<(String, Vec<ToolDefinition>)> {
        let clients = self.connections.get_connected_clients();
        let listings = clients.into_iter().map(|ConnectedClient { name, client }| async move {
            match client.list_tools().await {
                Ok(tools) => (name, tools),
                Err(e) => {
                    warn!("Failed to list tools from {}: {}", name, e);
                    (name, Vec::new())
                }
            }
        });
        join_all(listings).await
    }

    /// The merged tool list as a caller with `session_id` should see it
    pub async fn list_tools(&self, session_id: Option<&str>) -> Vec<ToolDefinition> {
        let mut tools = Vec::new();

        for (backend, catalog) in self.live_catalogs().await {
            for tool in catalog {
                if self.is_excluded(&backend, &tool.name) {
                    debug!("Excluding {}", qualified_name(&backend, &tool.name));
                    continue;
                }

                let expanded = self.sessions.is_expanded(session_id, &backend, &tool.name);
                let description = self.cache.get_description(
                    &backend,
                    &tool.name,
                    tool.description.as_deref(),
                    expanded,
                );

                tools.push(ToolDefinition {
                    name: qualified_name(&backend, &tool.name),
                    description,
                    input_schema: tool.input_schema,
                });
            }
        }

        tools.extend(Self::session_tools());
        tools
    }

    /// Definitions of the built-in expansion tools
    pub fn session_tools() -> Vec<ToolDefinition> {
        let schema = json!({
            "type": "object",
            "properties": {
                "tool": {
                    "type": "string",
                    "description": "Qualified tool name, e.g. github__create_issue"
                }
            },
            "required": ["tool"]
        });
        vec![
            ToolDefinition::new(
                EXPAND_TOOL,
                Some("Show the full original description of a tool for this session.".to_string()),
                schema.clone(),
            ),
            ToolDefinition::new(
                COLLAPSE_TOOL,
                Some("Return a tool to its compressed description for this session.".to_string()),
                schema,
            ),
        ]
    }

    /// Split a qualified name into a connected backend and its tool.
    /// The longest matching backend name wins.
    pub fn resolve(&self, qualified: &str) -> Option<(String, String)> {
        self.connections
            .get_connected_clients()
            .into_iter()
            .filter_map(|c| {
                let prefix = format!("{}{}", c.name, QUALIFIED_SEPARATOR);
                qualified
                    .strip_prefix(&prefix)
                    .filter(|tool| !tool.is_empty())
                    .map(|tool| (c.name.clone(), tool.to_string()))
            })
            .max_by_key(|(backend, _)| backend.len())
    }

    /// Invoke a tool by qualified name on behalf of `session_id`
    pub async fn call_tool(
        &self,
        session_id: Option<&str>,
        qualified: &str,
        arguments: Value,
    ) -> McpResult<CallToolResult> {
        match qualified {
            EXPAND_TOOL => return Ok(self.toggle_expansion(session_id, &arguments, true)),
            COLLAPSE_TOOL => return Ok(self.toggle_expansion(session_id, &arguments, false)),
            _ => {}
        }

        let (backend, tool) = self
            .resolve(qualified)
            .ok_or_else(|| McpError::ToolNotFound(qualified.to_string()))?;

        if self.is_excluded(&backend, &tool) {
            return Err(McpError::ToolNotFound(qualified.to_string()));
        }

        let client = self
            .connections
            .get_client(&backend)
            .ok_or_else(|| McpError::ServerNotFound(backend.clone()))?;

        client.call_tool(&tool, arguments).await
    }

    fn toggle_expansion(&self, session_id: Option<&str>, arguments: &Value, expand: bool) -> CallToolResult {
        let Some(session_id) = session_id.filter(|id| self.sessions.has(id)) else {
            return CallToolResult::error_text(
                "No active session. Initialize a session first (the Mcp-Session-Id header), then retry.",
            );
        };

        let Some(qualified) = arguments.get("tool").and_then(Value::as_str) else {
            return CallToolResult::error_text("Missing required argument: tool");
        };

        let Some((backend, tool)) = self.resolve(qualified) else {
            return CallToolResult::error_text(format!("Unknown tool: {}", qualified));
        };

        if expand {
            self.sessions.expand(session_id, &backend, &tool);
            CallToolResult::text(format!(
                "{} now shows its full description. List tools again to see it.",
                qualified
            ))
        } else if self.sessions.collapse(session_id, &backend, &tool) {
            CallToolResult::text(format!("{} is back to its compressed description.", qualified))
        } else {
            CallToolResult::text(format!("{} was not expanded.", qualified))
        }
    }

    /// Live tools lacking a non-empty compressed description
    pub async fn pending_compressions(&self) -> Vec<PendingCompression> {
        let mut pending = Vec::new();

        for (backend, catalog) in self.live_catalogs().await {
            for tool in catalog {
                if self.is_excluded(&backend, &tool.name)
                    || self.cache.has_compressed(&backend, &tool.name)
                {
                    continue;
                }
                pending.push(PendingCompression {
                    server_name: backend.clone(),
                    tool_name: tool.name,
                    original_description: tool.description,
                });
            }
        }

        pending
    }

    /// Store externally produced compressions and persist the cache.
    /// In-memory records are kept even when persisting fails.
    pub async fn apply_compressions(&self, entries: Vec<CompressionEntry>) -> McpResult<usize> {
        let count = entries.len();
        for entry in entries {
            self.cache.save_compressed(
                &entry.server_name,
                &entry.tool_name,
                entry.compressed_description,
                entry.original_description,
            );
        }

        self.cache.save_to_disk().await?;
        info!("Applied {} compressions", count);
        Ok(count)
    }

    pub fn stats(&self) -> ProxyStats {
        ProxyStats {
            servers: self.connections.get_server_statuses(),
            active_sessions: self.sessions.len(),
            cache: self.cache.get_cache_metrics(),
        }
    }

    /// Stop the session sweep and disconnect every backend
    pub async fn shutdown(&self) {
        self.sessions.destroy();
        self.connections.disconnect_all().await;
    }
}
