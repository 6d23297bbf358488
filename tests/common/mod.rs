//! Fake backends shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use mcp_compress_proxy::config::BackendConfig;
use mcp_compress_proxy::core::protocol::{CallToolResult, ToolDefinition};
use mcp_compress_proxy::core::{BackendClient, BackendConnector};
use mcp_compress_proxy::utils::errors::{McpError, McpResult};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Scripted behaviour for one backend name
#[derive(Clone, Default)]
pub struct FakeBackend {
    pub tools: Vec<ToolDefinition>,
    pub connect_delay: Duration,
    pub fail_connect: bool,
    pub fail_list: bool,
}

impl FakeBackend {
    pub fn with_tools(tools: &[(&str, &str)]) -> Self {
        Self {
            tools: tools
                .iter()
                .map(|(name, desc)| tool(name, desc))
                .collect(),
            ..Default::default()
        }
    }
}

pub fn tool(name: &str, description: &str) -> ToolDefinition {
    ToolDefinition::new(
        name,
        Some(description.to_string()),
        json!({ "type": "object" }),
    )
}

/// Records every call it receives and echoes the arguments back
pub struct FakeClient {
    backend: FakeBackend,
    pub calls: Arc<Mutex<Vec<(String, Value)>>>,
}

#[async_trait]
impl BackendClient for FakeClient {
    async fn list_tools(&self) -> McpResult<Vec<ToolDefinition>> {
        if self.backend.fail_list {
            return Err(McpError::TransportError("listing broke".to_string()));
        }
        Ok(self.backend.tools.clone())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<CallToolResult> {
        self.calls.lock().push((name.to_string(), arguments.clone()));
        Ok(CallToolResult::text(format!("{} {}", name, arguments)))
    }

    async fn close(&self) -> McpResult<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeConnector {
    backends: HashMap<String, FakeBackend>,
    pub calls: Arc<Mutex<Vec<(String, Value)>>>,
    pub cancelled: Arc<Mutex<Vec<String>>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn backend(mut self, name: &str, backend: FakeBackend) -> Self {
        self.backends.insert(name.to_string(), backend);
        self
    }
}

#[async_trait]
impl BackendConnector for FakeConnector {
    async fn connect(
        &self,
        config: &BackendConfig,
        cancel: CancellationToken,
    ) -> McpResult<Arc<dyn BackendClient>> {
        let backend = self
            .backends
            .get(&config.name)
            .cloned()
            .ok_or_else(|| McpError::ServerNotFound(config.name.clone()))?;

        let cancelled = self.cancelled.clone();
        let name = config.name.clone();
        let watcher = cancel.clone();
        tokio::spawn(async move {
            watcher.cancelled().await;
            cancelled.lock().push(name);
        });

        tokio::time::sleep(backend.connect_delay).await;

        if backend.fail_connect {
            return Err(McpError::TransportError("connection refused".to_string()));
        }

        Ok(Arc::new(FakeClient {
            backend,
            calls: self.calls.clone(),
        }))
    }
}

pub fn stdio(name: &str) -> BackendConfig {
    BackendConfig::stdio(name, "unused", vec![])
}
