//! MCP client session against one backend

use crate::core::connection::BackendClient;
use crate::core::protocol::{
    CallToolResult, Implementation, InitializeResult, JsonRpcRequest, JsonRpcResponse,
    ListToolsResult, ToolDefinition, PROTOCOL_VERSION,
};
use crate::transport::Transport;
use crate::utils::errors::{McpError, McpResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info};

/// Upper bound on `tools/list` pages followed for one listing
const MAX_LIST_PAGES: usize = 100;

/// An initialized MCP session over some transport
pub struct McpClient {
    name: String,
    transport: Box<dyn Transport>,
    server_info: Option<Implementation>,
}

impl McpClient {
    /// Run the `initialize` handshake over `transport`
    pub async fn initialize(name: impl Into<String>, transport: Box<dyn Transport>) -> McpResult<Self> {
        let name = name.into();
        let mut client = Self {
            name,
            transport,
            server_info: None,
        };

        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            }
        });
        let result: InitializeResult = client.request("initialize", Some(params)).await?;
        info!(
            "[{}] Initialized: {} {} (protocol {})",
            client.name, result.server_info.name, result.server_info.version, result.protocol_version
        );
        client.server_info = Some(result.server_info);

        client
            .transport
            .send_notification(JsonRpcRequest::new("notifications/initialized", None))
            .await?;

        Ok(client)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn server_info(&self) -> Option<&Implementation> {
        self.server_info.as_ref()
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Option<Value>) -> McpResult<T> {
        let response = self
            .transport
            .send_request(JsonRpcRequest::new(method, params))
            .await?;
        Self::into_result(response)
    }

    fn into_result<T: DeserializeOwned>(response: JsonRpcResponse) -> McpResult<T> {
        if let Some(error) = response.error {
            return Err(McpError::BackendError {
                code: error.code,
                message: error.message,
            });
        }
        let result = response.result.unwrap_or(Value::Null);
        Ok(serde_json::from_value(result)?)
    }
}

#[async_trait]
impl BackendClient for McpClient {
    async fn list_tools(&self) -> McpResult<Vec<ToolDefinition>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let page: ListToolsResult = self.request("tools/list", params).await?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        debug!("[{}] Listed {} tools", self.name, tools.len());
        Ok(tools)
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<CallToolResult> {
        debug!("[{}] Calling tool {}", self.name, name);
        self.request(
            "tools/call",
            Some(json!({ "name": name, "arguments": arguments })),
        )
        .await
    }

    async fn close(&self) -> McpResult<()> {
        self.transport.close().await
    }
}
