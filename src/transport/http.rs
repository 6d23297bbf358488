//! HTTP transport for MCP backends
//!
//! Each JSON-RPC message is POSTed to the endpoint. The response body is
//! either a JSON object or an SSE stream whose `data:` lines carry the
//! response. A `mcp-session-id` returned by the backend is echoed back on
//! every later request. A transport dropped with a session still open
//! ends it in the background.

use crate::core::protocol::{JsonRpcRequest, JsonRpcResponse};
use crate::core::request_id::SharedRequestIdGenerator;
use crate::transport::traits::Transport;
use crate::utils::errors::{McpError, McpResult};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;

const SESSION_HEADER: &str = "mcp-session-id";

pub struct HttpTransport {
    endpoint: Url,
    client: reqwest::Client,
    session_id: Arc<RwLock<Option<String>>>,
    is_connected: Arc<RwLock<bool>>,
    request_id_gen: SharedRequestIdGenerator,
}

impl HttpTransport {
    pub fn new(endpoint: impl AsRef<str>) -> McpResult<Self> {
        let endpoint = endpoint
            .as_ref()
            .parse::<Url>()
            .map_err(|e| McpError::TransportError(format!("Invalid URL: {}", e)))?;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| McpError::TransportError(e.to_string()))?;

        Ok(Self {
            endpoint,
            client,
            session_id: Arc::new(RwLock::new(None)),
            is_connected: Arc::new(RwLock::new(true)),
            request_id_gen: SharedRequestIdGenerator::new(),
        })
    }

    pub async fn session_id(&self) -> Option<String> {
        self.session_id.read().await.clone()
    }

    async fn post(&self, request: &JsonRpcRequest) -> McpResult<reqwest::Response> {
        let json = serde_json::to_string(request)?;
        debug!("POST {}: {}", self.endpoint, json);

        let mut builder = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json, text/event-stream")
            .body(json);

        if let Some(session_id) = self.session_id.read().await.as_ref() {
            builder = builder.header(SESSION_HEADER, session_id);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| McpError::TransportError(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(McpError::TransportError(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        if let Some(id) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            let mut session = self.session_id.write().await;
            if session.as_deref() != Some(id) {
                info!("HTTP backend session established: {}", id);
                *session = Some(id.to_string());
            }
        }

        Ok(response)
    }

    /// Pull the JSON-RPC response out of a JSON or SSE body
    fn parse_body(body: &str, is_event_stream: bool) -> McpResult<JsonRpcResponse> {
        if !is_event_stream {
            return Ok(serde_json::from_str(body)?);
        }

        body.lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(str::trim)
            .filter_map(|data| serde_json::from_str::<JsonRpcResponse>(data).ok())
            .find(|response| response.id.is_some())
            .ok_or_else(|| {
                McpError::TransportError("Event stream carried no response".to_string())
            })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send_request(&self, mut request: JsonRpcRequest) -> McpResult<JsonRpcResponse> {
        if !self.is_connected().await {
            return Err(McpError::TransportError("Transport not connected".to_string()));
        }

        if request.id.is_none() {
            request.id = Some(self.request_id_gen.next_id());
        }

        let response = self.post(&request).await?;
        let is_event_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map_or(false, |ct| ct.starts_with("text/event-stream"));

        let body = response
            .text()
            .await
            .map_err(|e| McpError::TransportError(format!("Failed to read body: {}", e)))?;

        Self::parse_body(&body, is_event_stream)
    }

    async fn send_notification(&self, mut request: JsonRpcRequest) -> McpResult<()> {
        request.id = None;
        self.post(&request).await?;
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        *self.is_connected.read().await
    }

    async fn close(&self) -> McpResult<()> {
        if let Some(session_id) = self.session_id.write().await.take() {
            let result = self
                .client
                .delete(self.endpoint.clone())
                .header(SESSION_HEADER, session_id)
                .send()
                .await;
            if let Err(e) = result {
                debug!("Failed to end HTTP backend session: {}", e);
            }
        }
        *self.is_connected.write().await = false;
        Ok(())
    }
}

impl Drop for HttpTransport {
    fn drop(&mut self) {
        let Some(session_id) = self.session_id.try_write().ok().and_then(|mut s| s.take()) else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("No runtime to end HTTP backend session {}", session_id);
            return;
        };

        let request = self
            .client
            .delete(self.endpoint.clone())
            .header(SESSION_HEADER, session_id.clone());
        handle.spawn(async move {
            if let Err(e) = request.send().await {
                debug!("Failed to end dropped HTTP backend session {}: {}", session_id, e);
            }
        });
    }
}
