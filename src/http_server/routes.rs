use crate::core::aggregator::{CompressionEntry, PendingCompression, ProxyStats};
use crate::core::protocol::{
    CallToolResult, JsonRpcRequest, JsonRpcResponse, RequestId, PROTOCOL_VERSION,
};
use crate::http_server::server::AppState;
use crate::utils::errors::{McpError, McpResult};
use axum::{
    extract::{Json, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// Header carrying the caller's session id
pub const SESSION_HEADER: &str = "mcp-session-id";

fn session_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[derive(Debug, Deserialize)]
struct CallToolParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

/// Health check endpoint
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "connectedServers": state.aggregator.connections().has_connected_servers(),
    }))
}

/// JSON-RPC entry point for the calling agent
pub async fn mcp_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<JsonRpcRequest>,
) -> Response {
    let session_id = session_from_headers(&headers);
    debug!("{} (session {:?})", request.method, session_id);

    if request.method == "initialize" {
        return initialize(&state, request.id);
    }

    if request.is_notification() {
        return StatusCode::ACCEPTED.into_response();
    }

    let id = request.id.clone();
    let result = dispatch(&state, session_id.as_deref(), request).await;
    let response = match result {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(id, e.rpc_code(), e.to_string()),
    };

    Json(response).into_response()
}

fn initialize(state: &AppState, id: Option<RequestId>) -> Response {
    let session_id = state.aggregator.sessions().create();
    let result = json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": { "listChanged": false } },
        "serverInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        }
    });

    let mut response = Json(JsonRpcResponse::success(id, result)).into_response();
    if let Ok(value) = HeaderValue::from_str(&session_id) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    response
}

async fn dispatch(
    state: &AppState,
    session_id: Option<&str>,
    request: JsonRpcRequest,
) -> McpResult<Value> {
    match request.method.as_str() {
        "ping" => Ok(json!({})),
        "tools/list" => {
            let tools = state.aggregator.list_tools(session_id).await;
            Ok(json!({ "tools": tools }))
        }
        "tools/call" => {
            let params: CallToolParams = request
                .params
                .map(serde_json::from_value::<CallToolParams>)
                .transpose()
                .map_err(|e| McpError::InvalidRequest(format!("Invalid tools/call params: {}", e)))?
                .ok_or_else(|| McpError::InvalidRequest("Missing tools/call params".to_string()))?;

            let arguments = params.arguments.unwrap_or_else(|| json!({}));
            let result = match state
                .aggregator
                .call_tool(session_id, &params.name, arguments)
                .await
            {
                Ok(result) => result,
                Err(e @ McpError::ToolNotFound(_)) => return Err(e),
                Err(e) => CallToolResult::error_text(e.to_string()),
            };
            Ok(serde_json::to_value(result)?)
        }
        other => Err(McpError::MethodNotFound(other.to_string())),
    }
}

/// End the session named in the header
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, McpError> {
    let id = session_from_headers(&headers)
        .ok_or_else(|| McpError::SessionError(format!("Missing {} header", SESSION_HEADER)))?;

    if state.aggregator.sessions().delete(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}

/// Backend health, cache metrics and session count
pub async fn stats(State(state): State<Arc<AppState>>) -> Json<ProxyStats> {
    Json(state.aggregator.stats())
}

/// Live tools still waiting for compression
pub async fn pending_compressions(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<PendingCompression>> {
    Json(state.aggregator.pending_compressions().await)
}

/// Accept compressed descriptions and persist them
pub async fn apply_compressions(
    State(state): State<Arc<AppState>>,
    Json(entries): Json<Vec<CompressionEntry>>,
) -> Result<Json<Value>, McpError> {
    let applied = state.aggregator.apply_compressions(entries).await?;
    Ok(Json(json!({ "applied": applied })))
}
