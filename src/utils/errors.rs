use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum McpError {
    #[error("server not found: {0}")]
    ServerNotFound(String),

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("transport error: {0}")]
    TransportError(String),

    #[error("backend error {code}: {message}")]
    BackendError { code: i32, message: String },

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("timeout after {0}ms")]
    Timeout(u64),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("cache persistence error: {0}")]
    CachePersist(String),

    #[error("session error: {0}")]
    SessionError(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl McpError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ServerNotFound(_) | Self::ToolNotFound(_) | Self::MethodNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Self::InvalidRequest(_) | Self::SessionError(_) => StatusCode::BAD_REQUEST,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::TransportError(_) | Self::BackendError { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ServerNotFound(_) => "SERVER_NOT_FOUND",
            Self::ToolNotFound(_) => "TOOL_NOT_FOUND",
            Self::MethodNotFound(_) => "METHOD_NOT_FOUND",
            Self::TransportError(_) => "TRANSPORT_ERROR",
            Self::BackendError { .. } => "BACKEND_ERROR",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::CachePersist(_) => "CACHE_PERSIST_ERROR",
            Self::SessionError(_) => "SESSION_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// JSON-RPC error code used when this error is reported to the calling agent
    pub fn rpc_code(&self) -> i32 {
        match self {
            Self::BackendError { code, .. } => *code,
            Self::InvalidRequest(_) => -32602,
            Self::ToolNotFound(_) | Self::ServerNotFound(_) | Self::MethodNotFound(_) => -32601,
            _ => -32603,
        }
    }
}

impl IntoResponse for McpError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.error_code(),
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}

pub type McpResult<T> = Result<T, McpError>;
