//! Stdio transport tests against short-lived shell processes

#![cfg(unix)]

use mcp_compress_proxy::config::BackendConfig;
use mcp_compress_proxy::core::protocol::JsonRpcRequest;
use mcp_compress_proxy::transport::{StdioTransport, Transport};
use mcp_compress_proxy::utils::errors::McpError;
use std::time::Duration;

fn shell(name: &str, script: &str) -> BackendConfig {
    BackendConfig::stdio(name, "sh", vec!["-c".to_string(), script.to_string()])
}

#[tokio::test]
async fn test_request_fails_fast_after_stdout_closes() {
    let transport = StdioTransport::spawn(&shell("mute", "exec >&-; sleep 5"))
        .await
        .unwrap();

    for _ in 0..100 {
        if !transport.is_connected().await {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!transport.is_connected().await);

    let result = tokio::time::timeout(
        Duration::from_secs(2),
        transport.send_request(JsonRpcRequest::new("ping", None)),
    )
    .await
    .expect("request should not wait for the response timeout");
    assert!(matches!(result, Err(McpError::TransportError(_))));
}

#[tokio::test]
async fn test_request_racing_process_exit_fails_fast() {
    let transport = StdioTransport::spawn(&shell("gone", "exit 0")).await.unwrap();

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        transport.send_request(JsonRpcRequest::new("ping", None)),
    )
    .await
    .expect("request should not wait for the response timeout");
    assert!(result.is_err());

    transport.close().await.unwrap();
}
