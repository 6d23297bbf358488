//! HTTP front tests driven through the router with `oneshot`

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use common::{stdio, FakeBackend, FakeConnector};
use mcp_compress_proxy::cache::CompressionCache;
use mcp_compress_proxy::config::{DescriptionFallback, ServerConfig};
use mcp_compress_proxy::core::{ConnectionManager, SessionStore, ToolAggregator};
use mcp_compress_proxy::http_server::{HttpServer, SESSION_HEADER};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

async fn app() -> (Router, Arc<ToolAggregator>) {
    let connector = FakeConnector::new().backend(
        "github",
        FakeBackend::with_tools(&[("create_issue", "Create a new issue in a repository")]),
    );
    let connections = Arc::new(ConnectionManager::with_connector(Arc::new(connector)));
    connections.initialize(&[stdio("github")], None).await;

    let aggregator = Arc::new(ToolAggregator::new(
        connections,
        Arc::new(CompressionCache::new::<&str>(&[], DescriptionFallback::Original)),
        Arc::new(SessionStore::new()),
        &[] as &[&str],
    ));
    let router = HttpServer::new(ServerConfig::default(), aggregator.clone()).create_router();
    (router, aggregator)
}

fn rpc(session: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/mcp")
        .header("content-type", "application/json");
    if let Some(session) = session {
        builder = builder.header(SESSION_HEADER, session);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn initialize(router: &Router) -> String {
    let response = router
        .clone()
        .oneshot(rpc(
            None,
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    response
        .headers()
        .get(SESSION_HEADER)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_health() {
    let (router, _) = app().await;
    let response = router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["connectedServers"], true);
}

#[tokio::test]
async fn test_initialize_creates_session() {
    let (router, aggregator) = app().await;
    let session = initialize(&router).await;
    assert!(aggregator.sessions().has(&session));
}

#[tokio::test]
async fn test_notification_accepted() {
    let (router, _) = app().await;
    let response = router
        .oneshot(rpc(
            None,
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_tools_list_and_expand_flow() {
    let (router, aggregator) = app().await;
    aggregator
        .cache()
        .save_compressed("github", "create_issue", "Create issue", None);
    let session = initialize(&router).await;

    let list = |router: Router, session: String| async move {
        let response = router
            .oneshot(rpc(
                Some(&session),
                json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
            ))
            .await
            .unwrap();
        json_body(response).await
    };

    let body = list(router.clone(), session.clone()).await;
    assert_eq!(body["result"]["tools"][0]["name"], "github__create_issue");
    assert_eq!(body["result"]["tools"][0]["description"], "Create issue");

    let response = router
        .clone()
        .oneshot(rpc(
            Some(&session),
            json!({
                "jsonrpc": "2.0",
                "id": 3,
                "method": "tools/call",
                "params": {"name": "expand_tool_description", "arguments": {"tool": "github__create_issue"}}
            }),
        ))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert!(body["result"]["isError"].is_null());

    let body = list(router.clone(), session.clone()).await;
    assert_eq!(
        body["result"]["tools"][0]["description"],
        "Create a new issue in a repository"
    );
}

#[tokio::test]
async fn test_tools_call_forwards_to_backend() {
    let (router, _) = app().await;
    let response = router
        .oneshot(rpc(
            None,
            json!({
                "jsonrpc": "2.0",
                "id": 4,
                "method": "tools/call",
                "params": {"name": "github__create_issue", "arguments": {"title": "bug"}}
            }),
        ))
        .await
        .unwrap();

    let body = json_body(response).await;
    assert_eq!(body["id"], 4);
    let text = body["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.starts_with("create_issue"));
}

#[tokio::test]
async fn test_unknown_tool_and_method_are_rpc_errors() {
    let (router, _) = app().await;

    let response = router
        .clone()
        .oneshot(rpc(
            None,
            json!({"jsonrpc": "2.0", "id": 5, "method": "tools/call", "params": {"name": "nope__x"}}),
        ))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], -32601);

    let response = router
        .oneshot(rpc(None, json!({"jsonrpc": "2.0", "id": 6, "method": "resources/list"})))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], -32601);
}

#[tokio::test]
async fn test_delete_session() {
    let (router, aggregator) = app().await;
    let session = initialize(&router).await;

    let delete = |session: String| {
        Request::builder()
            .method(Method::DELETE)
            .uri("/mcp")
            .header(SESSION_HEADER, session)
            .body(Body::empty())
            .unwrap()
    };

    let response = router.clone().oneshot(delete(session.clone())).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(!aggregator.sessions().has(&session));

    let response = router.clone().oneshot(delete(session)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = router
        .oneshot(
            Request::builder()
                .method(Method::DELETE)
                .uri("/mcp")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "SESSION_ERROR");
}

#[tokio::test]
async fn test_compression_endpoints() {
    let (router, aggregator) = app().await;

    let response = router
        .clone()
        .oneshot(Request::get("/compressions/pending").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let pending = json_body(response).await;
    assert_eq!(pending[0]["serverName"], "github");
    assert_eq!(pending[0]["toolName"], "create_issue");

    let entries = json!([{
        "serverName": "github",
        "toolName": "create_issue",
        "compressedDescription": "Create issue"
    }]);
    let response = router
        .clone()
        .oneshot(
            Request::post("/compressions")
                .header("content-type", "application/json")
                .body(Body::from(entries.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["applied"], 1);
    assert!(aggregator.cache().has_compressed("github", "create_issue"));

    let response = router
        .oneshot(Request::get("/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let stats = json_body(response).await;
    assert_eq!(stats["cache"]["totalRecords"], 1);
    assert_eq!(stats["servers"][0]["name"], "github");
}
