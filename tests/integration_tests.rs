//! End-to-end integration tests: the HTTP session protocol on a live server,
//! and the host orchestrator driving it through the action bridge.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tempfile::TempDir;
use todo_bridge::{ActionBridge, FileRenderer, HostError, HostOrchestrator, McpClient, Renderer};
use todo_protocol::{ActionKind, ActionPayload, ResourceArtifact, Tools};
use todo_server::{McpServer, broadcast_notifier};
use todo_services::{ArtifactBuilder, TodoService, TodoStore};
use todo_transport::{TransportConfig, TransportServer};
use tokio::sync::broadcast;
use tokio::time::timeout;

const SESSION: &str = "mcp-session-id";

/// Start a server on an OS-assigned port.
async fn start_test_server() -> TransportServer {
    let (notification_tx, _) = broadcast::channel(64);

    let service = TodoService::new(Arc::new(TodoStore::new()), ArtifactBuilder::default());
    service.set_notify_sender(broadcast_notifier(notification_tx.clone()));

    let mut server = McpServer::new("0.1.0");
    server.register_service(service);
    server.initialize().await.unwrap();

    let config = TransportConfig {
        port: 0,
        enable_cors: false,
        ..TransportConfig::default()
    };
    TransportServer::start_with_sender(config, Arc::new(server), notification_tx)
        .await
        .unwrap()
}

fn endpoint(server: &TransportServer) -> String {
    format!("http://127.0.0.1:{}/mcp", server.port())
}

async fn post(url: &str, session: Option<&str>, body: Value) -> reqwest::Response {
    let mut req = reqwest::Client::new()
        .post(url)
        .header("accept", "application/json, text/event-stream")
        .json(&body);
    if let Some(id) = session {
        req = req.header(SESSION, id);
    }
    req.send().await.unwrap()
}

/// Open a session and return its id.
async fn initialize(url: &str) -> String {
    let resp = post(
        url,
        None,
        json!({
            "jsonrpc": "2.0",
            "id": 0,
            "method": "initialize",
            "params": {
                "protocolVersion": "2025-03-26",
                "capabilities": {},
                "clientInfo": {"name": "integration", "version": "1.0"}
            }
        }),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let session = resp.headers()[SESSION].to_str().unwrap().to_string();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["result"]["serverInfo"]["name"], "minimal-todo-server");
    session
}

/// Call a tool and return the `tools/call` result object.
async fn call_tool(url: &str, session: &str, name: &str, arguments: Value) -> Value {
    let resp = post(
        url,
        Some(session),
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": {"name": name, "arguments": arguments}
        }),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    body["result"].clone()
}

fn outcome(result: &Value) -> Value {
    serde_json::from_str(result["content"][0]["text"].as_str().unwrap()).unwrap()
}

async fn delete_session(url: &str, session: &str) -> reqwest::StatusCode {
    reqwest::Client::new()
        .delete(url)
        .header(SESSION, session)
        .send()
        .await
        .unwrap()
        .status()
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP session protocol
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_endpoint_works() {
    let mut server = start_test_server().await;
    let url = format!("http://127.0.0.1:{}/health", server.port());
    let body: Value = reqwest::get(&url).await.unwrap().json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["sessions"], 0);
    server.stop().await;
}

#[tokio::test]
async fn todo_lifecycle_over_http() {
    let mut server = start_test_server().await;
    let url = endpoint(&server);
    let s1 = initialize(&url).await;

    let resp = post(
        &url,
        Some(&s1),
        json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
    )
    .await;
    assert_eq!(resp.status(), 202);

    let milk = call_tool(&url, &s1, Tools::TODO_CREATE, json!({"text": "buy milk"})).await;
    assert_eq!(outcome(&milk)["data"]["id"], 1);
    assert_eq!(milk["content"][1]["resource"]["uri"], "ui://todo/list");

    let rent = call_tool(&url, &s1, Tools::TODO_CREATE, json!({"text": "pay rent"})).await;
    assert_eq!(outcome(&rent)["data"]["id"], 2);

    let done = call_tool(&url, &s1, Tools::TODO_UPDATE, json!({"id": 1, "completed": true})).await;
    assert_eq!(outcome(&done)["data"]["completed"], true);
    assert!(
        done["content"][1]["resource"]["text"]
            .as_str()
            .unwrap()
            .contains("todo-item completed")
    );

    let deleted = call_tool(&url, &s1, Tools::TODO_DELETE, json!({"id": 2})).await;
    assert_eq!(outcome(&deleted)["success"], true);

    let again = call_tool(&url, &s1, Tools::TODO_DELETE, json!({"id": 2})).await;
    assert_eq!(again["isError"], true);
    assert_eq!(outcome(&again)["message"], "Todo with ID 2 not found");
    assert_eq!(again["content"].as_array().unwrap().len(), 1);

    let list = call_tool(&url, &s1, Tools::TODO_LIST, json!({})).await;
    let todos = outcome(&list)["data"].clone();
    assert_eq!(todos.as_array().unwrap().len(), 1);
    assert_eq!(todos[0]["text"], "buy milk");

    server.stop().await;
}

#[tokio::test]
async fn sessions_share_one_store() {
    let mut server = start_test_server().await;
    let url = endpoint(&server);
    let s1 = initialize(&url).await;
    let s2 = initialize(&url).await;
    assert_ne!(s1, s2);
    assert_eq!(server.registry().len(), 2);

    call_tool(&url, &s1, Tools::TODO_CREATE, json!({"text": "from s1"})).await;
    let list = call_tool(&url, &s2, Tools::TODO_LIST, json!({})).await;
    assert_eq!(outcome(&list)["data"][0]["text"], "from s1");

    server.stop().await;
    assert!(server.registry().is_empty());
}

#[tokio::test]
async fn requests_without_valid_session_are_rejected() {
    let mut server = start_test_server().await;
    let url = endpoint(&server);
    let list = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"});

    let resp = post(&url, None, list.clone()).await;
    assert_eq!(resp.status(), 400);
    assert!(resp.headers().get(SESSION).is_none());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], -32600);
    assert!(body["id"].is_null());

    let resp = post(&url, Some("no-such-session"), list).await;
    assert_eq!(resp.status(), 400);
    assert_eq!(server.registry().len(), 0);

    server.stop().await;
}

#[tokio::test]
async fn malformed_json_returns_parse_error() {
    let mut server = start_test_server().await;
    let url = endpoint(&server);
    let session = initialize(&url).await;

    let resp = reqwest::Client::new()
        .post(&url)
        .header(SESSION, &session)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], -32700);

    server.stop().await;
}

#[tokio::test]
async fn unknown_tool_is_a_jsonrpc_error() {
    let mut server = start_test_server().await;
    let url = endpoint(&server);
    let session = initialize(&url).await;

    let resp = post(
        &url,
        Some(&session),
        json!({"jsonrpc": "2.0", "id": 9, "method": "tools/call", "params": {"name": "nope", "arguments": {}}}),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["id"], 9);
    assert_eq!(body["error"]["code"], -32602);

    server.stop().await;
}

#[tokio::test]
async fn event_stream_carries_notifications_until_delete() {
    let mut server = start_test_server().await;
    let url = endpoint(&server);
    let session = initialize(&url).await;

    let mut stream = reqwest::Client::new()
        .get(&url)
        .header(SESSION, &session)
        .header("accept", "text/event-stream")
        .send()
        .await
        .unwrap();
    assert_eq!(stream.status(), 200);
    assert!(
        stream.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );

    call_tool(&url, &session, Tools::TODO_CREATE, json!({"text": "watched"})).await;

    let mut seen = String::new();
    while !seen.contains("notifications/resources/updated") {
        let chunk = timeout(Duration::from_secs(5), stream.chunk())
            .await
            .expect("timed out waiting for notification")
            .unwrap()
            .expect("stream ended early");
        seen.push_str(&String::from_utf8_lossy(&chunk));
    }
    assert!(seen.contains("ui://todo/list"));

    assert_eq!(delete_session(&url, &session).await, 200);
    let end = timeout(Duration::from_secs(5), async {
        while stream.chunk().await.unwrap().is_some() {}
    })
    .await;
    assert!(end.is_ok(), "event stream should end when the session closes");

    server.stop().await;
}

#[tokio::test]
async fn deleted_session_is_gone() {
    let mut server = start_test_server().await;
    let url = endpoint(&server);
    let session = initialize(&url).await;

    assert_eq!(delete_session(&url, &session).await, 200);
    assert!(server.registry().is_empty());

    let get = reqwest::Client::new()
        .get(&url)
        .header(SESSION, &session)
        .send()
        .await
        .unwrap();
    assert_eq!(get.status(), 404);

    let resp = post(&url, Some(&session), json!({"jsonrpc": "2.0", "id": 1, "method": "ping"})).await;
    assert_eq!(resp.status(), 400);

    assert_eq!(delete_session(&url, &session).await, 404);

    server.stop().await;
}

// ─────────────────────────────────────────────────────────────────────────────
// Host orchestrator
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingRenderer {
    documents: Vec<String>,
    failures: Vec<String>,
}

impl Renderer for RecordingRenderer {
    fn render(&mut self, artifact: &ResourceArtifact) -> Result<(), HostError> {
        self.documents.push(artifact.html()?);
        Ok(())
    }

    fn report_failure(&mut self, message: &str) {
        self.failures.push(message.to_string());
    }
}

#[tokio::test]
async fn host_rerenders_after_every_action() {
    let mut server = start_test_server().await;
    let (sender, listener) = ActionBridge::channel(16);
    let mut host = HostOrchestrator::new(
        McpClient::new(endpoint(&server)),
        listener,
        RecordingRenderer::default(),
    );

    host.start().await.unwrap();
    assert_eq!(host.renderer().documents.len(), 1);
    assert!(host.renderer().documents[0].contains("id=\"empty-state\""));
    assert!(host.client().session_id().is_some());

    let send = |payload: ActionPayload| {
        let sender = sender.clone();
        async move { sender.send(ActionKind::Tool, payload).await.unwrap() }
    };
    send(ActionPayload::new(Tools::TODO_CREATE).with_text("buy milk")).await;
    send(ActionPayload::new(Tools::TODO_UPDATE).with_id(1).with_completed(true)).await;
    sender
        .post(json!({"source": "devtools", "hello": true}))
        .await
        .unwrap();
    send(ActionPayload::new(Tools::TODO_DELETE).with_id(1)).await;
    send(ActionPayload::new(Tools::TODO_DELETE).with_id(99)).await;
    send(ActionPayload::new("todo_archive")).await;
    drop(send);
    drop(sender);

    host.run().await.unwrap();

    let renderer = host.renderer();
    assert_eq!(renderer.documents.len(), 6);
    assert!(renderer.documents[1].contains("buy milk"));
    assert!(renderer.documents[2].contains("todo-item completed"));
    assert!(renderer.documents[3].contains("id=\"empty-state\""));
    assert_eq!(
        renderer.failures,
        vec!["Todo with ID 99 not found", "Unknown operation: todo_archive"]
    );
    assert_eq!(host.listener().discarded(), 1);

    // run() ends the session once the bridge closes
    assert!(host.client().session_id().is_none());
    assert!(server.registry().is_empty());

    server.stop().await;
}

#[tokio::test]
async fn file_renderer_writes_each_artifact() {
    let mut server = start_test_server().await;
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("todo.html");

    let (sender, listener) = ActionBridge::channel(4);
    let mut host = HostOrchestrator::new(
        McpClient::new(endpoint(&server)),
        listener,
        FileRenderer::new(&out),
    );
    host.start().await.unwrap();
    assert!(std::fs::read_to_string(&out).unwrap().contains("Todo Management"));

    sender
        .send(ActionKind::Tool, ActionPayload::new(Tools::TODO_CREATE).with_text("on disk"))
        .await
        .unwrap();
    drop(sender);
    host.run().await.unwrap();

    assert_eq!(host.renderer().renders(), 2);
    assert_eq!(host.renderer().path(), out.as_path());
    assert!(std::fs::read_to_string(&out).unwrap().contains("on disk"));

    server.stop().await;
}

#[tokio::test]
async fn host_closes_session_when_it_stops_on_failure() {
    let mut server = start_test_server().await;
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("todo.html");

    let (sender, listener) = ActionBridge::channel(4);
    let mut host = HostOrchestrator::new(
        McpClient::new(endpoint(&server)),
        listener,
        FileRenderer::new(&out),
    );
    host.start().await.unwrap();
    assert_eq!(server.registry().len(), 1);

    // The next render has nowhere to go
    dir.close().unwrap();
    sender
        .send(ActionKind::Tool, ActionPayload::new(Tools::TODO_LIST))
        .await
        .unwrap();
    drop(sender);

    let err = host.run().await.unwrap_err();
    assert!(matches!(err, HostError::Io(_)));
    assert!(host.client().session_id().is_none());
    assert!(server.registry().is_empty());

    server.stop().await;
}

#[tokio::test]
async fn host_fails_to_start_without_server() {
    let (_sender, listener) = ActionBridge::channel(1);
    let mut host = HostOrchestrator::new(
        McpClient::new("http://127.0.0.1:1/mcp"),
        listener,
        RecordingRenderer::default(),
    );
    let err = host.start().await.unwrap_err();
    assert!(matches!(err, HostError::Client(_)));
    assert!(host.renderer().documents.is_empty());
}
