//! Service-level functional tests.
//!
//! Exercises the todo store, the tool layer, artifact rendering, the MCP
//! router, and the host-side bridge in-process, without HTTP.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde_json::{Value, json};
use todo_protocol::{ArtifactEncoding, CallToolResult, McpErrorCode, RequestContext, Tools};
use todo_services::{ArtifactBuilder, TodoService, TodoStore};

fn svc() -> TodoService {
    TodoService::new(Arc::new(TodoStore::new()), ArtifactBuilder::default())
}

fn call(s: &TodoService, name: &str, args: Value) -> CallToolResult {
    s.call_tool(name, Some(args)).unwrap()
}

fn data(result: &CallToolResult) -> Value {
    let outcome = result.outcome().unwrap();
    assert!(outcome.success, "expected success, got {outcome:?}");
    outcome.data.unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

mod store {
    use todo_services::{TodoError, TodoPatch, TodoStore};

    #[test]
    fn ids_start_at_one_and_increase() {
        let store = TodoStore::new();
        let a = store.create("buy milk").unwrap();
        let b = store.create("pay rent").unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert!(!a.completed);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn ids_are_never_reused() {
        let store = TodoStore::new();
        store.create("a").unwrap();
        let b = store.create("b").unwrap();
        store.delete(b.id).unwrap();
        let c = store.create("c").unwrap();
        assert_eq!(c.id, 3);
    }

    #[test]
    fn list_preserves_creation_order() {
        let store = TodoStore::new();
        for text in ["first", "second", "third"] {
            store.create(text).unwrap();
        }
        store.delete(2).unwrap();
        let texts: Vec<_> = store.list().into_iter().map(|t| t.text).collect();
        assert_eq!(texts, vec!["first", "third"]);
    }

    #[test]
    fn empty_text_is_rejected() {
        let store = TodoStore::new();
        assert_eq!(store.create(""), Err(TodoError::EmptyText));
        assert!(store.is_empty());

        // Whitespace counts as text
        assert!(store.create("  ").is_ok());
    }

    #[test]
    fn partial_update_touches_only_given_fields() {
        let store = TodoStore::new();
        store.create("draft").unwrap();

        let done = store
            .update(1, TodoPatch { text: None, completed: Some(true) })
            .unwrap();
        assert_eq!(done.text, "draft");
        assert!(done.completed);

        let renamed = store
            .update(1, TodoPatch { text: Some("final".into()), completed: None })
            .unwrap();
        assert_eq!(renamed.text, "final");
        assert!(renamed.completed);
        assert_eq!(renamed.created_at, done.created_at);
    }

    #[test]
    fn missing_ids_leave_the_store_untouched() {
        let store = TodoStore::new();
        store.create("keep me").unwrap();
        let before = store.list();

        assert_eq!(store.update(9, TodoPatch::default()), Err(TodoError::NotFound(9)));
        assert_eq!(store.delete(9), Err(TodoError::NotFound(9)));
        assert_eq!(store.list(), before);
        assert_eq!(TodoError::NotFound(9).to_string(), "Todo with ID 9 not found");
    }

    #[test]
    fn delete_removes_exactly_one() {
        let store = TodoStore::new();
        store.create("a").unwrap();
        store.create("b").unwrap();
        let removed = store.delete(1).unwrap();
        assert_eq!(removed.text, "a");
        assert!(store.get(1).is_none());
        assert!(store.get(2).is_some());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Argument contracts
// ─────────────────────────────────────────────────────────────────────────────

mod schema {
    use serde_json::json;
    use todo_services::schema::parse_args;
    use todo_services::{CreateArgs, DeleteArgs, TodoError, UpdateArgs, tool_descriptors};

    #[test]
    fn missing_arguments_read_as_empty_object() {
        let err = parse_args::<DeleteArgs>(None).unwrap_err();
        assert!(matches!(err, TodoError::InvalidArguments(_)));
        let err = parse_args::<CreateArgs>(Some(json!(null))).unwrap_err();
        assert!(matches!(err, TodoError::InvalidArguments(_)));
    }

    #[test]
    fn ids_must_be_non_negative_integers() {
        for bad in [json!({"id": -1}), json!({"id": "1"}), json!({"id": 1.5})] {
            assert!(parse_args::<DeleteArgs>(Some(bad.clone())).is_err(), "args: {bad}");
        }
        let ok: UpdateArgs = parse_args(Some(json!({"id": 0, "completed": true}))).unwrap();
        assert_eq!(ok.id, 0);
        assert_eq!(ok.patch().completed, Some(true));
        assert_eq!(ok.patch().text, None);
    }

    #[test]
    fn create_validation_rejects_empty_text() {
        let args: CreateArgs = parse_args(Some(json!({"text": ""}))).unwrap();
        assert_eq!(args.validate().unwrap_err(), TodoError::EmptyText);
    }

    #[test]
    fn descriptors_cover_all_tools_in_order() {
        let tools = tool_descriptors();
        let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, todo_protocol::Tools::ALL);
        assert_eq!(tools[0].input_schema["properties"]["text"]["minLength"], 1);
        assert_eq!(tools[2].input_schema["required"], json!(["id"]));
        assert_eq!(tools[3].input_schema["properties"]["id"]["type"], "integer");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool layer
// ─────────────────────────────────────────────────────────────────────────────

mod tools {
    use super::*;

    #[test]
    fn create_returns_todo_and_fresh_artifact() {
        let s = svc();
        let result = call(&s, Tools::TODO_CREATE, json!({"text": "buy milk"}));
        assert!(!result.is_error);

        let todo = data(&result);
        assert_eq!(todo["id"], 1);
        assert_eq!(todo["text"], "buy milk");
        assert_eq!(todo["completed"], false);
        assert!(todo["createdAt"].is_i64());

        let artifact = result.artifact().unwrap();
        assert_eq!(artifact.uri, "ui://todo/list");
        assert_eq!(artifact.metadata.description, "Your updated todo list");
        assert!(artifact.html().unwrap().contains("buy milk"));
    }

    #[test]
    fn list_returns_all_todos() {
        let s = svc();
        call(&s, Tools::TODO_CREATE, json!({"text": "a"}));
        call(&s, Tools::TODO_CREATE, json!({"text": "b"}));

        let result = call(&s, Tools::TODO_LIST, json!({}));
        let todos = data(&result);
        assert_eq!(todos.as_array().unwrap().len(), 2);
        assert_eq!(todos[1]["text"], "b");
        assert_eq!(
            result.artifact().unwrap().metadata.description,
            "All your todos in one place"
        );

        // No arguments at all is fine for list
        assert!(!s.call_tool(Tools::TODO_LIST, None).unwrap().is_error);
    }

    #[test]
    fn update_and_delete_describe_their_artifacts() {
        let s = svc();
        call(&s, Tools::TODO_CREATE, json!({"text": "a"}));

        let updated = call(&s, Tools::TODO_UPDATE, json!({"id": 1, "completed": true}));
        assert_eq!(data(&updated)["completed"], true);
        assert_eq!(updated.artifact().unwrap().metadata.description, "Updated todo list");

        let deleted = call(&s, Tools::TODO_DELETE, json!({"id": 1}));
        assert_eq!(data(&deleted)["text"], "a");
        assert_eq!(
            deleted.artifact().unwrap().metadata.description,
            "Updated todo list after deletion"
        );
        assert!(s.store().is_empty());
    }

    #[test]
    fn business_failures_are_error_results_without_artifact() {
        let s = svc();
        call(&s, Tools::TODO_CREATE, json!({"text": "a"}));
        call(&s, Tools::TODO_CREATE, json!({"text": "b"}));
        call(&s, Tools::TODO_DELETE, json!({"id": 2}));

        let again = call(&s, Tools::TODO_DELETE, json!({"id": 2}));
        assert!(again.is_error);
        assert!(again.artifact().is_none());
        assert_eq!(again.failure_message(), "Todo with ID 2 not found");
        assert_eq!(s.store().len(), 1);

        let empty = call(&s, Tools::TODO_CREATE, json!({"text": ""}));
        assert!(empty.is_error);
        assert_eq!(empty.failure_message(), "Todo text must not be empty");

        let bad_args = call(&s, Tools::TODO_UPDATE, json!({"text": "no id"}));
        assert!(bad_args.is_error);
        assert!(bad_args.failure_message().starts_with("Invalid arguments"));
    }

    #[test]
    fn update_allows_empty_text() {
        let s = svc();
        call(&s, Tools::TODO_CREATE, json!({"text": "a"}));
        let result = call(&s, Tools::TODO_UPDATE, json!({"id": 1, "text": ""}));
        assert!(!result.is_error);
        assert_eq!(data(&result)["text"], "");
    }

    #[test]
    fn unknown_tool_is_a_protocol_error() {
        let s = svc();
        let err = s.call_tool("todo_archive", Some(json!({}))).unwrap_err();
        assert_eq!(err.error_code(), McpErrorCode::InvalidParams);
        assert!(err.message.contains("todo_archive"));
    }

    #[test]
    fn mutations_notify_and_reads_do_not() {
        use tokio::sync::broadcast;
        use todo_server::broadcast_notifier;

        let s = svc();
        let (tx, mut rx) = broadcast::channel(16);
        s.set_notify_sender(broadcast_notifier(tx));

        call(&s, Tools::TODO_LIST, json!({}));
        assert!(rx.try_recv().is_err());

        call(&s, Tools::TODO_CREATE, json!({"text": "a"}));
        let raw = rx.try_recv().unwrap();
        let notification: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(notification["method"], "notifications/resources/updated");
        assert_eq!(notification["params"]["uri"], "ui://todo/list");

        call(&s, Tools::TODO_DELETE, json!({"id": 42}));
        assert!(rx.try_recv().is_err());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Artifact rendering
// ─────────────────────────────────────────────────────────────────────────────

mod artifact {
    use super::*;
    use todo_services::artifact::{escape_html, render_html};
    use todo_services::store::Todo;

    fn todo(id: u64, text: &str, completed: bool) -> Todo {
        Todo {
            id,
            text: text.into(),
            completed,
            created_at: Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap(),
        }
    }

    #[test]
    fn every_item_gets_its_own_regions() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 15, 0, 0).unwrap();
        let html = render_html(&[todo(1, "a", false), todo(7, "b", true)], now);
        for id in [1, 7] {
            for region in [
                "todo-item", "todo-text", "view-mode", "edit-mode", "edit-input",
                "edit-actions", "view-actions",
            ] {
                assert!(html.contains(&format!("id=\"{region}-{id}\"")), "{region}-{id}");
            }
            assert!(html.contains(&format!("toggleTodo({id})")));
            assert!(html.contains(&format!("deleteTodo({id})")));
        }
        assert!(html.contains("todo-item completed"));
        assert!(!html.contains("empty-state\" class"));
        assert!(html.contains("09/03/2024 14:05"));
        assert!(html.contains("Rendered at 09/03/2024 15:00:00"));
    }

    #[test]
    fn stats_count_completed_and_pending() {
        let now = Utc::now();
        let html = render_html(
            &[todo(1, "a", true), todo(2, "b", false), todo(3, "c", false)],
            now,
        );
        let stat = |n: usize, label: &str| {
            format!("<div class=\"stat-number\">{n}</div><div class=\"stat-label\">{label}</div>")
        };
        assert!(html.contains(&stat(3, "Total Tasks")));
        assert!(html.contains(&stat(1, "Completed")));
        assert!(html.contains(&stat(2, "Pending")));
    }

    #[test]
    fn empty_list_renders_empty_state() {
        let html = render_html(&[], Utc::now());
        assert!(html.contains("id=\"empty-state\""));
        assert!(!html.contains("id=\"todo-item-"));
        assert!(html.contains("const TODOS_DATA = [];"));
    }

    #[test]
    fn user_text_is_escaped_everywhere() {
        let hostile = r#"<script>alert("x")</script> & 'q'"#;
        let html = render_html(&[todo(1, hostile, false)], Utc::now());

        assert!(!html.contains("<script>alert"));
        assert!(html.contains("&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt; &amp; &#039;q&#039;"));
        assert!(html.contains(r#"\u003cscript>alert(\"x\")\u003c/script>"#));
        assert_eq!(escape_html("a<b>&\"'"), "a&lt;b&gt;&amp;&quot;&#039;");
    }

    #[test]
    fn script_embeds_data_and_posts_actions() {
        let html = render_html(&[todo(1, "a", false)], Utc::now());
        assert!(html.contains("const TODOS_DATA = [{\"id\":1,\"text\":\"a\",\"completed\":false"));
        assert!(html.contains("function sendToParent"));
        assert!(html.contains("toolName: 'todo_update'"));
        assert!(html.contains("toolName: 'todo_delete'"));
    }

    #[test]
    fn rendering_is_deterministic_for_a_fixed_clock() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let todos = [todo(1, "a", false)];
        let builder = ArtifactBuilder::new(ArtifactEncoding::Text);
        assert_eq!(
            builder.build_at(&todos, "d", now),
            builder.build_at(&todos, "d", now)
        );
    }

    #[test]
    fn blob_encoding_decodes_to_the_same_document() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let todos = [todo(1, "café ✓", false)];
        let text = ArtifactBuilder::new(ArtifactEncoding::Text).build_at(&todos, "d", now);
        let blob = ArtifactBuilder::new(ArtifactEncoding::Blob).build_at(&todos, "d", now);

        assert_eq!(blob.encoding, ArtifactEncoding::Blob);
        assert_ne!(blob.content, text.content);
        assert_eq!(blob.html().unwrap(), text.html().unwrap());
        assert_eq!(blob.metadata.title, "📝 Todo List");
        assert_eq!(blob.metadata.preferred_render_context, "main-panel");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MCP router
// ─────────────────────────────────────────────────────────────────────────────

mod router {
    use super::*;
    use todo_server::{McpServer, SERVER_NAME};
    use todo_transport::RequestHandler;

    fn ctx() -> RequestContext {
        RequestContext::for_session("test-session")
    }

    fn init_params() -> Value {
        json!({
            "protocolVersion": "2025-03-26",
            "capabilities": {},
            "clientInfo": {"name": "test-client", "version": "1.0"}
        })
    }

    async fn running() -> McpServer {
        let mut server = McpServer::new("0.1.0");
        server.register_service(svc());
        server.initialize().await.unwrap();
        server
    }

    #[tokio::test]
    async fn rejects_requests_before_startup() {
        let mut server = McpServer::new("0.1.0");
        server.register_service(svc());
        let err = server
            .handle_request("tools/list", None, ctx())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), McpErrorCode::ServerNotInitialized);
    }

    #[tokio::test]
    async fn initialize_reports_identity_and_capabilities() {
        let server = running().await;
        let result = server
            .handle_request("initialize", Some(init_params()), ctx())
            .await
            .unwrap();
        assert_eq!(result["protocolVersion"], "2025-03-26");
        assert_eq!(result["serverInfo"]["name"], SERVER_NAME);
        assert_eq!(result["serverInfo"]["version"], "0.1.0");
        assert!(result["capabilities"]["tools"].is_object());
        assert!(result["capabilities"]["resources"].is_object());
    }

    #[tokio::test]
    async fn initialize_requires_client_info() {
        let server = running().await;
        let err = server
            .handle_request("initialize", Some(json!({"protocolVersion": "2025-03-26"})), ctx())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), McpErrorCode::InvalidParams);
    }

    #[tokio::test]
    async fn ping_and_tools_list() {
        let server = running().await;
        assert_eq!(server.handle_request("ping", None, ctx()).await.unwrap(), json!({}));

        let list = server.handle_request("tools/list", None, ctx()).await.unwrap();
        let names: Vec<_> = list["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, Tools::ALL);
        assert!(list["tools"][0]["inputSchema"].is_object());
    }

    #[tokio::test]
    async fn tools_call_routes_by_name() {
        let server = running().await;
        let result = server
            .handle_request(
                "tools/call",
                Some(json!({"name": "todo_create", "arguments": {"text": "buy milk"}})),
                ctx(),
            )
            .await
            .unwrap();
        let parsed: CallToolResult = serde_json::from_value(result).unwrap();
        assert_eq!(data(&parsed)["text"], "buy milk");
        assert!(parsed.artifact().is_some());
    }

    #[tokio::test]
    async fn tools_call_with_unknown_tool_is_invalid_params() {
        let server = running().await;
        let err = server
            .handle_request("tools/call", Some(json!({"name": "rm_rf", "arguments": {}})), ctx())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), McpErrorCode::InvalidParams);

        let err = server
            .handle_request("tools/call", Some(json!({"arguments": {}})), ctx())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), McpErrorCode::InvalidParams);
    }

    #[tokio::test]
    async fn resources_are_served_by_the_todo_service() {
        let server = running().await;
        let list = server.handle_request("resources/list", None, ctx()).await.unwrap();
        assert_eq!(list["resources"][0]["uri"], "ui://todo/list");

        let read = server
            .handle_request("resources/read", Some(json!({"uri": "ui://todo/list"})), ctx())
            .await
            .unwrap();
        assert_eq!(read["contents"][0]["mimeType"], "text/html");
        assert!(read["contents"][0]["text"].as_str().unwrap().contains("id=\"empty-state\""));

        let err = server
            .handle_request("resources/read", Some(json!({"uri": "ui://other"})), ctx())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), McpErrorCode::InvalidParams);
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let server = running().await;
        let err = server
            .handle_request("prompts/list", None, ctx())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), McpErrorCode::MethodNotFound);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Host-side bridge
// ─────────────────────────────────────────────────────────────────────────────

mod bridge {
    use serde_json::json;
    use todo_bridge::{ActionBridge, to_tool_call};
    use todo_protocol::{ActionKind, ActionPayload, Tools};

    #[tokio::test]
    async fn listener_drops_foreign_traffic() {
        let (sender, mut listener) = ActionBridge::channel(8);
        sender.post(json!({"source": "devtools", "payload": {}})).await.unwrap();
        sender
            .post(json!({"type": "tool", "payload": {"toolName": "todo_list"}}))
            .await
            .unwrap();
        let id = sender
            .send(ActionKind::Tool, ActionPayload::new(Tools::TODO_DELETE).with_id(2))
            .await
            .unwrap();
        drop(sender);

        let message = listener.recv().await.unwrap();
        assert_eq!(message.message_id, id);
        assert_eq!(message.payload.id, Some(2));
        assert_eq!(listener.discarded(), 2);
        assert!(listener.recv().await.is_none());
    }

    #[tokio::test]
    async fn each_send_mints_a_new_message_id() {
        let (sender, _listener) = ActionBridge::channel(8);
        let a = sender.send(ActionKind::Tool, ActionPayload::new(Tools::TODO_LIST)).await.unwrap();
        let b = sender.send(ActionKind::Tool, ActionPayload::new(Tools::TODO_LIST)).await.unwrap();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("msg-"));
    }

    #[test]
    fn actions_map_onto_tool_calls() {
        let (name, args) =
            to_tool_call(&ActionPayload::new(Tools::TODO_CREATE).with_text("x")).unwrap();
        assert_eq!((name, args), (Tools::TODO_CREATE, json!({"text": "x"})));

        let (name, args) = to_tool_call(
            &ActionPayload::new(Tools::TODO_UPDATE).with_id(4).with_completed(false),
        )
        .unwrap();
        assert_eq!((name, args), (Tools::TODO_UPDATE, json!({"id": 4, "completed": false})));

        let (name, args) = to_tool_call(&ActionPayload::new(Tools::TODO_DELETE).with_id(1)).unwrap();
        assert_eq!((name, args), (Tools::TODO_DELETE, json!({"id": 1})));

        let (name, args) = to_tool_call(&ActionPayload::new(Tools::TODO_LIST)).unwrap();
        assert_eq!((name, args), (Tools::TODO_LIST, json!({})));
    }

    #[test]
    fn incomplete_or_unknown_actions_are_rejected() {
        assert!(to_tool_call(&ActionPayload::new(Tools::TODO_CREATE)).is_err());
        assert!(to_tool_call(&ActionPayload::new(Tools::TODO_UPDATE).with_text("x")).is_err());
        assert!(to_tool_call(&ActionPayload::new(Tools::TODO_DELETE)).is_err());
        assert_eq!(
            to_tool_call(&ActionPayload::new("todo_archive")).unwrap_err(),
            "Unknown operation: todo_archive"
        );
    }
}
