//! Renders the todo list as a self-contained HTML artifact.
//!
//! The document is a pure function of the todo snapshot and the render
//! time. Each todo gets a set of elements keyed by its id so per-item
//! handlers can find them, and the script carries a JSON copy of the list
//! (`TODOS_DATA`) so an edit can be cancelled without a round trip.
//!
//! User interactions post ActionBridge messages to the embedding window:
//! `{type: "tool", messageId, payload: {toolName, id, text?, completed?}}`.

use chrono::{DateTime, Utc};
use todo_protocol::resource::TODO_LIST_URI;
use todo_protocol::{ArtifactEncoding, ArtifactMetadata, ResourceArtifact};

use crate::store::Todo;

const TITLE: &str = "📝 Todo List";
const RENDER_CONTEXT: &str = "main-panel";

/// Builds fresh artifacts with a fixed wire encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactBuilder {
    encoding: ArtifactEncoding,
}

impl ArtifactBuilder {
    pub fn new(encoding: ArtifactEncoding) -> Self {
        Self { encoding }
    }

    pub fn encoding(&self) -> ArtifactEncoding {
        self.encoding
    }

    pub fn build(&self, todos: &[Todo], description: &str) -> ResourceArtifact {
        self.build_at(todos, description, Utc::now())
    }

    /// Same as [`build`](Self::build) with an explicit render time.
    pub fn build_at(&self, todos: &[Todo], description: &str, now: DateTime<Utc>) -> ResourceArtifact {
        let html = render_html(todos, now);
        ResourceArtifact::from_html(
            TODO_LIST_URI,
            &html,
            self.encoding,
            ArtifactMetadata {
                title: TITLE.into(),
                description: description.into(),
                preferred_render_context: RENDER_CONTEXT.into(),
            },
        )
    }
}

pub fn render_html(todos: &[Todo], now: DateTime<Utc>) -> String {
    let completed = todos.iter().filter(|t| t.completed).count();

    let mut html = String::with_capacity(16 * 1024);
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<style>");
    html.push_str(STYLE);
    html.push_str("</style>\n</head>\n<body>\n<div class=\"container\">\n");

    html.push_str(
        "<div class=\"header\">\n<h1>📝 Todo Management</h1>\n\
         <p>Keep track of your tasks efficiently</p>\n</div>\n",
    );

    html.push_str(&format!(
        "<div class=\"stats\">\n\
         {}{}{}\
         </div>\n",
        stat(todos.len(), "Total Tasks"),
        stat(completed, "Completed"),
        stat(todos.len() - completed, "Pending"),
    ));

    html.push_str("<div class=\"todo-list\">\n");
    if todos.is_empty() {
        html.push_str(EMPTY_STATE);
    } else {
        for (index, todo) in todos.iter().enumerate() {
            html.push_str(&render_item(todo, index));
        }
    }
    html.push_str("</div>\n");

    html.push_str(&format!(
        "<div class=\"footer\">Rendered at {}</div>\n</div>\n",
        now.format("%d/%m/%Y %H:%M:%S")
    ));

    html.push_str("<script>\nconst TODOS_DATA = ");
    html.push_str(&embedded_data(todos));
    html.push_str(";\n");
    html.push_str(SCRIPT);
    html.push_str("</script>\n</body>\n</html>\n");
    html
}

fn stat(value: usize, label: &str) -> String {
    format!(
        "<div class=\"stat-item\"><div class=\"stat-number\">{value}</div>\
         <div class=\"stat-label\">{label}</div></div>\n"
    )
}

fn render_item(todo: &Todo, index: usize) -> String {
    let id = todo.id;
    let text = escape_html(&todo.text);
    let (class, toggle_label) = if todo.completed {
        ("todo-item completed", "↩️ Undo")
    } else {
        ("todo-item", "✔️ Done")
    };

    format!(
        r#"<div id="todo-item-{id}" class="{class}" style="animation-delay: {delay:.2}s">
  <div id="todo-text-{id}" class="todo-content">
    <span class="todo-id">#{id}</span>
    <div id="view-mode-{id}" class="todo-text">{text}</div>
    <div id="edit-mode-{id}" class="todo-content" style="display: none; flex: 1;">
      <input type="text" id="edit-input-{id}" value="{text}" class="todo-input" />
    </div>
  </div>
  <div class="todo-meta">
    <span class="todo-date">{created}</span>
    <div id="edit-actions-{id}" class="todo-actions" style="display: none;">
      <button class="btn btn-toggle" onclick="saveEdit({id})">✅ Save</button>
      <button class="btn btn-delete" onclick="cancelEdit({id})">❌ Cancel</button>
    </div>
    <div id="view-actions-{id}" class="todo-actions">
      <button class="btn btn-toggle" onclick="toggleTodo({id})">{toggle_label}</button>
      <button class="btn btn-edit" onclick="startEdit({id})">✏️ Edit</button>
      <button class="btn btn-delete" onclick="deleteTodo({id})">🗑️ Delete</button>
    </div>
  </div>
</div>
"#,
        delay = index as f64 * 0.05,
        created = todo.created_at.format("%d/%m/%Y %H:%M"),
    )
}

/// JSON copy of the list, safe to inline inside a `<script>` element.
fn embedded_data(todos: &[Todo]) -> String {
    serde_json::to_string(todos)
        .unwrap_or_else(|_| "[]".into())
        .replace('<', "\\u003c")
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            c => out.push(c),
        }
    }
    out
}

const EMPTY_STATE: &str = r#"<div id="empty-state" class="empty-state">
  <h3>No Todos Yet</h3>
  <p>Create your first todo to get started!</p>
</div>
"#;

const STYLE: &str = r#"
* { margin: 0; padding: 0; box-sizing: border-box; }
body {
  font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
  background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
}
.container { background: white; }
.header {
  background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
  color: white;
  padding: 30px;
  text-align: center;
}
.header h1 { font-size: 28px; font-weight: 700; margin-bottom: 8px; }
.header p { opacity: 0.9; font-size: 14px; }
.stats {
  display: flex;
  justify-content: space-around;
  padding: 20px;
  background: #f8f9fa;
  border-bottom: 2px solid #e9ecef;
}
.stat-item { text-align: center; }
.stat-number { font-size: 32px; font-weight: 700; color: #667eea; }
.stat-label {
  font-size: 11px;
  color: #6c757d;
  margin-top: 5px;
  text-transform: uppercase;
  letter-spacing: 0.5px;
  font-weight: 600;
}
.todo-list { padding: 20px; max-height: 600px; overflow-y: auto; }
.todo-item {
  border: 2px solid #e9ecef;
  border-radius: 12px;
  padding: 20px;
  margin-bottom: 15px;
  display: flex;
  align-items: center;
  justify-content: space-between;
  animation: fadeIn 0.3s ease;
}
.todo-item:hover { border-color: #667eea; box-shadow: 0 4px 12px rgba(102, 126, 234, 0.15); }
.todo-content { flex: 1; display: flex; align-items: center; gap: 15px; }
.todo-text { font-size: 16px; color: #212529; font-weight: 500; }
.todo-item.completed .todo-text { text-decoration: line-through; color: #6c757d; }
.todo-input {
  width: 100%;
  padding: 8px;
  border: 2px solid #667eea;
  border-radius: 8px;
  font-size: 16px;
}
.todo-meta { display: flex; flex-direction: column; align-items: flex-end; gap: 10px; }
.todo-id {
  font-size: 11px;
  color: #6c757d;
  background: #e9ecef;
  padding: 4px 10px;
  border-radius: 12px;
  font-weight: 700;
}
.todo-date { font-size: 12px; color: #6c757d; }
.todo-actions { display: flex; gap: 8px; }
.btn {
  padding: 10px 18px;
  border: none;
  border-radius: 8px;
  font-size: 13px;
  font-weight: 600;
  cursor: pointer;
  text-transform: uppercase;
  color: white;
}
.btn-toggle { background: #667eea; }
.btn-edit { background: #20c997; }
.btn-delete { background: #dc3545; }
.empty-state { text-align: center; padding: 60px 20px; color: #6c757d; }
.empty-state h3 { font-size: 24px; margin-bottom: 10px; color: #495057; }
.footer { padding: 12px 20px; font-size: 11px; color: #adb5bd; text-align: right; }
@keyframes fadeIn {
  from { opacity: 0; transform: translateY(10px); }
  to { opacity: 1; transform: translateY(0); }
}
"#;

const SCRIPT: &str = r#"
var sendSeq = 0;

function findTodo(id) {
  return TODOS_DATA.find(function (t) { return t.id === id; });
}

function sendToParent(type, payload) {
  sendSeq += 1;
  var messageId = 'msg-' + Date.now() + '-' + sendSeq;
  window.parent.postMessage({ type: type, messageId: messageId, payload: payload }, '*');
  return messageId;
}

function setMode(id, editing) {
  document.getElementById('view-mode-' + id).style.display = editing ? 'none' : 'block';
  document.getElementById('view-actions-' + id).style.display = editing ? 'none' : 'flex';
  document.getElementById('edit-mode-' + id).style.display = editing ? 'flex' : 'none';
  document.getElementById('edit-actions-' + id).style.display = editing ? 'flex' : 'none';
}

function startEdit(id) {
  if (!document.getElementById('todo-item-' + id)) return;
  setMode(id, true);
  var input = document.getElementById('edit-input-' + id);
  if (input) {
    input.focus();
    input.select();
  }
}

function cancelEdit(id) {
  var todo = findTodo(id);
  var input = document.getElementById('edit-input-' + id);
  if (input && todo) {
    input.value = todo.text;
  }
  setMode(id, false);
}

function saveEdit(id) {
  var input = document.getElementById('edit-input-' + id);
  var text = input ? input.value.trim() : '';
  sendToParent('tool', { toolName: 'todo_update', id: id, text: text });
}

function toggleTodo(id) {
  var todo = findTodo(id);
  if (!todo) return;
  sendToParent('tool', { toolName: 'todo_update', id: id, completed: !todo.completed });
}

function deleteTodo(id) {
  sendToParent('tool', { toolName: 'todo_delete', id: id });
}

document.addEventListener('keydown', function (e) {
  var target = e.target;
  if (!target || !target.id || target.id.indexOf('edit-input-') !== 0) return;
  var id = parseInt(target.id.slice('edit-input-'.length), 10);
  if (e.key === 'Enter') {
    e.preventDefault();
    saveEdit(id);
  } else if (e.key === 'Escape') {
    e.preventDefault();
    cancelEdit(id);
  }
});
"#;
