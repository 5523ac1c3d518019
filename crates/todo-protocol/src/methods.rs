//! Method and tool name constants.
//!
//! Each method constant is the exact string sent over the wire as the
//! `method` field of a JSON-RPC request. Tool names are the `name` field of a
//! `tools/call` request.

/// All request method names, grouped by namespace.
pub struct Methods;

impl Methods {
    // ── Lifecycle ───────────────────────────────────────────────────────
    pub const INITIALIZE: &str = "initialize";
    pub const PING: &str = "ping";

    // ── Tools ───────────────────────────────────────────────────────────
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";

    // ── Resources ───────────────────────────────────────────────────────
    pub const RESOURCES_LIST: &str = "resources/list";
    pub const RESOURCES_READ: &str = "resources/read";
}

/// Tool names exposed by the todo service.
pub struct Tools;

impl Tools {
    pub const TODO_CREATE: &str = "todo_create";
    pub const TODO_LIST: &str = "todo_list";
    pub const TODO_UPDATE: &str = "todo_update";
    pub const TODO_DELETE: &str = "todo_delete";

    pub const ALL: [&str; 4] = [
        Self::TODO_CREATE,
        Self::TODO_LIST,
        Self::TODO_UPDATE,
        Self::TODO_DELETE,
    ];
}
