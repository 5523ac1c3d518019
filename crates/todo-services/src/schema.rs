//! Typed argument contracts for the todo tools.
//!
//! Arguments are deserialized into these structs before the store is
//! touched. The JSON Schemas advertised by `tools/list` describe the same
//! shapes.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use todo_protocol::{Tool, Tools};

use crate::store::{TodoError, TodoPatch};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateArgs {
    pub text: String,
}

impl CreateArgs {
    pub fn validate(self) -> Result<Self, TodoError> {
        if self.text.is_empty() {
            return Err(TodoError::EmptyText);
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateArgs {
    pub id: u64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
}

impl UpdateArgs {
    pub fn patch(&self) -> TodoPatch {
        TodoPatch {
            text: self.text.clone(),
            completed: self.completed,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteArgs {
    pub id: u64,
}

/// Deserialize tool arguments. Missing or `null` arguments read as `{}`.
pub fn parse_args<T: DeserializeOwned>(arguments: Option<Value>) -> Result<T, TodoError> {
    let value = match arguments {
        None | Some(Value::Null) => Value::Object(Default::default()),
        Some(v) => v,
    };
    serde_json::from_value(value).map_err(|e| TodoError::InvalidArguments(e.to_string()))
}

/// The static tool set, in the order `tools/list` reports it.
pub fn tool_descriptors() -> Vec<Tool> {
    vec![
        Tool {
            name: Tools::TODO_CREATE.into(),
            description: "Create a new todo item".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "text": {
                        "type": "string",
                        "minLength": 1,
                        "description": "The todo text/description"
                    }
                },
                "required": ["text"]
            }),
        },
        Tool {
            name: Tools::TODO_LIST.into(),
            description: "List all todos".into(),
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
        Tool {
            name: Tools::TODO_UPDATE.into(),
            description: "Update an existing todo's text or completion status by ID".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "id": {
                        "type": "integer",
                        "minimum": 0,
                        "description": "The ID of the todo to update"
                    },
                    "text": {
                        "type": "string",
                        "description": "New text for the todo"
                    },
                    "completed": {
                        "type": "boolean",
                        "description": "New completion status"
                    }
                },
                "required": ["id"]
            }),
        },
        Tool {
            name: Tools::TODO_DELETE.into(),
            description: "Delete a todo item by ID".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "id": {
                        "type": "integer",
                        "minimum": 0,
                        "description": "The ID of the todo to delete"
                    }
                },
                "required": ["id"]
            }),
        },
    ]
}
