//! Shared in-memory todo store.
//!
//! One store is shared by every session. All access goes through a single
//! mutex, so mutations are serialized and ids follow insertion order.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// A todo item as stored and as sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: u64,
    pub text: String,
    pub completed: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// Partial update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoPatch {
    pub text: Option<String>,
    pub completed: Option<bool>,
}

/// Business-level failures. These are reported inside successful tool
/// results, never as transport errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TodoError {
    #[error("Todo text must not be empty")]
    EmptyText,

    #[error("Todo with ID {0} not found")]
    NotFound(u64),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}

struct Inner {
    todos: Vec<Todo>,
    next_id: u64,
}

pub struct TodoStore {
    inner: Mutex<Inner>,
}

impl Default for TodoStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TodoStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                todos: Vec::new(),
                next_id: 1,
            }),
        }
    }

    /// Append a new todo with the next id. Ids are never reused.
    pub fn create(&self, text: impl Into<String>) -> Result<Todo, TodoError> {
        let text = text.into();
        if text.is_empty() {
            return Err(TodoError::EmptyText);
        }

        let mut inner = self.inner.lock();
        let todo = Todo {
            id: inner.next_id,
            text,
            completed: false,
            created_at: Utc::now(),
        };
        inner.next_id += 1;
        inner.todos.push(todo.clone());
        debug!("Created todo #{}", todo.id);
        Ok(todo)
    }

    /// Snapshot of all todos in creation order.
    pub fn list(&self) -> Vec<Todo> {
        self.inner.lock().todos.clone()
    }

    pub fn get(&self, id: u64) -> Option<Todo> {
        self.inner.lock().todos.iter().find(|t| t.id == id).cloned()
    }

    pub fn update(&self, id: u64, patch: TodoPatch) -> Result<Todo, TodoError> {
        let mut inner = self.inner.lock();
        let todo = inner
            .todos
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(TodoError::NotFound(id))?;

        if let Some(text) = patch.text {
            todo.text = text;
        }
        if let Some(completed) = patch.completed {
            todo.completed = completed;
        }
        debug!("Updated todo #{id}");
        Ok(todo.clone())
    }

    /// Remove exactly the todo with `id` and return it.
    pub fn delete(&self, id: u64) -> Result<Todo, TodoError> {
        let mut inner = self.inner.lock();
        let index = inner
            .todos
            .iter()
            .position(|t| t.id == id)
            .ok_or(TodoError::NotFound(id))?;
        let removed = inner.todos.remove(index);
        debug!("Deleted todo #{id}");
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().todos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().todos.is_empty()
    }
}
