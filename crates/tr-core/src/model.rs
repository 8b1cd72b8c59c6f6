use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Fields for a user row the store has not assigned an id to yet.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
}

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: i64,
    pub name: String,
    pub image: String,
    pub is_favorite: bool,
    /// Denormalized counters. Maintained by callers via partial update;
    /// the core only zeroes them at creation.
    pub tasks_completed: i64,
    pub total_tasks: i64,
    pub user_id: i64,
}

/// A collection with its member todos eagerly loaded, flat.
///
/// Tree shaping applies only at the todo listing boundary, so collection
/// listings carry the raw rows.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionWithTodos {
    #[serde(flatten)]
    pub collection: Collection,
    pub todos: Vec<Todo>,
}

#[derive(Debug, Clone)]
pub struct NewCollection {
    pub name: String,
    pub image: String,
    pub is_favorite: bool,
    pub user_id: i64,
}

/// Partial update for a collection. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollectionPatch {
    pub name: Option<String>,
    pub image: Option<String>,
    pub is_favorite: Option<bool>,
    pub tasks_completed: Option<i64>,
    pub total_tasks: Option<i64>,
}

// ---------------------------------------------------------------------------
// Todo
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub due_date: Option<DateTime<Utc>>,
    pub user_id: i64,
    pub collection_id: i64,
    pub parent_todo_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTodo {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub user_id: i64,
    pub collection_id: i64,
    pub parent_todo_id: Option<i64>,
}

/// Partial update for a todo. `None` leaves the field unchanged.
///
/// Deliberately has no `parent_todo_id`: parents are immutable after creation,
/// which is what lets creation-time validation foreclose parent cycles.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TodoPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
    pub due_date: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Todo forest (derived read model)
// ---------------------------------------------------------------------------

/// One node of the derived todo tree: the record's own fields inline plus its
/// direct children, recursively nested. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TodoNode {
    #[serde(flatten)]
    pub todo: Todo,
    pub child_todos: Vec<TodoNode>,
}

impl TodoNode {
    /// Nodes in this subtree, counting every depth including self.
    pub fn subtree_len(&self) -> usize {
        1 + self
            .children()
            .iter()
            .map(TodoNode::subtree_len)
            .sum::<usize>()
    }

    pub fn children(&self) -> &[TodoNode] {
        &self.child_todos
    }
}
