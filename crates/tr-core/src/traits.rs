use async_trait::async_trait;

use crate::error::TrResult;
use crate::model::*;

/// Storage backend for todos.
///
/// `update` applies the patch and refetches the row as one storage operation,
/// so a concurrent delete surfaces as `None` rather than a lost update.
#[async_trait]
pub trait TodoStore: Send + Sync {
    async fn insert(&self, new: &NewTodo) -> TrResult<Todo>;
    async fn get(&self, id: i64) -> TrResult<Option<Todo>>;
    async fn list_by_collection(&self, collection_id: i64) -> TrResult<Vec<Todo>>;
    async fn update(&self, id: i64, patch: &TodoPatch) -> TrResult<Option<Todo>>;
    async fn delete(&self, id: i64) -> TrResult<bool>;
}

fn _assert_todo_store_object_safe(_: &dyn TodoStore) {}

/// Storage backend for collections.
#[async_trait]
pub trait CollectionStore: Send + Sync {
    async fn insert(&self, new: &NewCollection) -> TrResult<Collection>;
    async fn get(&self, id: i64) -> TrResult<Option<Collection>>;
    async fn list_by_user(&self, user_id: i64) -> TrResult<Vec<Collection>>;
    async fn update(&self, id: i64, patch: &CollectionPatch) -> TrResult<Option<Collection>>;
    async fn delete(&self, id: i64) -> TrResult<bool>;
}

fn _assert_collection_store_object_safe(_: &dyn CollectionStore) {}

/// Storage backend for user accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, new: &NewUser) -> TrResult<User>;
    async fn get(&self, id: i64) -> TrResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> TrResult<Option<User>>;
}

fn _assert_user_store_object_safe(_: &dyn UserStore) {}
