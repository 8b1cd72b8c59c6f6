use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrError {
    #[error("todo not found: {0}")]
    TodoNotFound(i64),

    #[error("parent todo not found: {0}")]
    ParentNotFound(i64),

    #[error("collection not found: {0}")]
    CollectionNotFound(i64),

    #[error("user not found: {0}")]
    UserNotFound(i64),

    #[error("parent todo {parent_id} belongs to collection {parent_collection_id}, not {collection_id}")]
    CrossCollectionParent {
        parent_id: i64,
        parent_collection_id: i64,
        collection_id: i64,
    },

    #[error("email already registered: {0}")]
    DuplicateEmail(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("auth error: {0}")]
    Auth(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type TrResult<T> = Result<T, TrError>;
