use std::path::PathBuf;
use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use tr_core::*;
use tr_storage::SqliteStore;

use crate::config::EngineConfig;
use crate::tree::build_forest;

/// Fields accepted when creating a todo. `user_id` is never part of this:
/// it always comes from the authenticated caller.
#[derive(Debug, Clone, Deserialize)]
pub struct TodoDraft {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    pub collection_id: i64,
    #[serde(default)]
    pub parent_todo_id: Option<i64>,
}

/// Fields accepted when creating a collection.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionDraft {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub is_favorite: bool,
}

/// The Trellis engine. Owns the store and enforces the write-side rules
/// the schema alone cannot: parent placement, ownership, and account
/// uniqueness.
pub struct TrellisEngine {
    pub store: Arc<SqliteStore>,
    pub config: EngineConfig,
}

impl TrellisEngine {
    /// Initialize the engine from configuration, creating the data
    /// directory and database as needed.
    pub fn init(config: EngineConfig) -> TrResult<Self> {
        let data_dir = PathBuf::from(&config.data_dir);
        std::fs::create_dir_all(&data_dir)
            .map_err(|e| TrError::Storage(format!("create data dir: {e}")))?;

        let db_path = data_dir.join("trellis.sqlite");
        let store = Arc::new(SqliteStore::open(&db_path)?);
        tracing::info!(path = %db_path.display(), "engine initialized");

        Ok(Self { store, config })
    }

    /// In-memory engine for tests. The database vanishes on drop.
    pub fn init_in_memory() -> TrResult<Self> {
        Ok(Self {
            store: Arc::new(SqliteStore::open_in_memory()?),
            config: EngineConfig {
                data_dir: ":memory:".into(),
            },
        })
    }

    // -- accounts -----------------------------------------------------------

    pub async fn register_user(&self, email: &str, password: &str) -> TrResult<User> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(TrError::InvalidInput("a valid email is required".into()));
        }
        if password.is_empty() {
            return Err(TrError::InvalidInput("password must not be empty".into()));
        }

        // Friendly conflict check first; the unique index remains the
        // backstop under concurrent registration.
        if UserStore::find_by_email(&*self.store, email).await?.is_some() {
            return Err(TrError::DuplicateEmail(email.to_string()));
        }

        let user = UserStore::insert(
            &*self.store,
            &NewUser {
                email: email.to_string(),
                password_hash: hash_password(password)?,
            },
        )
        .await?;
        tracing::info!(user_id = user.id, "user registered");
        Ok(user)
    }

    /// Check an email/password pair. Unknown email and wrong password
    /// collapse into the same error so callers cannot probe for accounts.
    pub async fn verify_credentials(&self, email: &str, password: &str) -> TrResult<User> {
        let user = UserStore::find_by_email(&*self.store, email.trim())
            .await?
            .ok_or(TrError::InvalidCredentials)?;
        if !verify_password(password, &user.password_hash) {
            return Err(TrError::InvalidCredentials);
        }
        Ok(user)
    }

    pub async fn get_user(&self, id: i64) -> TrResult<User> {
        UserStore::get(&*self.store, id)
            .await?
            .ok_or(TrError::UserNotFound(id))
    }

    // -- collections --------------------------------------------------------

    pub async fn create_collection(
        &self,
        user_id: i64,
        draft: CollectionDraft,
    ) -> TrResult<Collection> {
        if draft.name.trim().is_empty() {
            return Err(TrError::InvalidInput(
                "collection name must not be empty".into(),
            ));
        }
        if draft.image.trim().is_empty() {
            return Err(TrError::InvalidInput(
                "collection image must not be empty".into(),
            ));
        }
        CollectionStore::insert(
            &*self.store,
            &NewCollection {
                name: draft.name,
                image: draft.image,
                is_favorite: draft.is_favorite,
                user_id,
            },
        )
        .await
    }

    /// All collections owned by a user, each carrying its flat todo rows.
    pub async fn list_collections(&self, user_id: i64) -> TrResult<Vec<CollectionWithTodos>> {
        let collections = self.store.list_by_user(user_id).await?;
        let mut out = Vec::with_capacity(collections.len());
        for collection in collections {
            let todos = self.store.list_by_collection(collection.id).await?;
            out.push(CollectionWithTodos { collection, todos });
        }
        Ok(out)
    }

    pub async fn get_collection(&self, id: i64) -> TrResult<CollectionWithTodos> {
        let collection = CollectionStore::get(&*self.store, id)
            .await?
            .ok_or(TrError::CollectionNotFound(id))?;
        let todos = self.store.list_by_collection(collection.id).await?;
        Ok(CollectionWithTodos { collection, todos })
    }

    pub async fn update_collection(
        &self,
        user_id: i64,
        id: i64,
        patch: &CollectionPatch,
    ) -> TrResult<Option<Collection>> {
        let Some(existing) = CollectionStore::get(&*self.store, id).await? else {
            return Ok(None);
        };
        if existing.user_id != user_id {
            return Err(TrError::AccessDenied(format!(
                "collection {id} belongs to another user"
            )));
        }
        CollectionStore::update(&*self.store, id, patch).await
    }

    /// Idempotent: deleting an absent collection reports `false`. Todo rows
    /// under the collection go with it via the schema's cascade.
    pub async fn delete_collection(&self, user_id: i64, id: i64) -> TrResult<bool> {
        let Some(existing) = CollectionStore::get(&*self.store, id).await? else {
            return Ok(false);
        };
        if existing.user_id != user_id {
            return Err(TrError::AccessDenied(format!(
                "collection {id} belongs to another user"
            )));
        }
        CollectionStore::delete(&*self.store, id).await
    }

    // -- todos --------------------------------------------------------------

    /// Create a todo after validating its placement. A parent must exist and
    /// live in the same collection as its child; parents never change after
    /// creation, so this check is what keeps parent links acyclic.
    pub async fn create_todo(&self, user_id: i64, draft: TodoDraft) -> TrResult<Todo> {
        if draft.title.trim().is_empty() {
            return Err(TrError::InvalidInput("todo title must not be empty".into()));
        }

        let collection = CollectionStore::get(&*self.store, draft.collection_id)
            .await?
            .ok_or(TrError::CollectionNotFound(draft.collection_id))?;
        if collection.user_id != user_id {
            return Err(TrError::AccessDenied(format!(
                "collection {} belongs to another user",
                collection.id
            )));
        }

        if let Some(parent_id) = draft.parent_todo_id {
            let parent = TodoStore::get(&*self.store, parent_id)
                .await?
                .ok_or(TrError::ParentNotFound(parent_id))?;
            if parent.collection_id != draft.collection_id {
                return Err(TrError::CrossCollectionParent {
                    parent_id,
                    parent_collection_id: parent.collection_id,
                    collection_id: draft.collection_id,
                });
            }
        }

        TodoStore::insert(
            &*self.store,
            &NewTodo {
                title: draft.title,
                description: draft.description,
                due_date: draft.due_date,
                user_id,
                collection_id: draft.collection_id,
                parent_todo_id: draft.parent_todo_id,
            },
        )
        .await
    }

    pub async fn get_todo(&self, id: i64) -> TrResult<Todo> {
        TodoStore::get(&*self.store, id)
            .await?
            .ok_or(TrError::TodoNotFound(id))
    }

    /// The nested todo forest for one collection. A collection with no todos
    /// (or an unknown id) yields an empty forest, never an error.
    pub async fn list_todos(&self, collection_id: i64) -> TrResult<Vec<TodoNode>> {
        let todos = self.store.list_by_collection(collection_id).await?;
        Ok(build_forest(todos))
    }

    pub async fn update_todo(
        &self,
        user_id: i64,
        id: i64,
        patch: &TodoPatch,
    ) -> TrResult<Option<Todo>> {
        let Some(existing) = TodoStore::get(&*self.store, id).await? else {
            return Ok(None);
        };
        if existing.user_id != user_id {
            return Err(TrError::AccessDenied(format!(
                "todo {id} belongs to another user"
            )));
        }
        TodoStore::update(&*self.store, id, patch).await
    }

    /// Idempotent delete. Descendants cascade at the schema level.
    pub async fn delete_todo(&self, user_id: i64, id: i64) -> TrResult<bool> {
        let Some(existing) = TodoStore::get(&*self.store, id).await? else {
            return Ok(false);
        };
        if existing.user_id != user_id {
            return Err(TrError::AccessDenied(format!(
                "todo {id} belongs to another user"
            )));
        }
        TodoStore::delete(&*self.store, id).await
    }
}

fn hash_password(password: &str) -> TrResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| TrError::Auth(format!("password hashing failed: {e}")))
}

fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}
