use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use tr_core::*;

/// Default number of connections in the pool.
/// SQLite WAL mode supports 1 writer + N readers, so even a small pool
/// eliminates head-of-line blocking for concurrent read queries.
const DEFAULT_POOL_SIZE: usize = 4;

static MEMDB_SEQ: AtomicU64 = AtomicU64::new(0);

/// Row counts for diagnostics (`trellis db stats`).
#[derive(Debug, Clone, Copy)]
pub struct StoreStats {
    pub users: u64,
    pub collections: u64,
    pub todos: u64,
}

/// SQLite-backed implementation of all three store traits.
pub struct SqliteStore {
    /// Connection pool, round-robin across `DEFAULT_POOL_SIZE` connections.
    /// Each connection is independently protected by a Mutex so callers can
    /// run synchronous rusqlite operations without holding an async lock.
    pool: Vec<Mutex<Connection>>,
    next_slot: AtomicUsize,
}

impl SqliteStore {
    /// Execute a synchronous closure with a pooled database connection.
    ///
    /// Picks the next connection via round-robin, locks it, runs the
    /// closure, then releases. Because the closure is `FnOnce` (not async),
    /// the `MutexGuard` is guaranteed to drop before any `.await`, keeping
    /// the enclosing future `Send`.
    fn with_conn<F, T>(&self, f: F) -> TrResult<T>
    where
        F: FnOnce(&Connection) -> TrResult<T>,
    {
        let idx = self.next_slot.fetch_add(1, Ordering::Relaxed) % self.pool.len();
        let conn = self.pool[idx]
            .lock()
            .map_err(|e| TrError::Storage(e.to_string()))?;
        f(&conn)
    }

    fn open_connection(path: &Path) -> TrResult<Connection> {
        let conn = Connection::open(path)
            .map_err(|e| TrError::Storage(format!("failed to open sqlite: {e}")))?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;",
        )
        .map_err(|e| TrError::Storage(format!("pragma error: {e}")))?;

        Ok(conn)
    }

    pub fn open(path: &Path) -> TrResult<Self> {
        let mut pool = Vec::with_capacity(DEFAULT_POOL_SIZE);
        for _ in 0..DEFAULT_POOL_SIZE {
            pool.push(Mutex::new(Self::open_connection(path)?));
        }

        let store = Self {
            pool,
            next_slot: AtomicUsize::new(0),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn open_in_memory() -> TrResult<Self> {
        // In-memory DBs: use a shared cache URI so all pool connections see
        // the same data. Without this, each Connection::open_in_memory()
        // gets its own isolated database.
        let uri = format!(
            "file:trellis-memdb-{}?mode=memory&cache=shared",
            MEMDB_SEQ.fetch_add(1, Ordering::Relaxed)
        );
        let flags = rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
            | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
            | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX
            | rusqlite::OpenFlags::SQLITE_OPEN_URI;
        let mut pool = Vec::with_capacity(DEFAULT_POOL_SIZE);
        for _ in 0..DEFAULT_POOL_SIZE {
            let conn = Connection::open_with_flags(&uri, flags)
                .map_err(|e| TrError::Storage(format!("failed to open in-memory sqlite: {e}")))?;
            conn.execute_batch("PRAGMA foreign_keys=ON;")
                .map_err(|e| TrError::Storage(format!("pragma error: {e}")))?;
            pool.push(Mutex::new(conn));
        }

        let store = Self {
            pool,
            next_slot: AtomicUsize::new(0),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> TrResult<()> {
        // Migrations run on slot 0 only, they need exclusive access.
        let conn = self.pool[0]
            .lock()
            .map_err(|e| TrError::Storage(e.to_string()))?;

        // Table-driven migration registry.
        const MIGRATIONS: &[(i64, &str)] =
            &[(1, include_str!("../../../migrations/001_initial.sql"))];

        // Migration 001 must always run first to create schema_version.
        conn.execute_batch(MIGRATIONS[0].1)
            .map_err(|e| TrError::Migration(format!("migration 001 failed: {e}")))?;

        let max_version: i64 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        for &(version, sql) in &MIGRATIONS[1..] {
            if version <= max_version {
                continue;
            }
            conn.execute_batch(sql)
                .map_err(|e| TrError::Migration(format!("migration {version:03} failed: {e}")))?;
        }

        tracing::debug!(
            applied_up_to = MIGRATIONS.last().map(|(v, _)| *v).unwrap_or(0),
            "migrations complete"
        );

        Ok(())
    }

    pub fn stats(&self) -> TrResult<StoreStats> {
        self.with_conn(|conn| {
            let count = |table: &str| -> TrResult<u64> {
                conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get(0)
                })
                .map_err(|e| TrError::Storage(e.to_string()))
            };
            Ok(StoreStats {
                users: count("users")?,
                collections: count("collections")?,
                todos: count("todos")?,
            })
        })
    }

    fn parse_dt(column: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    column,
                    Type::Text,
                    Box::new(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        e.to_string(),
                    )),
                )
            })
    }

    fn parse_optional_dt(
        column: usize,
        raw: Option<String>,
    ) -> rusqlite::Result<Option<DateTime<Utc>>> {
        raw.map(|s| Self::parse_dt(column, &s)).transpose()
    }

    fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
        let created_at: String = row.get(3)?;
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            password_hash: row.get(2)?,
            created_at: Self::parse_dt(3, &created_at)?,
        })
    }

    fn row_to_collection(row: &rusqlite::Row<'_>) -> rusqlite::Result<Collection> {
        Ok(Collection {
            id: row.get(0)?,
            name: row.get(1)?,
            image: row.get(2)?,
            is_favorite: row.get(3)?,
            tasks_completed: row.get(4)?,
            total_tasks: row.get(5)?,
            user_id: row.get(6)?,
        })
    }

    fn row_to_todo(row: &rusqlite::Row<'_>) -> rusqlite::Result<Todo> {
        let due_date: Option<String> = row.get(4)?;
        let created_at: String = row.get(8)?;
        let updated_at: String = row.get(9)?;
        Ok(Todo {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            completed: row.get(3)?,
            due_date: Self::parse_optional_dt(4, due_date)?,
            user_id: row.get(5)?,
            collection_id: row.get(6)?,
            parent_todo_id: row.get(7)?,
            created_at: Self::parse_dt(8, &created_at)?,
            updated_at: Self::parse_dt(9, &updated_at)?,
        })
    }

    fn get_todo(conn: &Connection, id: i64) -> TrResult<Option<Todo>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, title, description, completed, due_date, user_id, collection_id,
                 parent_todo_id, created_at, updated_at FROM todos WHERE id = ?1",
            )
            .map_err(|e| TrError::Storage(e.to_string()))?;
        stmt.query_row(params![id], Self::row_to_todo)
            .optional()
            .map_err(|e| TrError::Storage(e.to_string()))
    }

    fn get_collection(conn: &Connection, id: i64) -> TrResult<Option<Collection>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, name, image, is_favorite, tasks_completed, total_tasks, user_id
                 FROM collections WHERE id = ?1",
            )
            .map_err(|e| TrError::Storage(e.to_string()))?;
        stmt.query_row(params![id], Self::row_to_collection)
            .optional()
            .map_err(|e| TrError::Storage(e.to_string()))
    }
}

#[async_trait]
impl TodoStore for SqliteStore {
    async fn insert(&self, new: &NewTodo) -> TrResult<Todo> {
        self.with_conn(|conn| {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO todos (title, description, completed, due_date, user_id,
                 collection_id, parent_todo_id, created_at, updated_at)
                 VALUES (?1, ?2, 0, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![
                    new.title,
                    new.description,
                    new.due_date.map(|dt| dt.to_rfc3339()),
                    new.user_id,
                    new.collection_id,
                    new.parent_todo_id,
                    now,
                ],
            )
            .map_err(|e| TrError::Storage(format!("insert todo failed: {e}")))?;

            let id = conn.last_insert_rowid();
            Self::get_todo(conn, id)?
                .ok_or_else(|| TrError::Storage(format!("inserted todo {id} not readable")))
        })
    }

    async fn get(&self, id: i64) -> TrResult<Option<Todo>> {
        self.with_conn(|conn| Self::get_todo(conn, id))
    }

    async fn list_by_collection(&self, collection_id: i64) -> TrResult<Vec<Todo>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, title, description, completed, due_date, user_id, collection_id,
                     parent_todo_id, created_at, updated_at FROM todos
                     WHERE collection_id = ?1 ORDER BY id ASC",
                )
                .map_err(|e| TrError::Storage(e.to_string()))?;
            let rows = stmt
                .query_map(params![collection_id], Self::row_to_todo)
                .map_err(|e| TrError::Storage(e.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| TrError::Storage(e.to_string()))
        })
    }

    async fn update(&self, id: i64, patch: &TodoPatch) -> TrResult<Option<Todo>> {
        // Patch and refetch under one connection so a concurrent delete
        // surfaces as None rather than a lost update.
        self.with_conn(|conn| {
            let mut sets: Vec<&str> = Vec::new();
            let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if let Some(title) = &patch.title {
                sets.push("title = ?");
                values.push(Box::new(title.clone()));
            }
            if let Some(description) = &patch.description {
                sets.push("description = ?");
                values.push(Box::new(description.clone()));
            }
            if let Some(completed) = patch.completed {
                sets.push("completed = ?");
                values.push(Box::new(completed));
            }
            if let Some(due_date) = patch.due_date {
                sets.push("due_date = ?");
                values.push(Box::new(due_date.to_rfc3339()));
            }
            sets.push("updated_at = ?");
            values.push(Box::new(Utc::now().to_rfc3339()));
            values.push(Box::new(id));

            let sql = format!("UPDATE todos SET {} WHERE id = ?", sets.join(", "));
            let rows = conn
                .execute(
                    &sql,
                    rusqlite::params_from_iter(values.iter().map(|v| v.as_ref())),
                )
                .map_err(|e| TrError::Storage(format!("update todo failed: {e}")))?;

            if rows == 0 {
                return Ok(None);
            }
            Self::get_todo(conn, id)
        })
    }

    async fn delete(&self, id: i64) -> TrResult<bool> {
        self.with_conn(|conn| {
            let rows = conn
                .execute("DELETE FROM todos WHERE id = ?1", params![id])
                .map_err(|e| TrError::Storage(format!("delete todo failed: {e}")))?;
            Ok(rows > 0)
        })
    }
}

#[async_trait]
impl CollectionStore for SqliteStore {
    async fn insert(&self, new: &NewCollection) -> TrResult<Collection> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO collections (name, image, is_favorite, tasks_completed, total_tasks, user_id)
                 VALUES (?1, ?2, ?3, 0, 0, ?4)",
                params![new.name, new.image, new.is_favorite, new.user_id],
            )
            .map_err(|e| TrError::Storage(format!("insert collection failed: {e}")))?;

            let id = conn.last_insert_rowid();
            Self::get_collection(conn, id)?
                .ok_or_else(|| TrError::Storage(format!("inserted collection {id} not readable")))
        })
    }

    async fn get(&self, id: i64) -> TrResult<Option<Collection>> {
        self.with_conn(|conn| Self::get_collection(conn, id))
    }

    async fn list_by_user(&self, user_id: i64) -> TrResult<Vec<Collection>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, name, image, is_favorite, tasks_completed, total_tasks, user_id
                     FROM collections WHERE user_id = ?1 ORDER BY id ASC",
                )
                .map_err(|e| TrError::Storage(e.to_string()))?;
            let rows = stmt
                .query_map(params![user_id], Self::row_to_collection)
                .map_err(|e| TrError::Storage(e.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| TrError::Storage(e.to_string()))
        })
    }

    async fn update(&self, id: i64, patch: &CollectionPatch) -> TrResult<Option<Collection>> {
        self.with_conn(|conn| {
            let mut sets: Vec<&str> = Vec::new();
            let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if let Some(name) = &patch.name {
                sets.push("name = ?");
                values.push(Box::new(name.clone()));
            }
            if let Some(image) = &patch.image {
                sets.push("image = ?");
                values.push(Box::new(image.clone()));
            }
            if let Some(is_favorite) = patch.is_favorite {
                sets.push("is_favorite = ?");
                values.push(Box::new(is_favorite));
            }
            if let Some(tasks_completed) = patch.tasks_completed {
                sets.push("tasks_completed = ?");
                values.push(Box::new(tasks_completed));
            }
            if let Some(total_tasks) = patch.total_tasks {
                sets.push("total_tasks = ?");
                values.push(Box::new(total_tasks));
            }

            if sets.is_empty() {
                // Nothing to change; report the current row (or its absence).
                return Self::get_collection(conn, id);
            }
            values.push(Box::new(id));

            let sql = format!("UPDATE collections SET {} WHERE id = ?", sets.join(", "));
            let rows = conn
                .execute(
                    &sql,
                    rusqlite::params_from_iter(values.iter().map(|v| v.as_ref())),
                )
                .map_err(|e| TrError::Storage(format!("update collection failed: {e}")))?;

            if rows == 0 {
                return Ok(None);
            }
            Self::get_collection(conn, id)
        })
    }

    async fn delete(&self, id: i64) -> TrResult<bool> {
        self.with_conn(|conn| {
            let rows = conn
                .execute("DELETE FROM collections WHERE id = ?1", params![id])
                .map_err(|e| TrError::Storage(format!("delete collection failed: {e}")))?;
            Ok(rows > 0)
        })
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn insert(&self, new: &NewUser) -> TrResult<User> {
        self.with_conn(|conn| {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO users (email, password_hash, created_at) VALUES (?1, ?2, ?3)",
                params![new.email, new.password_hash, now],
            )
            .map_err(|e| match &e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    TrError::DuplicateEmail(new.email.clone())
                }
                _ => TrError::Storage(format!("insert user failed: {e}")),
            })?;

            let id = conn.last_insert_rowid();
            let mut stmt = conn
                .prepare(
                    "SELECT id, email, password_hash, created_at FROM users WHERE id = ?1",
                )
                .map_err(|e| TrError::Storage(e.to_string()))?;
            stmt.query_row(params![id], Self::row_to_user)
                .map_err(|e| TrError::Storage(e.to_string()))
        })
    }

    async fn get(&self, id: i64) -> TrResult<Option<User>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, email, password_hash, created_at FROM users WHERE id = ?1",
                )
                .map_err(|e| TrError::Storage(e.to_string()))?;
            stmt.query_row(params![id], Self::row_to_user)
                .optional()
                .map_err(|e| TrError::Storage(e.to_string()))
        })
    }

    async fn find_by_email(&self, email: &str) -> TrResult<Option<User>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, email, password_hash, created_at FROM users WHERE email = ?1",
                )
                .map_err(|e| TrError::Storage(e.to_string()))?;
            stmt.query_row(params![email], Self::row_to_user)
                .optional()
                .map_err(|e| TrError::Storage(e.to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seed_user(store: &SqliteStore, email: &str) -> User {
        UserStore::insert(
            store,
            &NewUser {
                email: email.into(),
                password_hash: "$argon2id$test".into(),
            },
        )
        .await
        .expect("insert user")
    }

    async fn seed_collection(store: &SqliteStore, user_id: i64) -> Collection {
        CollectionStore::insert(
            store,
            &NewCollection {
                name: "groceries".into(),
                image: "cart.png".into(),
                is_favorite: false,
                user_id,
            },
        )
        .await
        .expect("insert collection")
    }

    fn new_todo(user_id: i64, collection_id: i64, title: &str, parent: Option<i64>) -> NewTodo {
        NewTodo {
            title: title.into(),
            description: None,
            due_date: None,
            user_id,
            collection_id,
            parent_todo_id: parent,
        }
    }

    #[tokio::test]
    async fn todo_insert_assigns_id_and_defaults() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = seed_user(&store, "a@example.com").await;
        let coll = seed_collection(&store, user.id).await;

        let todo = TodoStore::insert(&store, &new_todo(user.id, coll.id, "milk", None))
            .await
            .unwrap();
        assert!(todo.id > 0);
        assert!(!todo.completed);
        assert_eq!(todo.collection_id, coll.id);
        assert_eq!(todo.parent_todo_id, None);

        let fetched = TodoStore::get(&store, todo.id).await.unwrap().unwrap();
        assert_eq!(fetched, todo);
    }

    #[tokio::test]
    async fn todo_update_patches_only_given_fields() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = seed_user(&store, "a@example.com").await;
        let coll = seed_collection(&store, user.id).await;
        let todo = TodoStore::insert(&store, &new_todo(user.id, coll.id, "milk", None))
            .await
            .unwrap();

        let patch = TodoPatch {
            completed: Some(true),
            ..Default::default()
        };
        let updated = TodoStore::update(&store, todo.id, &patch)
            .await
            .unwrap()
            .unwrap();
        assert!(updated.completed);
        assert_eq!(updated.title, "milk");
        assert!(updated.updated_at >= todo.updated_at);
    }

    #[tokio::test]
    async fn todo_update_missing_id_returns_none() {
        let store = SqliteStore::open_in_memory().unwrap();
        let patch = TodoPatch {
            title: Some("ghost".into()),
            ..Default::default()
        };
        assert!(TodoStore::update(&store, 999, &patch).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn todo_delete_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = seed_user(&store, "a@example.com").await;
        let coll = seed_collection(&store, user.id).await;
        let todo = TodoStore::insert(&store, &new_todo(user.id, coll.id, "milk", None))
            .await
            .unwrap();

        assert!(TodoStore::delete(&store, todo.id).await.unwrap());
        assert!(!TodoStore::delete(&store, todo.id).await.unwrap());
    }

    #[tokio::test]
    async fn deleting_parent_cascades_to_descendants() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = seed_user(&store, "a@example.com").await;
        let coll = seed_collection(&store, user.id).await;
        let root = TodoStore::insert(&store, &new_todo(user.id, coll.id, "root", None))
            .await
            .unwrap();
        let child = TodoStore::insert(&store, &new_todo(user.id, coll.id, "child", Some(root.id)))
            .await
            .unwrap();
        let grandchild =
            TodoStore::insert(&store, &new_todo(user.id, coll.id, "grand", Some(child.id)))
                .await
                .unwrap();

        assert!(TodoStore::delete(&store, root.id).await.unwrap());
        assert!(TodoStore::get(&store, child.id).await.unwrap().is_none());
        assert!(TodoStore::get(&store, grandchild.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleting_collection_cascades_to_todos() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = seed_user(&store, "a@example.com").await;
        let coll = seed_collection(&store, user.id).await;
        let todo = TodoStore::insert(&store, &new_todo(user.id, coll.id, "milk", None))
            .await
            .unwrap();

        assert!(CollectionStore::delete(&store, coll.id).await.unwrap());
        assert!(TodoStore::get(&store, todo.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_by_collection_is_scoped_and_ordered() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = seed_user(&store, "a@example.com").await;
        let c1 = seed_collection(&store, user.id).await;
        let c2 = seed_collection(&store, user.id).await;
        TodoStore::insert(&store, &new_todo(user.id, c1.id, "one", None))
            .await
            .unwrap();
        TodoStore::insert(&store, &new_todo(user.id, c2.id, "other", None))
            .await
            .unwrap();
        TodoStore::insert(&store, &new_todo(user.id, c1.id, "two", None))
            .await
            .unwrap();

        let rows = store.list_by_collection(c1.id).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.windows(2).all(|w| w[0].id < w[1].id));
        assert!(rows.iter().all(|t| t.collection_id == c1.id));
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let store = SqliteStore::open_in_memory().unwrap();
        seed_user(&store, "dup@example.com").await;
        let err = UserStore::insert(
            &store,
            &NewUser {
                email: "dup@example.com".into(),
                password_hash: "$argon2id$test".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TrError::DuplicateEmail(_)));
    }

    #[tokio::test]
    async fn collection_update_missing_id_returns_none() {
        let store = SqliteStore::open_in_memory().unwrap();
        let patch = CollectionPatch {
            name: Some("renamed".into()),
            ..Default::default()
        };
        assert!(CollectionStore::update(&store, 42, &patch)
            .await
            .unwrap()
            .is_none());
    }
}
