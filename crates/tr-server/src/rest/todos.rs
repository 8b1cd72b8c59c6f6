use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};

use tr_core::TodoPatch;
use tr_engine::TodoDraft;

use crate::auth::AuthContext;
use crate::rest::{err_json, map_tr_error};
use crate::state::AppState;

use super::collections::DeleteResponse;

/// POST /api/v1/todos
pub async fn create_todo(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(draft): Json<TodoDraft>,
) -> impl IntoResponse {
    match state.engine.create_todo(auth.user_id, draft).await {
        Ok(todo) => (StatusCode::CREATED, Json(todo)).into_response(),
        Err(err) => {
            let (status, message) = map_tr_error(err);
            (status, err_json(message)).into_response()
        }
    }
}

/// GET /api/v1/todos/:id
pub async fn get_todo(
    State(state): State<Arc<AppState>>,
    Extension(_auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.engine.get_todo(id).await {
        Ok(todo) => Json(todo).into_response(),
        Err(err) => {
            let (status, message) = map_tr_error(err);
            (status, err_json(message)).into_response()
        }
    }
}

/// GET /api/v1/collections/:id/todos
///
/// The collection's todos as a nested forest, roots in id order.
pub async fn list_todos(
    State(state): State<Arc<AppState>>,
    Extension(_auth): Extension<AuthContext>,
    Path(collection_id): Path<i64>,
) -> impl IntoResponse {
    match state.engine.list_todos(collection_id).await {
        Ok(forest) => Json(forest).into_response(),
        Err(err) => {
            let (status, message) = map_tr_error(err);
            (status, err_json(message)).into_response()
        }
    }
}

/// PATCH /api/v1/todos/:id
pub async fn update_todo(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(patch): Json<TodoPatch>,
) -> impl IntoResponse {
    match state.engine.update_todo(auth.user_id, id, &patch).await {
        Ok(Some(todo)) => Json(todo).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            err_json(format!("todo not found: {id}")),
        )
            .into_response(),
        Err(err) => {
            let (status, message) = map_tr_error(err);
            (status, err_json(message)).into_response()
        }
    }
}

/// DELETE /api/v1/todos/:id
pub async fn delete_todo(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.engine.delete_todo(auth.user_id, id).await {
        Ok(deleted) => Json(DeleteResponse { deleted }).into_response(),
        Err(err) => {
            let (status, message) = map_tr_error(err);
            (status, err_json(message)).into_response()
        }
    }
}
