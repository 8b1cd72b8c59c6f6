use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Serialize;

use tr_core::CollectionPatch;
use tr_engine::CollectionDraft;

use crate::auth::AuthContext;
use crate::rest::{err_json, map_tr_error};
use crate::state::AppState;

#[derive(Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

/// GET /api/v1/collections
pub async fn list_collections(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> impl IntoResponse {
    match state.engine.list_collections(auth.user_id).await {
        Ok(collections) => Json(collections).into_response(),
        Err(err) => {
            let (status, message) = map_tr_error(err);
            (status, err_json(message)).into_response()
        }
    }
}

/// POST /api/v1/collections
pub async fn create_collection(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(draft): Json<CollectionDraft>,
) -> impl IntoResponse {
    match state.engine.create_collection(auth.user_id, draft).await {
        Ok(collection) => (StatusCode::CREATED, Json(collection)).into_response(),
        Err(err) => {
            let (status, message) = map_tr_error(err);
            (status, err_json(message)).into_response()
        }
    }
}

/// GET /api/v1/collections/:id
pub async fn get_collection(
    State(state): State<Arc<AppState>>,
    Extension(_auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.engine.get_collection(id).await {
        Ok(collection) => Json(collection).into_response(),
        Err(err) => {
            let (status, message) = map_tr_error(err);
            (status, err_json(message)).into_response()
        }
    }
}

/// PATCH /api/v1/collections/:id
pub async fn update_collection(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(patch): Json<CollectionPatch>,
) -> impl IntoResponse {
    match state
        .engine
        .update_collection(auth.user_id, id, &patch)
        .await
    {
        Ok(Some(collection)) => Json(collection).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            err_json(format!("collection not found: {id}")),
        )
            .into_response(),
        Err(err) => {
            let (status, message) = map_tr_error(err);
            (status, err_json(message)).into_response()
        }
    }
}

/// DELETE /api/v1/collections/:id
pub async fn delete_collection(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.engine.delete_collection(auth.user_id, id).await {
        Ok(deleted) => Json(DeleteResponse { deleted }).into_response(),
        Err(err) => {
            let (status, message) = map_tr_error(err);
            (status, err_json(message)).into_response()
        }
    }
}
