use std::sync::Arc;

use axum::{
    extract::State, http::StatusCode, response::IntoResponse, Extension, Json,
};
use serde::{Deserialize, Serialize};

use tr_core::User;

use crate::auth::{issue_token, AuthContext};
use crate::rest::{err_json, map_tr_error};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: User,
}

/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CredentialsRequest>,
) -> impl IntoResponse {
    let user = match state.engine.register_user(&req.email, &req.password).await {
        Ok(user) => user,
        Err(err) => {
            let (status, message) = map_tr_error(err);
            return (status, err_json(message)).into_response();
        }
    };

    match issue_token(&user) {
        Ok(token) => {
            (StatusCode::CREATED, Json(SessionResponse { token, user })).into_response()
        }
        Err(err) => {
            let (status, message) = map_tr_error(err);
            (status, err_json(message)).into_response()
        }
    }
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CredentialsRequest>,
) -> impl IntoResponse {
    let user = match state
        .engine
        .verify_credentials(&req.email, &req.password)
        .await
    {
        Ok(user) => user,
        Err(err) => {
            let (status, message) = map_tr_error(err);
            return (status, err_json(message)).into_response();
        }
    };

    match issue_token(&user) {
        Ok(token) => Json(SessionResponse { token, user }).into_response(),
        Err(err) => {
            let (status, message) = map_tr_error(err);
            (status, err_json(message)).into_response()
        }
    }
}

/// GET /api/v1/auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> impl IntoResponse {
    match state.engine.get_user(auth.user_id).await {
        Ok(user) => Json(user).into_response(),
        Err(err) => {
            let (status, message) = map_tr_error(err);
            (status, err_json(message)).into_response()
        }
    }
}
