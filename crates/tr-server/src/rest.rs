use std::sync::Arc;

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method, StatusCode,
    },
    middleware,
    response::Json,
    routing::{delete, get, patch, post},
    Router,
};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use tr_core::TrError;

use crate::auth::auth_middleware;
use crate::state::AppState;

#[path = "rest/accounts.rs"]
mod accounts;
#[path = "rest/collections.rs"]
mod collections;
#[path = "rest/todos.rs"]
mod todos;

pub fn create_router(state: Arc<AppState>) -> Router {
    create_router_with_cors(state, &[])
}

pub fn create_router_with_cors(state: Arc<AppState>, cors_allowed_origins: &[String]) -> Router {
    let router = Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/auth/register", post(accounts::register))
        .route("/api/v1/auth/login", post(accounts::login))
        .route("/api/v1/auth/me", get(accounts::me))
        .route(
            "/api/v1/collections",
            get(collections::list_collections).post(collections::create_collection),
        )
        .route(
            "/api/v1/collections/:id",
            get(collections::get_collection)
                .patch(collections::update_collection)
                .delete(collections::delete_collection),
        )
        .route("/api/v1/collections/:id/todos", get(todos::list_todos))
        .route("/api/v1/todos", post(todos::create_todo))
        .route("/api/v1/todos/:id", get(todos::get_todo))
        .route("/api/v1/todos/:id", patch(todos::update_todo))
        .route("/api/v1/todos/:id", delete(todos::delete_todo))
        .layer(middleware::from_fn(auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if cors_allowed_origins.is_empty() {
        router
    } else {
        router.layer(build_cors_layer(cors_allowed_origins))
    }
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

#[derive(Serialize)]
pub(crate) struct ErrorBody {
    error: String,
}

pub(crate) fn err_json(msg: impl ToString) -> Json<ErrorBody> {
    Json(ErrorBody {
        error: msg.to_string(),
    })
}

pub(crate) fn map_tr_error(err: TrError) -> (StatusCode, String) {
    let status = match &err {
        TrError::TodoNotFound(_)
        | TrError::ParentNotFound(_)
        | TrError::CollectionNotFound(_)
        | TrError::UserNotFound(_) => StatusCode::NOT_FOUND,
        TrError::CrossCollectionParent { .. } | TrError::InvalidInput(_) => {
            StatusCode::BAD_REQUEST
        }
        TrError::DuplicateEmail(_) => StatusCode::CONFLICT,
        TrError::InvalidCredentials | TrError::Auth(_) => StatusCode::UNAUTHORIZED,
        TrError::AccessDenied(_) => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}
