pub mod auth;
pub mod rest;
pub mod state;

use std::sync::Arc;

use tr_core::{TrError, TrResult};
use tr_engine::{EngineConfig, TrellisEngine};

use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_host: String,
    pub rest_port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub engine_config: EngineConfig,
}

/// Refuse non-loopback binds unless a JWT secret is configured or the
/// operator explicitly opted in. Tokens signed with the built-in dev secret
/// are forgeable, which is fine on localhost and nowhere else.
pub fn check_bind_safety(bind_host: &str) -> Result<(), String> {
    if matches!(bind_host, "127.0.0.1" | "localhost" | "::1") {
        return Ok(());
    }

    let secret_set = std::env::var("TRELLIS_JWT_SECRET")
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false);
    let allow_insecure = std::env::var("TRELLIS_ALLOW_INSECURE_BIND")
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);

    if secret_set || allow_insecure {
        Ok(())
    } else {
        Err(format!(
            "binding to {bind_host} without TRELLIS_JWT_SECRET; set a secret or \
             TRELLIS_ALLOW_INSECURE_BIND=true for trusted networks"
        ))
    }
}

pub async fn start_server(config: ServerConfig) -> TrResult<()> {
    let engine = TrellisEngine::init(config.engine_config)?;
    let state = Arc::new(AppState::new(Arc::new(engine)));
    let router = rest::create_router_with_cors(state, &config.cors_allowed_origins);

    let addr = format!("{}:{}", config.bind_host, config.rest_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| TrError::Storage(format!("bind {addr}: {e}")))?;
    tracing::info!(%addr, "REST server listening");

    axum::serve(listener, router)
        .await
        .map_err(|e| TrError::Storage(format!("server error: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_binds_are_always_safe() {
        assert!(check_bind_safety("127.0.0.1").is_ok());
        assert!(check_bind_safety("localhost").is_ok());
        assert!(check_bind_safety("::1").is_ok());
    }
}
