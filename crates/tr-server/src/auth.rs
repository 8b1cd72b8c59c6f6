use axum::{
    extract::Request,
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use tr_core::{TrError, TrResult, User};

const AUTHORIZATION_BEARER_PREFIX: &str = "Bearer ";
const ENV_JWT_SECRET: &str = "TRELLIS_JWT_SECRET";
const DEFAULT_DEV_SECRET: &str = "trellis-dev-secret";

/// Token lifetime: one hour.
const TOKEN_TTL_SECS: i64 = 3600;

/// Maximum bearer token length (8 KiB). Prevents DoS via oversized Authorization headers.
const MAX_TOKEN_LENGTH: usize = 8192;

/// Identity of the authenticated caller, inserted as a request extension by
/// [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: i64,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct JwtClaims {
    /// User id, stringified.
    sub: String,
    email: String,
    exp: usize,
    iat: usize,
}

fn jwt_secret() -> String {
    match std::env::var(ENV_JWT_SECRET) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => {
            tracing::warn!("{ENV_JWT_SECRET} not set, using built-in dev secret");
            DEFAULT_DEV_SECRET.to_string()
        }
    }
}

/// Mint a signed HS256 token for a freshly registered or logged-in user.
pub fn issue_token(user: &User) -> TrResult<String> {
    let now = Utc::now().timestamp();
    let claims = JwtClaims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        exp: (now + TOKEN_TTL_SECS) as usize,
        iat: now as usize,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret().as_bytes()),
    )
    .map_err(|e| TrError::Auth(format!("failed to sign token: {e}")))
}

fn extract_bearer_token(auth_header: Option<&str>) -> Option<&str> {
    let token = auth_header?.strip_prefix(AUTHORIZATION_BEARER_PREFIX)?;
    if token.is_empty() || token.len() > MAX_TOKEN_LENGTH {
        return None;
    }
    Some(token)
}

fn decode_token(token: &str) -> Option<AuthContext> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    let data = decode::<JwtClaims>(
        token,
        &DecodingKey::from_secret(jwt_secret().as_bytes()),
        &validation,
    )
    .ok()?;

    let user_id = data.claims.sub.trim().parse::<i64>().ok()?;
    Some(AuthContext {
        user_id,
        email: data.claims.email,
    })
}

fn is_public_path(path: &str) -> bool {
    matches!(
        path,
        "/api/v1/health" | "/api/v1/auth/register" | "/api/v1/auth/login"
    )
}

/// Require a valid bearer token on every route except health and the two
/// auth entry points. On success the [`AuthContext`] rides along as an
/// extension for handlers to extract.
pub async fn auth_middleware(mut request: Request, next: Next) -> Result<Response, StatusCode> {
    if is_public_path(request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let token = extract_bearer_token(header).ok_or(StatusCode::UNAUTHORIZED)?;
    let auth_context = decode_token(token).ok_or(StatusCode::UNAUTHORIZED)?;

    request.extensions_mut().insert(auth_context);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(id: i64) -> User {
        User {
            id,
            email: "a@example.com".into(),
            password_hash: "hash".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn issued_tokens_round_trip() {
        let token = issue_token(&user(42)).unwrap();
        let ctx = decode_token(&token).unwrap();
        assert_eq!(ctx.user_id, 42);
        assert_eq!(ctx.email, "a@example.com");
    }

    #[test]
    fn garbage_tokens_are_rejected() {
        assert!(decode_token("not-a-jwt").is_none());
    }

    #[test]
    fn bearer_extraction_requires_prefix() {
        assert_eq!(extract_bearer_token(Some("Bearer abc")), Some("abc"));
        assert_eq!(extract_bearer_token(Some("Basic abc")), None);
        assert_eq!(extract_bearer_token(Some("Bearer ")), None);
        assert_eq!(extract_bearer_token(None), None);
    }

    #[test]
    fn oversized_tokens_are_rejected() {
        let header = format!("Bearer {}", "x".repeat(MAX_TOKEN_LENGTH + 1));
        assert_eq!(extract_bearer_token(Some(&header)), None);
    }

    #[test]
    fn public_paths_skip_auth() {
        assert!(is_public_path("/api/v1/health"));
        assert!(is_public_path("/api/v1/auth/register"));
        assert!(is_public_path("/api/v1/auth/login"));
        assert!(!is_public_path("/api/v1/collections"));
    }
}
