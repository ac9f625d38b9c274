//! REST endpoints for login and logout.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::json;

use super::{AccountBridge, UserAccount};

/// Shared state for auth routes.
#[derive(Clone)]
pub struct AuthRouteState {
    pub accounts: Arc<dyn AccountBridge>,
}

/// Build the auth REST routes.
pub fn auth_routes(state: AuthRouteState) -> Router {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .with_state(state)
}

/// Token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolve the request's bearer token to a user, or the error response to
/// return instead.
pub async fn require_user(
    accounts: &dyn AccountBridge,
    headers: &HeaderMap,
) -> Result<UserAccount, Response> {
    let Some(token) = bearer_token(headers) else {
        return Err(unauthorized("Missing bearer token"));
    };
    match accounts.authenticate(token).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(unauthorized("Invalid or expired session")),
        Err(e) => {
            tracing::error!("Session lookup failed: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Session lookup failed"})),
            )
                .into_response())
        }
    }
}

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({"error": message}))).into_response()
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: SecretString,
}

/// POST /api/auth/login
async fn login(State(state): State<AuthRouteState>, Json(req): Json<LoginRequest>) -> Response {
    match state.accounts.login(req.username.trim(), &req.password).await {
        Ok(Some(session)) => Json(session).into_response(),
        Ok(None) => unauthorized("Invalid username or password"),
        Err(e) => {
            tracing::error!("Login failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Login failed"})),
            )
                .into_response()
        }
    }
}

/// POST /api/auth/logout
async fn logout(State(state): State<AuthRouteState>, headers: HeaderMap) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return unauthorized("Missing bearer token");
    };
    match state.accounts.logout(token).await {
        Ok(true) => Json(json!({"status": "logged_out"})).into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Session not found"})),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Logout failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Logout failed"})),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers), Some("abc123"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc123"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
