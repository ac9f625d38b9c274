//! REST endpoints for dashboards and generative flows.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::accounts::AccountBridge;
use crate::accounts::routes::require_user;
use crate::error::{FlowError, LlmError};
use crate::store::Database;

use super::Flow;
use super::dashboard::Dashboard;
use super::runner::FlowRunner;

/// Shared state for dashboard and flow routes.
#[derive(Clone)]
pub struct FlowRouteState {
    pub accounts: Arc<dyn AccountBridge>,
    pub runner: Arc<FlowRunner>,
    pub db: Arc<dyn Database>,
}

/// Build the dashboard and flow REST routes.
pub fn flow_routes(state: FlowRouteState) -> Router {
    Router::new()
        .route("/api/dashboard", get(get_dashboard))
        .route("/api/flows/history", get(get_history))
        .route("/api/flows/{flow}", post(run_flow))
        .with_state(state)
}

impl IntoResponse for FlowError {
    fn into_response(self) -> Response {
        let status = match &self {
            FlowError::UnknownFlow(_) => StatusCode::NOT_FOUND,
            FlowError::NotAvailable { .. } => StatusCode::FORBIDDEN,
            FlowError::InvalidInput { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            FlowError::SchemaViolation { .. } => StatusCode::BAD_GATEWAY,
            FlowError::Llm(LlmError::NotConfigured) => StatusCode::SERVICE_UNAVAILABLE,
            FlowError::Llm(LlmError::RateLimited { .. }) => StatusCode::TOO_MANY_REQUESTS,
            FlowError::Llm(_) => StatusCode::BAD_GATEWAY,
        };
        (status, Json(json!({"error": self.to_string()}))).into_response()
    }
}

/// GET /api/dashboard
async fn get_dashboard(State(state): State<FlowRouteState>, headers: HeaderMap) -> Response {
    let user = match require_user(state.accounts.as_ref(), &headers).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    Json(Dashboard::load(state.db.as_ref(), &state.runner, user).await).into_response()
}

/// POST /api/flows/{flow}
///
/// Body: the flow's input object.
async fn run_flow(
    State(state): State<FlowRouteState>,
    Path(flow): Path<String>,
    headers: HeaderMap,
    Json(input): Json<serde_json::Value>,
) -> Response {
    let user = match require_user(state.accounts.as_ref(), &headers).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let flow: Flow = match flow.parse() {
        Ok(flow) => flow,
        Err(_) => return FlowError::UnknownFlow(flow).into_response(),
    };
    match state.runner.run(&user, flow, input).await {
        Ok(generation) => Json(generation).into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

/// GET /api/flows/history?limit=N
async fn get_history(
    State(state): State<FlowRouteState>,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let user = match require_user(state.accounts.as_ref(), &headers).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let limit = query
        .limit
        .unwrap_or(state.runner.config().history_limit)
        .clamp(1, 100);
    let generations = state.runner.history(user.id, limit).await;
    Json(json!({ "generations": generations })).into_response()
}
