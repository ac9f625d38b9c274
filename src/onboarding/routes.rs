//! REST endpoints for the onboarding wizard.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use uuid::Uuid;

use crate::error::OnboardingError;

use super::manager::OnboardingManager;
use super::model::StepForm;
use super::state::{Role, Step};

/// Shared state for onboarding routes.
#[derive(Clone)]
pub struct OnboardingRouteState {
    pub manager: Arc<OnboardingManager>,
}

/// Build the onboarding REST routes.
pub fn onboarding_routes(state: OnboardingRouteState) -> Router {
    Router::new()
        .route("/api/onboarding/sessions", post(create_session))
        .route("/api/onboarding/sessions/{id}", get(get_session))
        .route("/api/onboarding/sessions/{id}/restart", post(restart_session))
        .route("/api/onboarding/sessions/{id}/steps/{step}", get(enter_step))
        .route("/api/onboarding/sessions/{id}/submit", post(submit_step))
        .route("/api/onboarding/sessions/{id}/back", post(go_back))
        .route("/api/onboarding/tracks/{role}", get(get_track))
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({"error": message.into()}))).into_response()
}

impl IntoResponse for OnboardingError {
    fn into_response(self) -> Response {
        match self {
            OnboardingError::SessionNotFound(_) => {
                error_response(StatusCode::NOT_FOUND, self.to_string())
            }
            OnboardingError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({
                    "error": "Validation failed",
                    "fields": errors.fields,
                })),
            )
                .into_response(),
            OnboardingError::AccountCreation {
                message,
                existing_role,
            } => (
                StatusCode::CONFLICT,
                Json(json!({
                    "error": message,
                    "existingRole": existing_role,
                })),
            )
                .into_response(),
            OnboardingError::SignupInFlight => error_response(StatusCode::CONFLICT, self.to_string()),
        }
    }
}

fn parse_session_id(id: &str) -> Result<Uuid, Response> {
    Uuid::parse_str(id).map_err(|_| error_response(StatusCode::BAD_REQUEST, "Invalid session ID"))
}

/// POST /api/onboarding/sessions
///
/// Starts a new wizard at `welcome`.
async fn create_session(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    let view = state.manager.begin().await;
    (StatusCode::CREATED, Json(view))
}

/// GET /api/onboarding/sessions/{id}
async fn get_session(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_session_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.manager.view(id).await {
        Ok(view) => Json(view).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /api/onboarding/sessions/{id}/restart
async fn restart_session(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_session_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.manager.restart(id).await {
        Ok(view) => Json(view).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /api/onboarding/sessions/{id}/steps/{step}
///
/// Navigates to a step. The response names the step actually landed on,
/// which differs from the requested one when a prerequisite is missing.
async fn enter_step(
    State(state): State<OnboardingRouteState>,
    Path((id, step)): Path<(String, String)>,
) -> Response {
    let id = match parse_session_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let step: Step = match step.parse() {
        Ok(step) => step,
        Err(e) => return error_response(StatusCode::NOT_FOUND, e),
    };
    match state.manager.enter(id, step).await {
        Ok(transition) => Json(transition).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /api/onboarding/sessions/{id}/submit
///
/// Body: `{"step": "<slug>", "data": {...}}`.
async fn submit_step(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<String>,
    Json(form): Json<StepForm>,
) -> Response {
    let id = match parse_session_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let step = form.step();
    match state.manager.submit(id, form).await {
        Ok(transition) => Json(transition).into_response(),
        Err(e) => {
            tracing::debug!(session_id = %id, step = %step, "Submission rejected: {}", e);
            e.into_response()
        }
    }
}

/// POST /api/onboarding/sessions/{id}/back
async fn go_back(State(state): State<OnboardingRouteState>, Path(id): Path<String>) -> Response {
    let id = match parse_session_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.manager.back(id).await {
        Ok(transition) => Json(transition).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /api/onboarding/tracks/{role}
///
/// Progress outline for a role; `none` gives the pre-selection preview.
async fn get_track(
    State(state): State<OnboardingRouteState>,
    Path(role): Path<String>,
) -> Response {
    let role = if role == "none" {
        None
    } else {
        match role.parse::<Role>() {
            Ok(role) => Some(role),
            Err(e) => return error_response(StatusCode::NOT_FOUND, e),
        }
    };
    let steps = state.manager.track_outline(role);
    Json(json!({
        "role": role,
        "totalSteps": steps.len(),
        "steps": steps,
    }))
    .into_response()
}
