//! Service wiring: builds the shared components and the HTTP router.

use std::sync::Arc;

use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::accounts::{AccountBridge, AuthRouteState, LocalAccounts, auth_routes};
use crate::config::AppConfig;
use crate::flows::{FlowRouteState, FlowRunner, flow_routes};
use crate::llm::LlmProvider;
use crate::onboarding::{OnboardingManager, OnboardingRouteState, onboarding_routes};
use crate::store::Database;

/// Long-lived components shared by all routes.
#[derive(Clone)]
pub struct AppServices {
    pub db: Arc<dyn Database>,
    pub accounts: Arc<dyn AccountBridge>,
    pub onboarding: Arc<OnboardingManager>,
    pub flows: Arc<FlowRunner>,
}

impl AppServices {
    /// Wire the service over a database and an optional LLM provider.
    pub fn new(db: Arc<dyn Database>, llm: Option<Arc<dyn LlmProvider>>, config: &AppConfig) -> Self {
        let accounts: Arc<dyn AccountBridge> =
            Arc::new(LocalAccounts::new(Arc::clone(&db), config.session_ttl));
        let onboarding = Arc::new(OnboardingManager::new(Arc::clone(&db), Arc::clone(&accounts)));
        let flows = Arc::new(FlowRunner::new(llm, Arc::clone(&db), config.flows.clone()));
        Self {
            db,
            accounts,
            onboarding,
            flows,
        }
    }
}

/// Build the full HTTP router.
pub fn build_router(services: &AppServices) -> Router {
    let onboarding = onboarding_routes(OnboardingRouteState {
        manager: Arc::clone(&services.onboarding),
    });
    let auth = auth_routes(AuthRouteState {
        accounts: Arc::clone(&services.accounts),
    });
    let flows = flow_routes(FlowRouteState {
        accounts: Arc::clone(&services.accounts),
        runner: Arc::clone(&services.flows),
        db: Arc::clone(&services.db),
    });

    Router::new()
        .route("/health", get(health))
        .merge(onboarding)
        .merge(auth)
        .merge(flows)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "launchpad",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
