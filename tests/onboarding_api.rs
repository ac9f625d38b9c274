//! End-to-end tests for the HTTP API: wizard navigation, signup, login,
//! dashboards and generative flows.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use launchpad::app::{AppServices, build_router};
use launchpad::config::AppConfig;
use launchpad::error::LlmError;
use launchpad::llm::{CompletionRequest, CompletionResponse, FinishReason, LlmProvider};
use launchpad::store::{Database, LibSqlBackend};

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// LLM stub that always answers with a valid implementation plan.
struct StubLlm;

#[async_trait]
impl LlmProvider for StubLlm {
    fn model_name(&self) -> &str {
        "stub-model"
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let plan = json!({
            "phases": [
                {"phase": "Discovery", "weeks": 2, "deliverables": ["Requirements doc"]},
                {"phase": "Build", "weeks": 6, "deliverables": ["MVP", "Test suite"]}
            ]
        });
        Ok(CompletionResponse {
            content: format!("Here is the plan:\n```json\n{plan}\n```"),
            input_tokens: 120,
            output_tokens: 80,
            finish_reason: FinishReason::Stop,
        })
    }
}

/// Start a server on a random port and return its base URL.
async fn start_server() -> String {
    let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let llm = Some(Arc::new(StubLlm) as Arc<dyn LlmProvider>);
    let services = AppServices::new(db, llm, &AppConfig::default());
    let app = build_router(&services);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start.
    tokio::time::sleep(Duration::from_millis(50)).await;
    format!("http://{addr}")
}

async fn new_session(client: &reqwest::Client, base: &str) -> String {
    let resp = client
        .post(format!("{base}/api/onboarding/sessions"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let view: Value = resp.json().await.unwrap();
    assert_eq!(view["step"], "welcome");
    view["sessionId"].as_str().unwrap().to_string()
}

async fn submit(client: &reqwest::Client, base: &str, id: &str, form: Value) -> reqwest::Response {
    client
        .post(format!("{base}/api/onboarding/sessions/{id}/submit"))
        .json(&form)
        .send()
        .await
        .unwrap()
}

async fn submit_ok(client: &reqwest::Client, base: &str, id: &str, form: Value) -> Value {
    let resp = submit(client, base, id, form).await;
    assert_eq!(resp.status(), 200);
    resp.json().await.unwrap()
}

fn profile_form() -> Value {
    json!({
        "step": "profile",
        "data": {"fullName": "Ada Lovelace", "email": "ada@example.com", "country": "GB"}
    })
}

/// Walk a tekker through every step up to, not including, the account step.
async fn walk_tekker_to_account(client: &reqwest::Client, base: &str, id: &str) {
    let t = submit_ok(client, base, id, profile_form()).await;
    assert_eq!(t["step"], "vision");

    let t = submit_ok(
        client,
        base,
        id,
        json!({"step": "vision", "data": {"path": "tekker", "areasOfInterest": ["ai"]}}),
    )
    .await;
    assert_eq!(t["step"], "tekker-profile");
    assert_eq!(t["totalSteps"], 8);

    let t = submit_ok(
        client,
        base,
        id,
        json!({"step": "tekker-profile", "data": {"skills": ["rust", "sql"]}}),
    )
    .await;
    assert_eq!(t["step"], "tekker-agreement");

    let t = submit_ok(
        client,
        base,
        id,
        json!({"step": "tekker-agreement", "data": {
            "agreeToPlatformTerms": true,
            "understandsEngagementModel": true,
            "agreeToCodeOfHonor": true
        }}),
    )
    .await;
    assert_eq!(t["step"], "legal");

    let t = submit_ok(
        client,
        base,
        id,
        json!({"step": "legal", "data": {"acceptTermsOfService": true, "acceptPrivacyPolicy": true}}),
    )
    .await;
    assert_eq!(t["step"], "account");
    assert_eq!(t["currentStep"], 7);
}

fn account_form(username: &str) -> Value {
    json!({"step": "account", "data": {
        "username": username,
        "password": "correct horse",
        "verifyPassword": "correct horse",
        "agreeToTerms": true,
        "agreeToPrivacy": true,
        "agreeToCodeOfHonor": true
    }})
}

#[tokio::test]
async fn health_endpoint() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let body: Value = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "launchpad");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn tekker_completes_wizard_and_uses_dashboard() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = reqwest::Client::new();
        let id = new_session(&client, &base).await;

        walk_tekker_to_account(&client, &base, &id).await;

        let done = submit_ok(&client, &base, &id, account_form("ada_l")).await;
        assert_eq!(done["step"], "complete");
        assert_eq!(done["currentStep"], 8);
        assert_eq!(done["path"], "/complete");
        assert!(done["account"]["userId"].is_string());
        assert_eq!(done["account"]["role"], "tekker");

        // The wizard hands its record over to the user and keeps only the
        // completion.
        let view: Value = client
            .get(format!("{base}/api/onboarding/sessions/{id}"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(view["completed"], true);
        assert_eq!(view["step"], "complete");
        assert!(view["record"].get("profile").is_none_or(Value::is_null));
        let token = done["account"]["session"]["token"]
            .as_str()
            .unwrap()
            .to_string();

        // A fresh login works with the same credentials.
        let resp = client
            .post(format!("{base}/api/auth/login"))
            .json(&json!({"username": "ada_l", "password": "correct horse"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let dashboard: Value = client
            .get(format!("{base}/api/dashboard"))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(dashboard["role"], "tekker");
        assert_eq!(dashboard["flows"], json!(["implementation-plan"]));
        assert_eq!(dashboard["user"]["username"], "ada_l");
        assert_eq!(dashboard["onboarding"]["profile"]["email"], "ada@example.com");
        assert!(dashboard["onboarding"]["account"].get("password").is_none());

        // A founder-only flow is refused for a tekker.
        let resp = client
            .post(format!("{base}/api/flows/pitch-deck"))
            .bearer_auth(&token)
            .json(&json!({"companyName": "Acme", "problem": "p", "solution": "s", "market": "m"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 403);

        let resp = client
            .post(format!("{base}/api/flows/implementation-plan"))
            .bearer_auth(&token)
            .json(&json!({"projectSummary": "Inventory tracker", "timelineWeeks": 8}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let generation: Value = resp.json().await.unwrap();
        assert_eq!(generation["flow"], "implementation-plan");
        assert_eq!(generation["output"]["phases"][1]["phase"], "Build");

        let history: Value = client
            .get(format!("{base}/api/flows/history?limit=5"))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(history["generations"].as_array().unwrap().len(), 1);

        let resp = client
            .post(format!("{base}/api/auth/logout"))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let resp = client
            .get(format!("{base}/api/dashboard"))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn entering_a_later_step_redirects_to_first_gap() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = reqwest::Client::new();
        let id = new_session(&client, &base).await;

        let t: Value = client
            .get(format!("{base}/api/onboarding/sessions/{id}/steps/legal"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(t["step"], "profile");
        assert_eq!(t["redirected"], true);

        submit_ok(&client, &base, &id, profile_form()).await;
        let t: Value = client
            .get(format!("{base}/api/onboarding/sessions/{id}/steps/account"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(t["step"], "vision");
        assert_eq!(t["currentStep"], 3);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn invalid_profile_is_rejected_with_fields() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = reqwest::Client::new();
        let id = new_session(&client, &base).await;

        let resp = submit(
            &client,
            &base,
            &id,
            json!({"step": "profile", "data": {"fullName": "A", "email": "nope", "country": "GB"}}),
        )
        .await;
        assert_eq!(resp.status(), 422);
        let body: Value = resp.json().await.unwrap();
        let fields: Vec<&str> = body["fields"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|f| f["field"].as_str())
            .collect();
        assert!(fields.contains(&"fullName"));
        assert!(fields.contains(&"email"));

        // The wizard did not advance.
        let view: Value = client
            .get(format!("{base}/api/onboarding/sessions/{id}"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(view["record"].get("profile").is_none_or(Value::is_null));
        assert_eq!(view["completed"], false);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn duplicate_signup_reports_existing_role() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = reqwest::Client::new();

        let first = new_session(&client, &base).await;
        walk_tekker_to_account(&client, &base, &first).await;
        submit_ok(&client, &base, &first, account_form("ada_l")).await;

        let second = new_session(&client, &base).await;
        walk_tekker_to_account(&client, &base, &second).await;
        let resp = submit(&client, &base, &second, account_form("ada_l")).await;
        assert_eq!(resp.status(), 409);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["existingRole"], "tekker");

        // The second wizard keeps its progress for a retry.
        let view: Value = client
            .get(format!("{base}/api/onboarding/sessions/{second}"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(view["record"]["profile"]["fullName"], "Ada Lovelace");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unknown_session_and_bad_ids() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = reqwest::Client::new();

        let resp = client
            .get(format!(
                "{base}/api/onboarding/sessions/00000000-0000-0000-0000-000000000000"
            ))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);

        let resp = client
            .get(format!("{base}/api/onboarding/sessions/not-a-uuid"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        let resp = client
            .get(format!("{base}/api/onboarding/tracks/astronaut"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn track_outlines() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = reqwest::Client::new();

        let preview: Value = client
            .get(format!("{base}/api/onboarding/tracks/none"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(preview["totalSteps"], 5);

        let investor: Value = client
            .get(format!("{base}/api/onboarding/tracks/investor"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(investor["role"], "investor");
        assert_eq!(investor["totalSteps"], 8);
    })
    .await
    .expect("test timed out");
}
