//! OnboardingManager: owns wizard sessions, applies submitted forms and
//! drives the step router.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use secrecy::SecretString;
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::accounts::{AccountBridge, AuthSession, SignupRequest};
use crate::error::OnboardingError;
use crate::store::Database;

use super::model::{AccountDetails, OnboardingRecord, RecordPatch, StepForm, settings_keys};
use super::state::{self, Role, Step, StepOutline};
use super::store::OnboardingStore;
use super::validate::validate_form;

/// The user a finished wizard produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedAccount {
    pub user_id: Uuid,
    pub role: Role,
    /// Absent when the automatic login after signup failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<AuthSession>,
}

/// Where a navigation or submission landed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    pub step: Step,
    pub path: &'static str,
    pub current_step: u8,
    pub total_steps: u8,
    /// True when the requested step was replaced by an unmet prerequisite.
    pub redirected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<CompletedAccount>,
}

/// Snapshot of a session for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardView {
    pub session_id: Uuid,
    pub record: OnboardingRecord,
    pub step: Step,
    pub progress: Vec<StepOutline>,
    pub completed: bool,
}

/// Guards the account step against duplicate signups.
#[derive(Debug, Clone)]
enum SignupLatch {
    Idle,
    Pending,
    Done(CompletedAccount),
}

/// Sessions untouched for this long are dropped from memory. An unfinished
/// one can still be restored from its persisted record.
const IDLE_SESSION_TTL: Duration = Duration::from_secs(60 * 60);

/// One wizard session: its record plus the signup latch.
struct WizardSession {
    store: OnboardingStore,
    latch: Mutex<SignupLatch>,
    last_seen: Mutex<Instant>,
}

impl WizardSession {
    fn new(store: OnboardingStore) -> Self {
        Self {
            store,
            latch: Mutex::new(SignupLatch::Idle),
            last_seen: Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        *self.last_seen.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    /// Idle past `ttl` and not in the middle of a signup.
    fn is_stale(&self, ttl: Duration) -> bool {
        let idle = self.last_seen.lock().unwrap_or_else(|e| e.into_inner()).elapsed();
        idle >= ttl && !matches!(*self.lock_latch(), SignupLatch::Pending)
    }

    fn completed(&self) -> Option<CompletedAccount> {
        match &*self.lock_latch() {
            SignupLatch::Done(account) => Some(account.clone()),
            _ => None,
        }
    }

    fn set_latch(&self, latch: SignupLatch) {
        *self.lock_latch() = latch;
    }

    fn lock_latch(&self) -> std::sync::MutexGuard<'_, SignupLatch> {
        // The latch holds plain data, so a poisoned lock is still usable.
        self.latch.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Coordinates wizard sessions: record storage, routing and account creation.
pub struct OnboardingManager {
    db: Arc<dyn Database>,
    accounts: Arc<dyn AccountBridge>,
    sessions: RwLock<HashMap<Uuid, Arc<WizardSession>>>,
    idle_ttl: Duration,
}

impl OnboardingManager {
    pub fn new(db: Arc<dyn Database>, accounts: Arc<dyn AccountBridge>) -> Self {
        Self {
            db,
            accounts,
            sessions: RwLock::new(HashMap::new()),
            idle_ttl: IDLE_SESSION_TTL,
        }
    }

    /// Override how long an untouched session stays in memory.
    pub fn with_idle_ttl(mut self, ttl: Duration) -> Self {
        self.idle_ttl = ttl;
        self
    }

    /// Number of sessions currently held in memory.
    pub async fn active_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Start a new wizard session at `welcome`.
    pub async fn begin(&self) -> WizardView {
        let id = Uuid::new_v4();
        let session = Arc::new(WizardSession::new(OnboardingStore::new(id, self.db.clone())));
        // Writes the empty record so the session survives a restart.
        session.store.set_current_step(1).await;
        {
            let mut sessions = self.sessions.write().await;
            let before = sessions.len();
            sessions.retain(|_, s| !s.is_stale(self.idle_ttl));
            let evicted = before - sessions.len();
            if evicted > 0 {
                tracing::debug!(count = evicted, "Evicted idle onboarding sessions");
            }
            sessions.insert(id, session.clone());
        }

        tracing::info!(session_id = %id, "Onboarding session started");
        self.view_of(id, &session).await
    }

    /// Re-enter the wizard from `welcome`: clears the record and any
    /// completion.
    pub async fn restart(&self, id: Uuid) -> Result<WizardView, OnboardingError> {
        let session = self.session(id).await?;
        session.store.reset().await;
        session.store.set_current_step(1).await;
        session.set_latch(SignupLatch::Idle);
        Ok(self.view_of(id, &session).await)
    }

    /// Current record and progress outline.
    pub async fn view(&self, id: Uuid) -> Result<WizardView, OnboardingError> {
        let session = self.session(id).await?;
        Ok(self.view_of(id, &session).await)
    }

    /// Navigate to `target`, redirecting to the earliest unmet prerequisite.
    ///
    /// Entering `welcome` restarts the wizard. After completion every other
    /// target lands on `complete`.
    pub async fn enter(&self, id: Uuid, target: Step) -> Result<Transition, OnboardingError> {
        if target == Step::Welcome {
            self.restart(id).await?;
            let session = self.session(id).await?;
            return Ok(self.land(&session, Step::Welcome, false).await);
        }

        let session = self.session(id).await?;
        if let Some(done) = session.completed() {
            return Ok(self.land_complete(&session, done, target != Step::Complete).await);
        }

        let record = session.store.get_record().await;
        let resolved = guard(target, &record);
        if resolved != target {
            tracing::debug!(
                session_id = %id,
                requested = %target,
                resolved = %resolved,
                "Redirected to unmet prerequisite"
            );
        }
        Ok(self.land(&session, resolved, resolved != target).await)
    }

    /// Apply a submitted form and advance.
    ///
    /// A form for a step whose prerequisites are missing is not applied; the
    /// session is redirected instead. The account form creates the user
    /// exactly once per session.
    pub async fn submit(&self, id: Uuid, form: StepForm) -> Result<Transition, OnboardingError> {
        let session = self.session(id).await?;
        if let Some(done) = session.completed() {
            return Ok(self.land_complete(&session, done, false).await);
        }

        let step = form.step();
        let record = session.store.get_record().await;
        let resolved = guard(step, &record);
        if resolved != step {
            return Ok(self.land(&session, resolved, true).await);
        }

        validate_form(&form, record.role()).map_err(OnboardingError::Validation)?;

        let record = match form {
            StepForm::Welcome => record,
            StepForm::Vision(vision) => {
                let role = vision.path;
                let role_changed = record.role().is_some_and(|r| r != role);
                let form = StepForm::Vision(vision);
                let updated = session.store.update(form.into_patch()).await;
                if role_changed {
                    tracing::info!(session_id = %id, role = %role, "Role changed, clearing other tracks");
                    session.store.retain_role(role).await
                } else {
                    updated
                }
            }
            StepForm::Account(details) => {
                return self.create_account(id, session, record, details).await;
            }
            other => session.store.update(other.into_patch()).await,
        };

        let next = state::next(step, record.role()).unwrap_or(step);
        tracing::debug!(session_id = %id, from = %step, to = %next, "Step submitted");
        Ok(self.land(&session, next, false).await)
    }

    /// Go back one step from the current one.
    pub async fn back(&self, id: Uuid) -> Result<Transition, OnboardingError> {
        let session = self.session(id).await?;
        if let Some(done) = session.completed() {
            return Ok(self.land_complete(&session, done, false).await);
        }

        let record = session.store.get_record().await;
        let current = record.current();
        let previous = state::back(current, record.role()).unwrap_or(current);
        let resolved = guard(previous, &record);
        Ok(self.land(&session, resolved, resolved != previous).await)
    }

    /// Ordered progress outline for a role (or for no selection).
    pub fn track_outline(&self, role: Option<Role>) -> Vec<StepOutline> {
        state::outline(role)
    }

    async fn create_account(
        &self,
        id: Uuid,
        session: Arc<WizardSession>,
        record: OnboardingRecord,
        mut details: AccountDetails,
    ) -> Result<Transition, OnboardingError> {
        let (Some(profile), Some(role)) = (record.profile.clone(), record.role()) else {
            let resolved = guard(Step::Account, &record);
            return Ok(self.land(&session, resolved, true).await);
        };

        let acquired = {
            let mut latch = session.lock_latch();
            match *latch {
                SignupLatch::Idle => {
                    *latch = SignupLatch::Pending;
                    Ok(())
                }
                SignupLatch::Pending => Err(None),
                SignupLatch::Done(ref done) => Err(Some(done.clone())),
            }
        };
        match acquired {
            Ok(()) => {}
            Err(None) => return Err(OnboardingError::SignupInFlight),
            Err(Some(done)) => return Ok(self.land_complete(&session, done, false).await),
        }

        if role != Role::Tekker {
            details.agree_to_code_of_honor = false;
        }
        let password = SecretString::from(std::mem::take(&mut details.password));
        details.verify_password.clear();
        let record = session
            .store
            .update(RecordPatch {
                account: Some(details.clone()),
                ..Default::default()
            })
            .await;

        let request = SignupRequest {
            email: profile.email.trim().to_string(),
            username: details.username.trim().to_string(),
            country: profile.country.clone(),
            role,
            enable_2fa: details.enable_2fa,
            password,
        };

        // The attempt runs in its own task so a dropped request cannot leave
        // the latch pending.
        let attempt = tokio::spawn(run_signup(
            Arc::clone(&self.accounts),
            Arc::clone(&self.db),
            Arc::clone(&session),
            id,
            request,
            record,
        ));
        let done = match attempt.await {
            Ok(result) => result?,
            Err(e) => {
                session.set_latch(SignupLatch::Idle);
                tracing::error!(session_id = %id, "Signup task failed: {}", e);
                return Err(OnboardingError::AccountCreation {
                    message: "Account creation was interrupted".to_string(),
                    existing_role: None,
                });
            }
        };
        Ok(self.land_complete(&session, done, false).await)
    }

    /// Look a session up in memory, then in the settings table.
    async fn session(&self, id: Uuid) -> Result<Arc<WizardSession>, OnboardingError> {
        if let Some(session) = self.sessions.read().await.get(&id) {
            session.touch();
            return Ok(session.clone());
        }

        let store = OnboardingStore::restore(id, self.db.clone())
            .await
            .ok_or(OnboardingError::SessionNotFound(id))?;
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(id)
            .or_insert_with(|| Arc::new(WizardSession::new(store)))
            .clone();
        Ok(session)
    }

    async fn land(&self, session: &WizardSession, step: Step, redirected: bool) -> Transition {
        let record = session.store.get_record().await;
        let role = record.role();
        let position = state::position(step, role).unwrap_or(1);
        let current_step = session.store.set_current_step(position).await;
        Transition {
            step,
            path: step.path(),
            current_step,
            total_steps: state::total_steps(role),
            redirected,
            account: None,
        }
    }

    async fn land_complete(
        &self,
        session: &WizardSession,
        done: CompletedAccount,
        redirected: bool,
    ) -> Transition {
        session.touch();
        let total_steps = state::total_steps(Some(done.role));
        Transition {
            step: Step::Complete,
            path: Step::Complete.path(),
            current_step: total_steps,
            total_steps,
            redirected,
            account: Some(done),
        }
    }

    async fn view_of(&self, id: Uuid, session: &WizardSession) -> WizardView {
        let record = session.store.get_record().await;
        let (step, role, completed) = match session.completed() {
            Some(done) => (Step::Complete, Some(done.role), true),
            None => (record.current(), record.role(), false),
        };
        WizardView {
            session_id: id,
            progress: state::outline(role),
            step,
            completed,
            record,
        }
    }
}

/// Signup, auto-login and hand-off of the record. Always settles the latch:
/// `Idle` on failure so the account step can be retried, `Done` on success.
async fn run_signup(
    accounts: Arc<dyn AccountBridge>,
    db: Arc<dyn Database>,
    session: Arc<WizardSession>,
    id: Uuid,
    request: SignupRequest,
    record: OnboardingRecord,
) -> Result<CompletedAccount, OnboardingError> {
    let role = request.role;
    let username = request.username.clone();
    let password = request.password.clone();

    let outcome = match accounts.signup(request).await {
        Ok(outcome) => outcome,
        Err(e) => {
            session.set_latch(SignupLatch::Idle);
            tracing::warn!(session_id = %id, "Signup failed: {}", e);
            return Err(OnboardingError::AccountCreation {
                message: e.to_string(),
                existing_role: None,
            });
        }
    };

    let user_id = match (outcome.success, outcome.user_id) {
        (true, Some(user_id)) => user_id,
        _ => {
            session.set_latch(SignupLatch::Idle);
            let message = outcome
                .message
                .unwrap_or_else(|| "Account could not be created".to_string());
            tracing::info!(session_id = %id, "Signup rejected: {}", message);
            return Err(OnboardingError::AccountCreation {
                message,
                existing_role: outcome.existing_role,
            });
        }
    };

    let auth = match accounts.login(&username, &password).await {
        Ok(auth) => auth,
        Err(e) => {
            tracing::warn!(session_id = %id, user_id = %user_id, "Auto-login failed: {}", e);
            None
        }
    };

    store_profile_snapshot(db.as_ref(), user_id, &record).await;
    // The user now owns the data; the wizard keeps only the completion marker.
    session.store.reset().await;

    let done = CompletedAccount {
        user_id,
        role,
        session: auth,
    };
    session.set_latch(SignupLatch::Done(done.clone()));
    tracing::info!(session_id = %id, user_id = %user_id, role = %role, "Onboarding complete");
    Ok(done)
}

/// Keep a credential-free copy of the record for the user's dashboard.
async fn store_profile_snapshot(db: &dyn Database, user_id: Uuid, record: &OnboardingRecord) {
    let value = match serde_json::to_value(record) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("Failed to serialize onboarding snapshot: {}", e);
            return;
        }
    };
    if let Err(e) = db
        .set_setting(&user_id.to_string(), settings_keys::ONBOARDING_PROFILE, &value)
        .await
    {
        tracing::warn!(user_id = %user_id, "Failed to store onboarding snapshot: {}", e);
    }
}

/// Router guard plus the rule that `complete` is only reachable by creating
/// the account.
fn guard(target: Step, record: &OnboardingRecord) -> Step {
    match state::resolve(target, record) {
        Step::Complete => Step::Account,
        step => step,
    }
}
