//! Account/session bridge: turns a finished onboarding record into a durable
//! user and authenticates it.
//!
//! The wizard only depends on the [`AccountBridge`] trait. [`LocalAccounts`]
//! implements it over the service's own database.

pub mod local;
pub mod routes;

pub use local::LocalAccounts;
pub use routes::{AuthRouteState, auth_routes};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Serialize;
use uuid::Uuid;

use crate::error::AccountError;
use crate::onboarding::state::Role;
use crate::store::StoredUser;

/// Everything needed to materialize a user.
#[derive(Debug, Clone)]
pub struct SignupRequest {
    pub email: String,
    pub username: String,
    pub country: String,
    pub role: Role,
    pub enable_2fa: bool,
    pub password: SecretString,
}

/// Result of a signup attempt.
///
/// A rejected signup is not an error: `success` is false and `message`
/// explains why. When the rejection is a duplicate account, `existing_role`
/// is that account's role.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
}

impl SignupOutcome {
    pub fn created(user_id: Uuid) -> Self {
        Self {
            success: true,
            message: None,
            existing_role: None,
            user_id: Some(user_id),
        }
    }

    pub fn rejected(message: impl Into<String>, existing_role: Option<Role>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            existing_role,
            user_id: None,
        }
    }
}

/// A bearer session returned by a successful login.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Public view of a user. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub country: String,
    pub role: Role,
    #[serde(rename = "enable2FA")]
    pub enable_2fa: bool,
    pub created_at: DateTime<Utc>,
}

impl From<StoredUser> for UserAccount {
    fn from(user: StoredUser) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            country: user.country,
            role: user.role,
            enable_2fa: user.enable_2fa,
            created_at: user.created_at,
        }
    }
}

/// Identity operations the onboarding wizard and dashboards rely on.
#[async_trait]
pub trait AccountBridge: Send + Sync {
    /// Create a user. Duplicates come back as a rejected outcome.
    async fn signup(&self, request: SignupRequest) -> Result<SignupOutcome, AccountError>;

    /// Check credentials and open a session. `None` on bad credentials.
    async fn login(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<Option<AuthSession>, AccountError>;

    /// Resolve a bearer token to its user. `None` for unknown or expired tokens.
    async fn authenticate(&self, token: &str) -> Result<Option<UserAccount>, AccountError>;

    /// Close a session. Returns whether it existed.
    async fn logout(&self, token: &str) -> Result<bool, AccountError>;
}
