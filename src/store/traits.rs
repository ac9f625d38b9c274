//! Unified `Database` trait: single async interface for all persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::onboarding::state::Role;

/// A materialized user account.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub country: String,
    pub role: Role,
    /// Argon2 PHC string.
    pub password_hash: String,
    pub enable_2fa: bool,
    pub created_at: DateTime<Utc>,
}

/// An authenticated login session.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSession {
    pub token: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// One recorded generative-flow result.
#[derive(Debug, Clone)]
pub struct StoredGeneration {
    pub id: Uuid,
    pub user_id: Uuid,
    pub flow: String,
    pub input: serde_json::Value,
    pub output: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Backend-agnostic database trait covering settings, users, sessions and
/// generations.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Settings ────────────────────────────────────────────────────

    /// Read a JSON setting for a scope (a user id or a wizard session id).
    async fn get_setting(
        &self,
        user_id: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, DatabaseError>;

    /// Upsert a JSON setting.
    async fn set_setting(
        &self,
        user_id: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), DatabaseError>;

    /// Delete a setting. Returns whether a row was removed.
    async fn delete_setting(&self, user_id: &str, key: &str) -> Result<bool, DatabaseError>;

    // ── Users ───────────────────────────────────────────────────────

    /// Insert a new user. Duplicate usernames or emails yield
    /// `DatabaseError::Constraint`.
    async fn insert_user(&self, user: &StoredUser) -> Result<(), DatabaseError>;

    async fn get_user(&self, id: Uuid) -> Result<Option<StoredUser>, DatabaseError>;

    /// Case-insensitive lookup.
    async fn get_user_by_username(&self, username: &str)
    -> Result<Option<StoredUser>, DatabaseError>;

    /// Case-insensitive lookup.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<StoredUser>, DatabaseError>;

    // ── Sessions ────────────────────────────────────────────────────

    async fn insert_session(&self, session: &StoredSession) -> Result<(), DatabaseError>;

    /// Get a session by token, including expired ones.
    async fn get_session(&self, token: &str) -> Result<Option<StoredSession>, DatabaseError>;

    async fn delete_session(&self, token: &str) -> Result<bool, DatabaseError>;

    /// Delete sessions past their `expires_at`. Returns the number removed.
    async fn prune_expired_sessions(&self) -> Result<usize, DatabaseError>;

    // ── Generations ─────────────────────────────────────────────────

    async fn insert_generation(&self, generation: &StoredGeneration) -> Result<(), DatabaseError>;

    /// Most recent first, up to `limit`.
    async fn list_generations(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<StoredGeneration>, DatabaseError>;
}
