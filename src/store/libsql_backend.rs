//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::onboarding::state::Role;
use crate::store::migrations;
use crate::store::traits::{Database, StoredGeneration, StoredSession, StoredUser};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_uuid(s: &str, what: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::Serialization(format!("bad {what} id {s}: {e}")))
}

/// Map unique-index violations to `Constraint`, everything else to `Query`.
fn write_error(op: &str, e: libsql::Error) -> DatabaseError {
    let msg = e.to_string();
    if msg.contains("UNIQUE constraint failed") {
        DatabaseError::Constraint(format!("{op}: {msg}"))
    } else {
        DatabaseError::Query(format!("{op}: {msg}"))
    }
}

const USER_COLUMNS: &str =
    "id, username, email, country, role, password_hash, enable_2fa, created_at";

/// Map a libsql Row to a StoredUser. Column order matches USER_COLUMNS.
fn row_to_user(row: &libsql::Row) -> Result<StoredUser, DatabaseError> {
    let get = |idx: i32| -> Result<String, DatabaseError> {
        row.get::<String>(idx)
            .map_err(|e| DatabaseError::Serialization(format!("user column {idx}: {e}")))
    };
    let id = parse_uuid(&get(0)?, "user")?;
    let role_str = get(4)?;
    let role: Role = role_str
        .parse()
        .map_err(|e: String| DatabaseError::Serialization(e))?;
    let enable_2fa: i64 = row.get(6).unwrap_or(0);

    Ok(StoredUser {
        id,
        username: get(1)?,
        email: get(2)?,
        country: get(3)?,
        role,
        password_hash: get(5)?,
        enable_2fa: enable_2fa != 0,
        created_at: parse_datetime(&get(7)?),
    })
}

fn row_to_session(row: &libsql::Row) -> Result<StoredSession, DatabaseError> {
    let get = |idx: i32| -> Result<String, DatabaseError> {
        row.get::<String>(idx)
            .map_err(|e| DatabaseError::Serialization(format!("session column {idx}: {e}")))
    };
    Ok(StoredSession {
        token: get(0)?,
        user_id: parse_uuid(&get(1)?, "user")?,
        created_at: parse_datetime(&get(2)?),
        expires_at: parse_datetime(&get(3)?),
    })
}

fn row_to_generation(row: &libsql::Row) -> Result<StoredGeneration, DatabaseError> {
    let get = |idx: i32| -> Result<String, DatabaseError> {
        row.get::<String>(idx)
            .map_err(|e| DatabaseError::Serialization(format!("generation column {idx}: {e}")))
    };
    let parse_json = |s: String| serde_json::from_str(&s).unwrap_or(serde_json::Value::Null);
    Ok(StoredGeneration {
        id: parse_uuid(&get(0)?, "generation")?,
        user_id: parse_uuid(&get(1)?, "user")?,
        flow: get(2)?,
        input: parse_json(get(3)?),
        output: parse_json(get(4)?),
        created_at: parse_datetime(&get(5)?),
    })
}

impl LibSqlBackend {
    async fn query_user(
        &self,
        op: &str,
        where_clause: &str,
        value: String,
    ) -> Result<Option<StoredUser>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE {where_clause}"),
                params![value],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_user(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("{op}: {e}"))),
        }
    }
}

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Settings ────────────────────────────────────────────────────

    async fn get_setting(
        &self,
        user_id: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                "SELECT value FROM settings WHERE user_id = ?1 AND key = ?2",
                params![user_id, key],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_setting: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let value_str: String = row.get(0).unwrap_or_else(|_| "null".to_string());
                let value: serde_json::Value =
                    serde_json::from_str(&value_str).unwrap_or(serde_json::Value::Null);
                Ok(Some(value))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_setting: {e}"))),
        }
    }

    async fn set_setting(
        &self,
        user_id: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), DatabaseError> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();
        let value_str = serde_json::to_string(value)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        conn.execute(
            "INSERT INTO settings (user_id, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (user_id, key) DO UPDATE SET value = ?3, updated_at = ?4",
            params![user_id, key, value_str, now],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("set_setting: {e}")))?;

        Ok(())
    }

    async fn delete_setting(&self, user_id: &str, key: &str) -> Result<bool, DatabaseError> {
        let conn = self.conn();
        let count = conn
            .execute(
                "DELETE FROM settings WHERE user_id = ?1 AND key = ?2",
                params![user_id, key],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_setting: {e}")))?;
        Ok(count > 0)
    }

    // ── Users ───────────────────────────────────────────────────────

    async fn insert_user(&self, user: &StoredUser) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                &format!("INSERT INTO users ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
                params![
                    user.id.to_string(),
                    user.username.clone(),
                    user.email.clone(),
                    user.country.clone(),
                    user.role.as_str(),
                    user.password_hash.clone(),
                    user.enable_2fa as i64,
                    user.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| write_error("insert_user", e))?;

        debug!(user_id = %user.id, username = %user.username, "User inserted");
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<StoredUser>, DatabaseError> {
        self.query_user("get_user", "id = ?1", id.to_string()).await
    }

    async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<StoredUser>, DatabaseError> {
        self.query_user(
            "get_user_by_username",
            "lower(username) = lower(?1)",
            username.to_string(),
        )
        .await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<StoredUser>, DatabaseError> {
        self.query_user(
            "get_user_by_email",
            "lower(email) = lower(?1)",
            email.to_string(),
        )
        .await
    }

    // ── Sessions ────────────────────────────────────────────────────

    async fn insert_session(&self, session: &StoredSession) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    session.token.clone(),
                    session.user_id.to_string(),
                    session.created_at.to_rfc3339(),
                    session.expires_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| write_error("insert_session", e))?;
        Ok(())
    }

    async fn get_session(&self, token: &str) -> Result<Option<StoredSession>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT token, user_id, created_at, expires_at FROM sessions WHERE token = ?1",
                params![token],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_session: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_session(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_session: {e}"))),
        }
    }

    async fn delete_session(&self, token: &str) -> Result<bool, DatabaseError> {
        let count = self
            .conn()
            .execute("DELETE FROM sessions WHERE token = ?1", params![token])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_session: {e}")))?;
        Ok(count > 0)
    }

    async fn prune_expired_sessions(&self) -> Result<usize, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let count = self
            .conn()
            .execute("DELETE FROM sessions WHERE expires_at < ?1", params![now])
            .await
            .map_err(|e| DatabaseError::Query(format!("prune_expired_sessions: {e}")))?;
        if count > 0 {
            info!(count, "Pruned expired sessions");
        }
        Ok(count as usize)
    }

    // ── Generations ─────────────────────────────────────────────────

    async fn insert_generation(&self, generation: &StoredGeneration) -> Result<(), DatabaseError> {
        let input = serde_json::to_string(&generation.input)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let output = serde_json::to_string(&generation.output)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        self.conn()
            .execute(
                "INSERT INTO generations (id, user_id, flow, input, output, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    generation.id.to_string(),
                    generation.user_id.to_string(),
                    generation.flow.clone(),
                    input,
                    output,
                    generation.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| write_error("insert_generation", e))?;
        Ok(())
    }

    async fn list_generations(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<StoredGeneration>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, user_id, flow, input, output, created_at FROM generations
                 WHERE user_id = ?1 ORDER BY created_at DESC LIMIT ?2",
                params![user_id.to_string(), limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_generations: {e}")))?;

        let mut generations = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_generation(&row) {
                Ok(g) => generations.push(g),
                Err(e) => tracing::warn!("Skipping generation row: {e}"),
            }
        }
        Ok(generations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    fn make_user(username: &str, email: &str) -> StoredUser {
        StoredUser {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            country: "NL".to_string(),
            role: Role::BrandConsultant,
            password_hash: "$argon2id$v=19$stub".to_string(),
            enable_2fa: true,
            created_at: Utc::now(),
        }
    }

    // ── Settings tests ──────────────────────────────────────────────

    #[tokio::test]
    async fn settings_crud() {
        let db = test_db().await;
        let value = serde_json::json!({"currentStep": 3, "profile": {"fullName": "Ada"}});

        db.set_setting("session-1", "onboarding_record", &value)
            .await
            .unwrap();
        let fetched = db
            .get_setting("session-1", "onboarding_record")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched["currentStep"], 3);

        let updated = serde_json::json!({"currentStep": 4});
        db.set_setting("session-1", "onboarding_record", &updated)
            .await
            .unwrap();
        let fetched2 = db
            .get_setting("session-1", "onboarding_record")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched2["currentStep"], 4);

        assert!(db.delete_setting("session-1", "onboarding_record").await.unwrap());
        assert!(!db.delete_setting("session-1", "onboarding_record").await.unwrap());
        assert!(db
            .get_setting("session-1", "onboarding_record")
            .await
            .unwrap()
            .is_none());
    }

    // ── User tests ──────────────────────────────────────────────────

    #[tokio::test]
    async fn insert_and_lookup_user() {
        let db = test_db().await;
        let user = make_user("Brand_Guru", "guru@example.com");
        db.insert_user(&user).await.unwrap();

        let by_id = db.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(by_id, StoredUser {
            created_at: by_id.created_at,
            ..user.clone()
        });

        let by_name = db.get_user_by_username("brand_guru").await.unwrap().unwrap();
        assert_eq!(by_name.id, user.id);
        assert_eq!(by_name.role, Role::BrandConsultant);
        assert!(by_name.enable_2fa);

        let by_email = db.get_user_by_email("GURU@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, user.id);

        assert!(db.get_user_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_username_is_constraint_error() {
        let db = test_db().await;
        db.insert_user(&make_user("taken", "a@example.com")).await.unwrap();
        let err = db
            .insert_user(&make_user("TAKEN", "b@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Constraint(_)), "got {err:?}");
    }

    // ── Session tests ───────────────────────────────────────────────

    #[tokio::test]
    async fn session_lifecycle_and_pruning() {
        let db = test_db().await;
        let user = make_user("sessions", "s@example.com");
        db.insert_user(&user).await.unwrap();

        let live = StoredSession {
            token: "live-token".into(),
            user_id: user.id,
            created_at: Utc::now(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
        };
        let stale = StoredSession {
            token: "stale-token".into(),
            user_id: user.id,
            created_at: Utc::now() - chrono::Duration::hours(3),
            expires_at: Utc::now() - chrono::Duration::hours(1),
        };
        db.insert_session(&live).await.unwrap();
        db.insert_session(&stale).await.unwrap();

        let fetched = db.get_session("live-token").await.unwrap().unwrap();
        assert_eq!(fetched.user_id, user.id);

        assert_eq!(db.prune_expired_sessions().await.unwrap(), 1);
        assert!(db.get_session("stale-token").await.unwrap().is_none());

        assert!(db.delete_session("live-token").await.unwrap());
        assert!(db.get_session("live-token").await.unwrap().is_none());
    }

    // ── Generation tests ────────────────────────────────────────────

    #[tokio::test]
    async fn generations_most_recent_first() {
        let db = test_db().await;
        let user = make_user("gen", "gen@example.com");
        db.insert_user(&user).await.unwrap();

        for i in 0..3 {
            db.insert_generation(&StoredGeneration {
                id: Uuid::new_v4(),
                user_id: user.id,
                flow: "brand-taglines".into(),
                input: serde_json::json!({"n": i}),
                output: serde_json::json!({"taglines": ["x"]}),
                created_at: Utc::now() + chrono::Duration::seconds(i),
            })
            .await
            .unwrap();
        }

        let listed = db.list_generations(user.id, 2).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].input["n"], 2);
        assert!(listed[0].created_at >= listed[1].created_at);
    }

    #[tokio::test]
    async fn open_local_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("launchpad.db");
        let db = LibSqlBackend::new_local(&path).await.unwrap();
        db.set_setting("u", "k", &serde_json::json!(1)).await.unwrap();
        assert!(path.exists());
    }
}
