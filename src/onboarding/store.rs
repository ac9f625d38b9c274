//! OnboardingStore: holds one wizard session's record and mirrors it to the
//! settings table.

use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::store::Database;

use super::model::{OnboardingRecord, RecordPatch, settings_keys};
use super::state::Role;

/// The in-progress registration for one wizard session.
///
/// The in-memory record is authoritative. Every mutation is written through to
/// the settings table (scope = session id, key = `onboarding_record`); a failed
/// write is logged and otherwise ignored.
pub struct OnboardingStore {
    session_id: Uuid,
    db: Arc<dyn Database>,
    record: RwLock<OnboardingRecord>,
}

impl OnboardingStore {
    /// A fresh, empty record for a new session.
    pub fn new(session_id: Uuid, db: Arc<dyn Database>) -> Self {
        Self {
            session_id,
            db,
            record: RwLock::new(OnboardingRecord::default()),
        }
    }

    /// Rebuild a session from its persisted copy.
    ///
    /// Returns `None` when nothing was persisted for the session. A copy that
    /// no longer deserializes is replaced by an empty record.
    pub async fn restore(session_id: Uuid, db: Arc<dyn Database>) -> Option<Self> {
        let value = match db
            .get_setting(&session_id.to_string(), settings_keys::ONBOARDING_RECORD)
            .await
        {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(session_id = %session_id, "Failed to load onboarding record: {}", e);
                return None;
            }
        };

        let mut record = match serde_json::from_value::<OnboardingRecord>(value) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(
                    session_id = %session_id,
                    "Discarding unreadable onboarding record: {}",
                    e
                );
                OnboardingRecord::default()
            }
        };
        record.clamp_current_step();

        tracing::debug!(session_id = %session_id, step = record.current_step, "Restored onboarding record");
        Some(Self {
            session_id,
            db,
            record: RwLock::new(record),
        })
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Snapshot of the current record.
    pub async fn get_record(&self) -> OnboardingRecord {
        self.record.read().await.clone()
    }

    /// Shallow-merge `patch` into the record and persist it.
    pub async fn update(&self, patch: RecordPatch) -> OnboardingRecord {
        self.mutate(|record| record.merge(patch)).await
    }

    /// Set the 1-indexed step, clamped to the record's track, and persist.
    pub async fn set_current_step(&self, step: u8) -> u8 {
        self.mutate(|record| {
            record.current_step = step;
            record.clamp_current_step();
        })
        .await
        .current_step
    }

    /// Drop sub-records that belong to a role other than `role`.
    pub async fn retain_role(&self, role: Role) -> OnboardingRecord {
        self.mutate(|record| record.retain_role(role)).await
    }

    /// Clear the record back to step 1 and remove the persisted copy.
    pub async fn reset(&self) {
        *self.record.write().await = OnboardingRecord::default();
        self.discard().await;
        tracing::info!(session_id = %self.session_id, "Onboarding record reset");
    }

    /// Remove the persisted copy, keeping the in-memory record.
    pub async fn discard(&self) {
        if let Err(e) = self
            .db
            .delete_setting(&self.session_id.to_string(), settings_keys::ONBOARDING_RECORD)
            .await
        {
            tracing::warn!(session_id = %self.session_id, "Failed to delete onboarding record: {}", e);
        }
    }

    async fn mutate(&self, f: impl FnOnce(&mut OnboardingRecord)) -> OnboardingRecord {
        let snapshot = {
            let mut record = self.record.write().await;
            f(&mut record);
            record.clone()
        };
        self.persist(&snapshot).await;
        snapshot
    }

    async fn persist(&self, record: &OnboardingRecord) {
        let value = match serde_json::to_value(record) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("Failed to serialize onboarding record: {}", e);
                return;
            }
        };
        if let Err(e) = self
            .db
            .set_setting(
                &self.session_id.to_string(),
                settings_keys::ONBOARDING_RECORD,
                &value,
            )
            .await
        {
            tracing::warn!(session_id = %self.session_id, "Failed to persist onboarding record: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DatabaseError;
    use crate::onboarding::model::{Profile, Vision};
    use crate::store::{LibSqlBackend, StoredGeneration, StoredSession, StoredUser};
    use async_trait::async_trait;
    use std::collections::BTreeSet;

    async fn test_db() -> Arc<dyn Database> {
        Arc::new(LibSqlBackend::new_memory().await.unwrap())
    }

    fn profile_patch() -> RecordPatch {
        RecordPatch {
            profile: Some(Profile {
                full_name: "Ada Lovelace".into(),
                email: "ada@example.com".into(),
                country: "GB".into(),
            }),
            ..Default::default()
        }
    }

    /// A database whose every call fails.
    struct BrokenDb;

    fn broken() -> DatabaseError {
        DatabaseError::Pool("offline".into())
    }

    #[async_trait]
    impl Database for BrokenDb {
        async fn run_migrations(&self) -> Result<(), DatabaseError> {
            Err(broken())
        }
        async fn get_setting(
            &self,
            _: &str,
            _: &str,
        ) -> Result<Option<serde_json::Value>, DatabaseError> {
            Err(broken())
        }
        async fn set_setting(
            &self,
            _: &str,
            _: &str,
            _: &serde_json::Value,
        ) -> Result<(), DatabaseError> {
            Err(broken())
        }
        async fn delete_setting(&self, _: &str, _: &str) -> Result<bool, DatabaseError> {
            Err(broken())
        }
        async fn insert_user(&self, _: &StoredUser) -> Result<(), DatabaseError> {
            Err(broken())
        }
        async fn get_user(&self, _: Uuid) -> Result<Option<StoredUser>, DatabaseError> {
            Err(broken())
        }
        async fn get_user_by_username(&self, _: &str) -> Result<Option<StoredUser>, DatabaseError> {
            Err(broken())
        }
        async fn get_user_by_email(&self, _: &str) -> Result<Option<StoredUser>, DatabaseError> {
            Err(broken())
        }
        async fn insert_session(&self, _: &StoredSession) -> Result<(), DatabaseError> {
            Err(broken())
        }
        async fn get_session(&self, _: &str) -> Result<Option<StoredSession>, DatabaseError> {
            Err(broken())
        }
        async fn delete_session(&self, _: &str) -> Result<bool, DatabaseError> {
            Err(broken())
        }
        async fn prune_expired_sessions(&self) -> Result<usize, DatabaseError> {
            Err(broken())
        }
        async fn insert_generation(&self, _: &StoredGeneration) -> Result<(), DatabaseError> {
            Err(broken())
        }
        async fn list_generations(
            &self,
            _: Uuid,
            _: usize,
        ) -> Result<Vec<StoredGeneration>, DatabaseError> {
            Err(broken())
        }
    }

    #[tokio::test]
    async fn update_persists_and_restores() {
        let db = test_db().await;
        let id = Uuid::new_v4();
        let store = OnboardingStore::new(id, db.clone());

        store.update(profile_patch()).await;
        assert_eq!(store.set_current_step(3).await, 3);

        let restored = OnboardingStore::restore(id, db).await.unwrap();
        let record = restored.get_record().await;
        assert_eq!(record.current_step, 3);
        assert_eq!(record.profile.unwrap().full_name, "Ada Lovelace");
    }

    #[tokio::test]
    async fn set_current_step_clamps_to_track() {
        let store = OnboardingStore::new(Uuid::new_v4(), test_db().await);
        assert_eq!(store.set_current_step(0).await, 1);
        assert_eq!(store.set_current_step(42).await, 5);

        store
            .update(RecordPatch {
                vision: Some(Vision {
                    path: Role::Investor,
                    areas_of_interest: BTreeSet::new(),
                }),
                ..Default::default()
            })
            .await;
        assert_eq!(store.set_current_step(42).await, 8);
    }

    #[tokio::test]
    async fn reset_clears_record_and_persisted_copy() {
        let db = test_db().await;
        let id = Uuid::new_v4();
        let store = OnboardingStore::new(id, db.clone());
        store.update(profile_patch()).await;

        store.reset().await;
        assert_eq!(store.get_record().await, OnboardingRecord::default());
        assert!(OnboardingStore::restore(id, db).await.is_none());
    }

    #[tokio::test]
    async fn unknown_session_is_not_restored() {
        assert!(
            OnboardingStore::restore(Uuid::new_v4(), test_db().await)
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn unreadable_copy_falls_back_to_defaults() {
        let db = test_db().await;
        let id = Uuid::new_v4();
        db.set_setting(
            &id.to_string(),
            settings_keys::ONBOARDING_RECORD,
            &serde_json::json!({"vision": {"path": "astronaut"}}),
        )
        .await
        .unwrap();

        let store = OnboardingStore::restore(id, db).await.unwrap();
        assert_eq!(store.get_record().await, OnboardingRecord::default());
    }

    #[tokio::test]
    async fn persistence_failures_are_swallowed() {
        let store = OnboardingStore::new(Uuid::new_v4(), Arc::new(BrokenDb));
        let record = store.update(profile_patch()).await;
        assert!(record.profile.is_some());
        assert!(store.get_record().await.profile.is_some());

        store.reset().await;
        assert!(store.get_record().await.profile.is_none());
    }
}
