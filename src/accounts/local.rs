//! `LocalAccounts`: argon2-hashed users and random bearer sessions stored in
//! the service database.

use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

use crate::error::{AccountError, DatabaseError};
use crate::store::{Database, StoredSession, StoredUser};

use super::{AccountBridge, AuthSession, SignupOutcome, SignupRequest, UserAccount};

const TOKEN_LEN: usize = 48;

/// Account bridge backed by the local `users` and `sessions` tables.
pub struct LocalAccounts {
    db: Arc<dyn Database>,
    argon2: Argon2<'static>,
    session_ttl: Duration,
}

impl LocalAccounts {
    pub fn new(db: Arc<dyn Database>, session_ttl: Duration) -> Self {
        Self {
            db,
            argon2: Argon2::default(),
            session_ttl,
        }
    }

    /// Hash on the blocking pool; argon2 is CPU-bound.
    async fn hash_password(&self, password: &SecretString) -> Result<String, AccountError> {
        let argon2 = self.argon2.clone();
        let password = password.clone();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            argon2
                .hash_password(password.expose_secret().as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|e| AccountError::Hashing(e.to_string()))
        })
        .await
        .map_err(|e| AccountError::Hashing(e.to_string()))?
    }

    async fn verify_password(
        &self,
        password: &SecretString,
        hash: &str,
    ) -> Result<bool, AccountError> {
        let argon2 = self.argon2.clone();
        let password = password.clone();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || {
            let parsed =
                PasswordHash::new(&hash).map_err(|e| AccountError::Hashing(e.to_string()))?;
            Ok(argon2
                .verify_password(password.expose_secret().as_bytes(), &parsed)
                .is_ok())
        })
        .await
        .map_err(|e| AccountError::Hashing(e.to_string()))?
    }
}

fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

#[async_trait]
impl AccountBridge for LocalAccounts {
    async fn signup(&self, request: SignupRequest) -> Result<SignupOutcome, AccountError> {
        if let Some(existing) = self.db.get_user_by_email(&request.email).await? {
            tracing::info!(email = %request.email, "Signup rejected: email already registered");
            return Ok(SignupOutcome::rejected(
                "An account with this email already exists",
                Some(existing.role),
            ));
        }
        if let Some(existing) = self.db.get_user_by_username(&request.username).await? {
            tracing::info!(username = %request.username, "Signup rejected: username taken");
            return Ok(SignupOutcome::rejected(
                "This username is already taken",
                Some(existing.role),
            ));
        }

        let user = StoredUser {
            id: Uuid::new_v4(),
            username: request.username,
            email: request.email,
            country: request.country,
            role: request.role,
            password_hash: self.hash_password(&request.password).await?,
            enable_2fa: request.enable_2fa,
            created_at: Utc::now(),
        };

        match self.db.insert_user(&user).await {
            Ok(()) => {}
            // Lost a race with a concurrent signup for the same name or email.
            Err(DatabaseError::Constraint(_)) => {
                return Ok(SignupOutcome::rejected(
                    "An account with this username or email already exists",
                    None,
                ));
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(user_id = %user.id, role = %user.role, "User account created");
        Ok(SignupOutcome::created(user.id))
    }

    async fn login(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<Option<AuthSession>, AccountError> {
        let Some(user) = self.db.get_user_by_username(username).await? else {
            return Ok(None);
        };
        if !self.verify_password(password, &user.password_hash).await? {
            tracing::info!(username = %username, "Login rejected: bad password");
            return Ok(None);
        }

        if let Err(e) = self.db.prune_expired_sessions().await {
            tracing::warn!("Failed to prune expired sessions: {}", e);
        }

        let now = Utc::now();
        let session = StoredSession {
            token: generate_token(),
            user_id: user.id,
            created_at: now,
            expires_at: now + self.session_ttl,
        };
        self.db.insert_session(&session).await?;

        tracing::info!(user_id = %user.id, "Session opened");
        Ok(Some(AuthSession {
            token: session.token,
            user_id: session.user_id,
            expires_at: session.expires_at,
        }))
    }

    async fn authenticate(&self, token: &str) -> Result<Option<UserAccount>, AccountError> {
        let Some(session) = self.db.get_session(token).await? else {
            return Ok(None);
        };
        if session.expires_at <= Utc::now() {
            self.db.delete_session(token).await?;
            return Ok(None);
        }
        Ok(self.db.get_user(session.user_id).await?.map(UserAccount::from))
    }

    async fn logout(&self, token: &str) -> Result<bool, AccountError> {
        Ok(self.db.delete_session(token).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onboarding::state::Role;
    use crate::store::LibSqlBackend;

    async fn accounts() -> LocalAccounts {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        LocalAccounts::new(db, Duration::hours(1))
    }

    fn request(username: &str, email: &str, role: Role) -> SignupRequest {
        SignupRequest {
            email: email.into(),
            username: username.into(),
            country: "DE".into(),
            role,
            enable_2fa: false,
            password: SecretString::from("correct horse battery"),
        }
    }

    #[tokio::test]
    async fn signup_then_login_and_authenticate() {
        let accounts = accounts().await;
        let outcome = accounts
            .signup(request("builder", "builder@example.com", Role::Tekker))
            .await
            .unwrap();
        assert!(outcome.success);
        let user_id = outcome.user_id.unwrap();

        let session = accounts
            .login("builder", &SecretString::from("correct horse battery"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.user_id, user_id);
        assert_eq!(session.token.len(), TOKEN_LEN);

        let user = accounts.authenticate(&session.token).await.unwrap().unwrap();
        assert_eq!(user.role, Role::Tekker);
        assert_eq!(user.email, "builder@example.com");

        assert!(accounts.logout(&session.token).await.unwrap());
        assert!(accounts.authenticate(&session.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn password_is_stored_hashed() {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let accounts = LocalAccounts::new(db.clone(), Duration::hours(1));
        accounts
            .signup(request("hashed", "hashed@example.com", Role::Investor))
            .await
            .unwrap();

        let stored = db.get_user_by_username("hashed").await.unwrap().unwrap();
        assert!(stored.password_hash.starts_with("$argon2"));
        assert!(!stored.password_hash.contains("correct horse battery"));
    }

    #[tokio::test]
    async fn duplicate_email_reports_existing_role() {
        let accounts = accounts().await;
        accounts
            .signup(request("first", "same@example.com", Role::Investor))
            .await
            .unwrap();

        let outcome = accounts
            .signup(request("second", "SAME@example.com", Role::FounderCeo))
            .await
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.existing_role, Some(Role::Investor));
        assert!(outcome.message.unwrap().contains("email"));
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let accounts = accounts().await;
        accounts
            .signup(request("taken", "one@example.com", Role::BrandConsultant))
            .await
            .unwrap();

        let outcome = accounts
            .signup(request("Taken", "two@example.com", Role::Tekker))
            .await
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.existing_role, Some(Role::BrandConsultant));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_yield_none() {
        let accounts = accounts().await;
        accounts
            .signup(request("careful", "careful@example.com", Role::Tekker))
            .await
            .unwrap();

        assert!(accounts
            .login("careful", &SecretString::from("wrong"))
            .await
            .unwrap()
            .is_none());
        assert!(accounts
            .login("ghost", &SecretString::from("correct horse battery"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn expired_sessions_do_not_authenticate() {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let accounts = LocalAccounts::new(db, Duration::seconds(-1));
        accounts
            .signup(request("brief", "brief@example.com", Role::Investor))
            .await
            .unwrap();
        let session = accounts
            .login("brief", &SecretString::from("correct horse battery"))
            .await
            .unwrap()
            .unwrap();

        assert!(accounts.authenticate(&session.token).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn concurrent_signups_hash_off_the_runtime_thread() {
        let accounts = accounts().await;
        let ticks = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let ticker = {
            let ticks = ticks.clone();
            tokio::spawn(async move {
                loop {
                    ticks.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    tokio::task::yield_now().await;
                }
            })
        };

        let (a, b) = tokio::join!(
            accounts.signup(request("first_one", "first@example.com", Role::Tekker)),
            accounts.signup(request("second_one", "second@example.com", Role::Investor)),
        );
        ticker.abort();

        assert!(a.unwrap().success);
        assert!(b.unwrap().success);
        // The single runtime thread kept running other tasks while hashing.
        assert!(ticks.load(std::sync::atomic::Ordering::SeqCst) > 0);

        let hash = accounts
            .hash_password(&SecretString::from("another secret"))
            .await
            .unwrap();
        assert!(accounts
            .verify_password(&SecretString::from("another secret"), &hash)
            .await
            .unwrap());
        assert!(!accounts
            .verify_password(&SecretString::from("not it"), &hash)
            .await
            .unwrap());
    }

    #[test]
    fn tokens_are_alphanumeric_and_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), TOKEN_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
