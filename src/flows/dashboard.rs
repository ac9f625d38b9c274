//! Role dashboard: what a signed-in user sees after onboarding.

use serde::Serialize;

use crate::accounts::UserAccount;
use crate::onboarding::model::{OnboardingRecord, settings_keys};
use crate::onboarding::state::Role;
use crate::store::Database;

use super::Flow;
use super::runner::{FlowRunner, Generation};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub user: UserAccount,
    pub role: Role,
    pub flows: Vec<Flow>,
    /// Credential-free copy of the finished onboarding record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onboarding: Option<OnboardingRecord>,
    pub recent_generations: Vec<Generation>,
}

impl Dashboard {
    pub async fn load(db: &dyn Database, runner: &FlowRunner, user: UserAccount) -> Self {
        let onboarding = match db
            .get_setting(&user.id.to_string(), settings_keys::ONBOARDING_PROFILE)
            .await
        {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(user_id = %user.id, "Unreadable onboarding snapshot: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(user_id = %user.id, "Failed to load onboarding snapshot: {}", e);
                None
            }
        };

        let recent_generations = runner.history(user.id, runner.config().history_limit).await;

        Self {
            role: user.role,
            flows: Flow::available_for(user.role).to_vec(),
            onboarding,
            recent_generations,
            user,
        }
    }
}
