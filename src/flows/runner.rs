//! FlowRunner: fills a flow's prompt, calls the LLM and checks the result.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::accounts::UserAccount;
use crate::error::{FlowError, LlmError};
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::store::{Database, StoredGeneration};

use super::Flow;
use super::model::{FlowInput, FlowOutput};
use super::prompts::{system_prompt, user_prompt};

/// Configuration for flow generation.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// LLM temperature for generation.
    pub temperature: f32,
    /// Max tokens for the LLM response.
    pub max_tokens: u32,
    /// How many past generations a dashboard shows.
    pub history_limit: usize,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1024,
            history_limit: 20,
        }
    }
}

/// One recorded flow result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Generation {
    pub id: Uuid,
    pub flow: Flow,
    pub input: serde_json::Value,
    pub output: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<StoredGeneration> for Generation {
    type Error = String;

    fn try_from(stored: StoredGeneration) -> Result<Self, Self::Error> {
        Ok(Self {
            id: stored.id,
            flow: stored.flow.parse()?,
            input: stored.input,
            output: stored.output,
            created_at: stored.created_at,
        })
    }
}

/// Runs generative flows on behalf of signed-in users.
pub struct FlowRunner {
    llm: Option<Arc<dyn LlmProvider>>,
    db: Arc<dyn Database>,
    config: FlowConfig,
}

impl FlowRunner {
    /// `llm` is `None` when no provider is configured; every run then fails
    /// with `LlmError::NotConfigured`.
    pub fn new(llm: Option<Arc<dyn LlmProvider>>, db: Arc<dyn Database>, config: FlowConfig) -> Self {
        Self { llm, db, config }
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// Run `flow` for `user` with a raw JSON input.
    pub async fn run(
        &self,
        user: &UserAccount,
        flow: Flow,
        input: serde_json::Value,
    ) -> Result<Generation, FlowError> {
        if !flow.is_available_for(user.role) {
            return Err(FlowError::NotAvailable {
                flow: flow.to_string(),
                role: user.role,
            });
        }
        let input = FlowInput::parse(flow, input)?;
        let llm = self.llm.as_ref().ok_or(LlmError::NotConfigured)?;

        info!(user_id = %user.id, flow = %flow, model = llm.model_name(), "Running flow");

        let request = CompletionRequest::new(vec![
            ChatMessage::system(system_prompt(flow)),
            ChatMessage::user(user_prompt(&input)),
        ])
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens);

        let response = llm.complete(request).await?;
        let json = extract_json_object(&response.content);
        let output = match FlowOutput::parse(flow, &json) {
            Ok(output) => output,
            Err(e) => {
                warn!(flow = %flow, error = %e, response = %response.content, "Flow output rejected");
                return Err(e);
            }
        };

        let generation = Generation {
            id: Uuid::new_v4(),
            flow,
            input: input.to_json(),
            output: serde_json::to_value(&output).unwrap_or(serde_json::Value::Null),
            created_at: Utc::now(),
        };
        self.record(user.id, &generation).await;

        info!(
            user_id = %user.id,
            flow = %flow,
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "Flow complete"
        );
        Ok(generation)
    }

    /// The user's most recent generations, newest first.
    pub async fn history(&self, user_id: Uuid, limit: usize) -> Vec<Generation> {
        match self.db.list_generations(user_id, limit).await {
            Ok(rows) => rows
                .into_iter()
                .filter_map(|row| match Generation::try_from(row) {
                    Ok(g) => Some(g),
                    Err(e) => {
                        warn!("Skipping stored generation: {}", e);
                        None
                    }
                })
                .collect(),
            Err(e) => {
                warn!(user_id = %user_id, "Failed to load generation history: {}", e);
                Vec::new()
            }
        }
    }

    async fn record(&self, user_id: Uuid, generation: &Generation) {
        let stored = StoredGeneration {
            id: generation.id,
            user_id,
            flow: generation.flow.to_string(),
            input: generation.input.clone(),
            output: generation.output.clone(),
            created_at: generation.created_at,
        };
        if let Err(e) = self.db.insert_generation(&stored).await {
            warn!(user_id = %user_id, flow = %generation.flow, "Failed to record generation: {}", e);
        }
    }
}

/// Extract a JSON object from LLM output that might contain markdown or extra text.
fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    // Wrapped in a markdown code block
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner.to_string();
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if end > start {
            return trimmed[start..=end].to_string();
        }
    }

    trimmed.to_string()
}
