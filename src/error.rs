//! Error types for Launchpad.

use std::time::Duration;

use crate::onboarding::validate::ValidationErrors;
use crate::onboarding::state::Role;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Onboarding error: {0}")]
    Onboarding(#[from] OnboardingError),

    #[error("Account error: {0}")]
    Account(#[from] AccountError),

    #[error("Flow error: {0}")]
    Flow(#[from] FlowError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("No LLM provider configured")]
    NotConfigured,
}

/// Errors raised while driving the onboarding wizard.
///
/// A missing prerequisite is not an error: the router answers it with a
/// redirect.
#[derive(Debug, thiserror::Error)]
pub enum OnboardingError {
    #[error("Onboarding session {0} not found")]
    SessionNotFound(uuid::Uuid),

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Account creation failed: {message}")]
    AccountCreation {
        message: String,
        existing_role: Option<Role>,
    },

    #[error("Account creation already in progress")]
    SignupInFlight,
}

/// Account/session bridge errors.
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Generative flow errors.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("Unknown flow: {0}")]
    UnknownFlow(String),

    #[error("Flow {flow} is not available for role {role}")]
    NotAvailable { flow: String, role: Role },

    #[error("Invalid input for {flow}: {reason}")]
    InvalidInput { flow: String, reason: String },

    #[error("Output of {flow} violates its schema: {reason}")]
    SchemaViolation { flow: String, reason: String },

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
