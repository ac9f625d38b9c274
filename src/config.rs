//! Configuration types.

use std::path::PathBuf;
use std::str::FromStr;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::flows::FlowConfig;
use crate::llm::{LlmBackend, LlmConfig};

/// Service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP server binds to.
    pub host: String,
    pub port: u16,
    /// libSQL database file.
    pub db_path: PathBuf,
    /// Lifetime of a login session.
    pub session_ttl: chrono::Duration,
    /// When set, logs are also written to a daily rolling file here.
    pub log_dir: Option<PathBuf>,
    /// Generative flow settings.
    pub flows: FlowConfig,
    /// `None` when no API key is present; flows then answer 503.
    pub llm: Option<LlmConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            db_path: PathBuf::from("./data/launchpad.db"),
            session_ttl: chrono::Duration::hours(72),
            log_dir: None,
            flows: FlowConfig::default(),
            llm: None,
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, which maps a variable name to its
    /// value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let host = get("LAUNCHPAD_HOST").unwrap_or(defaults.host);
        let port = parse_or(&get, "LAUNCHPAD_PORT", defaults.port)?;
        let db_path = get("LAUNCHPAD_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);
        let ttl_hours: i64 = parse_or(&get, "LAUNCHPAD_SESSION_TTL_HOURS", 72)?;
        if ttl_hours <= 0 {
            return Err(ConfigError::InvalidValue {
                key: "LAUNCHPAD_SESSION_TTL_HOURS".to_string(),
                message: "must be positive".to_string(),
            });
        }
        let log_dir = get("LAUNCHPAD_LOG_DIR").map(PathBuf::from);

        let flows = FlowConfig {
            temperature: parse_or(&get, "LAUNCHPAD_FLOW_TEMPERATURE", defaults.flows.temperature)?,
            max_tokens: parse_or(&get, "LAUNCHPAD_FLOW_MAX_TOKENS", defaults.flows.max_tokens)?,
            history_limit: parse_or(
                &get,
                "LAUNCHPAD_HISTORY_LIMIT",
                defaults.flows.history_limit,
            )?,
        };

        Ok(Self {
            host,
            port,
            db_path,
            session_ttl: chrono::Duration::hours(ttl_hours),
            log_dir,
            flows,
            llm: llm_from_lookup(&get)?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?}: {e}"),
        }),
        None => Ok(default),
    }
}

/// Pick the LLM backend: explicit `LAUNCHPAD_LLM_BACKEND`, otherwise whichever
/// API key is present (Anthropic first).
fn llm_from_lookup(get: &impl Fn(&str) -> Option<String>) -> Result<Option<LlmConfig>, ConfigError> {
    let backend = match get("LAUNCHPAD_LLM_BACKEND").as_deref() {
        Some("anthropic") => Some(LlmBackend::Anthropic),
        Some("openai") => Some(LlmBackend::OpenAi),
        Some(other) => {
            return Err(ConfigError::InvalidValue {
                key: "LAUNCHPAD_LLM_BACKEND".to_string(),
                message: format!("unknown backend {other:?}, expected anthropic or openai"),
            });
        }
        None if get("ANTHROPIC_API_KEY").is_some() => Some(LlmBackend::Anthropic),
        None if get("OPENAI_API_KEY").is_some() => Some(LlmBackend::OpenAi),
        None => None,
    };
    let Some(backend) = backend else {
        return Ok(None);
    };

    let key_var = match backend {
        LlmBackend::Anthropic => "ANTHROPIC_API_KEY",
        LlmBackend::OpenAi => "OPENAI_API_KEY",
    };
    let api_key = get(key_var).ok_or_else(|| ConfigError::MissingEnvVar(key_var.to_string()))?;
    let model = get("LAUNCHPAD_MODEL").unwrap_or_else(|| backend.default_model().to_string());

    Ok(Some(LlmConfig {
        backend,
        api_key: SecretString::from(api_key),
        model,
    }))
}
