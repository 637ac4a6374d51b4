//! Runtime configuration
//!
//! Loaded from the environment (and a `.env` file when present). The caller's
//! identity is deliberately absent: it is bound per orchestrator instance.

use crate::error::{OttoError, Result};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4";
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 6;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_SCHEMA_TTL: Duration = Duration::from_millis(3_600_000);

/// Where the raw-query procedure lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataStoreConfig {
    /// Hosted RPC endpoint (`<url>/rest/v1/rpc/execute_raw_query`).
    Rpc { project_url: String, service_key: String },
    /// Direct Postgres connection.
    Postgres { database_url: String },
}

#[derive(Debug, Clone)]
pub struct OttoConfig {
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub model: String,
    pub data_store: DataStoreConfig,
    pub max_tool_rounds: usize,
    pub request_timeout: Duration,
    pub schema_ttl: Duration,
    pub sql_tools: bool,
}

impl OttoConfig {
    pub fn new(openai_api_key: impl Into<String>, data_store: DataStoreConfig) -> Self {
        Self {
            openai_api_key: openai_api_key.into(),
            openai_base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            data_store,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            schema_ttl: DEFAULT_SCHEMA_TTL,
            sql_tools: false,
        }
    }

    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get("OPENAI_API_KEY")
            .ok_or_else(|| OttoError::Config("OPENAI_API_KEY is not set".to_string()))?;

        let data_store = match (get("SUPABASE_URL"), get("SUPABASE_SERVICE_KEY"), get("DATABASE_URL")) {
            (Some(project_url), Some(service_key), _) => DataStoreConfig::Rpc {
                project_url: project_url.trim_end_matches('/').to_string(),
                service_key,
            },
            (_, _, Some(database_url)) => DataStoreConfig::Postgres { database_url },
            _ => {
                return Err(OttoError::Config(
                    "either SUPABASE_URL + SUPABASE_SERVICE_KEY or DATABASE_URL must be set".to_string(),
                ))
            }
        };

        let mut config = Self::new(api_key, data_store);
        if let Some(url) = get("OPENAI_BASE_URL") {
            config.openai_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = get("OTTO_MODEL") {
            config.model = model;
        }
        if let Some(raw) = get("OTTO_MAX_TOOL_ROUNDS") {
            config.max_tool_rounds = parse_number(&raw, "OTTO_MAX_TOOL_ROUNDS")?;
            if config.max_tool_rounds == 0 {
                return Err(OttoError::Config("OTTO_MAX_TOOL_ROUNDS must be at least 1".to_string()));
            }
        }
        if let Some(raw) = get("OTTO_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(parse_number(&raw, "OTTO_REQUEST_TIMEOUT_SECS")?);
        }
        if let Some(raw) = get("OTTO_SCHEMA_TTL_SECS") {
            config.schema_ttl = Duration::from_secs(parse_number(&raw, "OTTO_SCHEMA_TTL_SECS")?);
        }
        if let Some(raw) = get("OTTO_SQL_TOOLS") {
            config.sql_tools = matches!(raw.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(raw: &str, key: &str) -> Result<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| OttoError::Config(format!("{} must be a non-negative integer, got '{}'", key, raw)))
}
