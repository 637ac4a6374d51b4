use thiserror::Error;

#[derive(Error, Debug)]
pub enum OttoError {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Invalid query plan: {0}")]
    InvalidPlan(String),

    #[error("Invalid query: {0}")]
    Validation(String),

    #[error("Query rejected by guard: {0}")]
    Guard(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Deadline exceeded: {0}")]
    Timeout(String),

    #[error("Tool round limit exceeded: {0}")]
    ToolLimit(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl OttoError {
    /// Stable tag reported as `metadata.errorType` in failure envelopes.
    pub fn error_type(&self) -> &'static str {
        match self {
            OttoError::Schema(_) => "schema_error",
            OttoError::Llm(_) => "llm_error",
            OttoError::InvalidPlan(_) => "invalid_plan",
            OttoError::Validation(_) => "validation_error",
            OttoError::Guard(_) => "guard_rejected",
            OttoError::Execution(_) => "execution_error",
            OttoError::Tool(_) => "tool_error",
            OttoError::Config(_) => "config_error",
            OttoError::Timeout(_) => "timeout",
            OttoError::ToolLimit(_) => "tool_limit_exceeded",
            OttoError::Json(_) => "json_error",
            OttoError::Http(_) => "http_error",
            OttoError::Database(_) => "database_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, OttoError>;
