//! Model-based SQL review. Advisory only: the deterministic guard in
//! `security` still runs on whatever this returns.

use crate::analysis::plan::ValidationResult;
use crate::error::{OttoError, Result};
use crate::function_schema::parse_arguments;
use crate::llm::{ChatModel, ChatRequest};
use std::sync::Arc;
use tracing::{info, warn};

pub const VALIDATE_FUNCTION: &str = "validate_query";

pub struct QueryValidator {
    model: Arc<dyn ChatModel>,
}

impl QueryValidator {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    pub async fn validate_query(&self, query: &str) -> Result<ValidationResult> {
        let function = ValidationResult::object_schema()
            .into_function(VALIDATE_FUNCTION, "Validate a SQL query for issues and security risks");
        let reply = self
            .model
            .complete(ChatRequest::forced(build_prompt(query), function))
            .await?;
        let arguments = reply.function_arguments(VALIDATE_FUNCTION)?;
        let value = parse_arguments(arguments, &ValidationResult::object_schema())?;
        let result: ValidationResult = serde_json::from_value(value)?;

        if !result.security_risks.is_empty() {
            warn!(risks = ?result.security_risks, "validator reported security risks");
        }
        Ok(result)
    }

    /// The query to run: the original when valid, the suggested fix when
    /// invalid and one is offered, otherwise an error listing the issues.
    pub async fn validate_and_fix_query(&self, query: &str) -> Result<String> {
        let result = self.validate_query(query).await?;
        if result.is_valid {
            return Ok(query.to_string());
        }
        match result.suggested_fix.filter(|fix| !fix.trim().is_empty()) {
            Some(fix) => {
                info!(issues = ?result.issues, "using validator's suggested fix");
                Ok(fix)
            }
            None => Err(OttoError::Validation(result.issues.join(", "))),
        }
    }
}

fn build_prompt(query: &str) -> String {
    format!(
        "You are a SQL query validator. Analyze the following SQL query for potential issues and security risks.\n\
         Pay special attention to:\n\
         1. SQL injection vulnerabilities\n\
         2. Proper use of parameterized queries (the only allowed parameter is :currentUserId)\n\
         3. Performance implications\n\
         4. Proper handling of NULL values\n\
         5. Correct join conditions\n\
         6. Appropriate use of indexes\n\
         7. Resource consumption (memory, CPU)\n\
         8. Data type mismatches\n\
         9. Potential deadlocks or blocking issues\n\
         10. Access control implications\n\n\
         Query to validate:\n{}\n\n\
         Provide a structured analysis including:\n\
         1. Whether the query is valid\n\
         2. Any issues found\n\
         3. Suggested fixes (if applicable)\n\
         4. Security risks identified",
        query
    )
}
