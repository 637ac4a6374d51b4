//! Question execution: plan, review, bind the caller, run.

use crate::analysis::{Filters, QueryAnalyzer, QueryValidator};
use crate::db::DataStore;
use crate::error::{OttoError, Result};
use crate::execution::parameters::{substitute, UserIdentity};
use crate::security::QueryGuards;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SuccessMetadata {
    pub tables_accessed: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<Filters>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FailureMetadata {
    pub timestamp: String,
    pub error_type: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSuccess {
    pub success: bool,
    pub primary_results: Value,
    pub sub_query_results: Vec<Value>,
    pub metadata: SuccessMetadata,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExecutionFailure {
    pub success: bool,
    pub error: String,
    pub metadata: FailureMetadata,
}

impl ExecutionFailure {
    pub fn from_error(err: &OttoError) -> Self {
        Self {
            success: false,
            error: err.to_string(),
            metadata: FailureMetadata {
                timestamp: Utc::now().to_rfc3339(),
                error_type: err.error_type().to_string(),
            },
        }
    }
}

/// Result of one question, as handed back to the model.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ExecutionEnvelope {
    Success(ExecutionSuccess),
    Failure(ExecutionFailure),
}

impl ExecutionEnvelope {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionEnvelope::Success(_))
    }
}

pub struct QueryExecutor {
    analyzer: Arc<QueryAnalyzer>,
    validator: Arc<QueryValidator>,
    store: Arc<dyn DataStore>,
    guards: QueryGuards,
}

impl QueryExecutor {
    pub fn new(
        analyzer: Arc<QueryAnalyzer>,
        validator: Arc<QueryValidator>,
        store: Arc<dyn DataStore>,
    ) -> Self {
        Self { analyzer, validator, store, guards: QueryGuards::new() }
    }

    /// Answer `question` for `identity`. Failures come back as a value.
    pub async fn execute(&self, question: &str, identity: &UserIdentity) -> ExecutionEnvelope {
        match self.try_execute(question, identity).await {
            Ok(success) => ExecutionEnvelope::Success(success),
            Err(e) => {
                warn!(error = %e, error_type = e.error_type(), "query execution failed");
                ExecutionEnvelope::Failure(ExecutionFailure::from_error(&e))
            }
        }
    }

    pub async fn try_execute(&self, question: &str, identity: &UserIdentity) -> Result<ExecutionSuccess> {
        let plan = self.analyzer.analyze_query(question).await?;
        let primary_results = self.run_statement(&plan.primary_query, identity).await?;

        let mut sub_query_results = Vec::with_capacity(plan.sub_queries.len());
        for (idx, sub_query) in plan.sub_queries.iter().enumerate() {
            match self.run_statement(sub_query, identity).await {
                Ok(rows) => sub_query_results.push(rows),
                Err(e) => warn!(index = idx, error = %e, "sub-query failed, skipping"),
            }
        }

        info!(
            tables = ?plan.required_tables,
            sub_queries = sub_query_results.len(),
            "query executed"
        );
        Ok(ExecutionSuccess {
            success: true,
            primary_results,
            sub_query_results,
            metadata: SuccessMetadata { tables_accessed: plan.required_tables, filters: plan.filters },
        })
    }

    /// Review, guard, bind, and run one templated statement.
    pub async fn run_statement(&self, template: &str, identity: &UserIdentity) -> Result<Value> {
        let reviewed = self.validator.validate_and_fix_query(template).await?;
        self.run_reviewed(&reviewed, identity).await
    }

    /// Guard, bind, and run a statement that has already been reviewed.
    pub async fn run_reviewed(&self, template: &str, identity: &UserIdentity) -> Result<Value> {
        self.guards.check_placeholders(template)?;
        let sql = substitute(template, identity);
        self.guards.check_statement(&sql)?;

        debug!(sql = %template, "executing statement");
        self.store.execute_raw_query(&sql).await
    }
}
