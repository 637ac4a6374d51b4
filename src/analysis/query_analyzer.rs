//! Query Analyzer
//!
//! Turns a question into a `QueryPlan` through one forced function call,
//! grounded on the filtered schema text.

use crate::analysis::plan::QueryPlan;
use crate::analysis::table_analyzer::TableRelevanceAnalyzer;
use crate::error::{OttoError, Result};
use crate::execution::parameters::{contains_token, CURRENT_USER_TOKEN};
use crate::function_schema::parse_arguments;
use crate::llm::{ChatModel, ChatRequest};
use crate::schema::SchemaCache;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const ANALYZE_FUNCTION: &str = "analyze_query";

lazy_static::lazy_static! {
    static ref OTTO_POSSESSIVE: Regex = Regex::new(r"\botto's\b").expect("valid regex");
    static ref TO_OTTO: Regex = Regex::new(r"\bto otto\b").expect("valid regex");
    static ref OTTO: Regex = Regex::new(r"\botto\b").expect("valid regex");
    static ref FIRST_PERSON: Regex = Regex::new(r"\b(me|my|i)\b").expect("valid regex");
    static ref UUID_RE: Regex =
        Regex::new(r"(?i)\b[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\b").expect("valid regex");
    static ref USER_COLUMN: Regex =
        Regex::new(r#"(?i)"?\b(assigneeId|requesterId|submitterId|userId)\b"?\s*="#).expect("valid regex");
}

/// Rewrite a question so it is unambiguously about the current user.
pub fn normalize_question(question: &str) -> String {
    let lower = question.to_lowercase();
    let step = OTTO_POSSESSIVE.replace_all(&lower, "my");
    let step = TO_OTTO.replace_all(&step, "to me");
    let normalized = OTTO.replace_all(&step, "me").into_owned();

    if FIRST_PERSON.is_match(&normalized) {
        normalized
    } else {
        format!("my {}", normalized)
    }
}

pub struct QueryAnalyzer {
    model: Arc<dyn ChatModel>,
    schema: Arc<SchemaCache>,
    tables: Arc<TableRelevanceAnalyzer>,
}

impl QueryAnalyzer {
    pub fn new(
        model: Arc<dyn ChatModel>,
        schema: Arc<SchemaCache>,
        tables: Arc<TableRelevanceAnalyzer>,
    ) -> Self {
        Self { model, schema, tables }
    }

    pub async fn analyze_query(&self, question: &str) -> Result<QueryPlan> {
        let normalized = normalize_question(question);
        let relevant = self.tables.schema_tables(&normalized);
        let schema_text = self.schema.format_schema(Some(&relevant)).await?;
        debug!(tables = ?relevant, "planning query");

        let function = QueryPlan::object_schema().into_function(
            ANALYZE_FUNCTION,
            "Analyze a natural language question and convert it to a structured SQL query plan",
        );
        let request = ChatRequest::forced(build_prompt(&normalized, &schema_text), function);
        let reply = self.model.complete(request).await?;
        let arguments = reply.function_arguments(ANALYZE_FUNCTION)?;

        let value = parse_arguments(arguments, &QueryPlan::object_schema())?;
        let mut plan: QueryPlan = serde_json::from_value(value)
            .map_err(|e| OttoError::InvalidPlan(format!("Query plan has the wrong shape: {}", e)))?;

        plan.fix_columns();
        plan.check_filter_values()?;
        check_identity(question, &normalized, &plan)?;

        info!(
            tables = ?plan.required_tables,
            sub_queries = plan.sub_queries.len(),
            "query plan ready"
        );
        Ok(plan)
    }
}

/// Reject plans that copy a UUID from the question into SQL; the caller's
/// identity must only ever arrive through the reserved token.
fn check_identity(question: &str, normalized: &str, plan: &QueryPlan) -> Result<()> {
    let question_ids: Vec<String> = UUID_RE
        .find_iter(question)
        .map(|m| m.as_str().to_lowercase())
        .collect();

    for sql in plan.statements() {
        let lower = sql.to_lowercase();
        if let Some(id) = question_ids.iter().find(|id| lower.contains(id.as_str())) {
            return Err(OttoError::InvalidPlan(format!(
                "query embeds identifier '{}' from the question; use {} instead",
                id, CURRENT_USER_TOKEN
            )));
        }
        if FIRST_PERSON.is_match(normalized) && USER_COLUMN.is_match(sql) && !contains_token(sql) {
            warn!("first-person question filters on a user column without {}", CURRENT_USER_TOKEN);
        }
    }
    Ok(())
}

pub fn build_prompt(question: &str, schema_text: &str) -> String {
    format!(
        r#"You are an expert SQL query analyzer for a ticket management system.
Given a question in natural language, analyze it and create a structured query plan.

Database Schema (Relevant Tables):
{schema}
IMPORTANT: All queries are about the current user. Never try to look up specific users by name.
The parameter {token} MUST be used to reference the current user's ID. Never wrap it in quotes.

Example Queries for Current User:

Question: How many tickets are assigned to me?
Query: SELECT COUNT(*) FROM "Tickets" WHERE "assigneeId" = {token}
Explanation: Uses {token} to reference the current user's ID
Filters: {{ "assigneeId": "{token}" }}

Question: Show my open tickets
Query: SELECT * FROM "Tickets" WHERE "assigneeId" = {token} AND "status" = 'open'
Explanation: Uses {token} combined with status filter
Filters: {{ "assigneeId": "{token}", "status": "open" }}

Question: What tickets did I submit?
Query: SELECT * FROM "Tickets" WHERE "submitterId" = {token}
Explanation: Uses {token} to find tickets submitted by current user

CRITICAL RULES:
1. ALL queries are about the currently logged-in user
2. NEVER look up users by name - Otto is just the AI assistant
3. ALWAYS use {token} for user identification
4. Use camelCase for all column names (e.g., "assigneeId" not "assignee_id") and double-quote table and column names
5. Filter values must be simple strings, not objects
6. Other formats will fail:
   :current_user_id  (wrong)
   :userId           (wrong)
   :CURRENT_USER_ID  (wrong)
   {token}    (correct)
   {{ "$eq": "{token}" }}  (wrong)
   '{token}'             (wrong, never quote the parameter)

Guidelines:
- Use proper SQL syntax for Postgres and only read data (SELECT)
- Include appropriate joins when needed
- Handle NULL values appropriately
- Use proper date/time functions for temporal queries
- Consider pagination for large result sets

Question: {question}

Provide a structured response that includes:
1. The primary SQL query needed
2. Any additional sub-queries if required
3. The tables that need to be accessed
4. Any specific filters that should be applied (as simple string values)"#,
        schema = schema_text,
        token = CURRENT_USER_TOKEN,
        question = question,
    )
}
