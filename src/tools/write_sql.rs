//! Free-text SQL generation against a caller-supplied schema excerpt.

use crate::analysis::fix_column_names;
use crate::error::Result;
use crate::execution::CURRENT_USER_TOKEN;
use crate::function_schema::{ObjectSchema, ParamSchema};
use crate::llm::{ChatModel, ChatRequest};
use crate::tools::{failure_body, typed_args, Tool};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

const CONTINUATION_KEYWORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "JOIN", "LEFT", "RIGHT", "INNER", "GROUP", "ORDER", "HAVING",
    "LIMIT", "OFFSET", "AND", "OR", "ON", "WITH", "UNION", "INTERSECT", "EXCEPT",
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WriteSqlArgs {
    query: String,
    filtered_schema: String,
}

pub struct WriteSqlTool {
    model: Arc<dyn ChatModel>,
}

impl WriteSqlTool {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

/// Pull the statement out of a chatty reply: from the first `SELECT`/`WITH`
/// line through the last line that still starts with a SQL keyword.
/// Replies without a statement are returned whole.
pub fn extract_sql(content: &str) -> String {
    let lines: Vec<&str> = content.lines().collect();

    let Some(start) = lines.iter().position(|l| starts_with_any(l, &["SELECT", "WITH"])) else {
        return content.to_string();
    };
    let end = lines[start + 1..]
        .iter()
        .position(|l| l.trim().is_empty() || !starts_with_any(l, CONTINUATION_KEYWORDS))
        .map_or(lines.len(), |offset| start + 1 + offset);

    lines[start..end]
        .iter()
        .map(|l| l.trim())
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn starts_with_any(line: &str, words: &[&str]) -> bool {
    let upper = line.trim().to_uppercase();
    words.iter().any(|w| upper.starts_with(w))
}

fn build_prompt(question: &str, schema: &str) -> String {
    format!(
        r#"You are an expert SQL query writer for a ticket management system.
Given a question in natural language and a database schema, create a valid SQL query.

Database Schema:
{schema}

IMPORTANT: All queries are about the current user. Never try to look up specific users by name.
The parameter {token} MUST be used to reference the current user's ID. Never wrap it in quotes.

Question: How many tickets are assigned to me?
Query: SELECT COUNT(*) FROM "Tickets" WHERE "assigneeId" = {token}

Question: Show my open tickets
Query: SELECT * FROM "Tickets" WHERE "assigneeId" = {token} AND "status" = 'open'

CRITICAL RULES:
1. ALL queries are about the currently logged-in user
2. NEVER look up users by name - Otto is just the AI assistant
3. ALWAYS use {token} for user identification
4. Use proper camelCase for column names
5. Always quote table and column names with double quotes
6. Return only the SQL query, no explanation or additional text
7. ONLY use column names that are explicitly listed in the schema above
8. Use "accountId" rather than company_id, companyId, or account_id

Question: {question}"#,
        schema = schema,
        token = CURRENT_USER_TOKEN,
        question = question,
    )
}

#[async_trait]
impl Tool for WriteSqlTool {
    fn name(&self) -> &str {
        "writeSQL"
    }

    fn description(&self) -> &str {
        "Convert a natural language query into a SQL statement using the provided schema information"
    }

    fn parameters(&self) -> ObjectSchema {
        ObjectSchema::new()
            .required("query", ParamSchema::string().describe("The natural language query to convert to SQL"))
            .required(
                "filteredSchema",
                ParamSchema::string().describe("The filtered database schema relevant to this query"),
            )
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let args: WriteSqlArgs = typed_args(self.name(), args)?;
        let request = ChatRequest::prompt(build_prompt(&args.query, &args.filtered_schema), 0.0);
        match self.model.complete(request).await {
            Ok(reply) => {
                let sql = fix_column_names(&extract_sql(&reply.content.unwrap_or_default()));
                debug!(sql = %sql, "generated SQL");
                Ok(json!({ "success": true, "sql": sql }).to_string())
            }
            Err(e) => Ok(failure_body(&e)),
        }
    }
}
