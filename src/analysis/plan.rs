//! Structured outputs produced by the analyzer and validator calls.

use crate::analysis::column_fixer::fix_column_names;
use crate::error::{OttoError, Result};
use crate::function_schema::{ObjectSchema, ParamSchema};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    New,
    Open,
    Pending,
    OnHold,
    Solved,
    Closed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TicketPriority {
    Low,
    Normal,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TicketType {
    Question,
    Incident,
    Problem,
    Task,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DateRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

/// Filters extracted from the question. Values stay plain strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Filters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TicketStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TicketPriority>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub ticket_type: Option<TicketType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryPlan {
    pub primary_query: String,
    #[serde(default)]
    pub sub_queries: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Filters>,
    pub required_tables: Vec<String>,
}

impl QueryPlan {
    pub fn object_schema() -> ObjectSchema {
        let date_range = ObjectSchema::new()
            .optional("start", ParamSchema::string())
            .optional("end", ParamSchema::string());

        let filters = ObjectSchema::new()
            .optional(
                "ticketId",
                ParamSchema::string().describe("Ticket UUID or a parameter such as :currentUserId"),
            )
            .optional(
                "status",
                ParamSchema::enumeration(&["new", "open", "pending", "on_hold", "solved", "closed"]),
            )
            .optional("priority", ParamSchema::enumeration(&["low", "normal", "high", "urgent"]))
            .optional("type", ParamSchema::enumeration(&["question", "incident", "problem", "task"]))
            .optional(
                "assigneeId",
                ParamSchema::string().describe("Assignee UUID or the :currentUserId parameter"),
            )
            .optional("dateRange", ParamSchema::object(date_range));

        ObjectSchema::new()
            .required("primaryQuery", ParamSchema::string().describe("The main SQL query to execute"))
            .optional(
                "subQueries",
                ParamSchema::array(ParamSchema::string()).describe("Additional queries that may be needed"),
            )
            .optional("filters", ParamSchema::object(filters))
            .required(
                "requiredTables",
                ParamSchema::array(ParamSchema::string()).describe("Tables needed for this query"),
            )
    }

    /// Every statement in the plan, primary first.
    pub fn statements(&self) -> impl Iterator<Item = &String> {
        std::iter::once(&self.primary_query).chain(self.sub_queries.iter())
    }

    pub(crate) fn fix_columns(&mut self) {
        self.primary_query = fix_column_names(&self.primary_query);
        for sub in &mut self.sub_queries {
            *sub = fix_column_names(sub);
        }
    }

    /// Id-like filters must be a UUID or a `:parameter`.
    pub(crate) fn check_filter_values(&self) -> Result<()> {
        let Some(filters) = &self.filters else {
            return Ok(());
        };
        for (field, value) in [("ticketId", &filters.ticket_id), ("assigneeId", &filters.assignee_id)] {
            if let Some(v) = value {
                if !(v.starts_with(':') || uuid::Uuid::parse_str(v).is_ok()) {
                    return Err(OttoError::InvalidPlan(format!(
                        "filters.{} must be a UUID or a parameter, got '{}'",
                        field, v
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub issues: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
    pub security_risks: Vec<String>,
}

impl ValidationResult {
    pub fn object_schema() -> ObjectSchema {
        ObjectSchema::new()
            .required("isValid", ParamSchema::boolean().describe("Whether the query is valid"))
            .required(
                "issues",
                ParamSchema::array(ParamSchema::string()).describe("List of issues found in the query"),
            )
            .optional(
                "suggestedFix",
                ParamSchema::string().describe("Suggested fix for the query if issues are found"),
            )
            .required(
                "securityRisks",
                ParamSchema::array(ParamSchema::string())
                    .describe("List of potential security risks identified"),
            )
    }
}
