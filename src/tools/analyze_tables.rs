use crate::analysis::TableRelevanceAnalyzer;
use crate::error::Result;
use crate::function_schema::{ObjectSchema, ParamSchema};
use crate::tools::{typed_args, Tool};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeTablesArgs {
    query: String,
    #[serde(default)]
    include_related_tables: Option<bool>,
}

pub struct AnalyzeTablesTool {
    tables: Arc<TableRelevanceAnalyzer>,
}

impl AnalyzeTablesTool {
    pub fn new(tables: Arc<TableRelevanceAnalyzer>) -> Self {
        Self { tables }
    }
}

#[async_trait]
impl Tool for AnalyzeTablesTool {
    fn name(&self) -> &str {
        "analyzeTables"
    }

    fn description(&self) -> &str {
        "Analyze a natural language query to determine the most relevant database tables"
    }

    fn parameters(&self) -> ObjectSchema {
        ObjectSchema::new()
            .required(
                "query",
                ParamSchema::string().describe("The natural language query to analyze for relevant tables"),
            )
            .optional(
                "includeRelatedTables",
                ParamSchema::boolean().describe("Whether to include related tables that might be needed for joins"),
            )
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let args: AnalyzeTablesArgs = typed_args(self.name(), args)?;
        let analysis = self
            .tables
            .analyze_with(&args.query, args.include_related_tables.unwrap_or(true))
            .await;

        let mut body = serde_json::to_value(&analysis)?;
        body["success"] = json!(true);
        Ok(body.to_string())
    }
}
