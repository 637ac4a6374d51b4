use crate::analysis::TableRelevanceAnalyzer;
use crate::error::Result;
use crate::function_schema::{ObjectSchema, ParamSchema};
use crate::schema::SchemaCache;
use crate::tools::{failure_body, typed_args, Tool};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct FilterSchemaArgs {
    query: String,
}

/// Schema text restricted to the tables a question mentions.
pub struct FilterSchemaTool {
    schema: Arc<SchemaCache>,
    tables: Arc<TableRelevanceAnalyzer>,
}

impl FilterSchemaTool {
    pub fn new(schema: Arc<SchemaCache>, tables: Arc<TableRelevanceAnalyzer>) -> Self {
        Self { schema, tables }
    }
}

#[async_trait]
impl Tool for FilterSchemaTool {
    fn name(&self) -> &str {
        "filterSchema"
    }

    fn description(&self) -> &str {
        "Filter the database schema to only include tables and information relevant to a specific query"
    }

    fn parameters(&self) -> ObjectSchema {
        ObjectSchema::new().required(
            "query",
            ParamSchema::string().describe("The natural language query to analyze for relevant schema information"),
        )
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let args: FilterSchemaArgs = typed_args(self.name(), args)?;
        let relevant = self.tables.schema_tables(&args.query);
        match self.schema.format_schema(Some(&relevant)).await {
            Ok(text) => Ok(json!({
                "success": true,
                "schema": text,
                "relevantTables": relevant,
            })
            .to_string()),
            Err(e) => Ok(failure_body(&e)),
        }
    }
}
