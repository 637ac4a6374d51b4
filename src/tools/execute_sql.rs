use crate::error::Result;
use crate::execution::{QueryExecutor, UserIdentity};
use crate::function_schema::{ObjectSchema, ParamSchema};
use crate::tools::{failure_body, typed_args, Tool};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct ExecuteSqlArgs {
    sql: String,
}

/// Runs model-written SQL through the same review, guard, and binding path
/// as planned queries.
pub struct ExecuteSqlTool {
    executor: Arc<QueryExecutor>,
    identity: UserIdentity,
}

impl ExecuteSqlTool {
    pub fn new(executor: Arc<QueryExecutor>, identity: UserIdentity) -> Self {
        Self { executor, identity }
    }
}

#[async_trait]
impl Tool for ExecuteSqlTool {
    fn name(&self) -> &str {
        "executeSQL"
    }

    fn description(&self) -> &str {
        "Execute a SQL query against the database and return the results"
    }

    fn parameters(&self) -> ObjectSchema {
        ObjectSchema::new().required("sql", ParamSchema::string().describe("The SQL query to execute"))
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let args: ExecuteSqlArgs = typed_args(self.name(), args)?;
        match self.executor.run_statement(&args.sql, &self.identity).await {
            Ok(result) => Ok(json!({ "success": true, "result": result }).to_string()),
            Err(e) => Ok(failure_body(&e)),
        }
    }
}
