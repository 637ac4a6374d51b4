use crate::error::Result;
use crate::execution::{QueryExecutor, UserIdentity};
use crate::function_schema::{ObjectSchema, ParamSchema};
use crate::tools::{typed_args, Tool};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct DatabaseQueryArgs {
    question: String,
}

/// Natural-language question in, JSON result envelope out.
pub struct DatabaseQueryTool {
    executor: Arc<QueryExecutor>,
    identity: UserIdentity,
}

impl DatabaseQueryTool {
    pub fn new(executor: Arc<QueryExecutor>, identity: UserIdentity) -> Self {
        Self { executor, identity }
    }
}

#[async_trait]
impl Tool for DatabaseQueryTool {
    fn name(&self) -> &str {
        "databaseQuery"
    }

    fn description(&self) -> &str {
        "Query the database using natural language questions about tickets and related data"
    }

    fn parameters(&self) -> ObjectSchema {
        ObjectSchema::new().required(
            "question",
            ParamSchema::string().describe("The natural language question to query the database with"),
        )
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let args: DatabaseQueryArgs = typed_args(self.name(), args)?;
        let envelope = self.executor.execute(&args.question, &self.identity).await;
        Ok(serde_json::to_string_pretty(&envelope)?)
    }
}
