//! Tools the model may invoke by name.
//!
//! Each tool describes its own argument contract through an `ObjectSchema`;
//! the registry validates arguments against it before dispatch.

pub mod analyze_tables;
pub mod current_time;
pub mod database_query;
pub mod execute_sql;
pub mod filter_schema;
pub mod registry;
pub mod write_sql;

pub use analyze_tables::AnalyzeTablesTool;
pub use current_time::CurrentTimeTool;
pub use database_query::DatabaseQueryTool;
pub use execute_sql::ExecuteSqlTool;
pub use filter_schema::FilterSchemaTool;
pub use registry::ToolRegistry;
pub use write_sql::WriteSqlTool;

use crate::error::{OttoError, Result};
use crate::function_schema::{FunctionDefinition, ObjectSchema};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters(&self) -> ObjectSchema;

    /// Run with arguments that already passed `parameters()` validation.
    async fn execute(&self, args: Value) -> Result<String>;

    fn definition(&self) -> FunctionDefinition {
        self.parameters().into_function(self.name(), self.description())
    }
}

pub(crate) fn typed_args<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T> {
    serde_json::from_value(args).map_err(|e| OttoError::Tool(format!("{}: bad arguments: {}", tool, e)))
}

/// `{success:false, error}` body for tools that report failures in-band.
pub(crate) fn failure_body(err: &OttoError) -> String {
    json!({ "success": false, "error": err.to_string() }).to_string()
}

/// True when a tool result is a JSON body carrying `"success": false`.
pub fn reports_failure(result: &str) -> bool {
    serde_json::from_str::<Value>(result)
        .ok()
        .and_then(|body| body.get("success").and_then(Value::as_bool))
        == Some(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_failure_reads_success_flag() {
        assert!(reports_failure(&failure_body(&OttoError::Guard("no".into()))));
        assert!(reports_failure("{\n  \"success\": false,\n  \"error\": \"x\"\n}"));
        assert!(!reports_failure(r#"{"success": true, "sql": "SELECT 1"}"#));
        assert!(!reports_failure("10:30 PM"));
    }
}
