use crate::error::Result;
use crate::function_schema::{parse_arguments, FunctionDefinition};
use crate::tools::Tool;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Name-keyed tool catalog. Definitions are listed in registration order.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registering a name twice replaces the earlier tool.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn definitions(&self) -> Vec<FunctionDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition())
            .collect()
    }

    /// Parse, validate, and run one call. `None` when no tool has that name.
    pub async fn dispatch(&self, name: &str, raw_arguments: &str) -> Option<Result<String>> {
        let tool = self.get(name)?;
        let raw = if raw_arguments.trim().is_empty() { "{}" } else { raw_arguments };
        debug!(tool = name, "dispatching tool");

        let outcome = match parse_arguments(raw, &tool.parameters()) {
            Ok(args) => tool.execute(args).await,
            Err(e) => Err(e),
        };
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function_schema::{ObjectSchema, ParamSchema};
    use async_trait::async_trait;
    use serde_json::Value;

    struct Echo(&'static str);

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "Echo the text argument"
        }

        fn parameters(&self) -> ObjectSchema {
            ObjectSchema::new().required("text", ParamSchema::string())
        }

        async fn execute(&self, args: Value) -> Result<String> {
            Ok(args["text"].as_str().unwrap_or_default().to_string())
        }
    }

    #[tokio::test]
    async fn test_dispatch_known_unknown_and_invalid() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo("echo")));

        assert_eq!(registry.dispatch("echo", r#"{"text":"hi"}"#).await.unwrap().unwrap(), "hi");
        assert!(registry.dispatch("missing", "{}").await.is_none());

        let err = registry.dispatch("echo", "{}").await.unwrap().unwrap_err();
        assert!(err.to_string().contains("$.text: missing required field"));
        assert!(registry.dispatch("echo", "not json").await.unwrap().is_err());
    }

    #[test]
    fn test_definitions_keep_registration_order() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo("b")));
        registry.register(Arc::new(Echo("a")));
        registry.register(Arc::new(Echo("b")));

        let defs = registry.definitions();
        assert_eq!(registry.names(), vec!["b", "a"]);
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].parameters["required"], serde_json::json!(["text"]));
    }
}
