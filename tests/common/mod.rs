//! Scripted model and in-memory data store shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use otto_agent::config::{DataStoreConfig, OttoConfig};
use otto_agent::db::{DataStore, IntrospectedColumn, IntrospectedForeignKey, IntrospectedTable};
use otto_agent::error::{OttoError, Result};
use otto_agent::llm::{ChatModel, ChatReply, ChatRequest, FunctionCall, FunctionCallMode};
use otto_agent::OttoServices;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const USER_ID: &str = "7d1c3a52-0f4e-4b8a-9c6e-2f5d8e1b4a90";

/// Answers structured calls from queued plans and verdicts, and conversation
/// turns from a queued script. Every request is recorded.
#[derive(Default)]
pub struct ScriptedModel {
    plans: Mutex<VecDeque<Value>>,
    verdicts: Mutex<VecDeque<Value>>,
    turns: Mutex<VecDeque<ChatReply>>,
    repeat_turn: Option<ChatReply>,
    turn_delay: Option<Duration>,
    pub requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plan(self, plan: Value) -> Self {
        self.plans.lock().unwrap().push_back(plan);
        self
    }

    pub fn verdict(self, verdict: Value) -> Self {
        self.verdicts.lock().unwrap().push_back(verdict);
        self
    }

    pub fn turn(self, reply: ChatReply) -> Self {
        self.turns.lock().unwrap().push_back(reply);
        self
    }

    /// Reply with `reply` on every conversation turn once the script runs out.
    pub fn always(mut self, reply: ChatReply) -> Self {
        self.repeat_turn = Some(reply);
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.turn_delay = Some(delay);
        self
    }

    pub fn conversation_requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.function_call == FunctionCallMode::Auto || r.function_call == FunctionCallMode::None)
            .cloned()
            .collect()
    }

    pub fn forced_calls(&self, name: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.function_call == FunctionCallMode::Force(name.to_string()))
            .count()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: ChatRequest) -> Result<ChatReply> {
        self.requests.lock().unwrap().push(request.clone());

        match &request.function_call {
            FunctionCallMode::Force(name) if name == "analyze_query" => {
                let plan = self
                    .plans
                    .lock()
                    .unwrap()
                    .pop_front()
                    .ok_or_else(|| OttoError::Llm("no scripted plan".to_string()))?;
                Ok(structured(name, plan))
            }
            FunctionCallMode::Force(name) if name == "validate_query" => {
                let verdict = self
                    .verdicts
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| json!({"isValid": true, "issues": [], "securityRisks": []}));
                Ok(structured(name, verdict))
            }
            FunctionCallMode::Force(name) => Err(OttoError::Llm(format!("unexpected forced call {}", name))),
            _ => {
                if let Some(delay) = self.turn_delay {
                    tokio::time::sleep(delay).await;
                }
                let next = self.turns.lock().unwrap().pop_front();
                Ok(next
                    .or_else(|| self.repeat_turn.clone())
                    .unwrap_or_else(|| ChatReply::text("Done.")))
            }
        }
    }
}

pub fn structured(name: &str, arguments: Value) -> ChatReply {
    ChatReply {
        function_call: Some(FunctionCall { name: name.to_string(), arguments: arguments.to_string() }),
        ..Default::default()
    }
}

/// A conversation turn asking for one tool.
pub fn call_tool(name: &str, arguments: Value) -> ChatReply {
    structured(name, arguments)
}

/// Two tables and a recorder for every statement it is asked to run.
pub struct MemoryDataStore {
    pub executed: Mutex<Vec<String>>,
    fail_when: Option<String>,
    rows: Value,
}

impl MemoryDataStore {
    pub fn new() -> Self {
        Self { executed: Mutex::new(Vec::new()), fail_when: None, rows: json!([{"count": 4}]) }
    }

    /// Fail any statement containing `marker`.
    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_when = Some(marker.to_string());
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

fn column(name: &str, data_type: &str, pk: bool) -> IntrospectedColumn {
    IntrospectedColumn {
        name: name.to_string(),
        data_type: data_type.to_string(),
        is_nullable: !pk,
        is_primary_key: pk,
    }
}

#[async_trait]
impl DataStore for MemoryDataStore {
    async fn execute_raw_query(&self, query: &str) -> Result<Value> {
        self.executed.lock().unwrap().push(query.to_string());
        match &self.fail_when {
            Some(marker) if query.contains(marker.as_str()) => {
                Err(OttoError::Execution(format!("relation does not exist near {}", marker)))
            }
            _ => Ok(self.rows.clone()),
        }
    }

    async fn introspect(&self) -> Result<Vec<IntrospectedTable>> {
        Ok(vec![
            IntrospectedTable {
                name: "Tickets".to_string(),
                columns: vec![
                    column("ticketId", "uuid", true),
                    column("assigneeId", "uuid", false),
                    column("status", "text", false),
                    column("priority", "text", false),
                ],
                foreign_keys: vec![IntrospectedForeignKey {
                    column: "assigneeId".to_string(),
                    referenced_table: "UserProfiles".to_string(),
                    referenced_column: "id".to_string(),
                }],
            },
            IntrospectedTable {
                name: "UserProfiles".to_string(),
                columns: vec![column("id", "uuid", true), column("displayName", "text", false)],
                foreign_keys: vec![],
            },
        ])
    }
}

pub fn config() -> OttoConfig {
    OttoConfig::new(
        "sk-test",
        DataStoreConfig::Postgres { database_url: "postgres://localhost/otto_test".to_string() },
    )
}

pub fn services_with(
    config: OttoConfig,
    model: Arc<ScriptedModel>,
    store: Arc<MemoryDataStore>,
) -> Arc<OttoServices> {
    Arc::new(OttoServices::new(config, model, store))
}

pub fn services(model: Arc<ScriptedModel>, store: Arc<MemoryDataStore>) -> Arc<OttoServices> {
    services_with(config(), model, store)
}

pub fn count_plan(sub_queries: &[&str]) -> Value {
    json!({
        "primaryQuery": r#"SELECT COUNT(*) FROM "Tickets" WHERE "assigneeId" = :currentUserId"#,
        "subQueries": sub_queries,
        "filters": {"assigneeId": ":currentUserId"},
        "requiredTables": ["Tickets"]
    })
}
