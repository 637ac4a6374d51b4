use crate::llm::{ChatMessage, ChatReply, Role};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl Message {
    pub fn now(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into(), timestamp: Some(Utc::now().to_rfc3339()) }
    }

    pub fn to_chat(&self) -> ChatMessage {
        ChatMessage { role: self.role, content: self.content.clone() }
    }
}

/// Caller-held conversation state. Unknown keys are carried through untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryContext {
    #[serde(default)]
    pub previous_messages: Vec<Message>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OttoResponse {
    pub messages: Vec<Message>,
    pub context: QueryContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

impl OttoResponse {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub id: Option<String>,
    pub name: String,
    pub arguments: String,
}

/// What the model asked for on one turn.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentDecision {
    FinalAnswer(String),
    Invoke(Vec<ToolInvocation>),
}

impl AgentDecision {
    /// A legacy `function_call` comes first, followed by any `tool_calls`.
    pub fn from_reply(reply: ChatReply) -> Self {
        let legacy = reply.function_call.map(|fc| ToolInvocation {
            id: None,
            name: fc.name,
            arguments: fc.arguments,
        });
        let calls: Vec<ToolInvocation> = legacy
            .into_iter()
            .chain(reply.tool_calls.into_iter().map(|tc| ToolInvocation {
                id: tc.id,
                name: tc.function.name,
                arguments: tc.function.arguments,
            }))
            .collect();

        if calls.is_empty() {
            AgentDecision::FinalAnswer(reply.content.unwrap_or_default())
        } else {
            AgentDecision::Invoke(calls)
        }
    }
}
