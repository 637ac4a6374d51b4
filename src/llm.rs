use crate::error::{OttoError, Result};
use crate::function_schema::FunctionDefinition;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Message in chat-completion format
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Function call response from the model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String, // JSON string
}

/// One entry of a multi-call `tool_calls` reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionCallMode {
    Auto,
    None,
    Force(String),
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub functions: Vec<FunctionDefinition>,
    pub function_call: FunctionCallMode,
    pub temperature: f32,
}

impl ChatRequest {
    /// Plain completion over a single user prompt.
    pub fn prompt(prompt: impl Into<String>, temperature: f32) -> Self {
        Self {
            messages: vec![ChatMessage::user(prompt)],
            functions: Vec::new(),
            function_call: FunctionCallMode::None,
            temperature,
        }
    }

    /// Single mandatory structured call to `function`.
    pub fn forced(prompt: impl Into<String>, function: FunctionDefinition) -> Self {
        let name = function.name.clone();
        Self {
            messages: vec![ChatMessage::user(prompt)],
            functions: vec![function],
            function_call: FunctionCallMode::Force(name),
            temperature: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatReply {
    pub content: Option<String>,
    pub function_call: Option<FunctionCall>,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ChatReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: Some(content.into()), ..Default::default() }
    }

    /// Arguments of the forced call to `name`, from either structured shape.
    pub fn function_arguments(&self, name: &str) -> Result<&str> {
        self.function_call
            .iter()
            .chain(self.tool_calls.iter().map(|tc| &tc.function))
            .find(|fc| fc.name == name)
            .map(|fc| fc.arguments.as_str())
            .ok_or_else(|| OttoError::Llm("No function call arguments received from model".to_string()))
    }
}

/// Hosted chat-completion endpoint.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> Result<ChatReply>;
}

#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl LlmClient {
    pub fn new(api_key: String, model: String, base_url: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, api_key, base_url, model })
    }

    fn build_body(&self, request: &ChatRequest) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": request.messages,
            "temperature": request.temperature,
        });

        if !request.functions.is_empty() {
            body["functions"] = json!(request.functions);
            body["function_call"] = match &request.function_call {
                FunctionCallMode::Auto => json!("auto"),
                FunctionCallMode::None => json!("none"),
                FunctionCallMode::Force(name) => json!({ "name": name }),
            };
        }

        if self.model.starts_with("gpt-5") || self.model.contains("o1") {
            body["max_completion_tokens"] = json!(2000);
        } else {
            body["max_tokens"] = json!(1000);
        }
        body
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    function_call: Option<FunctionCall>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallRequest>>,
}

/// Decode a raw `/chat/completions` response body.
pub fn decode_completion(response_json: Value) -> Result<ChatReply> {
    if let Some(error) = response_json.get("error").filter(|e| !e.is_null()) {
        return Err(OttoError::Llm(format!("LLM API error: {}", error)));
    }

    let parsed: CompletionResponse = serde_json::from_value(response_json)
        .map_err(|e| OttoError::Llm(format!("Failed to parse LLM response: {}", e)))?;

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| OttoError::Llm("Empty choices array in LLM response".to_string()))?;

    match choice.finish_reason.as_deref() {
        Some("length") => warn!("LLM response was truncated due to length limit"),
        Some("content_filter") => {
            return Err(OttoError::Llm("LLM response was filtered by content policy".to_string()))
        }
        _ => {}
    }

    Ok(ChatReply {
        content: choice.message.content,
        function_call: choice.message.function_call,
        tool_calls: choice.message.tool_calls.unwrap_or_default(),
    })
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatReply> {
        let body = self.build_body(&request);
        debug!(
            model = %self.model,
            messages = request.messages.len(),
            functions = request.functions.len(),
            "calling chat completion"
        );

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| OttoError::Llm(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(OttoError::Llm(format!("LLM API error ({}): {}", status, error_text)));
        }

        let response_json: Value = response
            .json()
            .await
            .map_err(|e| OttoError::Llm(format!("Failed to parse LLM response: {}", e)))?;

        decode_completion(response_json)
    }
}
