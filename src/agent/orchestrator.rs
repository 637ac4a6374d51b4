//! Conversational loop
//!
//! One `query` call drives the model until it answers in plain text, handing
//! each requested tool call to the registry and feeding results back as
//! system messages. Tool rounds are capped and the whole call shares one
//! deadline.

use crate::agent::contracts::{AgentDecision, Message, OttoResponse, QueryContext, ToolInvocation};
use crate::agent::metrics::{AggregateMetrics, QueryMetrics};
use crate::agent::services::OttoServices;
use crate::error::{OttoError, Result};
use crate::execution::UserIdentity;
use crate::llm::{ChatMessage, ChatRequest, FunctionCallMode, Role};
use crate::tools::{reports_failure, ToolRegistry};
use std::future::Future;
use std::sync::Arc;
use tokio::time::{timeout_at, Instant};
use tracing::{info, warn};

const CONVERSATION_TEMPERATURE: f32 = 0.7;

pub const SYSTEM_PROMPT: &str = "You are Otto, an AI assistant specialized in helping users with their support tickets and tasks. \
You have access to tools that can help you query and analyze ticket data. \
When users ask questions about tickets or need help with support tasks, use these tools to provide accurate information. \
Always try to use the appropriate tool to get real data rather than making assumptions or stating you don't have access to the information.";

#[derive(Debug, Default)]
struct LoopState {
    rounds: usize,
    action_identified: bool,
    tool_succeeded: bool,
    tool_failed: bool,
}

pub struct OttoSystem {
    services: Arc<OttoServices>,
    identity: UserIdentity,
    tools: ToolRegistry,
}

impl OttoSystem {
    pub fn new(services: Arc<OttoServices>, identity: UserIdentity) -> Self {
        let tools = services.tool_registry(&identity);
        Self { services, identity, tools }
    }

    pub fn with_tools(services: Arc<OttoServices>, identity: UserIdentity, tools: ToolRegistry) -> Self {
        Self { services, identity, tools }
    }

    pub fn identity(&self) -> &UserIdentity {
        &self.identity
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn metrics(&self) -> Option<AggregateMetrics> {
        self.services.metrics.aggregate()
    }

    /// Answer one user message. Failures are reported in the response, never
    /// raised.
    pub async fn query(&self, text: &str, context: Option<QueryContext>) -> OttoResponse {
        let started = Instant::now();
        let context = context.unwrap_or_default();
        let mut state = LoopState::default();

        let outcome = self.converse(text, &context, started, &mut state).await;

        let error_type = match &outcome {
            Err(e) => Some(e.error_type().to_string()),
            Ok(_) if state.tool_failed => Some("tool_error".to_string()),
            Ok(_) => None,
        };
        self.services.metrics.record(&QueryMetrics {
            action_identified: state.action_identified,
            tool_succeeded: state.tool_succeeded,
            response_time: started.elapsed(),
            error_type,
        });

        match outcome {
            Ok(answer) => {
                let mut messages = context.previous_messages.clone();
                messages.push(Message::now(Role::User, text));
                messages.push(Message::now(Role::Assistant, answer));
                info!(rounds = state.rounds, elapsed_ms = started.elapsed().as_millis() as u64, "query answered");
                OttoResponse { messages, context, error: None, error_type: None }
            }
            Err(e) => {
                warn!(error = %e, error_type = e.error_type(), rounds = state.rounds, "query failed");
                OttoResponse {
                    messages: Vec::new(),
                    context,
                    error: Some(e.to_string()),
                    error_type: Some(e.error_type().to_string()),
                }
            }
        }
    }

    async fn converse(
        &self,
        text: &str,
        context: &QueryContext,
        started: Instant,
        state: &mut LoopState,
    ) -> Result<String> {
        let deadline = started + self.services.config.request_timeout;
        let max_rounds = self.services.config.max_tool_rounds;

        let mut messages = vec![ChatMessage::system(SYSTEM_PROMPT)];
        messages.extend(context.previous_messages.iter().map(Message::to_chat));
        messages.push(ChatMessage::user(text));

        loop {
            let request = self.request(messages.clone());
            let reply = within(deadline, "model call", self.services.model.complete(request)).await??;

            let calls = match AgentDecision::from_reply(reply) {
                AgentDecision::FinalAnswer(answer) => return Ok(answer),
                AgentDecision::Invoke(calls) => calls,
            };
            if state.rounds >= max_rounds {
                return Err(OttoError::ToolLimit(format!(
                    "model still requesting tools after {} rounds",
                    max_rounds
                )));
            }
            state.rounds += 1;
            state.action_identified = true;

            for call in calls {
                if let Some(note) = within(deadline, "tool call", self.dispatch(&call, state)).await? {
                    messages.push(ChatMessage::system(note));
                }
            }
        }
    }

    fn request(&self, messages: Vec<ChatMessage>) -> ChatRequest {
        let functions = self.tools.definitions();
        let function_call = if functions.is_empty() { FunctionCallMode::None } else { FunctionCallMode::Auto };
        ChatRequest { messages, functions, function_call, temperature: CONVERSATION_TEMPERATURE }
    }

    /// Run one invocation and render the note fed back to the model.
    async fn dispatch(&self, call: &ToolInvocation, state: &mut LoopState) -> Option<String> {
        match self.tools.dispatch(&call.name, &call.arguments).await {
            None => {
                warn!(tool = %call.name, id = ?call.id, "model requested unknown tool; skipping");
                None
            }
            Some(Ok(result)) => {
                if reports_failure(&result) {
                    warn!(tool = %call.name, "tool reported failure");
                    state.tool_failed = true;
                } else {
                    state.tool_succeeded = true;
                }
                Some(format!("Tool {} returned: {}", call.name, result))
            }
            Some(Err(e)) => {
                warn!(tool = %call.name, error = %e, "tool failed");
                state.tool_failed = true;
                Some(format!("Tool {} failed: {}", call.name, e))
            }
        }
    }
}

async fn within<F: Future>(deadline: Instant, what: &str, fut: F) -> Result<F::Output> {
    timeout_at(deadline, fut)
        .await
        .map_err(|_| OttoError::Timeout(format!("{} did not finish before the deadline", what)))
}
