//! Otto agent: the conversational orchestrator and the services it runs on.

pub mod contracts;
pub mod metrics;
pub mod orchestrator;
pub mod services;

pub use contracts::{AgentDecision, Message, OttoResponse, QueryContext, ToolInvocation};
pub use metrics::{AgentMetrics, AggregateMetrics, QueryMetrics};
pub use orchestrator::{OttoSystem, SYSTEM_PROMPT};
pub use services::OttoServices;
