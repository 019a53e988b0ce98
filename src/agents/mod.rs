//! Agents: who can do what, and how work reaches them.

mod registry;
mod runtime;

pub use registry::{AgentCapability, AgentRegistry, AgentType, Capability};
pub use runtime::{AgentOutcome, AgentRuntime, CompletionSender, DispatchRequest, TaskHandle};
