//! The seam between the coordinator and whatever actually runs agents.
//!
//! A runtime accepts a [`DispatchRequest`] and hands back a [`TaskHandle`].
//! It later resolves the handle through the paired [`CompletionSender`];
//! the coordinator simply awaits the handle, with no status polling.

use crate::agents::AgentType;
use crate::core::task::{Priority, TaskId};
use crate::core::workflow::{SessionId, WorkflowContext, WorkflowId};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;

/// Everything an agent needs to perform one unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub workflow_id: WorkflowId,
    pub session_id: SessionId,
    pub agent: AgentType,
    /// Tasks covered by this dispatch; several in single-agent mode.
    pub tasks: Vec<TaskId>,
    pub description: String,
    pub context: WorkflowContext,
    pub priority: Priority,
    /// Task ids in phased mode, prerequisite workflow ids in single-agent mode.
    pub dependencies: Vec<String>,
}

/// Final state reported by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "payload")]
pub enum AgentOutcome {
    Completed(serde_json::Value),
    Failed(String),
}

impl AgentOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AgentOutcome::Completed(_))
    }
}

/// Runtime-side half of a dispatched task.
#[derive(Debug)]
pub struct CompletionSender {
    tx: oneshot::Sender<AgentOutcome>,
}

impl CompletionSender {
    /// Resolve the task. Returns false if the coordinator stopped waiting.
    pub fn complete(self, outcome: AgentOutcome) -> bool {
        self.tx.send(outcome).is_ok()
    }

    pub fn succeed(self, output: serde_json::Value) -> bool {
        self.complete(AgentOutcome::Completed(output))
    }

    pub fn fail(self, error: impl Into<String>) -> bool {
        self.complete(AgentOutcome::Failed(error.into()))
    }
}

/// Coordinator-side half of a dispatched task.
#[derive(Debug)]
pub struct TaskHandle {
    pub id: Uuid,
    rx: oneshot::Receiver<AgentOutcome>,
}

impl TaskHandle {
    /// Create a handle and the sender that resolves it.
    pub fn channel() -> (CompletionSender, TaskHandle) {
        let (tx, rx) = oneshot::channel();
        (
            CompletionSender { tx },
            TaskHandle {
                id: Uuid::new_v4(),
                rx,
            },
        )
    }

    /// A handle that is already resolved.
    pub fn ready(outcome: AgentOutcome) -> TaskHandle {
        let (sender, handle) = Self::channel();
        sender.complete(outcome);
        handle
    }

    /// Wait for the runtime to resolve the task.
    ///
    /// A sender dropped without resolving counts as a failure.
    pub async fn wait(self) -> AgentOutcome {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => AgentOutcome::Failed("agent runtime dropped the task".to_string()),
        }
    }
}

/// Executes agent work on behalf of the coordinator.
///
/// `dispatch` should return promptly; long-running work belongs behind the
/// returned handle. An `Err` is treated as an immediate task failure.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    async fn dispatch(&self, request: DispatchRequest) -> Result<TaskHandle>;
}
