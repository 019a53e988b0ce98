//! Workflow definitions submitted by callers.

use crate::core::task::{Priority, TaskDefinition, TaskId};
use crate::{elog_debug, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

/// Newest context layout this build understands.
pub const CONTEXT_VERSION: u32 = 1;

/// Identifier of a workflow, supplied by the caller or generated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(pub String);

impl WorkflowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh `workflow-<uuid>` identifier.
    pub fn generate() -> Self {
        Self(format!("workflow-{}", Uuid::new_v4()))
    }
}

impl Default for WorkflowId {
    fn default() -> Self {
        Self::generate()
    }
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for one execution of a workflow.
///
/// Uses UUID v4 for generation and provides a short form display
/// for human-readable output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return first 8 characters of the UUID for display.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Typed payload passed through to every agent dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowContext {
    /// Layout version; anything above [`CONTEXT_VERSION`] is rejected.
    #[serde(default = "default_context_version")]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester: Option<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_context_version() -> u32 {
    CONTEXT_VERSION
}

impl Default for WorkflowContext {
    fn default() -> Self {
        Self {
            version: CONTEXT_VERSION,
            project: None,
            requester: None,
            parameters: BTreeMap::new(),
            tags: Vec::new(),
        }
    }
}

impl WorkflowContext {
    pub fn is_supported(&self) -> bool {
        self.version <= CONTEXT_VERSION
    }
}

/// A named set of interdependent tasks submitted as one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default)]
    pub id: WorkflowId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tasks: Vec<TaskDefinition>,
    #[serde(default)]
    pub priority: Priority,
    /// Run deadline in seconds, measured from the start of execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Workflows this one is declared to follow.
    #[serde(default)]
    pub dependencies: Vec<WorkflowId>,
    #[serde(default)]
    pub context: WorkflowContext,
}

impl Workflow {
    /// Create an empty workflow with a generated identifier.
    pub fn new(name: &str) -> Self {
        Self {
            id: WorkflowId::generate(),
            name: name.to_string(),
            description: String::new(),
            tasks: Vec::new(),
            priority: Priority::default(),
            timeout_secs: None,
            dependencies: Vec::new(),
            context: WorkflowContext::default(),
        }
    }

    /// Builder-style helper appending a task.
    pub fn with_task(mut self, task: TaskDefinition) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs());
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn task(&self, id: &TaskId) -> Option<&TaskDefinition> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    pub fn task_ids(&self) -> Vec<TaskId> {
        self.tasks.iter().map(|t| t.id.clone()).collect()
    }

    /// Load a workflow from a `.json` or `.toml` file.
    pub fn load(path: &Path) -> Result<Self> {
        elog_debug!("Workflow::load path={}", path.display());
        let raw = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(serde_json::from_str(&raw)?),
            Some("toml") => Ok(toml::from_str(&raw)?),
            other => Err(Error::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }
}
