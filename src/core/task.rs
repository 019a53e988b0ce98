//! Task data model for workflow execution.
//!
//! Tasks are the atomic units of work assigned to agents. Identifiers are
//! supplied by the caller and only need to be unique within one workflow.

use crate::agents::AgentType;
use serde::{Deserialize, Serialize};

/// Caller-supplied identifier for a task within a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Scheduling priority of a task or workflow.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
            Priority::Critical => write!(f, "critical"),
        }
    }
}

/// Declared risk of a task, feeding the complexity multiplier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Multiplier applied to the running complexity total.
    pub fn multiplier(&self) -> f64 {
        match self {
            RiskLevel::Low => 0.8,
            RiskLevel::Medium => 1.0,
            RiskLevel::High => 1.3,
            RiskLevel::Critical => 1.6,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
            RiskLevel::Critical => write!(f, "critical"),
        }
    }
}

/// Category of work a task represents.
///
/// Tags that do not name a known category are kept as `Unknown` so the
/// validator can report them; they are never routed to an agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskKind {
    Validation,
    Security,
    Architecture,
    Design,
    Debugging,
    CodeReview,
    Refactoring,
    Testing,
    Orchestration,
    General,
    Unknown(String),
}

impl TaskKind {
    /// Ordered candidate agents for this kind, most preferred first.
    ///
    /// Returns `None` for unknown kinds.
    pub fn candidates(&self) -> Option<&'static [AgentType]> {
        use AgentType::*;
        let list: &'static [AgentType] = match self {
            TaskKind::Validation => &[Enforcer, CodeReviewer],
            TaskKind::Security => &[SecurityAuditor, Enforcer],
            TaskKind::Architecture => &[Architect, Orchestrator],
            TaskKind::Design => &[Architect, CodeReviewer],
            TaskKind::Debugging => &[BugTriageSpecialist, CodeReviewer],
            TaskKind::CodeReview => &[CodeReviewer, Enforcer],
            TaskKind::Refactoring => &[Refactorer, CodeReviewer],
            TaskKind::Testing => &[TestArchitect, Enforcer],
            TaskKind::Orchestration => &[Orchestrator, Architect],
            TaskKind::General => &[Enforcer],
            TaskKind::Unknown(_) => return None,
        };
        Some(list)
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, TaskKind::Unknown(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            TaskKind::Validation => "validation",
            TaskKind::Security => "security",
            TaskKind::Architecture => "architecture",
            TaskKind::Design => "design",
            TaskKind::Debugging => "debugging",
            TaskKind::CodeReview => "code-review",
            TaskKind::Refactoring => "refactoring",
            TaskKind::Testing => "testing",
            TaskKind::Orchestration => "orchestration",
            TaskKind::General => "general",
            TaskKind::Unknown(tag) => tag,
        }
    }
}

impl From<String> for TaskKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "validation" => TaskKind::Validation,
            "security" => TaskKind::Security,
            "architecture" => TaskKind::Architecture,
            "design" => TaskKind::Design,
            "debugging" => TaskKind::Debugging,
            "code-review" => TaskKind::CodeReview,
            "refactoring" => TaskKind::Refactoring,
            "testing" => TaskKind::Testing,
            "orchestration" => TaskKind::Orchestration,
            "general" => TaskKind::General,
            _ => TaskKind::Unknown(tag),
        }
    }
}

impl From<&str> for TaskKind {
    fn from(tag: &str) -> Self {
        Self::from(tag.to_string())
    }
}

impl From<TaskKind> for String {
    fn from(kind: TaskKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single task submitted as part of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinition {
    /// Identifier, unique within the workflow.
    pub id: TaskId,
    /// What the agent is asked to do.
    #[serde(default)]
    pub description: String,
    /// Category used to pick candidate agents.
    #[serde(rename = "type")]
    pub kind: TaskKind,
    #[serde(default)]
    pub priority: Priority,
    /// Tasks that must resolve before this one is dispatched.
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
    /// Caller's own complexity estimate; overrides the scorer when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<u8>,
    /// Files the task is expected to touch.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    #[serde(default)]
    pub risk: RiskLevel,
}

impl TaskDefinition {
    /// Create a task with default priority and risk and no dependencies.
    pub fn new(id: impl Into<String>, kind: TaskKind, description: &str) -> Self {
        Self {
            id: TaskId::new(id),
            description: description.to_string(),
            kind,
            priority: Priority::default(),
            dependencies: Vec::new(),
            complexity: None,
            files: Vec::new(),
            risk: RiskLevel::default(),
        }
    }

    /// Builder-style helper adding a dependency.
    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.dependencies.push(TaskId::new(id));
        self
    }

    /// Builder-style helper declaring a complexity estimate.
    pub fn with_complexity(mut self, complexity: u8) -> Self {
        self.complexity = Some(complexity);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_risk(mut self, risk: RiskLevel) -> Self {
        self.risk = risk;
        self
    }

    pub fn with_files(mut self, files: &[&str]) -> Self {
        self.files = files.iter().map(|f| f.to_string()).collect();
        self
    }
}
