//! Complexity scoring for tasks and workflows.
//!
//! Scores are cheap heuristics on a 0-100 scale. The workflow-level mean
//! decides how the coordinator runs the workflow.

use crate::core::task::{RiskLevel, TaskDefinition, TaskId};
use crate::core::workflow::Workflow;
use serde::{Deserialize, Serialize};

/// Starting score of every task.
pub const BASE_SCORE: f64 = 25.0;
/// Points per file beyond the first.
pub const POINTS_PER_FILE: usize = 2;
pub const MAX_FILE_POINTS: usize = 20;
pub const POINTS_PER_DEPENDENCY: usize = 3;
pub const MAX_DEPENDENCY_POINTS: usize = 15;

/// Workflow complexity above which an orchestrator leads the run.
pub const ORCHESTRATOR_LED_THRESHOLD: f64 = 95.0;
/// Workflow complexity above which tasks are spread over agents.
pub const MULTI_AGENT_THRESHOLD: f64 = 50.0;

/// Cheap signals describing a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ComplexityInput {
    pub file_count: usize,
    pub dependency_count: usize,
    pub risk: RiskLevel,
}

impl From<&TaskDefinition> for ComplexityInput {
    fn from(task: &TaskDefinition) -> Self {
        Self {
            file_count: task.files.len(),
            dependency_count: task.dependencies.len(),
            risk: task.risk,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityCategory {
    Simple,
    Moderate,
    Complex,
    Enterprise,
}

impl ComplexityCategory {
    pub fn from_score(score: u8) -> Self {
        match score {
            s if s > 80 => ComplexityCategory::Enterprise,
            s if s > 50 => ComplexityCategory::Complex,
            s if s > 25 => ComplexityCategory::Moderate,
            _ => ComplexityCategory::Simple,
        }
    }
}

impl std::fmt::Display for ComplexityCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComplexityCategory::Simple => write!(f, "simple"),
            ComplexityCategory::Moderate => write!(f, "moderate"),
            ComplexityCategory::Complex => write!(f, "complex"),
            ComplexityCategory::Enterprise => write!(f, "enterprise"),
        }
    }
}

/// How the coordinator runs a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    /// Whole task list handed to one orchestration call.
    SingleAgent,
    /// Phases dispatched across agents.
    MultiAgent,
    /// Phased, for workflows complex enough to warrant an orchestrator.
    OrchestratorLed,
}

impl ExecutionMode {
    pub fn for_complexity(overall: f64) -> Self {
        if overall > ORCHESTRATOR_LED_THRESHOLD {
            ExecutionMode::OrchestratorLed
        } else if overall > MULTI_AGENT_THRESHOLD {
            ExecutionMode::MultiAgent
        } else {
            ExecutionMode::SingleAgent
        }
    }

    pub fn is_phased(&self) -> bool {
        !matches!(self, ExecutionMode::SingleAgent)
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::SingleAgent => write!(f, "single-agent"),
            ExecutionMode::MultiAgent => write!(f, "multi-agent"),
            ExecutionMode::OrchestratorLed => write!(f, "orchestrator-led"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityScore {
    pub score: u8,
    pub category: ComplexityCategory,
}

impl ComplexityScore {
    fn new(score: u8) -> Self {
        Self {
            score,
            category: ComplexityCategory::from_score(score),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskComplexity {
    pub task_id: TaskId,
    pub score: ComplexityScore,
}

/// Complexity analysis of a whole workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowComplexity {
    pub tasks: Vec<TaskComplexity>,
    /// Mean of the per-task scores.
    pub overall: f64,
    pub category: ComplexityCategory,
    pub strategy: ExecutionMode,
}

impl WorkflowComplexity {
    pub fn score_of(&self, id: &TaskId) -> Option<u8> {
        self.tasks
            .iter()
            .find(|t| &t.task_id == id)
            .map(|t| t.score.score)
    }
}

/// Score raw complexity signals.
pub fn score(input: &ComplexityInput) -> ComplexityScore {
    let file_points = (input.file_count.saturating_sub(1) * POINTS_PER_FILE).min(MAX_FILE_POINTS);
    let dependency_points =
        (input.dependency_count * POINTS_PER_DEPENDENCY).min(MAX_DEPENDENCY_POINTS);

    let total = (BASE_SCORE + file_points as f64 + dependency_points as f64) * input.risk.multiplier();
    ComplexityScore::new(total.round().clamp(0.0, 100.0) as u8)
}

/// Score one task; a declared estimate wins over the heuristic.
pub fn score_task(task: &TaskDefinition) -> ComplexityScore {
    match task.complexity {
        Some(declared) => ComplexityScore::new(declared.min(100)),
        None => score(&ComplexityInput::from(task)),
    }
}

/// Rate every task and pick an execution strategy for the workflow.
pub fn analyze_workflow_complexity(workflow: &Workflow) -> WorkflowComplexity {
    let tasks: Vec<TaskComplexity> = workflow
        .tasks
        .iter()
        .map(|task| TaskComplexity {
            task_id: task.id.clone(),
            score: score_task(task),
        })
        .collect();

    let overall = if tasks.is_empty() {
        0.0
    } else {
        tasks.iter().map(|t| t.score.score as f64).sum::<f64>() / tasks.len() as f64
    };

    WorkflowComplexity {
        tasks,
        overall,
        category: ComplexityCategory::from_score(overall.round() as u8),
        strategy: ExecutionMode::for_complexity(overall),
    }
}
