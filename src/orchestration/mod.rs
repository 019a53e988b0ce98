//! Orchestration layer of the coordination engine.
//!
//! Scoring, planning, validation and execution of workflows across the
//! registered agents, plus the statistics and conflict resolution that go
//! with them.

pub mod complexity;
mod coordinator;
mod metrics;
mod planner;
mod resolver;
mod validator;

pub use complexity::{
    analyze_workflow_complexity, score, score_task, ComplexityCategory, ComplexityInput,
    ComplexityScore, ExecutionMode, TaskComplexity, WorkflowComplexity,
};
pub use coordinator::{
    ActiveSession, AgentCoordination, Coordinator, CoordinatorConfig, CoordinatorEvent,
    OrchestrationResult, RunState, TaskResult,
};
pub use metrics::{CoordinationMetrics, MetricsAggregator, ASSUMED_TASKS_PER_WORKFLOW};
pub use planner::{ExecutionPlan, ResourceAllocator};
pub use resolver::{AgentResponse, ConflictResolver, ConflictStrategy};
pub use validator::{validate_workflow, ValidationReport};
