//! Execution planning: phases from the dependency graph, agents from the
//! registry, concurrency and a duration estimate per agent.

use crate::agents::{AgentRegistry, AgentType};
use crate::core::{TaskDAG, TaskDefinition, TaskId, Workflow};
use crate::error::Result;
use crate::orchestration::complexity::{
    analyze_workflow_complexity, ExecutionMode, WorkflowComplexity,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// How a workflow will be executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub mode: ExecutionMode,
    /// Tasks grouped into dependency layers, in execution order.
    pub phases: Vec<Vec<TaskDefinition>>,
    /// Tasks per agent, in workflow order.
    pub assignments: BTreeMap<AgentType, Vec<TaskId>>,
    pub agent_for: BTreeMap<TaskId, AgentType>,
    pub concurrency: BTreeMap<AgentType, usize>,
    pub estimated_duration: Duration,
    pub complexity: WorkflowComplexity,
}

impl ExecutionPlan {
    pub fn agent_of(&self, id: &TaskId) -> Option<AgentType> {
        self.agent_for.get(id).copied()
    }

    pub fn task_count(&self) -> usize {
        self.phases.iter().map(Vec::len).sum()
    }

    /// Agents that receive at least one task.
    pub fn agents(&self) -> Vec<AgentType> {
        self.assignments.keys().copied().collect()
    }
}

/// Assigns tasks to agents and estimates how long the plan takes.
pub struct ResourceAllocator<'a> {
    registry: &'a AgentRegistry,
    average_task_duration: Duration,
}

impl<'a> ResourceAllocator<'a> {
    pub fn new(registry: &'a AgentRegistry, average_task_duration: Duration) -> Self {
        Self {
            registry,
            average_task_duration,
        }
    }

    /// Build an execution plan for a workflow.
    ///
    /// # Errors
    /// `CircularDependency` when the tasks cannot be layered, `UnknownTaskKind`
    /// when a task has no candidate agents.
    pub fn plan(&self, workflow: &Workflow) -> Result<ExecutionPlan> {
        let complexity = analyze_workflow_complexity(workflow);
        let dag = TaskDAG::from_tasks(&workflow.tasks);
        let phases = dag.phases()?;

        let mut assignments: BTreeMap<AgentType, Vec<TaskId>> = BTreeMap::new();
        let mut agent_for = BTreeMap::new();
        for task in &workflow.tasks {
            if agent_for.contains_key(&task.id) {
                continue;
            }
            let score = complexity.score_of(&task.id).unwrap_or(0);
            let agent = self.registry.select_agent(task, score)?;
            assignments.entry(agent).or_default().push(task.id.clone());
            agent_for.insert(task.id.clone(), agent);
        }

        let (concurrency, estimated_duration) = self.allocate(&assignments);

        Ok(ExecutionPlan {
            mode: complexity.strategy,
            phases,
            assignments,
            agent_for,
            concurrency,
            estimated_duration,
            complexity,
        })
    }

    /// Per-agent concurrency and the overall duration estimate.
    ///
    /// Each agent runs `min(tasks, max_concurrent)` at once and needs
    /// `ceil(tasks / concurrency)` rounds; the slowest agent bounds the plan.
    pub fn allocate(
        &self,
        assignments: &BTreeMap<AgentType, Vec<TaskId>>,
    ) -> (BTreeMap<AgentType, usize>, Duration) {
        let mut concurrency = BTreeMap::new();
        let mut estimate = Duration::ZERO;

        for (agent, tasks) in assignments {
            if tasks.is_empty() {
                continue;
            }
            let slots = tasks.len().min(self.registry.max_concurrent(*agent)).max(1);
            let rounds = u32::try_from(tasks.len().div_ceil(slots)).unwrap_or(u32::MAX);
            estimate = estimate.max(self.average_task_duration.saturating_mul(rounds));
            concurrency.insert(*agent, slots);
        }

        (concurrency, estimate)
    }
}
