//! Execution coordinator.
//!
//! The [`Coordinator`] is the entry point of the engine. It validates a
//! workflow, plans it, dispatches tasks phase by phase through the injected
//! [`AgentRuntime`], and folds every finished run into metrics, history and
//! the shared state store.
//!
//! Within a phase all tasks are driven concurrently on the calling task with
//! `join_all`; nothing is spawned. Phases run strictly in order and a failed
//! task never stops its siblings or later phases.

use crate::agents::{AgentOutcome, AgentRegistry, AgentRuntime, AgentType, DispatchRequest};
use crate::config::Config;
use crate::core::{SessionId, TaskDefinition, TaskId, Workflow, WorkflowId};
use crate::error::{Error, Result};
use crate::log::{EventLogger, LogLevel};
use crate::orchestration::complexity::{
    analyze_workflow_complexity, ExecutionMode, WorkflowComplexity,
};
use crate::orchestration::metrics::{CoordinationMetrics, MetricsAggregator};
use crate::orchestration::planner::{ExecutionPlan, ResourceAllocator};
use crate::orchestration::resolver::{AgentResponse, ConflictResolver, ConflictStrategy};
use crate::orchestration::validator::{self, ValidationReport};
use crate::state::{RunHistory, StateStore, LAST_RESULT_KEY, METRICS_KEY};
use crate::{elog_debug, elog_trace, elog_warn};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock, Semaphore};
use tokio::time::Instant;

const COMPONENT: &str = "coordinator";

/// Runtime knobs of the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorConfig {
    pub average_task_duration: Duration,
    /// Deadline for workflows that declare none.
    pub default_timeout: Option<Duration>,
    /// Gate dispatch with a per-agent semaphore sized to `max_concurrent`.
    pub enforce_agent_concurrency: bool,
    pub history_limit: usize,
    pub conflict_strategy: ConflictStrategy,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for CoordinatorConfig {
    fn from(config: &Config) -> Self {
        Self {
            average_task_duration: Duration::from_secs(config.average_task_duration_secs),
            default_timeout: config.default_timeout_secs.map(Duration::from_secs),
            enforce_agent_concurrency: config.enforce_agent_concurrency,
            history_limit: config.history_limit,
            conflict_strategy: config.conflict_strategy,
        }
    }
}

/// Lifecycle of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Planned,
    Running,
    Completed,
    Failed,
}

impl RunState {
    pub fn can_transition_to(self, next: RunState) -> bool {
        matches!(
            (self, next),
            (RunState::Planned, RunState::Running)
                | (RunState::Running, RunState::Completed)
                | (RunState::Running, RunState::Failed)
        )
    }

    /// # Errors
    /// `InvalidStateTransition` for anything but planned -> running ->
    /// completed/failed.
    pub fn transition(self, next: RunState) -> Result<RunState> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(Error::InvalidStateTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Planned => write!(f, "planned"),
            RunState::Running => write!(f, "running"),
            RunState::Completed => write!(f, "completed"),
            RunState::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of one task within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    /// `None` when the run failed before an agent was chosen.
    pub agent: Option<AgentType>,
    pub phase: usize,
    pub success: bool,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub duration: Duration,
}

impl TaskResult {
    fn failed(
        task_id: TaskId,
        agent: Option<AgentType>,
        phase: usize,
        error: String,
        duration: Duration,
    ) -> Self {
        Self {
            task_id,
            agent,
            phase,
            success: false,
            output: None,
            error: Some(error),
            duration,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCoordination {
    pub agents_used: Vec<AgentType>,
    /// Dispatches made during the run.
    pub coordination_events: u64,
    /// Dispatches the runtime refused outright.
    pub conflict_resolution_attempts: u64,
}

/// Everything the caller learns about a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationResult {
    pub workflow_id: WorkflowId,
    pub session_id: SessionId,
    pub mode: ExecutionMode,
    pub success: bool,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub total_tasks: usize,
    pub duration: Duration,
    pub results: Vec<TaskResult>,
    pub errors: Vec<String>,
    pub coordination: AgentCoordination,
    pub finished_at: DateTime<Utc>,
}

impl OrchestrationResult {
    pub fn result_for(&self, id: &TaskId) -> Option<&TaskResult> {
        self.results.iter().find(|r| &r.task_id == id)
    }

    /// Compact form published to the state store.
    pub fn summary(&self) -> Value {
        json!({
            "workflow_id": self.workflow_id,
            "session_id": self.session_id,
            "mode": self.mode,
            "success": self.success,
            "completed_tasks": self.completed_tasks,
            "failed_tasks": self.failed_tasks,
            "total_tasks": self.total_tasks,
            "duration_ms": self.duration.as_millis() as u64,
            "finished_at": self.finished_at.to_rfc3339(),
        })
    }
}

/// A run that has not finished yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSession {
    pub session_id: SessionId,
    pub workflow_id: WorkflowId,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    /// Tasks dispatched and not yet resolved.
    pub in_flight: BTreeSet<TaskId>,
}

/// Progress notifications for observers of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorEvent {
    RunStarted {
        session_id: SessionId,
        workflow_id: WorkflowId,
        mode: ExecutionMode,
    },
    PhaseStarted {
        session_id: SessionId,
        phase: usize,
        tasks: Vec<TaskId>,
    },
    TaskDispatched {
        session_id: SessionId,
        tasks: Vec<TaskId>,
        agent: AgentType,
    },
    TaskCompleted {
        session_id: SessionId,
        task_id: TaskId,
    },
    TaskFailed {
        session_id: SessionId,
        task_id: TaskId,
        error: String,
    },
    RunFinished {
        session_id: SessionId,
        workflow_id: WorkflowId,
        success: bool,
    },
}

/// Run deadline and the limit it was derived from.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    limit: Duration,
}

impl Deadline {
    /// A limit too far out to be represented as an instant means no deadline.
    fn from_limit(limit: Option<Duration>) -> Option<Self> {
        let limit = limit?;
        Instant::now()
            .checked_add(limit)
            .map(|at| Self { at, limit })
    }

    fn expired(&self) -> bool {
        Instant::now() >= self.at
    }

    fn error(&self) -> String {
        Error::Timeout(self.limit).to_string()
    }
}

/// Await `fut`, giving up at the deadline.
async fn within<F: Future>(deadline: Option<Deadline>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(d) => tokio::time::timeout_at(d.at, fut).await.ok(),
        None => Some(fut.await),
    }
}

/// How a single dispatch ended.
enum Attempt {
    Resolved(AgentOutcome),
    Rejected(String),
    TimedOut,
}

/// One task's result plus what it did to the run's counters.
struct TaskRun {
    result: TaskResult,
    dispatched: bool,
    rejected: bool,
}

struct RunOutput {
    results: Vec<TaskResult>,
    coordination: AgentCoordination,
}

/// Per-run state shared by the tasks of a phase.
struct RunContext<'a> {
    workflow: &'a Workflow,
    plan: &'a ExecutionPlan,
    session_id: SessionId,
    deadline: Option<Deadline>,
}

/// Coordinates agents to execute workflows.
///
/// Collaborators are injected so that embedders and tests control the agent
/// runtime, where state is published and where structured events go.
///
/// # Example
///
/// ```ignore
/// let coordinator = Coordinator::new(
///     Arc::new(AgentRegistry::new()),
///     Arc::new(MyRuntime::default()),
///     Arc::new(MemoryStateStore::new()),
///     Arc::new(FileLogger),
///     CoordinatorConfig::default(),
/// );
/// let result = coordinator.execute_orchestration_workflow(workflow, None).await?;
/// ```
pub struct Coordinator {
    registry: Arc<AgentRegistry>,
    runtime: Arc<dyn AgentRuntime>,
    store: Arc<dyn StateStore>,
    logger: Arc<dyn EventLogger>,
    config: CoordinatorConfig,
    resolver: ConflictResolver,
    metrics: RwLock<MetricsAggregator>,
    history: RwLock<RunHistory>,
    sessions: RwLock<HashMap<SessionId, ActiveSession>>,
    /// Per-agent dispatch limits, shared by every run of this coordinator.
    /// Empty when concurrency is not enforced.
    limiters: HashMap<AgentType, Arc<Semaphore>>,
    events: Option<mpsc::UnboundedSender<CoordinatorEvent>>,
}

impl Coordinator {
    pub fn new(
        registry: Arc<AgentRegistry>,
        runtime: Arc<dyn AgentRuntime>,
        store: Arc<dyn StateStore>,
        logger: Arc<dyn EventLogger>,
        config: CoordinatorConfig,
    ) -> Self {
        let limiters = if config.enforce_agent_concurrency {
            AgentType::ALL
                .iter()
                .map(|agent| (*agent, Arc::new(Semaphore::new(registry.max_concurrent(*agent)))))
                .collect()
        } else {
            HashMap::new()
        };
        Self {
            registry,
            runtime,
            store,
            logger,
            resolver: ConflictResolver::new(config.conflict_strategy),
            history: RwLock::new(RunHistory::new(config.history_limit)),
            metrics: RwLock::new(MetricsAggregator::new()),
            sessions: RwLock::new(HashMap::new()),
            limiters,
            events: None,
            config,
        }
    }

    /// Emit [`CoordinatorEvent`]s on `tx` while runs progress.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<CoordinatorEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn validate_workflow(&self, workflow: &Workflow) -> ValidationReport {
        validator::validate_workflow(workflow, &self.registry)
    }

    pub fn analyze_workflow_complexity(&self, workflow: &Workflow) -> WorkflowComplexity {
        analyze_workflow_complexity(workflow)
    }

    /// # Errors
    /// `CircularDependency` or `UnknownTaskKind` when the workflow cannot be
    /// planned.
    pub fn plan(&self, workflow: &Workflow) -> Result<ExecutionPlan> {
        ResourceAllocator::new(&self.registry, self.config.average_task_duration).plan(workflow)
    }

    /// Validate, plan and run a workflow to completion.
    ///
    /// Task failures, timeouts and planning problems are reported inside the
    /// returned result; every such run counts towards the metrics.
    ///
    /// # Errors
    /// `InvalidWorkflow` with every validation error when the workflow is
    /// rejected, `SessionActive` when `session_id` names a run still in
    /// progress. Nothing runs and no metrics change in either case.
    pub async fn execute_orchestration_workflow(
        &self,
        workflow: Workflow,
        session_id: Option<SessionId>,
    ) -> Result<OrchestrationResult> {
        let report = self.validate_workflow(&workflow);
        for warning in &report.warnings {
            self.log(
                LogLevel::Warn,
                "Workflow validation warning",
                &[("workflow", workflow.id.to_string()), ("warning", warning.clone())],
            );
        }
        if !report.valid {
            self.log(
                LogLevel::Warn,
                "Workflow rejected",
                &[
                    ("workflow", workflow.id.to_string()),
                    ("errors", report.errors.len().to_string()),
                ],
            );
            return Err(Error::InvalidWorkflow(report.errors));
        }

        let session_id = session_id.unwrap_or_default();
        let started = Instant::now();
        match self.sessions.write().await.entry(session_id) {
            Entry::Occupied(_) => return Err(Error::SessionActive(session_id.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(ActiveSession {
                    session_id,
                    workflow_id: workflow.id.clone(),
                    state: RunState::Planned,
                    started_at: Utc::now(),
                    in_flight: BTreeSet::new(),
                });
            }
        }

        let outcome = self.run(&workflow, session_id, started).await;
        let finished = match outcome {
            Ok((mode, output)) => self.finish(&workflow, session_id, mode, output, started),
            Err(e) => {
                self.log(
                    LogLevel::Error,
                    "Workflow run aborted",
                    &[("workflow", workflow.id.to_string()), ("error", e.to_string())],
                );
                self.full_failure(&workflow, session_id, &e, started)
            }
        };

        let terminal = if finished.success {
            RunState::Completed
        } else {
            RunState::Failed
        };
        self.set_state(session_id, terminal).await;
        self.record(&finished).await;
        self.sessions.write().await.remove(&session_id);

        self.emit(CoordinatorEvent::RunFinished {
            session_id,
            workflow_id: finished.workflow_id.clone(),
            success: finished.success,
        });
        self.log(
            if finished.success {
                LogLevel::Info
            } else {
                LogLevel::Warn
            },
            "Workflow finished",
            &[
                ("workflow", finished.workflow_id.to_string()),
                ("session", session_id.short()),
                ("mode", finished.mode.to_string()),
                ("completed", finished.completed_tasks.to_string()),
                ("failed", finished.failed_tasks.to_string()),
                ("duration_ms", finished.duration.as_millis().to_string()),
            ],
        );

        Ok(finished)
    }

    /// Plan and execute. Any `Err` here becomes a full-failure result.
    async fn run(
        &self,
        workflow: &Workflow,
        session_id: SessionId,
        started: Instant,
    ) -> Result<(ExecutionMode, RunOutput)> {
        self.set_state(session_id, RunState::Running).await;

        let plan = self.plan(workflow)?;
        elog_trace!(
            "Plan for {}: mode={} phases={} agents={:?} estimate={:?}",
            workflow.id,
            plan.mode,
            plan.phases.len(),
            plan.agents(),
            plan.estimated_duration
        );
        self.log(
            LogLevel::Info,
            "Workflow started",
            &[
                ("workflow", workflow.id.to_string()),
                ("session", session_id.short()),
                ("mode", plan.mode.to_string()),
                ("tasks", workflow.tasks.len().to_string()),
                ("complexity", format!("{:.1}", plan.complexity.overall)),
            ],
        );
        self.emit(CoordinatorEvent::RunStarted {
            session_id,
            workflow_id: workflow.id.clone(),
            mode: plan.mode,
        });

        let deadline = Deadline::from_limit(workflow.timeout().or(self.config.default_timeout));
        let output = if plan.mode.is_phased() {
            self.run_phased(workflow, &plan, session_id, deadline).await?
        } else {
            self.run_single(workflow, session_id, deadline, started).await
        };

        Ok((plan.mode, output))
    }

    /// Hand the whole workflow to the orchestrator in one dispatch.
    async fn run_single(
        &self,
        workflow: &Workflow,
        session_id: SessionId,
        deadline: Option<Deadline>,
        started: Instant,
    ) -> RunOutput {
        let mut coordination = AgentCoordination::default();
        if workflow.tasks.is_empty() {
            return RunOutput {
                results: Vec::new(),
                coordination,
            };
        }

        let agent = AgentType::Orchestrator;
        let task_ids = workflow.task_ids();
        let fail_all = |error: String| -> Vec<TaskResult> {
            task_ids
                .iter()
                .map(|id| TaskResult::failed(id.clone(), Some(agent), 0, error.clone(), started.elapsed()))
                .collect()
        };

        if deadline.is_some_and(|d| d.expired()) {
            let error = deadline.map(|d| d.error()).unwrap_or_default();
            return RunOutput {
                results: fail_all(error),
                coordination,
            };
        }

        let request = DispatchRequest {
            workflow_id: workflow.id.clone(),
            session_id,
            agent,
            tasks: task_ids.clone(),
            description: workflow
                .tasks
                .iter()
                .map(|t| t.description.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
            context: workflow.context.clone(),
            priority: workflow.priority,
            dependencies: workflow.dependencies.iter().map(|d| d.to_string()).collect(),
        };

        coordination.coordination_events += 1;
        coordination.agents_used.push(agent);
        self.track(session_id, &task_ids, true).await;
        self.emit(CoordinatorEvent::TaskDispatched {
            session_id,
            tasks: task_ids.clone(),
            agent,
        });
        elog_debug!("Dispatching {} tasks of {} to {}", task_ids.len(), workflow.id, agent);

        let attempt = self.dispatch_and_wait(request, deadline).await;
        self.track(session_id, &task_ids, false).await;

        let results = match attempt {
            Attempt::Resolved(AgentOutcome::Completed(output)) => task_ids
                .iter()
                .map(|id| TaskResult {
                    task_id: id.clone(),
                    agent: Some(agent),
                    phase: 0,
                    success: true,
                    output: Some(output.clone()),
                    error: None,
                    duration: started.elapsed(),
                })
                .collect(),
            Attempt::Resolved(AgentOutcome::Failed(error)) => fail_all(error),
            Attempt::Rejected(error) => {
                coordination.conflict_resolution_attempts += 1;
                fail_all(error)
            }
            Attempt::TimedOut => fail_all(deadline.map(|d| d.error()).unwrap_or_default()),
        };

        for result in &results {
            self.emit_result(session_id, result);
        }

        RunOutput {
            results,
            coordination,
        }
    }

    /// Run the plan's phases in order.
    async fn run_phased(
        &self,
        workflow: &Workflow,
        plan: &ExecutionPlan,
        session_id: SessionId,
        deadline: Option<Deadline>,
    ) -> Result<RunOutput> {
        let ctx = RunContext {
            workflow,
            plan,
            session_id,
            deadline,
        };

        let mut results = Vec::with_capacity(workflow.tasks.len());
        let mut coordination = AgentCoordination::default();
        let mut used = BTreeSet::new();

        for (index, phase) in plan.phases.iter().enumerate() {
            if let Some(d) = deadline.filter(|d| d.expired()) {
                for task in phase {
                    let result = TaskResult::failed(
                        task.id.clone(),
                        plan.agent_of(&task.id),
                        index,
                        d.error(),
                        Duration::ZERO,
                    );
                    self.emit_result(session_id, &result);
                    results.push(result);
                }
                continue;
            }

            elog_debug!("Phase {} of {}: {} tasks", index, workflow.id, phase.len());
            self.emit(CoordinatorEvent::PhaseStarted {
                session_id,
                phase: index,
                tasks: phase.iter().map(|t| t.id.clone()).collect(),
            });

            let runs = join_all(phase.iter().map(|task| self.run_task(&ctx, task, index))).await;
            for run in runs {
                let run = run?;
                if run.dispatched {
                    coordination.coordination_events += 1;
                    if let Some(agent) = run.result.agent {
                        used.insert(agent);
                    }
                }
                if run.rejected {
                    coordination.conflict_resolution_attempts += 1;
                }
                results.push(run.result);
            }
        }

        coordination.agents_used = used.into_iter().collect();
        Ok(RunOutput {
            results,
            coordination,
        })
    }

    async fn run_task(
        &self,
        ctx: &RunContext<'_>,
        task: &TaskDefinition,
        phase: usize,
    ) -> Result<TaskRun> {
        let agent = ctx.plan.agent_of(&task.id).ok_or_else(|| Error::UnknownTaskKind {
            task: task.id.to_string(),
            kind: task.kind.to_string(),
        })?;
        let waited = Instant::now();

        let _permit = match self.limiters.get(&agent) {
            Some(limiter) => {
                elog_trace!(
                    "Task {} waiting for {} ({} permits free)",
                    task.id,
                    agent,
                    limiter.available_permits()
                );
                match within(ctx.deadline, limiter.acquire()).await {
                    Some(permit) => Some(permit.map_err(|_| Error::LimiterClosed(agent.to_string()))?),
                    None => {
                        let result = self.timed_out(ctx, task, agent, phase, waited.elapsed());
                        return Ok(TaskRun {
                            result,
                            dispatched: false,
                            rejected: false,
                        });
                    }
                }
            }
            None => None,
        };

        let request = DispatchRequest {
            workflow_id: ctx.workflow.id.clone(),
            session_id: ctx.session_id,
            agent,
            tasks: vec![task.id.clone()],
            description: task.description.clone(),
            context: ctx.workflow.context.clone(),
            priority: task.priority,
            dependencies: task.dependencies.iter().map(|d| d.to_string()).collect(),
        };

        let ids = std::slice::from_ref(&task.id);
        self.track(ctx.session_id, ids, true).await;
        self.emit(CoordinatorEvent::TaskDispatched {
            session_id: ctx.session_id,
            tasks: ids.to_vec(),
            agent,
        });
        elog_debug!("Dispatching task {} to {}", task.id, agent);

        let started = Instant::now();
        let attempt = self.dispatch_and_wait(request, ctx.deadline).await;
        self.track(ctx.session_id, ids, false).await;

        let mut rejected = false;
        let result = match attempt {
            Attempt::Resolved(AgentOutcome::Completed(output)) => TaskResult {
                task_id: task.id.clone(),
                agent: Some(agent),
                phase,
                success: true,
                output: Some(output),
                error: None,
                duration: started.elapsed(),
            },
            Attempt::Resolved(AgentOutcome::Failed(error)) => {
                TaskResult::failed(task.id.clone(), Some(agent), phase, error, started.elapsed())
            }
            Attempt::Rejected(error) => {
                rejected = true;
                TaskResult::failed(task.id.clone(), Some(agent), phase, error, started.elapsed())
            }
            Attempt::TimedOut => {
                return Ok(TaskRun {
                    result: self.timed_out(ctx, task, agent, phase, started.elapsed()),
                    dispatched: true,
                    rejected: false,
                });
            }
        };

        if !result.success {
            self.log(
                LogLevel::Warn,
                "Task failed",
                &[
                    ("task", task.id.to_string()),
                    ("agent", agent.to_string()),
                    ("error", result.error.clone().unwrap_or_default()),
                ],
            );
        }
        self.emit_result(ctx.session_id, &result);

        Ok(TaskRun {
            result,
            dispatched: true,
            rejected,
        })
    }

    fn timed_out(
        &self,
        ctx: &RunContext<'_>,
        task: &TaskDefinition,
        agent: AgentType,
        phase: usize,
        elapsed: Duration,
    ) -> TaskResult {
        let error = ctx.deadline.map(|d| d.error()).unwrap_or_default();
        self.log(
            LogLevel::Warn,
            "Task timed out",
            &[("task", task.id.to_string()), ("agent", agent.to_string())],
        );
        let result = TaskResult::failed(task.id.clone(), Some(agent), phase, error, elapsed);
        self.emit_result(ctx.session_id, &result);
        result
    }

    async fn dispatch_and_wait(
        &self,
        request: DispatchRequest,
        deadline: Option<Deadline>,
    ) -> Attempt {
        let handle = match within(deadline, self.runtime.dispatch(request)).await {
            Some(Ok(handle)) => handle,
            Some(Err(e)) => return Attempt::Rejected(e.to_string()),
            None => return Attempt::TimedOut,
        };
        match within(deadline, handle.wait()).await {
            Some(outcome) => Attempt::Resolved(outcome),
            None => Attempt::TimedOut,
        }
    }

    fn finish(
        &self,
        workflow: &Workflow,
        session_id: SessionId,
        mode: ExecutionMode,
        output: RunOutput,
        started: Instant,
    ) -> OrchestrationResult {
        let completed_tasks = output.results.iter().filter(|r| r.success).count();
        let failed_tasks = output.results.len() - completed_tasks;
        let errors = output
            .results
            .iter()
            .filter_map(|r| r.error.as_ref().map(|e| format!("Task {}: {}", r.task_id, e)))
            .collect();

        OrchestrationResult {
            workflow_id: workflow.id.clone(),
            session_id,
            mode,
            success: failed_tasks == 0,
            completed_tasks,
            failed_tasks,
            total_tasks: output.results.len(),
            duration: started.elapsed(),
            results: output.results,
            errors,
            coordination: output.coordination,
            finished_at: Utc::now(),
        }
    }

    fn full_failure(
        &self,
        workflow: &Workflow,
        session_id: SessionId,
        error: &Error,
        started: Instant,
    ) -> OrchestrationResult {
        let message = error.to_string();
        let results: Vec<TaskResult> = workflow
            .tasks
            .iter()
            .map(|t| TaskResult::failed(t.id.clone(), None, 0, message.clone(), Duration::ZERO))
            .collect();

        OrchestrationResult {
            workflow_id: workflow.id.clone(),
            session_id,
            mode: analyze_workflow_complexity(workflow).strategy,
            success: false,
            completed_tasks: 0,
            failed_tasks: results.len(),
            total_tasks: results.len(),
            duration: started.elapsed(),
            results,
            errors: vec![message],
            coordination: AgentCoordination::default(),
            finished_at: Utc::now(),
        }
    }

    /// Fold a finished run into metrics and history, then publish.
    async fn record(&self, result: &OrchestrationResult) {
        let snapshot = {
            let mut metrics = self.metrics.write().await;
            metrics.record(result.success, result.duration, &result.coordination.agents_used);
            metrics.snapshot()
        };
        self.history.write().await.push(result.clone());

        if let Err(e) = self.publish(result, &snapshot) {
            elog_warn!("Failed to publish coordination state: {}", e);
        }
    }

    fn publish(&self, result: &OrchestrationResult, metrics: &CoordinationMetrics) -> Result<()> {
        self.store.set(METRICS_KEY, serde_json::to_value(metrics)?)?;
        self.store.set(LAST_RESULT_KEY, result.summary())?;
        Ok(())
    }

    pub async fn get_coordination_metrics(&self) -> CoordinationMetrics {
        self.metrics.read().await.snapshot()
    }

    /// Pick one of several conflicting agent responses using the configured
    /// strategy.
    pub fn resolve_conflicts(&self, responses: Vec<AgentResponse>) -> Option<AgentResponse> {
        let count = responses.len();
        let winner = self.resolver.resolve(responses);
        if let Some(w) = &winner {
            self.log(
                LogLevel::Debug,
                "Conflict resolved",
                &[
                    ("strategy", self.resolver.strategy().to_string()),
                    ("responses", count.to_string()),
                    ("winner", w.agent.to_string()),
                ],
            );
        }
        winner
    }

    pub async fn active_sessions(&self) -> Vec<ActiveSession> {
        let mut sessions: Vec<ActiveSession> = self.sessions.read().await.values().cloned().collect();
        sessions.sort_by_key(|s| s.started_at);
        sessions
    }

    /// Forget a session. Agents are not signalled.
    ///
    /// Returns false if the session is unknown.
    pub async fn cancel_session(&self, session_id: SessionId) -> bool {
        let removed = self.sessions.write().await.remove(&session_id).is_some();
        if removed {
            self.log(
                LogLevel::Info,
                "Session cancelled",
                &[("session", session_id.short())],
            );
        }
        removed
    }

    /// Stop tracking one in-flight task of a session.
    ///
    /// # Errors
    /// `SessionNotFound` if the session is not active.
    pub async fn cancel_task(&self, session_id: SessionId, task_id: &TaskId) -> Result<bool> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;
        Ok(session.in_flight.remove(task_id))
    }

    /// Finished runs, oldest first.
    pub async fn history(&self) -> Vec<OrchestrationResult> {
        self.history.read().await.iter().cloned().collect()
    }

    /// Drop history entries older than `max_age`. Returns how many.
    pub async fn cleanup_history(&self, max_age: Duration) -> usize {
        let removed = self.history.write().await.cleanup(max_age);
        if removed > 0 {
            elog_debug!("Removed {} runs from history", removed);
        }
        removed
    }

    async fn set_state(&self, session_id: SessionId, next: RunState) {
        if let Some(session) = self.sessions.write().await.get_mut(&session_id) {
            match session.state.transition(next) {
                Ok(state) => session.state = state,
                Err(e) => elog_warn!("Session {}: {}", session_id.short(), e),
            }
        }
    }

    async fn track(&self, session_id: SessionId, tasks: &[TaskId], in_flight: bool) {
        if let Some(session) = self.sessions.write().await.get_mut(&session_id) {
            for task in tasks {
                if in_flight {
                    session.in_flight.insert(task.clone());
                } else {
                    session.in_flight.remove(task);
                }
            }
        }
    }

    fn emit(&self, event: CoordinatorEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver just means nobody is watching.
            let _ = tx.send(event);
        }
    }

    fn emit_result(&self, session_id: SessionId, result: &TaskResult) {
        let event = match &result.error {
            None => CoordinatorEvent::TaskCompleted {
                session_id,
                task_id: result.task_id.clone(),
            },
            Some(error) => CoordinatorEvent::TaskFailed {
                session_id,
                task_id: result.task_id.clone(),
                error: error.clone(),
            },
        };
        self.emit(event);
    }

    fn log(&self, level: LogLevel, message: &str, fields: &[(&str, String)]) {
        self.logger.log(COMPONENT, message, level, fields);
    }
}
