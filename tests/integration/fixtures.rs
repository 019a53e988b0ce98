//! Test fixtures for integration tests.
//!
//! Provides helpers for:
//! - A scripted agent runtime with per-task behavior and delays
//! - Coordinators wired to in-memory collaborators
//! - Predefined task shapes

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use ensemble::agents::{AgentRegistry, AgentRuntime, AgentType, DispatchRequest, TaskHandle};
use ensemble::core::{TaskDefinition, TaskKind};
use ensemble::log::NullLogger;
use ensemble::orchestration::{Coordinator, CoordinatorConfig};
use ensemble::state::{MemoryStateStore, StateStore};
use ensemble::{Error, Result};

/// What the scripted runtime does with a task.
#[derive(Debug, Clone, PartialEq)]
pub enum Behavior {
    Succeed,
    /// Resolve the handle with a failure.
    Fail(String),
    /// Refuse the dispatch itself.
    Reject(String),
    /// Drop the completion sender without resolving.
    Drop,
}

/// Dispatch counters shared with the spawned completion tasks.
#[derive(Debug, Default)]
pub struct RuntimeStats {
    in_flight: Mutex<HashMap<AgentType, usize>>,
    peak: Mutex<HashMap<AgentType, usize>>,
}

impl RuntimeStats {
    fn start(&self, agent: AgentType) {
        let mut in_flight = self.in_flight.lock().unwrap();
        let count = in_flight.entry(agent).or_insert(0);
        *count += 1;
        let mut peak = self.peak.lock().unwrap();
        let max = peak.entry(agent).or_insert(0);
        *max = (*max).max(*count);
    }

    fn finish(&self, agent: AgentType) {
        if let Some(count) = self.in_flight.lock().unwrap().get_mut(&agent) {
            *count = count.saturating_sub(1);
        }
    }
}

/// Agent runtime whose behavior is scripted per task id.
///
/// Every accepted dispatch spawns a task that sleeps for the configured delay
/// and then resolves the handle.
pub struct ScriptedRuntime {
    behaviors: HashMap<String, Behavior>,
    delays: HashMap<String, Duration>,
    default_delay: Duration,
    requests: Mutex<Vec<DispatchRequest>>,
    stats: Arc<RuntimeStats>,
}

impl ScriptedRuntime {
    pub fn new() -> Self {
        Self {
            behaviors: HashMap::new(),
            delays: HashMap::new(),
            default_delay: Duration::from_millis(10),
            requests: Mutex::new(Vec::new()),
            stats: Arc::new(RuntimeStats::default()),
        }
    }

    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn fail(mut self, task: &str, error: &str) -> Self {
        self.behaviors
            .insert(task.to_string(), Behavior::Fail(error.to_string()));
        self
    }

    pub fn reject(mut self, task: &str, error: &str) -> Self {
        self.behaviors
            .insert(task.to_string(), Behavior::Reject(error.to_string()));
        self
    }

    pub fn drop_completion(mut self, task: &str) -> Self {
        self.behaviors.insert(task.to_string(), Behavior::Drop);
        self
    }

    pub fn delay(mut self, task: &str, delay: Duration) -> Self {
        self.delays.insert(task.to_string(), delay);
        self
    }

    /// Every request received, in dispatch order.
    pub fn requests(&self) -> Vec<DispatchRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Ids of the tasks dispatched, in dispatch order.
    pub fn dispatched(&self) -> Vec<String> {
        self.requests()
            .iter()
            .flat_map(|r| r.tasks.iter().map(|t| t.to_string()))
            .collect()
    }

    /// Highest number of simultaneously unresolved tasks seen for an agent.
    pub fn peak(&self, agent: AgentType) -> usize {
        self.stats.peak.lock().unwrap().get(&agent).copied().unwrap_or(0)
    }
}

#[async_trait]
impl AgentRuntime for ScriptedRuntime {
    async fn dispatch(&self, request: DispatchRequest) -> Result<TaskHandle> {
        let key = request
            .tasks
            .first()
            .map(|t| t.to_string())
            .unwrap_or_default();
        let behavior = self
            .behaviors
            .get(&key)
            .cloned()
            .unwrap_or(Behavior::Succeed);
        let delay = self.delays.get(&key).copied().unwrap_or(self.default_delay);
        let agent = request.agent;
        self.requests.lock().unwrap().push(request);

        if let Behavior::Reject(error) = behavior {
            return Err(Error::Dispatch(error));
        }

        self.stats.start(agent);
        let (sender, handle) = TaskHandle::channel();
        let stats = Arc::clone(&self.stats);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            stats.finish(agent);
            match behavior {
                Behavior::Succeed => {
                    sender.succeed(json!({ "task": key }));
                }
                Behavior::Fail(error) => {
                    sender.fail(error);
                }
                Behavior::Drop | Behavior::Reject(_) => drop(sender),
            }
        });

        Ok(handle)
    }
}

/// A coordinator over the scripted runtime with in-memory state.
pub struct Harness {
    pub runtime: Arc<ScriptedRuntime>,
    pub store: Arc<MemoryStateStore>,
    pub coordinator: Coordinator,
}

impl Harness {
    pub fn new(runtime: ScriptedRuntime) -> Self {
        Self::with_config(runtime, CoordinatorConfig::default())
    }

    pub fn with_config(runtime: ScriptedRuntime, config: CoordinatorConfig) -> Self {
        Self::with_store(runtime, config, Arc::new(MemoryStateStore::new()))
    }

    fn with_store(
        runtime: ScriptedRuntime,
        config: CoordinatorConfig,
        store: Arc<MemoryStateStore>,
    ) -> Self {
        let runtime = Arc::new(runtime);
        let coordinator = Coordinator::new(
            Arc::new(AgentRegistry::new()),
            runtime.clone(),
            store.clone() as Arc<dyn StateStore>,
            Arc::new(NullLogger),
            config,
        );
        Self {
            runtime,
            store,
            coordinator,
        }
    }
}

/// A task heavy enough (60) to push a workflow into phased execution.
pub fn phased_task(id: &str, kind: TaskKind) -> TaskDefinition {
    TaskDefinition::new(id, kind, &format!("work on {}", id)).with_complexity(60)
}
