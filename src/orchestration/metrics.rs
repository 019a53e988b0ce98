//! Long-running coordination statistics.

use crate::agents::AgentType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Task count assumed per workflow when deriving throughput.
pub const ASSUMED_TASKS_PER_WORKFLOW: f64 = 5.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoordinationMetrics {
    pub total_workflows: u64,
    pub successful_workflows: u64,
    pub failed_workflows: u64,
    /// Rolling mean run duration.
    pub average_duration_ms: f64,
    /// Runs each agent took part in.
    pub agent_utilization: BTreeMap<AgentType, u64>,
    /// Estimated tasks per minute.
    pub coordination_efficiency: f64,
}

impl CoordinationMetrics {
    pub fn success_rate(&self) -> f64 {
        if self.total_workflows == 0 {
            0.0
        } else {
            self.successful_workflows as f64 / self.total_workflows as f64
        }
    }
}

/// Folds finished runs into [`CoordinationMetrics`].
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    metrics: CoordinationMetrics,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one finished run into the statistics.
    pub fn record(&mut self, success: bool, duration: Duration, agents_used: &[AgentType]) {
        let m = &mut self.metrics;
        m.total_workflows += 1;
        if success {
            m.successful_workflows += 1;
        } else {
            m.failed_workflows += 1;
        }

        for agent in agents_used {
            *m.agent_utilization.entry(*agent).or_insert(0) += 1;
        }

        let sample = duration.as_secs_f64() * 1000.0;
        m.average_duration_ms += (sample - m.average_duration_ms) / m.total_workflows as f64;

        m.coordination_efficiency = if m.average_duration_ms > 0.0 {
            ASSUMED_TASKS_PER_WORKFLOW / (m.average_duration_ms / 60_000.0)
        } else {
            0.0
        };
    }

    /// Current statistics. Reading never changes them.
    pub fn snapshot(&self) -> CoordinationMetrics {
        self.metrics.clone()
    }
}
