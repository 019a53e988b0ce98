//! Bounded retention of finished runs.

use crate::core::WorkflowId;
use crate::orchestration::OrchestrationResult;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug)]
pub struct RunHistory {
    limit: usize,
    runs: VecDeque<OrchestrationResult>,
}

impl RunHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            runs: VecDeque::new(),
        }
    }

    /// Append a run, evicting the oldest once the limit is reached.
    pub fn push(&mut self, result: OrchestrationResult) {
        if self.limit == 0 {
            return;
        }
        while self.runs.len() >= self.limit {
            self.runs.pop_front();
        }
        self.runs.push_back(result);
    }

    /// Runs oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &OrchestrationResult> {
        self.runs.iter()
    }

    pub fn latest(&self) -> Option<&OrchestrationResult> {
        self.runs.back()
    }

    pub fn find(&self, workflow_id: &WorkflowId) -> Vec<&OrchestrationResult> {
        self.runs
            .iter()
            .filter(|r| &r.workflow_id == workflow_id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Drop runs that finished more than `max_age` ago. Returns how many.
    pub fn cleanup(&mut self, max_age: Duration) -> usize {
        self.cleanup_at(Utc::now(), max_age)
    }

    pub fn cleanup_at(&mut self, now: DateTime<Utc>, max_age: Duration) -> usize {
        let before = self.runs.len();
        self.runs.retain(|run| {
            // Finish times in the future count as age zero.
            let age = (now - run.finished_at).to_std().unwrap_or(Duration::ZERO);
            age <= max_age
        });
        before - self.runs.len()
    }
}
