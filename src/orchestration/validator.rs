//! Structural validation of workflows before they are planned.
//!
//! Every check runs regardless of earlier failures so the caller sees all
//! problems at once.

use crate::agents::AgentRegistry;
use crate::core::{TaskDAG, TaskId, Workflow, CONTEXT_VERSION};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Outcome of validating a workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    /// Non-fatal observations.
    pub warnings: Vec<String>,
}

impl ValidationReport {
    fn from_findings(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

/// Check a workflow for duplicate ids, cycles, unknown task kinds, dangling
/// dependencies and an unsupported context version.
pub fn validate_workflow(workflow: &Workflow, registry: &AgentRegistry) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    errors.extend(duplicate_ids(workflow));

    for task in TaskDAG::from_tasks(&workflow.tasks).cycles() {
        errors.push(format!("Circular dependency detected involving task {}", task));
    }

    for task in &workflow.tasks {
        if !task.kind.is_known() {
            errors.push(format!("Unknown task type '{}' for task {}", task.kind, task.id));
        }
    }

    let ids: HashSet<&TaskId> = workflow.tasks.iter().map(|t| &t.id).collect();
    for task in &workflow.tasks {
        for dep in &task.dependencies {
            if !ids.contains(dep) {
                errors.push(format!("Task {} depends on missing task {}", task.id, dep));
            }
        }
    }

    if !workflow.context.is_supported() {
        errors.push(format!(
            "Unsupported context version {} (newest supported is {})",
            workflow.context.version, CONTEXT_VERSION
        ));
    }

    if workflow.tasks.is_empty() {
        warnings.push("Workflow has no tasks".to_string());
    }

    for task in &workflow.tasks {
        if let Some(declared) = task.complexity {
            if registry.exceeds_all_candidates(task, declared) {
                warnings.push(format!(
                    "Task {} complexity {} exceeds every candidate agent's threshold",
                    task.id, declared
                ));
            }
        }
    }

    if workflow.timeout_secs == Some(0) {
        warnings.push("Workflow timeout is zero; no task will be dispatched".to_string());
    }

    ValidationReport::from_findings(errors, warnings)
}

fn duplicate_ids(workflow: &Workflow) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    let mut errors = Vec::new();

    for task in &workflow.tasks {
        if !seen.insert(&task.id) && reported.insert(&task.id) {
            errors.push(format!("Duplicate task ID: {}", task.id));
        }
    }

    errors
}
