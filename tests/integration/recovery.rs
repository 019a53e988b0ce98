//! Partial failure and timeout tests.
//!
//! A failed or timed-out task must never take its siblings down with it;
//! these tests check that completed work survives and failures are
//! reported per task.

use std::time::Duration;

use ensemble::core::{TaskId, TaskKind, Workflow};
use ensemble::orchestration::CoordinatorConfig;

use crate::fixtures::{phased_task, Harness, ScriptedRuntime};

/// Test: Partial failure
/// Given three independent tasks where the second fails
/// When the workflow runs
/// Then two complete, one fails, and both successes are in the results
#[tokio::test(start_paused = true)]
async fn test_partial_failure_keeps_successes() {
    let harness = Harness::new(ScriptedRuntime::new().fail("task-2", "agent crashed"));
    let wf = Workflow::new("partial")
        .with_task(phased_task("task-1", TaskKind::Testing))
        .with_task(phased_task("task-2", TaskKind::Testing))
        .with_task(phased_task("task-3", TaskKind::Testing));

    let result = harness
        .coordinator
        .execute_orchestration_workflow(wf, None)
        .await
        .unwrap();

    assert_eq!(result.completed_tasks, 2);
    assert_eq!(result.failed_tasks, 1);
    assert_eq!(result.total_tasks, 3);
    assert!(!result.success);
    assert!(result.result_for(&TaskId::from("task-1")).unwrap().success);
    assert!(result.result_for(&TaskId::from("task-3")).unwrap().success);

    let failed = result.result_for(&TaskId::from("task-2")).unwrap();
    assert_eq!(failed.error.as_deref(), Some("agent crashed"));
    assert_eq!(result.errors, vec!["Task task-2: agent crashed".to_string()]);
}

/// Test: Failure does not block later phases
/// Given B depending on a failing A
/// When the workflow runs
/// Then B is still dispatched and completes
#[tokio::test(start_paused = true)]
async fn test_dependent_of_failed_task_still_runs() {
    let harness = Harness::new(ScriptedRuntime::new().fail("A", "nope"));
    let wf = Workflow::new("continue")
        .with_task(phased_task("A", TaskKind::Debugging))
        .with_task(phased_task("B", TaskKind::Testing).depends_on("A"));

    let result = harness
        .coordinator
        .execute_orchestration_workflow(wf, None)
        .await
        .unwrap();

    assert_eq!(harness.runtime.dispatched(), vec!["A", "B"]);
    assert!(!result.result_for(&TaskId::from("A")).unwrap().success);
    assert!(result.result_for(&TaskId::from("B")).unwrap().success);
}

/// Test: Run deadline
/// Given a 1s timeout, a slow task, a fast sibling and a dependent of the slow task
/// When the deadline passes
/// Then the slow task fails with a timeout, the sibling's result is kept and
/// the dependent is never dispatched
#[tokio::test(start_paused = true)]
async fn test_timeout_fails_pending_tasks() {
    let runtime = ScriptedRuntime::new()
        .delay("slow", Duration::from_secs(5))
        .delay("fast", Duration::from_millis(10));
    let harness = Harness::new(runtime);
    let wf = Workflow::new("deadline")
        .with_task(phased_task("slow", TaskKind::Testing))
        .with_task(phased_task("fast", TaskKind::Testing))
        .with_task(phased_task("after", TaskKind::Testing).depends_on("slow"))
        .with_timeout(Duration::from_secs(1));

    let result = harness
        .coordinator
        .execute_orchestration_workflow(wf, None)
        .await
        .unwrap();

    assert!(!result.success);
    assert!(result.result_for(&TaskId::from("fast")).unwrap().success);

    let slow = result.result_for(&TaskId::from("slow")).unwrap();
    assert!(!slow.success);
    assert!(slow.error.as_ref().unwrap().contains("timed out"));

    let after = result.result_for(&TaskId::from("after")).unwrap();
    assert!(!after.success);
    assert_eq!(after.phase, 1);
    assert!(!harness.runtime.dispatched().contains(&"after".to_string()));
    assert_eq!(result.coordination.coordination_events, 2);
}

/// Test: Configured default timeout
/// Given a workflow without its own timeout
/// When the coordinator has a default deadline
/// Then the default applies
#[tokio::test(start_paused = true)]
async fn test_default_timeout_applies() {
    let config = CoordinatorConfig {
        default_timeout: Some(Duration::from_millis(500)),
        ..Default::default()
    };
    let harness = Harness::with_config(
        ScriptedRuntime::new().delay("slow", Duration::from_secs(2)),
        config,
    );
    let wf = Workflow::new("defaulted").with_task(phased_task("slow", TaskKind::Testing));

    let result = harness
        .coordinator
        .execute_orchestration_workflow(wf, None)
        .await
        .unwrap();

    assert_eq!(result.failed_tasks, 1);
    assert!(result.errors[0].contains("timed out"));
    assert!(result.duration < Duration::from_secs(1));
}

/// Test: Unbounded timeout
/// Given a workflow whose timeout is too large to schedule
/// When it runs
/// Then it completes as if it had no deadline
#[tokio::test(start_paused = true)]
async fn test_huge_timeout_runs_without_deadline() {
    let harness = Harness::new(ScriptedRuntime::new().with_default_delay(Duration::from_millis(20)));
    let mut wf = Workflow::new("patient").with_task(phased_task("r", TaskKind::Refactoring));
    wf.timeout_secs = Some(u64::MAX);

    let result = harness
        .coordinator
        .execute_orchestration_workflow(wf, None)
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.completed_tasks, 1);
}

/// Test: Dropped completion
/// Given a runtime that drops a task's completion sender
/// When the workflow runs
/// Then that task fails instead of hanging
#[tokio::test(start_paused = true)]
async fn test_dropped_completion_is_failure() {
    let harness = Harness::new(ScriptedRuntime::new().drop_completion("lost"));
    let wf = Workflow::new("dropped")
        .with_task(phased_task("lost", TaskKind::Testing))
        .with_task(phased_task("kept", TaskKind::Testing));

    let result = harness
        .coordinator
        .execute_orchestration_workflow(wf, None)
        .await
        .unwrap();

    assert_eq!(result.completed_tasks, 1);
    let lost = result.result_for(&TaskId::from("lost")).unwrap();
    assert_eq!(lost.error.as_deref(), Some("agent runtime dropped the task"));
}
