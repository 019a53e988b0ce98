//! Rejected workflow tests.
//!
//! A rejected workflow must not run, must not dispatch anything and must
//! not touch the metrics.

use ensemble::core::{TaskDefinition, TaskKind, Workflow};
use ensemble::Error;

use crate::fixtures::{Harness, ScriptedRuntime};

fn task(id: &str) -> TaskDefinition {
    TaskDefinition::new(id, TaskKind::General, "work")
}

async fn rejection(wf: Workflow) -> (Vec<String>, Harness) {
    let harness = Harness::new(ScriptedRuntime::new());
    let errors = match harness
        .coordinator
        .execute_orchestration_workflow(wf, None)
        .await
    {
        Err(Error::InvalidWorkflow(errors)) => errors,
        other => panic!("Expected InvalidWorkflow, got {:?}", other.map(|r| r.success)),
    };
    (errors, harness)
}

/// Test: Circular dependency
/// Given A depends on B and B depends on A
/// When the workflow is submitted
/// Then it is rejected naming a circular dependency and nothing runs
#[tokio::test]
async fn test_cycle_is_rejected() {
    let wf = Workflow::new("loop")
        .with_task(task("A").depends_on("B"))
        .with_task(task("B").depends_on("A"));

    let (errors, harness) = rejection(wf).await;
    assert!(errors.iter().any(|e| e.contains("Circular dependency")));
    assert!(harness.runtime.requests().is_empty());
    assert_eq!(
        harness.coordinator.get_coordination_metrics().await.total_workflows,
        0
    );
    assert!(harness.coordinator.history().await.is_empty());
}

/// Test: Duplicate ids
#[tokio::test]
async fn test_duplicate_id_is_rejected() {
    let wf = Workflow::new("dupes").with_task(task("t1")).with_task(task("t1"));
    let (errors, _) = rejection(wf).await;
    assert_eq!(errors, vec!["Duplicate task ID: t1".to_string()]);
}

/// Test: Dangling dependency
#[tokio::test]
async fn test_missing_dependency_is_rejected() {
    let wf = Workflow::new("dangling").with_task(task("a").depends_on("missing-id"));
    let (errors, _) = rejection(wf).await;
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("missing-id"));
}

/// Test: Unknown task type from a workflow file
/// Given JSON declaring a task type no agent handles
/// When it is loaded and submitted
/// Then it parses but is rejected
#[tokio::test]
async fn test_unknown_type_from_json_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("odd.json");
    std::fs::write(
        &path,
        r#"{
            "name": "odd",
            "tasks": [
                { "id": "a", "type": "testing", "description": "fine" },
                { "id": "b", "type": "interpretive-dance", "description": "not fine" }
            ]
        }"#,
    )
    .unwrap();

    let wf = Workflow::load(&path).unwrap();
    let (errors, _) = rejection(wf).await;
    assert_eq!(
        errors,
        vec!["Unknown task type 'interpretive-dance' for task b".to_string()]
    );
}

/// Test: Every violation reported at once
#[tokio::test]
async fn test_violations_are_aggregated() {
    let wf = Workflow::new("broken")
        .with_task(task("a").depends_on("b"))
        .with_task(task("b").depends_on("a"))
        .with_task(task("c"))
        .with_task(task("c").depends_on("nowhere"));

    let (errors, _) = rejection(wf).await;
    assert!(errors.iter().any(|e| e.contains("Duplicate task ID: c")));
    assert!(errors.iter().any(|e| e.contains("Circular dependency")));
    assert!(errors.iter().any(|e| e.contains("nowhere")));
}
